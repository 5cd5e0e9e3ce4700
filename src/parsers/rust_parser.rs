//! Filepath: src/parsers/rust_parser.rs

use anyhow::{Context, Result};
use tree_sitter::{Language as TsLanguage, Node, Parser, Query, QueryCursor, StreamingIterator};

use crate::core::symbols::{
    Candidate, Container, Language, OutlineBuilder, ParseFailure, SymbolExtractor, SymbolNode,
    parse_checked,
};
// Reuse the shared helper to avoid drift
use crate::infra::utils::TsNodeUtils;

pub struct RustExtractor {
    language: TsLanguage,
    // One resilient query capturing item nodes; ownership is computed later.
    items_query: Query,
}

impl RustExtractor {
    pub fn new() -> Result<Self> {
        let language: TsLanguage = tree_sitter_rust::LANGUAGE.into();
        Parser::new()
            .set_language(&language)
            .context("set Rust language")?;

        // Structs, enums, unions and traits are the class-like nodes.
        // `function_signature_item` covers bodiless trait methods.
        let items_query_src = r#"
            (function_item name: (identifier) @name) @function
            (function_signature_item name: (identifier) @name) @function
            (struct_item name: (type_identifier) @name) @class
            (enum_item   name: (type_identifier) @name) @class
            (union_item  name: (type_identifier) @name) @class
            (trait_item  name: (type_identifier) @name) @class
        "#;

        let items_query =
            Query::new(&language, items_query_src).context("create Rust items query")?;
        Ok(Self {
            language,
            items_query,
        })
    }
}

impl SymbolExtractor for RustExtractor {
    fn language(&self) -> Language {
        Language::Rust
    }

    fn extract(&self, content: &str) -> Result<Vec<SymbolNode>, ParseFailure> {
        let tree = parse_checked(&self.language, content)?;
        let bytes = content.as_bytes();

        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&self.items_query, tree.root_node(), bytes);
        let cap_names: Vec<&str> = self.items_query.capture_names().to_vec();

        let mut out = Vec::new();

        while let Some(m) = matches.next() {
            let mut picked: Option<(&str, Node)> = None;
            let mut name: Option<String> = None;

            for cap in m.captures {
                let cname = cap_names[cap.index as usize];
                match cname {
                    "function" | "class" => picked = Some((cname, cap.node)),
                    "name" => name = cap.node.utf8_text(bytes).ok().map(str::to_string),
                    _ => {}
                }
            }

            let (Some((cname, node)), Some(name)) = (picked, name) else {
                continue;
            };

            let is_class = cname == "class";
            let parameters = if is_class {
                Vec::new()
            } else {
                node.child_by_field_name("parameters")
                    .map(|p| TsNodeUtils::parameter_texts(p, bytes))
                    .unwrap_or_default()
            };
            let container = container_of(node, is_class, bytes);

            out.push(Candidate::from_node(
                node, is_class, name, parameters, container,
            ));
        }

        Ok(OutlineBuilder::build(out))
    }
}

/// Functions in a trait belong to that trait; functions in an
/// impl attach by the implemented type's name. Anything inside a
/// function body is nested.
fn container_of(node: Node, is_class: bool, bytes: &[u8]) -> Container {
    let kinds: &[&str] = if is_class {
        &["function_item"]
    } else {
        &["function_item", "impl_item", "trait_item"]
    };

    match TsNodeUtils::nearest_ancestor(node, kinds) {
        None => Container::TopLevel,
        Some(p) => match p.kind() {
            "trait_item" => Container::Class(p.id()),
            "impl_item" => match p.child_by_field_name("type").and_then(|t| base_type_name(t, bytes)) {
                Some(ty) => Container::Named(ty),
                None => Container::TopLevel,
            },
            _ => Container::Nested,
        },
    }
}

/// `Foo`, `Foo<T>`, `crate::m::Foo<T>`, `&Foo` → `Foo`
fn base_type_name(ty: Node, bytes: &[u8]) -> Option<String> {
    match ty.kind() {
        "type_identifier" => ty.utf8_text(bytes).ok().map(str::to_string),
        "generic_type" => base_type_name(ty.child_by_field_name("type")?, bytes),
        "scoped_type_identifier" => TsNodeUtils::field_text(ty, "name", bytes).map(str::to_string),
        "reference_type" => base_type_name(ty.child_by_field_name("type")?, bytes),
        _ => None,
    }
}
