//! Filepath: src/parsers/ecmascript_parser.rs
//! JavaScript, TypeScript and TSX outlines from one extractor.
//! The grammars share node names for classes, functions and
//! methods; TypeScript adds interfaces, abstract classes and
//! method signatures, so its query is a superset.

use anyhow::{Context, Result};
use tree_sitter::{Language as TsLanguage, Node, Parser, Query, QueryCursor, StreamingIterator};

use crate::core::symbols::{
    Candidate, Container, Language, OutlineBuilder, ParseFailure, SymbolExtractor, SymbolNode,
    parse_checked,
};
use crate::infra::utils::TsNodeUtils;

const COMMON_QUERY: &str = r#"
    (class_declaration name: (_) @name) @class
    (function_declaration name: (_) @name) @function
    (generator_function_declaration name: (_) @name) @function
    (method_definition name: (_) @name) @function
    (variable_declarator
      name: (identifier) @name
      value: [(arrow_function) (function_expression)]) @function
"#;

const TYPESCRIPT_QUERY: &str = r#"
    (abstract_class_declaration name: (_) @name) @class
    (interface_declaration name: (_) @name) @class
    (method_signature name: (_) @name) @function
    (abstract_method_signature name: (_) @name) @function
"#;

/// Ancestors that own methods
const CLASS_KINDS: [&str; 4] = [
    "class_declaration",
    "abstract_class_declaration",
    "interface_declaration",
    "class",
];

/// Ancestors whose bodies hide nested definitions
const FUNCTION_KINDS: [&str; 5] = [
    "function_declaration",
    "generator_function_declaration",
    "function_expression",
    "arrow_function",
    "method_definition",
];

pub struct EcmaExtractor {
    dialect: Language,
    language: TsLanguage,
    query: Query,
}

impl EcmaExtractor {
    pub fn javascript() -> Result<Self> {
        Self::build(Language::JavaScript, tree_sitter_javascript::LANGUAGE.into())
    }

    pub fn typescript() -> Result<Self> {
        Self::build(
            Language::TypeScript,
            tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        )
    }

    pub fn tsx() -> Result<Self> {
        Self::build(Language::Tsx, tree_sitter_typescript::LANGUAGE_TSX.into())
    }

    fn build(dialect: Language, language: TsLanguage) -> Result<Self> {
        Parser::new()
            .set_language(&language)
            .with_context(|| format!("set {} language", dialect.name()))?;

        let src = match dialect {
            Language::JavaScript => COMMON_QUERY.to_string(),
            _ => format!("{COMMON_QUERY}{TYPESCRIPT_QUERY}"),
        };
        let query = Query::new(&language, &src)
            .with_context(|| format!("create {} query", dialect.name()))?;

        Ok(Self {
            dialect,
            language,
            query,
        })
    }
}

impl SymbolExtractor for EcmaExtractor {
    fn language(&self) -> Language {
        self.dialect
    }

    fn extract(&self, content: &str) -> Result<Vec<SymbolNode>, ParseFailure> {
        let tree = parse_checked(&self.language, content)?;
        let bytes = content.as_bytes();

        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&self.query, tree.root_node(), bytes);
        let cap_names: Vec<&str> = self.query.capture_names().to_vec();

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
                parameters_of(node, bytes)
            };

            out.push(Candidate::from_node(
                node,
                is_class,
                name,
                parameters,
                container_of(node),
            ));
        }

        Ok(OutlineBuilder::build(out))
    }
}

/// `const f = (a) => …` keeps its parameters on the value node;
/// a bare `x => …` uses the singular `parameter` field.
fn parameters_of(node: Node, bytes: &[u8]) -> Vec<String> {
    let target = if node.kind() == "variable_declarator" {
        match node.child_by_field_name("value") {
            Some(v) => v,
            None => return Vec::new(),
        }
    } else {
        node
    };

    if let Some(params) = target.child_by_field_name("parameters") {
        return TsNodeUtils::parameter_texts(params, bytes);
    }
    TsNodeUtils::field_text(target, "parameter", bytes)
        .map(|p| vec![p.to_string()])
        .unwrap_or_default()
}

fn container_of(node: Node) -> Container {
    let kinds: Vec<&str> = CLASS_KINDS.iter().chain(FUNCTION_KINDS.iter()).copied().collect();

    match TsNodeUtils::nearest_ancestor(node, &kinds) {
        None => Container::TopLevel,
        Some(p) if CLASS_KINDS.contains(&p.kind()) => Container::Class(p.id()),
        Some(_) => Container::Nested,
    }
}
