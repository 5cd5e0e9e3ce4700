//! Filepath: src/parsers/python_parser.rs
//! ------------------------------------------------------------------
//! Python outline extractor built on Tree-sitter 0.25.x.
//! Goals:
//!   - Use broad, stable queries (no fragile field predicates).
//!   - Classify methods by ancestry (avoid duplicate matches).
//!   - Skip functions and classes defined inside function bodies.
//!
//! Notes:
//!   - We only query for functions and classes. Methods are
//!     determined by the nearest enclosing definition.
//!   - Decorated definitions are found through the inner node.
//!   - We rely on tree_sitter::StreamingIterator for matches.
//! ------------------------------------------------------------------

use anyhow::{Context, Result};
use tree_sitter::{Language as TsLanguage, Node, Parser, Query, QueryCursor, StreamingIterator};

use crate::core::symbols::{
    Candidate, Container, Language, OutlineBuilder, ParseFailure, SymbolExtractor, SymbolNode,
    parse_checked,
};
use crate::infra::utils::TsNodeUtils;

/// Extracts Python classes, functions and methods.
pub struct PythonExtractor {
    /// Python language handle for Tree-sitter.
    language: TsLanguage,
    /// Broad, stable query capturing defs and class defs.
    query: Query,
}

impl PythonExtractor {
    /// Construct a new extractor with a broad query that
    /// captures function_definition and class_definition.
    pub fn new() -> Result<Self> {
        // Obtain the Tree-sitter language for Python.
        let language: TsLanguage = tree_sitter_python::LANGUAGE.into();

        // Fail early on an ABI mismatch rather than per file.
        Parser::new()
            .set_language(&language)
            .context("set Python language")?;

        let query_src = r#"
            (function_definition
              name: (identifier) @name) @item

            (class_definition
              name: (identifier) @name) @item
        "#;

        // Compile the query once for reuse in extraction.
        let query = Query::new(&language, query_src).context("create Python query")?;

        Ok(Self { language, query })
    }
}

impl SymbolExtractor for PythonExtractor {
    fn language(&self) -> Language {
        Language::Python
    }

    fn extract(&self, content: &str) -> Result<Vec<SymbolNode>, ParseFailure> {
        let tree = parse_checked(&self.language, content)?;

        // Use the same bytes slice for all utf8_text calls.
        let bytes = content.as_bytes();

        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&self.query, tree.root_node(), bytes);
        let cap_names: Vec<&str> = self.query.capture_names().to_vec();

        let mut out = Vec::with_capacity(16);

        while let Some(m) = matches.next() {
            let mut picked: Option<Node> = None;
            let mut name_text: Option<String> = None;

            for cap in m.captures {
                match cap_names[cap.index as usize] {
                    "item" => picked = Some(cap.node),
                    "name" => name_text = cap.node.utf8_text(bytes).ok().map(str::to_string),
                    _ => {}
                }
            }

            // Skip malformed matches lacking structure or name.
            let (Some(node), Some(name)) = (picked, name_text) else {
                continue;
            };

            let is_class = node.kind() == "class_definition";
            let parameters = if is_class {
                Vec::new()
            } else {
                node.child_by_field_name("parameters")
                    .map(|p| TsNodeUtils::parameter_texts(p, bytes))
                    .unwrap_or_default()
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

/// The nearest enclosing definition decides ownership.
fn container_of(node: Node) -> Container {
    match TsNodeUtils::nearest_ancestor(node, &["class_definition", "function_definition"]) {
        Some(p) if p.kind() == "class_definition" => Container::Class(p.id()),
        Some(_) => Container::Nested,
        None => Container::TopLevel,
    }
}
