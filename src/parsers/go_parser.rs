//! Filepath: src/parsers/go_parser.rs
//! Go outlines: struct/interface types are class-like, receiver
//! methods attach to their type by name.

use anyhow::{Context, Result};
use tree_sitter::{Language as TsLanguage, Node, Parser, Query, QueryCursor, StreamingIterator};

use crate::core::symbols::{
    Candidate, Container, Language, OutlineBuilder, ParseFailure, SymbolExtractor, SymbolNode,
    parse_checked,
};
use crate::infra::utils::TsNodeUtils;

pub struct GoExtractor {
    language: TsLanguage,
    query: Query,
}

impl GoExtractor {
    pub fn new() -> Result<Self> {
        let language: TsLanguage = tree_sitter_go::LANGUAGE.into();
        Parser::new()
            .set_language(&language)
            .context("set Go language")?;

        let query_src = r#"
            (type_spec name: (type_identifier) @name type: (struct_type)) @class
            (type_spec name: (type_identifier) @name type: (interface_type)) @class
            (function_declaration name: (identifier) @name) @function
            (method_declaration name: (field_identifier) @name) @method
        "#;
        let query = Query::new(&language, query_src).context("create Go query")?;

        Ok(Self { language, query })
    }
}

impl SymbolExtractor for GoExtractor {
    fn language(&self) -> Language {
        Language::Go
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
                    "class" | "function" | "method" => picked = Some((cname, cap.node)),
                    "name" => name = cap.node.utf8_text(bytes).ok().map(str::to_string),
                    _ => {}
                }
            }

            let (Some((cname, node)), Some(name)) = (picked, name) else {
                continue;
            };

            let (is_class, container) = match cname {
                "class" => (true, nesting_of(node)),
                "method" => match receiver_type(node, bytes) {
                    Some(ty) => (false, Container::Named(ty)),
                    None => (false, Container::TopLevel),
                },
                _ => (false, Container::TopLevel),
            };

            let parameters = if is_class {
                Vec::new()
            } else {
                node.child_by_field_name("parameters")
                    .map(|p| TsNodeUtils::parameter_texts(p, bytes))
                    .unwrap_or_default()
            };

            out.push(Candidate::from_node(
                node, is_class, name, parameters, container,
            ));
        }

        Ok(OutlineBuilder::build(out))
    }
}

/// Types declared inside a function body are local
fn nesting_of(node: Node) -> Container {
    match TsNodeUtils::nearest_ancestor(
        node,
        &["function_declaration", "method_declaration", "func_literal"],
    ) {
        Some(_) => Container::Nested,
        None => Container::TopLevel,
    }
}

/// First type identifier inside the receiver: `(s *Server)` → `Server`
fn receiver_type(method: Node, bytes: &[u8]) -> Option<String> {
    let receiver = method.child_by_field_name("receiver")?;
    first_of_kind(receiver, "type_identifier")?
        .utf8_text(bytes)
        .ok()
        .map(str::to_string)
}

fn first_of_kind<'a>(node: Node<'a>, kind: &str) -> Option<Node<'a>> {
    if node.kind() == kind {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'a>> = node.named_children(&mut cursor).collect();
    children.into_iter().find_map(|c| first_of_kind(c, kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::symbols::SymbolKind;

    #[test]
    fn structs_receivers_and_functions() {
        let src = r#"package main

type Server struct {
	addr string
}

func (s *Server) Start(port int, host string) error {
	return nil
}

func main() {
	type local struct{}
}
"#;
        let out = GoExtractor::new().unwrap().extract(src).unwrap();
        let names: Vec<_> = out.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Server", "Start", "main"]);
        assert_eq!(out[0].kind, SymbolKind::Class);
        assert_eq!(out[1].kind, SymbolKind::Method);
        assert_eq!(out[1].parent, Some(0));
        assert_eq!(out[1].signature(), "Start(port int, host string)");
        assert_eq!(out[2].kind, SymbolKind::Function);
    }
}
