//! Filepath: src/core/symbols.rs
//! Static structural outlines (classes, functions, methods).
//! Language extractors live in `parsers::*`; this module owns
//! the shared types, the per-run registry, and the outline
//! builder that turns raw captures into a flat, source-ordered
//! sequence with parent links expressed as indices.
use std::collections::HashMap;

use anyhow::Result; // Error handling
use serde::{Deserialize, Serialize}; // JSON report
use tree_sitter::Node;

use crate::{
    infra::utils::TsNodeUtils,
    parsers::{EcmaExtractor, GoExtractor, PythonExtractor, RustExtractor},
};

/// Closed set of symbol kinds; rendering matches exhaustively
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind
{
    /// Class-like type (class, struct, enum, trait, interface)
    Class,

    /// Free-standing function
    Function,

    /// Function owned by a class-like type
    Method,
}

impl SymbolKind
{
    /// Prefix used in tree annotations
    pub fn label(self) -> &'static str
    {
        match self
        {
            SymbolKind::Class => "class",
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
        }
    }
}

/// One entry of a file outline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SymbolNode
{
    pub kind: SymbolKind,

    /// Simple declared name
    pub name: String,

    /// Parameters as written, whitespace-normalized
    pub parameters: Vec<String>,

    /// 1-based start line
    pub start_line: usize,

    /// 1-based end line
    pub end_line: usize,

    /// Index of the enclosing class node in the same outline (lookup only)
    pub parent: Option<usize>,
}

impl SymbolNode
{
    /// `Foo` for classes, `bar(self, x)` for callables
    pub fn signature(&self) -> String
    {
        match self.kind
        {
            SymbolKind::Class => self
                .name
                .clone(),
            SymbolKind::Function | SymbolKind::Method =>
            {
                format!(
                    "{}({})",
                    self.name,
                    self.parameters
                        .join(", ")
                )
            }
        }
    }
}

/// Number of enclosing class nodes above `idx`
pub fn nesting_depth(
    outline: &[SymbolNode],
    idx: usize,
) -> usize
{
    let mut depth = 0;
    let mut cur = outline
        .get(idx)
        .and_then(|n| n.parent);

    // Parents always precede children, so this terminates
    while let Some(p) = cur
    {
        if p >= idx
        {
            break;
        }
        depth += 1;
        cur = outline
            .get(p)
            .and_then(|n| n.parent);
    }
    depth
}

/// Declarations of `outline` copied from `source` with every
/// function body replaced by a placeholder. Indentation and header
/// text are kept verbatim; nested closures never appear because the
/// outline leaves them out.
pub fn skeleton(
    outline: &[SymbolNode],
    source: &str,
    ext: &str,
) -> String
{
    let python = Language::from_extension(ext) == Some(Language::Python);
    let lines: Vec<&str> = source
        .lines()
        .collect();
    let mut out: Vec<String> = Vec::new();
    // Classes whose closing line is still owed
    let mut open: Vec<&SymbolNode> = Vec::new();

    for node in outline
    {
        if node.start_line == 0 || node.start_line > lines.len()
        {
            continue;
        }

        while let Some(top) = open.last()
            && top.end_line < node.start_line
        {
            push_closer(&mut out, &lines, top, python);
            open.pop();
        }

        let header_end = header_end(&lines, node, python);
        out.extend(
            lines[node.start_line - 1..header_end]
                .iter()
                .map(|l| l.to_string()),
        );

        match node.kind
        {
            SymbolKind::Class => open.push(node),
            SymbolKind::Function | SymbolKind::Method if header_end < node.end_line =>
            {
                let indent = leading_ws(lines[node.start_line - 1]);
                let placeholder = if python { "pass" } else { "..." };
                out.push(format!("{indent}    {placeholder}"));
                push_closer(&mut out, &lines, node, python);
            }
            SymbolKind::Function | SymbolKind::Method => {}
        }
    }

    while let Some(top) = open.pop()
    {
        push_closer(&mut out, &lines, top, python);
    }

    let mut text = out.join("\n");
    if !text.is_empty()
    {
        text.push('\n');
    }
    text
}

/// 1-based last line of the declaration header, clamped to the node
fn header_end(
    lines: &[&str],
    node: &SymbolNode,
    python: bool,
) -> usize
{
    let last = node
        .end_line
        .min(lines.len());
    (node.start_line..=last)
        .find(|&n| {
            let line = lines[n - 1].trim_end();
            if python { line.ends_with(':') } else { line.contains('{') || line.ends_with(';') }
        })
        .unwrap_or(last)
}

/// Brace languages: repeat the node's closing line
fn push_closer(
    out: &mut Vec<String>,
    lines: &[&str],
    node: &SymbolNode,
    python: bool,
)
{
    if python || node.end_line <= node.start_line
    {
        return;
    }
    if let Some(line) = lines.get(node.end_line - 1)
        && line
            .trim_start()
            .starts_with('}')
    {
        out.push(line.to_string());
    }
}

fn leading_ws(line: &str) -> &str
{
    &line[..line.len() - line.trim_start().len()]
}

/// Languages with a structural extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language
{
    Python,
    Rust,
    JavaScript,
    TypeScript,
    Tsx,
    Go,
}

impl Language
{
    /// Map a dotted lowercase extension to a language
    pub fn from_extension(ext: &str) -> Option<Self>
    {
        let lang = match ext
        {
            ".py" | ".pyw" => Language::Python,
            ".rs" => Language::Rust,
            ".js" | ".jsx" | ".mjs" | ".cjs" => Language::JavaScript,
            ".ts" | ".mts" | ".cts" => Language::TypeScript,
            ".tsx" => Language::Tsx,
            ".go" => Language::Go,
            _ => return None,
        };
        Some(lang)
    }

    pub fn name(self) -> &'static str
    {
        match self
        {
            Language::Python => "python",
            Language::Rust => "rust",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Tsx => "tsx",
            Language::Go => "go",
        }
    }
}

/// Structural extraction failed; the outline is discarded
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("syntax error at line {line}")]
pub struct ParseFailure
{
    pub line: usize,
}

pub trait SymbolExtractor: Send + Sync
{
    /// Language handled by this extractor
    fn language(&self) -> Language;

    /// Parse `content` and return its outline in source order
    fn extract(
        &self,
        content: &str,
    ) -> Result<Vec<SymbolNode>, ParseFailure>;
}

/// Where a callable or class was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Container
{
    /// Module/file level
    TopLevel,

    /// Directly inside the class-like node with this id
    Class(usize),

    /// Attached to a type by name (Rust `impl`, Go receiver)
    Named(String),

    /// Inside a function body; not part of the outline
    Nested,
}

/// A raw capture waiting for parent resolution
#[derive(Debug, Clone)]
pub struct Candidate
{
    /// Tree-sitter node id (stable within one tree)
    pub id: usize,
    pub start_byte: usize,
    pub is_class: bool,
    pub name: String,
    pub parameters: Vec<String>,
    pub start_line: usize,
    pub end_line: usize,
    pub container: Container,
}

impl Candidate
{
    /// Candidate for `node`, with line range from the node itself
    pub fn from_node(
        node: Node,
        is_class: bool,
        name: String,
        parameters: Vec<String>,
        container: Container,
    ) -> Self
    {
        let (start_line, end_line) = TsNodeUtils::line_range_1based(node);
        Self {
            id: node.id(),
            start_byte: node.start_byte(),
            is_class,
            name,
            parameters,
            start_line,
            end_line,
            container,
        }
    }
}

/// Shared two-pass builder: order by source position, then
/// resolve parents by node id or by type name.
pub struct OutlineBuilder;

impl OutlineBuilder
{
    pub fn build(mut candidates: Vec<Candidate>) -> Vec<SymbolNode>
    {
        // Source order, one entry per node
        candidates.sort_by_key(|c| (c.start_byte, c.id));
        candidates.dedup_by_key(|c| c.id);
        candidates.retain(|c| c.container != Container::Nested);

        // Pass 1: index classes by node id and (first) name
        let mut by_id: HashMap<usize, usize> = HashMap::new();
        let mut by_name: HashMap<&str, usize> = HashMap::new();
        for (i, c) in candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_class)
        {
            by_id.insert(c.id, i);
            by_name
                .entry(c.name.as_str())
                .or_insert(i);
        }

        // Pass 2: resolve parents and kinds
        candidates
            .iter()
            .map(|c| {
                let parent = match &c.container
                {
                    Container::Class(id) => by_id
                        .get(id)
                        .copied(),
                    Container::Named(name) => by_name
                        .get(name.as_str())
                        .copied(),
                    Container::TopLevel | Container::Nested => None,
                };

                let kind = match (c.is_class, &c.container)
                {
                    (true, _) => SymbolKind::Class,
                    (false, Container::Class(_) | Container::Named(_)) => SymbolKind::Method,
                    (false, _) => SymbolKind::Function,
                };

                SymbolNode {
                    kind,
                    name: c
                        .name
                        .clone(),
                    parameters: c
                        .parameters
                        .clone(),
                    start_line: c.start_line,
                    end_line: c.end_line,
                    parent,
                }
            })
            .collect()
    }
}

/// Reject trees with ERROR/MISSING nodes
pub fn check_syntax(root: Node) -> Result<(), ParseFailure>
{
    match TsNodeUtils::first_error(root)
    {
        Some(bad) => Err(ParseFailure { line: bad.start_position().row + 1 }),
        None => Ok(()),
    }
}

/// Parse with a fresh parser and reject malformed trees
pub fn parse_checked(
    language: &tree_sitter::Language,
    content: &str,
) -> Result<tree_sitter::Tree, ParseFailure>
{
    // Parsers are cheap and not Sync; one per call
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(language)
        .map_err(|_| ParseFailure { line: 1 })?;

    let tree = parser
        .parse(content, None)
        .ok_or(ParseFailure { line: 1 })?;

    check_syntax(tree.root_node())?;
    Ok(tree)
}

/// Extractors compiled once per run and shared by the worker pool
pub struct SymbolRegistry
{
    extractors: Vec<Box<dyn SymbolExtractor>>,
}

impl SymbolRegistry
{
    /// Compile every grammar query
    pub fn new() -> Result<Self>
    {
        let extractors: Vec<Box<dyn SymbolExtractor>> = vec![
            Box::new(PythonExtractor::new()?),
            Box::new(RustExtractor::new()?),
            Box::new(EcmaExtractor::javascript()?),
            Box::new(EcmaExtractor::typescript()?),
            Box::new(EcmaExtractor::tsx()?),
            Box::new(GoExtractor::new()?),
        ];
        Ok(Self { extractors })
    }

    /// Extractor for a dotted lowercase extension, if supported
    pub fn for_extension(
        &self,
        ext: &str,
    ) -> Option<&dyn SymbolExtractor>
    {
        let lang = Language::from_extension(ext)?;
        self.extractors
            .iter()
            .find(|e| e.language() == lang)
            .map(|e| e.as_ref())
    }

    /// Outline for `content`; `Ok(empty)` for unsupported languages
    pub fn outline(
        &self,
        ext: &str,
        content: &str,
    ) -> Result<Vec<SymbolNode>, ParseFailure>
    {
        match self.for_extension(ext)
        {
            Some(x) => x.extract(content),
            None => Ok(Vec::new()),
        }
    }
}
