//! Filepath: src/core/tree.rs
//! Tree map of the eligible files, with optional symbol lines
//! beneath each file entry, e.g.
//!
//! ```text
//! └── src
//!     └── app.py
//!         class Foo
//!           method bar(self)
//! ```
//!
//! Directories left without any visible file are never created,
//! so empty branches do not show up. Siblings are ordered by name
//! (BTreeMap), matching the walker's order.

use std::collections::BTreeMap;

use crate::core::model::FileRecord;
use crate::core::symbols::{SymbolKind, SymbolNode, nesting_depth};
use crate::infra::config::TreeOptions;

const MID: &str = "├── ";
const LAST: &str = "└── ";
const PIPE: &str = "│   ";
const BLANK: &str = "    ";

#[derive(Debug, Default)]
struct TreeNode<'a> {
    /// Set on file leaves
    file: Option<&'a FileRecord>,
    children: BTreeMap<&'a str, TreeNode<'a>>,
}

impl<'a> TreeNode<'a> {
    fn insert(&mut self, record: &'a FileRecord) {
        let mut node = self;
        for part in record.path.components() {
            node = node.children.entry(part.as_str()).or_default();
        }
        node.file = Some(record);
    }
}

/// Render the tree map for `records` (already filtered to what should
/// be visible). Returns an empty string when there is nothing to show.
pub fn render_tree<'a>(records: impl IntoIterator<Item = &'a FileRecord>, opts: &TreeOptions) -> String {
    let mut root = TreeNode::default();
    for r in records {
        root.insert(r);
    }

    let mut lines = Vec::new();
    render_level(&root, "", opts, &mut lines);

    if lines.is_empty() {
        return String::new();
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn render_level(node: &TreeNode, prefix: &str, opts: &TreeOptions, lines: &mut Vec<String>) {
    let total = node.children.len();

    for (i, (name, child)) in node.children.iter().enumerate() {
        let is_last = i + 1 == total;
        lines.push(format!("{prefix}{}{name}", if is_last { LAST } else { MID }));

        let next = format!("{prefix}{}", if is_last { BLANK } else { PIPE });

        if let Some(record) = child.file {
            lines.extend(symbol_lines(&record.outline, opts).map(|l| format!("{next}{l}")));
        }
        render_level(child, &next, opts, lines);
    }
}

fn shows(kind: SymbolKind, opts: &TreeOptions) -> bool {
    match kind {
        SymbolKind::Class => opts.show_classes,
        SymbolKind::Function => opts.show_functions,
        SymbolKind::Method => opts.show_methods,
    }
}

/// `class Foo`, `  method bar(self)`: two spaces per visible
/// enclosing class
fn symbol_lines<'o>(outline: &'o [SymbolNode], opts: &'o TreeOptions) -> impl Iterator<Item = String> + 'o {
    outline
        .iter()
        .enumerate()
        .filter(|(_, s)| shows(s.kind, opts))
        .map(|(idx, s)| {
            let depth = if opts.show_classes { nesting_depth(outline, idx) } else { 0 };
            format!("{}{} {}", "  ".repeat(depth), s.kind.label(), s.signature())
        })
}
