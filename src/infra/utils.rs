//! Filepath: src/infra/utils.rs
//! Utility helpers organized by small, focused structs.
//! All functions are associated fns to keep call sites
//! ergonomic, testable, and discoverable.

use std::path::Path;

use camino::Utf8PathBuf;
// Tree-sitter types for node helpers
use tree_sitter::Node;

/// Relative-path helpers
pub struct PathUtils;

impl PathUtils
{
    /// `path` relative to `root`, always `/`-separated.
    /// Non-UTF-8 components are converted lossily.
    pub fn relative_slash(
        root: &Path,
        path: &Path,
    ) -> Utf8PathBuf
    {
        // Fall back to the full path when outside root
        let rel = path
            .strip_prefix(root)
            .unwrap_or(path);

        let joined = rel
            .components()
            .map(|c| {
                c.as_os_str()
                    .to_string_lossy()
            })
            .collect::<Vec<_>>()
            .join("/");

        Utf8PathBuf::from(joined)
    }

    /// Lowercase extension including the dot; empty when absent
    pub fn dotted_extension(name: &str) -> String
    {
        match name.rfind('.')
        {
            // ".gitignore" style names have no extension
            Some(0) | None => String::new(),
            Some(i) => name[i..].to_lowercase(),
        }
    }
}

/// Common Tree-sitter node helpers
pub struct TsNodeUtils;

impl TsNodeUtils
{
    /// Find the nearest ancestor whose kind is in `kinds`
    pub fn nearest_ancestor<'a>(
        mut node: Node<'a>,
        kinds: &[&str],
    ) -> Option<Node<'a>>
    {
        // Walk up parents until we match or hit root
        while let Some(p) = node.parent()
        {
            if kinds.contains(&p.kind())
            {
                return Some(p);
            }

            node = p;
        }

        // No ancestor found
        None
    }

    /// Extract text of a child field if present
    pub fn field_text<'a>(
        node: Node,
        field: &str,
        bytes: &'a [u8],
    ) -> Option<&'a str>
    {
        // Locate the child by field name
        let child = node.child_by_field_name(field)?;

        // Convert to utf8 text
        child
            .utf8_text(bytes)
            .ok()
    }

    /// Convert node positions to 1-based line numbers
    pub fn line_range_1based(node: Node) -> (usize, usize)
    {
        (node.start_position().row + 1, node.end_position().row + 1)
    }

    /// First ERROR or MISSING node in pre-order, if any
    pub fn first_error(root: Node) -> Option<Node>
    {
        if !root.has_error()
        {
            return None;
        }

        let mut cursor = root.walk();
        loop
        {
            let node = cursor.node();
            if node.is_error() || node.is_missing()
            {
                return Some(node);
            }

            // Only descend into subtrees that contain an error
            if node.has_error() && cursor.goto_first_child()
            {
                continue;
            }

            // Advance to the next sibling, climbing as needed
            loop
            {
                if cursor.goto_next_sibling()
                {
                    break;
                }
                if !cursor.goto_parent()
                {
                    return None;
                }
            }
        }
    }

    /// Named children of the parameter list as trimmed source text,
    /// skipping comments
    pub fn parameter_texts(
        params: Node,
        bytes: &[u8],
    ) -> Vec<String>
    {
        let mut cursor = params.walk();
        params
            .named_children(&mut cursor)
            .filter(|c| {
                !c.kind()
                    .contains("comment")
            })
            .filter_map(|c| {
                c.utf8_text(bytes)
                    .ok()
            })
            .map(|t| {
                t.split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect()
    }
}
