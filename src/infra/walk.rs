//! Filepath: src/infra/walk.rs
//! Deterministic, lazy tree walker.
//! - Pre-order, directories before their children
//! - Siblings sorted by file name
//! - Ignored directories are pruned before descent
//! - Unreadable directories become `ErrorRecord`s, never aborts
//!
//! Backed by ripgrep's `ignore` crate.
//!
//! Ignore layers (an entry is dropped if any layer drops it):
//!   1) built-in names (VCS metadata, bytecode caches)
//!   2) configured exclude regexes (entry name or relative path)
//!   3) `.gitignore` rules under the root, when enabled; negation
//!      (`!pattern`) only re-includes within this layer.

use std::path::{Path, PathBuf};

use ignore::{DirEntry, Walk, WalkBuilder};
use regex::RegexSet;

use crate::{
    core::model::{ErrorReason, ErrorRecord, TreeEntry},
    infra::utils::PathUtils,
};

/// Names never visited, regardless of configuration
pub const BUILTIN_IGNORES: [&str; 7] =
    [".git", ".hg", ".svn", "__pycache__", ".pytest_cache", ".mypy_cache", ".DS_Store"];

/// One item produced by the walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkItem
{
    Entry(TreeEntry),
    Failed(ErrorRecord),
}

/// Walk configuration; build once, iterate once
pub struct TreeWalker
{
    /// Walk root (canonical)
    root: PathBuf,

    /// Compiled exclude regexes
    exclude: RegexSet,

    /// Honor `.gitignore` files
    respect_gitignore: bool,

    /// Maximum recursion depth; default None (unbounded)
    max_depth: Option<usize>,

    /// Relative path never visited (the output directory)
    skip: Option<PathBuf>,
}

impl TreeWalker
{
    pub fn new(
        root: impl Into<PathBuf>,
        exclude: RegexSet,
    ) -> Self
    {
        Self {
            root: root.into(),
            exclude,
            respect_gitignore: true,
            max_depth: None,
            skip: None,
        }
    }

    pub fn with_gitignore(
        mut self,
        respect: bool,
    ) -> Self
    {
        self.respect_gitignore = respect;
        self
    }

    pub fn with_max_depth(
        mut self,
        depth: Option<usize>,
    ) -> Self
    {
        self.max_depth = depth;
        self
    }

    /// Never visit `rel` (relative to root), e.g. our own output directory
    pub fn with_skip(
        mut self,
        rel: Option<PathBuf>,
    ) -> Self
    {
        self.skip = rel;
        self
    }

    /// Internal: construct a configured WalkBuilder
    fn build_walk(&self) -> WalkBuilder
    {
        let mut b = WalkBuilder::new(&self.root);

        // Start from nothing; only project .gitignore files count
        b.standard_filters(false);
        b.hidden(false);
        b.git_ignore(self.respect_gitignore);
        b.require_git(false);
        b.parents(false);

        b.follow_links(false);
        b.max_depth(self.max_depth);
        b.sort_by_file_name(|a, b| a.cmp(b));

        // Early pruning: builtin names, exclude regexes, skipped dir
        let root = self
            .root
            .clone();
        let exclude = self
            .exclude
            .clone();
        let skip = self
            .skip
            .clone();
        b.filter_entry(move |ent: &DirEntry| {
            if ent.depth() == 0
            {
                return true;
            }

            let name = ent
                .file_name()
                .to_string_lossy();
            if BUILTIN_IGNORES.contains(&name.as_ref())
            {
                return false;
            }

            let rel = PathUtils::relative_slash(&root, ent.path());
            if exclude.is_match(&name) || exclude.is_match(rel.as_str())
            {
                return false;
            }

            !skip
                .as_deref()
                .is_some_and(|s| ent.path() == root.join(s))
        });

        b
    }

    /// Lazy iterator over entries and per-entry failures
    pub fn walk(&self) -> TreeWalk
    {
        TreeWalk {
            inner: self
                .build_walk()
                .build(),
            root: self
                .root
                .clone(),
        }
    }
}

/// Single-pass, non-restartable walk
pub struct TreeWalk
{
    inner: Walk,
    root: PathBuf,
}

impl Iterator for TreeWalk
{
    type Item = WalkItem;

    fn next(&mut self) -> Option<WalkItem>
    {
        loop
        {
            let res = self
                .inner
                .next()?;

            let ent = match res
            {
                Ok(ent) => ent,
                Err(err) => return Some(WalkItem::Failed(error_record(&self.root, &err))),
            };

            // The root itself is not an entry
            if ent.depth() == 0
            {
                continue;
            }

            let path = PathUtils::relative_slash(&self.root, ent.path());
            let Some(ft) = ent.file_type()
            else
            {
                continue;
            };

            let is_directory = if ft.is_symlink()
            {
                // Follow symlinks to files; never descend through linked dirs
                match std::fs::metadata(ent.path())
                {
                    Ok(meta) if meta.is_file() => false,
                    Ok(_) =>
                    {
                        tracing::debug!(%path, "skipping symlinked directory");
                        continue;
                    }
                    Err(e) =>
                    {
                        return Some(WalkItem::Failed(ErrorRecord::new(
                            path,
                            reason_for(e.kind()),
                            format!("broken symlink: {e}"),
                        )));
                    }
                }
            }
            else
            {
                ft.is_dir()
            };

            return Some(WalkItem::Entry(TreeEntry { path, is_directory, depth: ent.depth() }));
        }
    }
}

fn reason_for(kind: std::io::ErrorKind) -> ErrorReason
{
    match kind
    {
        std::io::ErrorKind::PermissionDenied => ErrorReason::PermissionDenied,
        _ => ErrorReason::IoError,
    }
}

/// Dig the offending path out of an `ignore::Error`
fn error_path(err: &ignore::Error) -> Option<&Path>
{
    match err
    {
        ignore::Error::WithPath { path, .. } => Some(path),
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } =>
        {
            error_path(err)
        }
        ignore::Error::Loop { child, .. } => Some(child),
        ignore::Error::Partial(errs) => errs
            .iter()
            .find_map(error_path),
        _ => None,
    }
}

fn error_record(
    root: &Path,
    err: &ignore::Error,
) -> ErrorRecord
{
    let path = error_path(err)
        .map(|p| PathUtils::relative_slash(root, p))
        .unwrap_or_default();

    let reason = err
        .io_error()
        .map(|e| reason_for(e.kind()))
        .unwrap_or(ErrorReason::IoError);

    tracing::warn!(%path, %reason, "walk error: {err}");
    ErrorRecord::new(path, reason, err.to_string())
}

#[cfg(test)]
mod tests
{
    use std::fs;

    use anyhow::Result;
    use tempfile::TempDir;

    use super::*;

    /// Create a file with parent dirs as needed
    fn write_file(
        root: &Path,
        rel: &str,
        contents: &str,
    ) -> Result<()>
    {
        let path = root.join(rel);
        if let Some(parent) = path.parent()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
        Ok(())
    }

    fn no_excludes() -> RegexSet
    {
        RegexSet::empty()
    }

    fn paths(walker: &TreeWalker) -> Vec<String>
    {
        walker
            .walk()
            .filter_map(|item| match item
            {
                WalkItem::Entry(e) => Some(if e.is_directory
                {
                    format!("{}/", e.path)
                }
                else
                {
                    e.path
                        .to_string()
                }),
                WalkItem::Failed(_) => None,
            })
            .collect()
    }

    #[test]
    fn pre_order_sorted_siblings() -> Result<()>
    {
        let tmp = TempDir::new()?;
        let root = tmp.path();

        write_file(root, "b.py", "")?;
        write_file(root, "a/z.py", "")?;
        write_file(root, "a/m/x.py", "")?;
        write_file(root, "c.py", "")?;

        let walker = TreeWalker::new(root, no_excludes());
        assert_eq!(paths(&walker), vec!["a/", "a/m/", "a/m/x.py", "a/z.py", "b.py", "c.py"]);
        Ok(())
    }

    #[test]
    fn depth_counts_components() -> Result<()>
    {
        let tmp = TempDir::new()?;
        write_file(tmp.path(), "src/app.py", "")?;

        let depths: Vec<_> = TreeWalker::new(tmp.path(), no_excludes())
            .walk()
            .filter_map(|i| match i
            {
                WalkItem::Entry(e) => Some((
                    e.path
                        .to_string(),
                    e.depth,
                )),
                WalkItem::Failed(_) => None,
            })
            .collect();
        assert_eq!(depths, vec![("src".to_string(), 1), ("src/app.py".to_string(), 2)]);
        Ok(())
    }

    #[test]
    fn gitignored_directory_is_never_visited() -> Result<()>
    {
        let tmp = TempDir::new()?;
        let root = tmp.path();

        write_file(root, ".gitignore", "build/\n")?;
        write_file(root, "build/generated.py", "x = 1")?;
        write_file(root, "main.py", "")?;

        let walker = TreeWalker::new(root, no_excludes());
        let items: Vec<_> = walker
            .walk()
            .collect();
        assert!(
            items
                .iter()
                .all(|i| matches!(i, WalkItem::Entry(_)))
        );
        assert_eq!(paths(&walker), vec![".gitignore", "main.py"]);

        // Disabled: build/ comes back
        let walker = TreeWalker::new(root, no_excludes()).with_gitignore(false);
        assert!(
            paths(&walker)
                .contains(&"build/generated.py".to_string())
        );
        Ok(())
    }

    #[test]
    fn negation_and_directory_only_rules() -> Result<()>
    {
        let tmp = TempDir::new()?;
        let root = tmp.path();

        write_file(root, ".gitignore", "*.log\n!keep.log\nout/\n")?;
        write_file(root, "a.log", "")?;
        write_file(root, "keep.log", "")?;
        // `out/` only matches directories
        write_file(root, "sub/out", "file, not dir")?;

        let got = paths(&TreeWalker::new(root, no_excludes()));
        assert!(!got.contains(&"a.log".to_string()));
        assert!(got.contains(&"keep.log".to_string()));
        assert!(got.contains(&"sub/out".to_string()));
        Ok(())
    }

    #[test]
    fn excludes_and_builtins_prune() -> Result<()>
    {
        let tmp = TempDir::new()?;
        let root = tmp.path();

        write_file(root, ".git/HEAD", "ref")?;
        write_file(root, "__pycache__/m.pyc", "")?;
        write_file(root, "node_modules/pkg/index.js", "")?;
        write_file(root, "src/lib.rs", "")?;

        let exclude = RegexSet::new([r"^node_modules$"])?;
        let got = paths(&TreeWalker::new(root, exclude));
        assert_eq!(got, vec!["src/", "src/lib.rs"]);
        Ok(())
    }

    #[test]
    fn skip_and_max_depth() -> Result<()>
    {
        let tmp = TempDir::new()?;
        let root = tmp.path();

        write_file(root, "a.py", "")?;
        write_file(root, "sub/b.py", "")?;
        write_file(root, "transcript/old.txt", "")?;

        let walker = TreeWalker::new(root, no_excludes())
            .with_skip(Some(PathBuf::from("transcript")))
            .with_max_depth(Some(1));
        assert_eq!(paths(&walker), vec!["a.py", "sub/"]);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_to_files_followed_dirs_skipped() -> Result<()>
    {
        use std::os::unix::fs::symlink;

        let tmp = TempDir::new()?;
        let root = tmp.path();
        write_file(root, "real/x.py", "")?;
        symlink(root.join("real/x.py"), root.join("link.py"))?;
        symlink(root.join("real"), root.join("zlinkdir"))?;

        let got = paths(&TreeWalker::new(root, no_excludes()));
        assert!(got.contains(&"link.py".to_string()));
        assert!(
            !got.iter()
                .any(|p| p.starts_with("zlinkdir"))
        );
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_directory_is_recorded_not_fatal() -> Result<()>
    {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new()?;
        let root = tmp.path();
        write_file(root, "locked/secret.py", "")?;
        write_file(root, "open.py", "")?;
        fs::set_permissions(root.join("locked"), fs::Permissions::from_mode(0o000))?;

        // Privileged users can read it anyway; nothing to assert then
        if fs::read_dir(root.join("locked")).is_ok()
        {
            fs::set_permissions(root.join("locked"), fs::Permissions::from_mode(0o755))?;
            return Ok(());
        }

        let items: Vec<_> = TreeWalker::new(root, no_excludes())
            .walk()
            .collect();
        fs::set_permissions(root.join("locked"), fs::Permissions::from_mode(0o755))?;

        let failures: Vec<_> = items
            .iter()
            .filter_map(|i| match i
            {
                WalkItem::Failed(e) => Some(e),
                _ => None,
            })
            .collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].reason, ErrorReason::PermissionDenied);
        assert!(
            items
                .iter()
                .any(|i| matches!(i, WalkItem::Entry(e) if e.path == "open.py"))
        );
        Ok(())
    }
}
