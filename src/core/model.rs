//! Filepath: src/core/model.rs
//! Per-run data model shared by every pipeline stage.
//! All values are created fresh per invocation and never
//! outlive the `RunResult` handed back to the caller.

use std::{fmt, path::PathBuf};

use camino::Utf8PathBuf;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::core::symbols::SymbolNode;

/// One filesystem entry produced by the walker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry
{
    /// Path relative to the root, `/`-separated
    pub path: Utf8PathBuf,

    /// True for directories
    pub is_directory: bool,

    /// Number of path components below the root (root children are 1)
    pub depth: usize,
}

/// File category decided by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category
{
    /// Source module
    Module,

    /// Test suite
    Test,

    /// Documentation, structured config, manifests
    Resource,

    /// Not eligible for output
    Excluded,
}

impl Category
{
    /// Eligible categories in assembly order
    pub const SECTIONS: [Category; 3] = [Category::Module, Category::Test, Category::Resource];

    pub fn is_eligible(self) -> bool
    {
        !matches!(self, Category::Excluded)
    }
}

impl fmt::Display for Category
{
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result
    {
        match self
        {
            Category::Module => write!(f, "module"),
            Category::Test => write!(f, "test"),
            Category::Resource => write!(f, "resource"),
            Category::Excluded => write!(f, "excluded"),
        }
    }
}

/// Text encoding recognised by the reader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextEncoding
{
    Utf8,
    Utf8Bom,
    Utf16Le,
    Utf16Be,
}

/// Per-file record flowing from the classifier to the assembler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord
{
    /// Path relative to the root, `/`-separated
    pub path: Utf8PathBuf,

    /// Category (pure function of path + config)
    pub category: Category,

    /// Lowercase extension including the dot, empty when absent
    pub extension: String,

    /// Size on disk in bytes
    pub byte_size: u64,

    /// Encoding detected while reading; None when never read or unreadable
    pub encoding_detected: Option<TextEncoding>,

    /// Structural outline in source order (empty on parse failure)
    pub outline: Vec<SymbolNode>,

    /// Token estimate of the transformed content
    pub tokens: usize,

    /// Number of redaction placeholders substituted
    pub redactions: usize,
}

/// Reason attached to a per-item error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorReason
{
    /// Content not decodable as text
    EncodingError,

    /// Entry unreadable due to permissions
    PermissionDenied,

    /// Structural extraction failed
    ParseFailure,

    /// Read/write failure (after one retry) or read deadline exceeded
    #[serde(rename = "IOError")]
    IoError,
}

impl fmt::Display for ErrorReason
{
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result
    {
        match self
        {
            ErrorReason::EncodingError => write!(f, "EncodingError"),
            ErrorReason::PermissionDenied => write!(f, "PermissionDenied"),
            ErrorReason::ParseFailure => write!(f, "ParseFailure"),
            ErrorReason::IoError => write!(f, "IOError"),
        }
    }
}

/// A per-item failure; accumulated, never removed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord
{
    pub path: Utf8PathBuf,
    pub reason: ErrorReason,
    pub detail: String,
}

impl ErrorRecord
{
    pub fn new(
        path: impl Into<Utf8PathBuf>,
        reason: ErrorReason,
        detail: impl Into<String>,
    ) -> Self
    {
        Self { path: path.into(), reason, detail: detail.into() }
    }

    /// Render as one error-log line (path, reason, detail)
    pub fn log_line(&self) -> String
    {
        format!("{}: {} — {}", self.path, self.reason, self.detail)
    }
}

/// Which assembled outputs a run produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode
{
    UnifiedOnly,
    IndividualOnly,
    #[default]
    Both,
}

impl OutputMode
{
    pub fn includes_unified(self) -> bool
    {
        matches!(self, OutputMode::UnifiedOnly | OutputMode::Both)
    }

    pub fn includes_individual(self) -> bool
    {
        matches!(self, OutputMode::IndividualOnly | OutputMode::Both)
    }
}

/// How much of each selected file reaches the category artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingDepth
{
    /// Whole content
    #[default]
    Full,
    /// Declarations only, bodies elided
    Skeleton,
    /// Tree map only; no category sections
    TreeOnly,
}

/// Kind of assembled artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind
{
    Tree,
    Modules,
    Tests,
    Resources,
    Unified,
    ErrorLog,
}

impl ArtifactKind
{
    /// Key used in `token_estimate_by_artifact` and in file names
    pub fn key(self) -> &'static str
    {
        match self
        {
            ArtifactKind::Tree => "tree",
            ArtifactKind::Modules => "modules",
            ArtifactKind::Tests => "tests",
            ArtifactKind::Resources => "resources",
            ArtifactKind::Unified => "full_context",
            ArtifactKind::ErrorLog => "errors",
        }
    }

    /// File name for a given output prefix, e.g. `transcription_modules.txt`
    pub fn file_name(
        self,
        prefix: &str,
    ) -> String
    {
        format!("{prefix}_{}.txt", self.key())
    }

    /// Per-category artifact for an eligible category
    pub fn for_category(category: Category) -> Option<Self>
    {
        match category
        {
            Category::Module => Some(ArtifactKind::Modules),
            Category::Test => Some(ArtifactKind::Tests),
            Category::Resource => Some(ArtifactKind::Resources),
            Category::Excluded => None,
        }
    }
}

/// Size and estimate of an artifact, whether written or staged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSummary
{
    pub kind: ArtifactKind,

    /// Destination path (would-be path in staging mode)
    pub path: PathBuf,

    pub bytes: usize,

    pub tokens: usize,
}

/// Count of files per category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryBreakdown
{
    pub modules: usize,
    pub tests: usize,
    pub resources: usize,
    pub excluded: usize,
}

impl CategoryBreakdown
{
    pub fn tally(records: &[FileRecord]) -> Self
    {
        records
            .iter()
            .fold(Self::default(), |mut acc, r| {
                match r.category
                {
                    Category::Module => acc.modules += 1,
                    Category::Test => acc.tests += 1,
                    Category::Resource => acc.resources += 1,
                    Category::Excluded => acc.excluded += 1,
                }
                acc
            })
    }
}

/// Structured outcome of one invocation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunResult
{
    /// Records in walker pre-order
    pub file_records: Vec<FileRecord>,

    /// Token estimate per artifact key, in assembly order
    pub token_estimate_by_artifact: IndexMap<String, usize>,

    /// Per-item errors in the order they were recorded
    pub errors: Vec<ErrorRecord>,

    /// Paths actually written (empty in staging mode)
    pub artifacts_written: Vec<PathBuf>,

    /// Every artifact the run produced or would produce
    pub artifacts: Vec<ArtifactSummary>,

    /// Captured artifact contents, keyed by file name (staging mode only)
    #[serde(skip_serializing_if = "IndexMap::is_empty", default)]
    pub staged: IndexMap<String, String>,

    /// Category counts over `file_records`
    pub breakdown: CategoryBreakdown,

    /// True when the run was cancelled before every file was processed
    pub truncated: bool,

    /// True when this result came from a staging run
    pub dry_run: bool,
}

impl RunResult
{
    /// Excluded files plus files that failed outright
    pub fn skipped(&self) -> usize
    {
        let failed = self
            .errors
            .iter()
            .filter(|e| e.reason != ErrorReason::ParseFailure)
            .count();
        self.breakdown
            .excluded
            + failed
    }

    /// Completed, but with per-item errors the caller must surface
    pub fn has_errors(&self) -> bool
    {
        !self
            .errors
            .is_empty()
    }

    /// Total estimate across artifacts, unified preferred when present
    pub fn total_tokens(&self) -> usize
    {
        match self
            .token_estimate_by_artifact
            .get(ArtifactKind::Unified.key())
        {
            Some(n) => *n,
            None => self
                .token_estimate_by_artifact
                .values()
                .sum(),
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn error_log_line_format()
    {
        let e = ErrorRecord::new("src/bad.py", ErrorReason::ParseFailure, "syntax error at line 3");
        assert_eq!(e.log_line(), "src/bad.py: ParseFailure — syntax error at line 3");

        let io = ErrorRecord::new("a.txt", ErrorReason::IoError, "timed out");
        assert_eq!(io.log_line(), "a.txt: IOError — timed out");
    }

    #[test]
    fn artifact_file_names_follow_prefix()
    {
        assert_eq!(ArtifactKind::Modules.file_name("out"), "out_modules.txt");
        assert_eq!(ArtifactKind::Unified.file_name("t"), "t_full_context.txt");
        assert_eq!(ArtifactKind::ErrorLog.file_name("t"), "t_errors.txt");
    }

    #[test]
    fn processing_depth_names()
    {
        let parsed: ProcessingDepth = serde_json::from_str("\"tree_only\"").unwrap();
        assert_eq!(parsed, ProcessingDepth::TreeOnly);
        assert_eq!(ProcessingDepth::default(), ProcessingDepth::Full);
    }

    #[test]
    fn output_mode_flags()
    {
        assert!(OutputMode::Both.includes_unified() && OutputMode::Both.includes_individual());
        assert!(!OutputMode::UnifiedOnly.includes_individual());
        assert!(!OutputMode::IndividualOnly.includes_unified());
    }
}
