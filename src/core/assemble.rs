//! Filepath: src/core/assemble.rs
//! Deterministic artifact assembly and the sinks they go to.
//!
//! Layout of a category artifact:
//!
//! ```text
//! SCRIPTS/MODULES:
//! ------…------ (200 dashes)
//! src/app.py
//! <content>
//! ```
//!
//! The unified artifact is a `PROJECT CONTEXT` header, the tree
//! section, then each category artifact followed by a blank line.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use fd_lock::RwLock;
use itertools::Itertools;
use tempfile::NamedTempFile;

use crate::core::model::{ArtifactKind, Category, ErrorRecord};
use crate::core::transform::Transformed;
use crate::core::tree::render_tree;
use crate::infra::config::PipelineConfig;
use crate::infra::io::retry_once;

const FILE_SEPARATOR_WIDTH: usize = 200;
const CONTEXT_RULE_WIDTH: usize = 80;
const STRUCTURE_RULE_WIDTH: usize = 50;

/// One assembled artifact, not yet written anywhere
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub file_name: String,
    pub content: String,
}

/// Files processed vs files scheduled when a run was cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Truncation {
    pub done: usize,
    pub total: usize,
}

impl Truncation {
    pub fn marker(&self) -> String {
        format!(
            "[TRUNCATED: run cancelled after {} of {} files]",
            self.done, self.total
        )
    }
}

fn section_header(category: Category) -> &'static str {
    match category {
        Category::Module => "SCRIPTS/MODULES:",
        Category::Test => "TESTS:",
        Category::Resource => "RESOURCES (CONFIG/DATA/DOCS):",
        Category::Excluded => "",
    }
}

/// Build every artifact the configuration asks for, in fixed order:
/// tree, modules, tests, resources, unified. Empty sections are omitted.
pub fn assemble(
    cfg: &PipelineConfig,
    root_name: &str,
    files: &[Transformed],
    truncation: Option<Truncation>,
) -> Vec<Artifact> {
    let prefix = cfg.output_prefix.as_str();
    let individual = cfg.output_mode.includes_individual();
    let mut out = Vec::new();

    let tree = if cfg.tree.generate {
        let visible = files
            .iter()
            .map(|f| &f.record)
            .filter(|r| cfg.processes(r.category));
        render_tree(visible, &cfg.tree)
    } else {
        String::new()
    };

    if individual && !tree.is_empty() {
        out.push(artifact(ArtifactKind::Tree, prefix, tree.clone()));
    }

    let mut sections = Vec::new();
    for category in Category::SECTIONS {
        let Some(kind) = ArtifactKind::for_category(category) else {
            continue;
        };
        let Some(mut text) = category_text(category, files) else {
            continue;
        };
        if let Some(t) = truncation {
            text.push_str(&t.marker());
            text.push('\n');
        }
        if individual {
            out.push(artifact(kind, prefix, text.clone()));
        }
        sections.push(text);
    }

    if cfg.output_mode.includes_unified() {
        let mut unified = format!(
            "PROJECT CONTEXT: {root_name}\n{}\n\n",
            "=".repeat(CONTEXT_RULE_WIDTH)
        );
        if !tree.is_empty() {
            unified.push_str("PROJECT STRUCTURE:\n");
            unified.push_str(&"-".repeat(STRUCTURE_RULE_WIDTH));
            unified.push('\n');
            unified.push_str(&tree);
            unified.push_str("\n\n");
        }
        for section in &sections {
            unified.push_str(section);
            unified.push_str("\n\n");
        }
        if sections.is_empty()
            && let Some(t) = truncation
        {
            unified.push_str(&t.marker());
            unified.push('\n');
        }
        out.push(artifact(ArtifactKind::Unified, prefix, unified));
    }

    out
}

fn artifact(kind: ArtifactKind, prefix: &str, content: String) -> Artifact {
    Artifact {
        kind,
        file_name: kind.file_name(prefix),
        content,
    }
}

/// Header, then one separator + path + content block per file that
/// has content. None when the section would be empty.
fn category_text(category: Category, files: &[Transformed]) -> Option<String> {
    let separator = "-".repeat(FILE_SEPARATOR_WIDTH);
    let mut text = String::new();
    let mut any = false;

    for f in files.iter().filter(|f| f.record.category == category) {
        let Some(content) = f.content.as_deref() else {
            continue;
        };
        if !any {
            text.push_str(section_header(category));
            text.push('\n');
            any = true;
        }
        text.push_str(&separator);
        text.push('\n');
        text.push_str(f.record.path.as_str());
        text.push('\n');
        text.push_str(content);
        text.push('\n');
    }

    any.then_some(text)
}

/// One `ErrorRecord::log_line` per record
pub fn error_log(errors: &[ErrorRecord]) -> String {
    let mut log = errors.iter().map(ErrorRecord::log_line).join("\n");
    if !log.is_empty() {
        log.push('\n');
    }
    log
}

/// Destination for assembled artifacts
pub trait ArtifactSink {
    /// Where `file_name` lands (or would land)
    fn path_for(&self, file_name: &str) -> PathBuf;

    /// Store one artifact, all-or-nothing
    fn store(&mut self, artifact: &Artifact) -> io::Result<PathBuf>;

    /// Paths actually written to disk
    fn written(&self) -> Vec<PathBuf>;
}

const WRITE_RETRY_BACKOFF: Duration = Duration::from_millis(50);

type WriteFn = Box<dyn FnMut(&Path, &[u8]) -> io::Result<()> + Send>;

/// Writes into the output directory through a temp file + rename
pub struct DiskSink {
    dir: PathBuf,
    written: Vec<PathBuf>,
    write: WriteFn,
}

impl DiskSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            written: Vec::new(),
            write: Box::new(write_atomic),
        }
    }

    /// Swap the low-level writer (fault injection in tests)
    pub fn with_writer(
        mut self,
        write: impl FnMut(&Path, &[u8]) -> io::Result<()> + Send + 'static,
    ) -> Self {
        self.write = Box::new(write);
        self
    }
}

impl ArtifactSink for DiskSink {
    fn path_for(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    fn store(&mut self, artifact: &Artifact) -> io::Result<PathBuf> {
        let path = self.path_for(&artifact.file_name);
        let write = &mut self.write;
        retry_once(WRITE_RETRY_BACKOFF, || {
            write(&path, artifact.content.as_bytes())
        })?;
        self.written.push(path.clone());
        Ok(path)
    }

    fn written(&self) -> Vec<PathBuf> {
        self.written.clone()
    }
}

/// Replace `path` with `data` atomically
pub fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;

    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Run `f` while holding the exclusive lock for `prefix` in `dir`.
/// Concurrent runs targeting the same output serialize here.
pub fn with_output_lock<T>(dir: &Path, prefix: &str, f: impl FnOnce() -> T) -> io::Result<T> {
    let lock_path = dir.join(format!(".{prefix}.lock"));
    let file: File = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)?;

    let mut lock = RwLock::new(file);
    let _guard = lock.write()?;
    tracing::debug!(lock = %lock_path.display(), "output lock acquired");

    Ok(f())
}

/// Artifacts of a previous run that a real run would overwrite
pub fn existing_outputs(dir: &Path, prefix: &str) -> Vec<PathBuf> {
    [
        ArtifactKind::Tree,
        ArtifactKind::Modules,
        ArtifactKind::Tests,
        ArtifactKind::Resources,
        ArtifactKind::Unified,
        ArtifactKind::ErrorLog,
    ]
    .into_iter()
    .map(|k| dir.join(k.file_name(prefix)))
    .filter(|p| fs::metadata(p).is_ok())
    .collect()
}
