//! Filepath: src/core/transform.rs
//! Per-file transform shared by real and staging runs:
//! read → outline → (skeleton) → redact → minify → estimate.
//!
//! Pure with respect to the output directory: nothing here
//! writes, so both run modes produce identical records.

use std::path::Path;

use camino::Utf8Path;

use crate::core::minify::minify;
use crate::core::model::{Category, ErrorReason, ErrorRecord, FileRecord, ProcessingDepth};
use crate::core::redact::Redactor;
use crate::core::symbols::{SymbolRegistry, skeleton};
use crate::core::tokens::TokenEstimator;
use crate::infra::config::PipelineConfig;
use crate::infra::io::{ReadPolicy, read_source};
use crate::infra::utils::PathUtils;

/// Outcome of transforming one file
#[derive(Debug, Clone)]
pub struct Transformed {
    pub record: FileRecord,
    /// Final content for the category artifact; None when not read
    pub content: Option<String>,
    pub errors: Vec<ErrorRecord>,
}

/// Compiled per-run stages, borrowed by every worker
pub struct Transformer<'a> {
    cfg: &'a PipelineConfig,
    symbols: &'a SymbolRegistry,
    redactor: Option<&'a Redactor>,
    estimator: &'a TokenEstimator,
    policy: ReadPolicy,
}

impl<'a> Transformer<'a> {
    pub fn new(
        cfg: &'a PipelineConfig,
        symbols: &'a SymbolRegistry,
        redactor: Option<&'a Redactor>,
        estimator: &'a TokenEstimator,
    ) -> Self {
        Self {
            cfg,
            symbols,
            redactor,
            estimator,
            policy: ReadPolicy::with_timeout_ms(cfg.read_timeout_ms),
        }
    }

    /// Transform `rel` (relative to `root`). Files whose category is
    /// excluded or not selected are recorded without being read.
    /// At `TreeOnly` depth a file is read only when the tree map
    /// needs its outline, and no content is returned.
    pub fn transform(&self, root: &Path, rel: &Utf8Path, category: Category) -> Transformed {
        let abs = root.join(rel.as_std_path());
        let extension = rel
            .file_name()
            .map(PathUtils::dotted_extension)
            .unwrap_or_default();

        let mut record = FileRecord {
            path: rel.to_path_buf(),
            category,
            extension,
            byte_size: std::fs::metadata(&abs).map(|m| m.len()).unwrap_or(0),
            encoding_detected: None,
            outline: Vec::new(),
            tokens: 0,
            redactions: 0,
        };

        let depth = self.cfg.processing_depth;
        let outlined = self.symbols.for_extension(&record.extension).is_some();
        let tree_needs_outline = self.cfg.tree.generate && self.cfg.tree.shows_symbols() && outlined;

        if !self.cfg.processes(category) || (depth == ProcessingDepth::TreeOnly && !tree_needs_outline) {
            return Transformed {
                record,
                content: None,
                errors: Vec::new(),
            };
        }

        let source = match read_source(&abs, &self.policy) {
            Ok(s) => s,
            Err(e) => {
                tracing::debug!(path = %rel, error = %e, "read failed");
                return Transformed {
                    record,
                    content: None,
                    errors: vec![ErrorRecord::new(rel, e.reason(), e.to_string())],
                };
            }
        };

        record.byte_size = source.byte_size;
        record.encoding_detected = Some(source.encoding);

        let mut errors = Vec::new();

        // A parse failure keeps the file; only the outline is lost
        let parsed = match self.symbols.outline(&record.extension, &source.text) {
            Ok(outline) => {
                record.outline = outline;
                true
            }
            Err(failure) => {
                tracing::debug!(path = %rel, %failure, "outline unavailable");
                errors.push(ErrorRecord::new(
                    rel,
                    ErrorReason::ParseFailure,
                    failure.to_string(),
                ));
                false
            }
        };

        let mut text = match depth {
            ProcessingDepth::TreeOnly => {
                return Transformed {
                    record,
                    content: None,
                    errors,
                };
            }
            // Unsupported languages and unparseable files stay whole
            ProcessingDepth::Skeleton if outlined && parsed => {
                skeleton(&record.outline, &source.text, &record.extension)
            }
            ProcessingDepth::Skeleton | ProcessingDepth::Full => source.text,
        };

        if let Some(redactor) = self.redactor {
            let redacted = redactor.redact(&text);
            record.redactions = redacted.count;
            text = redacted.text;
        }

        if self.cfg.minify {
            text = minify(&text, &record.extension);
        }

        record.tokens = self.estimator.estimate(&text);
        tracing::debug!(path = %rel, tokens = record.tokens, "transformed");

        Transformed {
            record,
            content: Some(text),
            errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::redact::{API_KEY_PLACEHOLDER, UserIdentity};
    use std::fs;
    use tempfile::TempDir;

    struct Stages {
        symbols: SymbolRegistry,
        redactor: Redactor,
        estimator: TokenEstimator,
    }

    fn stages() -> Stages {
        let identity = UserIdentity {
            home: None,
            username: None,
        };
        Stages {
            symbols: SymbolRegistry::new().unwrap(),
            redactor: Redactor::new(&identity, true).unwrap(),
            estimator: TokenEstimator::new("claude-3"),
        }
    }

    #[test]
    fn parse_failure_keeps_content() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("bad.py"), "def broken(:\n    pass\n").unwrap();

        let cfg = PipelineConfig::for_root(dir.path());
        let s = stages();
        let t = Transformer::new(&cfg, &s.symbols, None, &s.estimator);
        let out = t.transform(dir.path(), Utf8Path::new("bad.py"), Category::Module);

        assert!(out.record.outline.is_empty());
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].reason, ErrorReason::ParseFailure);
        assert_eq!(out.content.as_deref(), Some("def broken(:\n    pass\n"));
        assert!(out.record.tokens > 0);
    }

    #[test]
    fn redacts_then_minifies() {
        let dir = TempDir::new().unwrap();
        let src = "# config\nKEY = \"sk_live_ABCDEFGHIJKLMNOP1234\"  # stripe\n";
        fs::write(dir.path().join("conf.py"), src).unwrap();

        let mut cfg = PipelineConfig::for_root(dir.path());
        cfg.enable_sanitizer = true;
        cfg.minify = true;

        let s = stages();
        let t = Transformer::new(&cfg, &s.symbols, Some(&s.redactor), &s.estimator);
        let out = t.transform(dir.path(), Utf8Path::new("conf.py"), Category::Module);

        assert_eq!(out.content.unwrap(), format!("KEY = \"{API_KEY_PLACEHOLDER}\""));
        assert_eq!(out.record.redactions, 1);
        assert!(out.errors.is_empty());
    }

    #[test]
    fn unselected_category_is_not_read() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("test_x.py"), [0xff, 0xfe, 0x00]).unwrap();

        let mut cfg = PipelineConfig::for_root(dir.path());
        cfg.process.tests = false;

        let s = stages();
        let t = Transformer::new(&cfg, &s.symbols, None, &s.estimator);
        let out = t.transform(dir.path(), Utf8Path::new("test_x.py"), Category::Test);

        assert!(out.content.is_none());
        assert!(out.errors.is_empty());
        assert_eq!(out.record.byte_size, 3);
    }

    #[test]
    fn skeleton_depth_elides_bodies() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("core.py"),
            "class Core:\n    def run(self):\n        return True\n",
        )
        .unwrap();
        fs::write(dir.path().join("notes.md"), "# Notes\nbody\n").unwrap();

        let mut cfg = PipelineConfig::for_root(dir.path());
        cfg.processing_depth = ProcessingDepth::Skeleton;
        let s = stages();
        let t = Transformer::new(&cfg, &s.symbols, None, &s.estimator);

        let out = t.transform(dir.path(), Utf8Path::new("core.py"), Category::Module);
        let content = out.content.unwrap();
        assert!(content.contains("def run(self):"));
        assert!(content.contains("pass"));
        assert!(!content.contains("return True"));
        assert_eq!(out.record.outline.len(), 2);
        assert!(out.record.tokens > 0);

        // Nothing to skeletonize: kept whole
        let out = t.transform(dir.path(), Utf8Path::new("notes.md"), Category::Resource);
        assert_eq!(out.content.as_deref(), Some("# Notes\nbody\n"));
    }

    #[test]
    fn tree_only_depth_returns_no_content() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("app.py"), "def main():\n    pass\n").unwrap();
        fs::write(dir.path().join("notes.md"), [0xff, 0x00, 0x01]).unwrap();

        let mut cfg = PipelineConfig::for_root(dir.path());
        cfg.processing_depth = ProcessingDepth::TreeOnly;
        let s = stages();
        let t = Transformer::new(&cfg, &s.symbols, None, &s.estimator);

        // Still outlined for the tree map
        let out = t.transform(dir.path(), Utf8Path::new("app.py"), Category::Module);
        assert!(out.content.is_none());
        assert_eq!(out.record.outline.len(), 1);
        assert_eq!(out.record.tokens, 0);

        // No outline to gain, so never read
        let out = t.transform(dir.path(), Utf8Path::new("notes.md"), Category::Resource);
        assert!(out.content.is_none());
        assert!(out.errors.is_empty());
        assert_eq!(out.record.encoding_detected, None);
    }

    #[test]
    fn binary_file_is_an_encoding_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("blob.py"), b"abc\0def").unwrap();

        let cfg = PipelineConfig::for_root(dir.path());
        let s = stages();
        let t = Transformer::new(&cfg, &s.symbols, None, &s.estimator);
        let out = t.transform(dir.path(), Utf8Path::new("blob.py"), Category::Module);

        assert!(out.content.is_none());
        assert_eq!(out.errors[0].reason, ErrorReason::EncodingError);
        assert_eq!(out.record.encoding_detected, None);
    }
}
