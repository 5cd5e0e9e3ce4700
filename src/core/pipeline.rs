//! Filepath: src/core/pipeline.rs
//! Programmatic entry point.
//!
//! validate → walk → classify → transform (bounded pool) →
//! assemble → deliver. Only validation can fail the run; every
//! per-file problem becomes an `ErrorRecord`. Real and staging
//! runs share every step except the sink.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use rayon::prelude::*;
use tracing::{info, instrument, warn};

use crate::{
    core::{
        assemble::{
            Artifact, ArtifactSink, DiskSink, Truncation, assemble, error_log, existing_outputs,
            with_output_lock,
        },
        classify::Classifier,
        error::ConfigError,
        model::{
            ArtifactKind, ArtifactSummary, Category, CategoryBreakdown, ErrorReason, ErrorRecord,
            RunResult,
        },
        redact::{Redactor, UserIdentity},
        staging::StagingSink,
        symbols::SymbolRegistry,
        tokens::TokenEstimator,
        transform::{Transformed, Transformer},
    },
    infra::{
        config::PipelineConfig,
        walk::{TreeWalker, WalkItem},
    },
};

/// Per-file progress notification
#[derive(Debug, Clone, Copy)]
pub struct Progress<'a>
{
    pub path: &'a Utf8Path,
    pub done: usize,
    pub total: usize,
}

type ProgressFn = dyn Fn(Progress<'_>) + Send + Sync;

/// External controls for a run: cooperative cancellation and an
/// optional progress callback (called from worker threads)
#[derive(Default)]
pub struct RunControl
{
    cancel: Arc<AtomicBool>,
    progress: Option<Box<ProgressFn>>,
}

impl RunControl
{
    pub fn new() -> Self
    {
        Self::default()
    }

    pub fn with_progress(
        mut self,
        f: impl Fn(Progress<'_>) + Send + Sync + 'static,
    ) -> Self
    {
        self.progress = Some(Box::new(f));
        self
    }

    /// Share an existing cancellation flag (e.g. set by a signal handler)
    pub fn with_cancel_flag(
        mut self,
        flag: Arc<AtomicBool>,
    ) -> Self
    {
        self.cancel = flag;
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool>
    {
        Arc::clone(&self.cancel)
    }

    pub fn cancel(&self)
    {
        self.cancel
            .store(true, Ordering::SeqCst);
    }

    fn is_cancelled(&self) -> bool
    {
        self.cancel
            .load(Ordering::SeqCst)
    }

    fn notify(
        &self,
        p: Progress<'_>,
    )
    {
        if let Some(f) = &self.progress
        {
            f(p);
        }
    }
}

/// Run with default controls
pub fn run(cfg: &PipelineConfig) -> Result<RunResult, ConfigError>
{
    run_with(cfg, &RunControl::default())
}

/// Everything compiled during validation, shared by all workers
struct Prepared
{
    root: PathBuf,
    root_name: String,
    classifier: Classifier,
    symbols: SymbolRegistry,
    redactor: Option<Redactor>,
    estimator: TokenEstimator,
    pool: rayon::ThreadPool,
}

#[instrument(skip_all, fields(root = %cfg.root_path.display(), dry_run = cfg.dry_run))]
pub fn run_with(
    cfg: &PipelineConfig,
    control: &RunControl,
) -> Result<RunResult, ConfigError>
{
    let prep = validate(cfg)?;
    info!(root = %prep.root.display(), "configuration valid");

    // 1. Walk
    let mut errors = Vec::new();
    let mut files: Vec<(Utf8PathBuf, Category)> = Vec::new();

    let walker = TreeWalker::new(&prep.root, prep.classifier.exclude_set().clone())
        .with_gitignore(cfg.respect_gitignore)
        .with_max_depth(cfg.max_depth)
        .with_skip(output_relative_to(&prep.root, cfg));

    for item in walker.walk()
    {
        match item
        {
            WalkItem::Entry(e) if e.is_directory => {}
            WalkItem::Entry(e) =>
            {
                // 2. Classify
                let category = prep
                    .classifier
                    .classify(&e.path);
                files.push((e.path, category));
            }
            WalkItem::Failed(err) => errors.push(err),
        }
    }
    info!(files = files.len(), "walk complete");

    // 3. Transform on the bounded pool; collect keeps walk order
    let transformer = Transformer::new(cfg, &prep.symbols, prep.redactor.as_ref(), &prep.estimator);
    let total = files.len();
    let done = AtomicUsize::new(0);

    let outcomes: Vec<Option<Transformed>> = prep
        .pool
        .install(|| {
            files
                .par_iter()
                .map(|(path, category)| {
                    if control.is_cancelled()
                    {
                        return None;
                    }
                    let t = transformer.transform(&prep.root, path, *category);
                    let n = done.fetch_add(1, Ordering::SeqCst) + 1;
                    control.notify(Progress { path, done: n, total });
                    Some(t)
                })
                .collect()
        });

    let transformed: Vec<Transformed> = outcomes
        .into_iter()
        .flatten()
        .collect();

    let truncation = (transformed.len() < total).then(|| Truncation { done: transformed.len(), total });
    if let Some(t) = truncation
    {
        warn!(done = t.done, total = t.total, "run cancelled");
    }

    for t in &transformed
    {
        errors.extend(
            t.errors
                .iter()
                .cloned(),
        );
    }

    // 4. Assemble
    let artifacts = assemble(cfg, &prep.root_name, &transformed, truncation);
    let mut token_estimate_by_artifact = IndexMap::new();
    for a in &artifacts
    {
        token_estimate_by_artifact.insert(
            a.kind
                .key()
                .to_string(),
            prep.estimator
                .estimate(&a.content),
        );
    }

    let file_records: Vec<_> = transformed
        .into_iter()
        .map(|t| t.record)
        .collect();

    let mut result = RunResult {
        breakdown: CategoryBreakdown::tally(&file_records),
        file_records,
        token_estimate_by_artifact,
        truncated: truncation.is_some(),
        dry_run: cfg.dry_run,
        ..RunResult::default()
    };

    // 5. Deliver
    if cfg.dry_run
    {
        let mut sink = StagingSink::new(&cfg.output_dir);
        deliver(cfg, &prep.estimator, &artifacts, &mut errors, &mut result, &mut sink);
        result.staged = sink.into_captured();
    }
    else
    {
        let mut sink = DiskSink::new(&cfg.output_dir);
        let locked = with_output_lock(&cfg.output_dir, &cfg.output_prefix, || {
            deliver(cfg, &prep.estimator, &artifacts, &mut errors, &mut result, &mut sink)
        });
        if let Err(e) = locked
        {
            errors.push(ErrorRecord::new(
                utf8_lossy(&cfg.output_dir),
                ErrorReason::IoError,
                format!("cannot lock output directory: {e}"),
            ));
        }
        result.artifacts_written = sink.written();
    }

    result.errors = errors;
    info!(
        records = result
            .file_records
            .len(),
        errors = result
            .errors
            .len(),
        written = result
            .artifacts_written
            .len(),
        "run complete"
    );
    Ok(result)
}

/// Fatal checks and per-run compilation, before any file is touched
fn validate(cfg: &PipelineConfig) -> Result<Prepared, ConfigError>
{
    let root = &cfg.root_path;
    match fs::metadata(root)
    {
        Err(_) => return Err(ConfigError::RootMissing { path: root.clone() }),
        Ok(m) if !m.is_dir() => return Err(ConfigError::RootNotDirectory { path: root.clone() }),
        Ok(_) =>
        {}
    }
    let root = dunce::canonicalize(root).map_err(|_| ConfigError::RootMissing { path: root.clone() })?;

    cfg.check_conflicts()?;

    let classifier = Classifier::new(cfg)?;
    let symbols = SymbolRegistry::new().map_err(|e| ConfigError::Setup(format!("symbol extractors: {e:#}")))?;
    let redactor = cfg
        .enable_sanitizer
        .then(|| Redactor::new(&UserIdentity::detect(), cfg.mask_user_paths))
        .transpose()
        .map_err(|e| ConfigError::Setup(format!("redaction rules: {e:#}")))?;
    let estimator = TokenEstimator::new(&cfg.target_model);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(
            cfg.max_workers
                .unwrap_or(0),
        )
        .build()
        .map_err(|e| ConfigError::Setup(format!("worker pool: {e}")))?;

    // Staging never touches the output directory
    if !cfg.dry_run
    {
        if !cfg.overwrite
            && let Some(existing) = existing_outputs(&cfg.output_dir, &cfg.output_prefix)
                .into_iter()
                .next()
        {
            return Err(ConfigError::OutputCollision { path: existing });
        }
        fs::create_dir_all(&cfg.output_dir).map_err(|e| ConfigError::OutputUncreatable {
            path: cfg
                .output_dir
                .clone(),
            reason: e.to_string(),
        })?;
    }

    let root_name = root
        .file_name()
        .map(|n| {
            n.to_string_lossy()
                .into_owned()
        })
        .unwrap_or_else(|| {
            root.display()
                .to_string()
        });

    Ok(Prepared { root, root_name, classifier, symbols, redactor, estimator, pool })
}

/// Output directory relative to the canonical root, when inside it
fn output_relative_to(
    root: &Path,
    cfg: &PipelineConfig,
) -> Option<PathBuf>
{
    let out = dunce::canonicalize(&cfg.output_dir).unwrap_or_else(|_| {
        // Not created yet (staging): resolve through the configured root
        match cfg
            .output_dir
            .strip_prefix(&cfg.root_path)
        {
            Ok(rel) => root.join(rel),
            Err(_) => cfg
                .output_dir
                .clone(),
        }
    });
    out.strip_prefix(root)
        .ok()
        .filter(|rel| {
            !rel.as_os_str()
                .is_empty()
        })
        .map(Path::to_path_buf)
}

/// Store every artifact, then the error log. A failed write is
/// recorded and the next artifact still goes out.
fn deliver(
    cfg: &PipelineConfig,
    estimator: &TokenEstimator,
    artifacts: &[Artifact],
    errors: &mut Vec<ErrorRecord>,
    result: &mut RunResult,
    sink: &mut dyn ArtifactSink,
)
{
    for a in artifacts
    {
        store(estimator, a, errors, result, sink);
    }

    if cfg.save_error_log && !errors.is_empty()
    {
        let log = Artifact {
            kind: ArtifactKind::ErrorLog,
            file_name: ArtifactKind::ErrorLog.file_name(&cfg.output_prefix),
            content: error_log(errors),
        };
        store(estimator, &log, errors, result, sink);
    }
}

fn store(
    estimator: &TokenEstimator,
    artifact: &Artifact,
    errors: &mut Vec<ErrorRecord>,
    result: &mut RunResult,
    sink: &mut dyn ArtifactSink,
)
{
    match sink.store(artifact)
    {
        Ok(path) => result
            .artifacts
            .push(ArtifactSummary {
                kind: artifact.kind,
                path,
                bytes: artifact
                    .content
                    .len(),
                tokens: estimator.estimate(&artifact.content),
            }),
        Err(e) =>
        {
            let path = sink.path_for(&artifact.file_name);
            warn!(path = %path.display(), error = %e, "artifact write failed");
            errors.push(ErrorRecord::new(utf8_lossy(&path), ErrorReason::IoError, format!("write failed: {e}")));
        }
    }
}

fn utf8_lossy(path: &Path) -> Utf8PathBuf
{
    Utf8PathBuf::from(
        path.to_string_lossy()
            .into_owned(),
    )
}

#[cfg(test)]
mod tests
{
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn project() -> TempDir
    {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(
            dir.path()
                .join("src"),
        )
        .unwrap();
        fs::write(
            dir.path()
                .join("src/app.py"),
            "class Foo:\n    def bar(self):\n        pass\n",
        )
        .unwrap();
        fs::write(
            dir.path()
                .join("README.md"),
            "# Demo\n",
        )
        .unwrap();
        dir
    }

    fn config(dir: &TempDir) -> PipelineConfig
    {
        let mut cfg = PipelineConfig::for_root(dir.path());
        cfg.allowed_extensions
            .insert(".md".into());
        cfg
    }

    #[test]
    fn missing_root_is_fatal()
    {
        let cfg = PipelineConfig::for_root("/definitely/not/here");
        assert!(matches!(run(&cfg), Err(ConfigError::RootMissing { .. })));
    }

    #[test]
    fn real_run_writes_artifacts_and_skips_its_output_dir()
    {
        let dir = project();
        let cfg = config(&dir);

        let first = run(&cfg).unwrap();
        assert!(
            first
                .errors
                .is_empty()
        );
        assert_eq!(first.breakdown.modules, 1);
        assert_eq!(first.breakdown.resources, 1);
        assert!(
            first
                .artifacts_written
                .iter()
                .all(|p| p.exists())
        );

        // Second run over the same tree: collision unless overwrite
        assert!(matches!(run(&cfg), Err(ConfigError::OutputCollision { .. })));

        let again = run(&PipelineConfig { overwrite: true, ..cfg.clone() }).unwrap();
        assert_eq!(first.file_records, again.file_records);
        assert_eq!(first.token_estimate_by_artifact, again.token_estimate_by_artifact);
    }

    #[test]
    fn cancelled_run_marks_truncation()
    {
        let dir = project();
        let cfg = PipelineConfig { dry_run: true, ..config(&dir) };

        let control = RunControl::new();
        control.cancel();
        let res = run_with(&cfg, &control).unwrap();

        assert!(res.truncated);
        assert!(
            res.file_records
                .is_empty()
        );
        let unified = &res.staged["transcription_full_context.txt"];
        assert!(unified.contains("[TRUNCATED: run cancelled after 0 of 2 files]"));
    }

    #[test]
    fn progress_sees_every_file()
    {
        let dir = project();
        let cfg = PipelineConfig { dry_run: true, ..config(&dir) };

        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let control = RunControl::new().with_progress(move |p| {
            assert_eq!(p.total, 2);
            counter.fetch_add(1, Ordering::SeqCst);
        });

        run_with(&cfg, &control).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn zero_workers_conflict()
    {
        let dir = project();
        let cfg = PipelineConfig { max_workers: Some(0), ..config(&dir) };
        assert!(matches!(run(&cfg), Err(ConfigError::Conflict(_))));
    }
}
