//! CLI handler for `ctxpack run`.
//!
//! Layers flags over the loaded settings, drives the pipeline with
//! a progress bar, and reports either a summary table or JSON.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tabled::{Table, Tabled};
use tracing::instrument;

use crate::{
    cli::{AppContext, RunArgs},
    core::{
        model::RunResult,
        pipeline::{RunControl, run_with},
    },
    infra::config::{Settings, load_settings},
};

/// How a completed run ended, for the process exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus
{
    Clean,
    CompletedWithSkips,
}

impl RunArgs
{
    /// Apply flags on top of `settings`; unset flags change nothing
    pub fn apply(
        &self,
        s: &mut Settings,
    )
    {
        if let Some(dir) = &self.output_dir
        {
            s.output_dir = Some(dir.clone());
        }
        if let Some(p) = &self.prefix
        {
            s.output_prefix = p.clone();
        }
        if !self
            .extensions
            .is_empty()
        {
            s.allowed_extensions = self
                .extensions
                .clone();
        }
        if !self
            .include
            .is_empty()
        {
            s.include_patterns = self
                .include
                .clone();
        }
        s.exclude_patterns
            .extend(
                self.exclude
                    .iter()
                    .cloned(),
            );
        if !self
            .test_patterns
            .is_empty()
        {
            s.test_patterns = self
                .test_patterns
                .clone();
        }
        if let Some(m) = &self.model
        {
            s.target_model = m.clone();
        }
        if let Some(mode) = self.mode
        {
            s.output_mode = mode.into();
        }
        if let Some(depth) = self.depth
        {
            s.processing_depth = depth.into();
        }

        s.respect_gitignore &= !self.no_gitignore;
        s.enable_sanitizer |= self.sanitize;
        s.mask_user_paths &= !self.no_mask_paths;
        s.minify |= self.minify;
        s.overwrite |= self.overwrite;
        s.save_error_log &= !self.no_error_log;

        s.tree
            .generate &= !self.no_tree;
        s.tree
            .show_classes &= !self.no_classes;
        s.tree
            .show_functions &= !self.no_functions;
        s.tree
            .show_methods &= !self.no_methods;
        s.process
            .modules &= !self.no_modules;
        s.process
            .tests &= !self.no_tests;
        s.process
            .resources &= !self.no_resources;

        if self
            .max_depth
            .is_some()
        {
            s.max_depth = self.max_depth;
        }
        if self
            .workers
            .is_some()
        {
            s.max_workers = self.workers;
        }
        if let Some(ms) = self.timeout_ms
        {
            s.read_timeout_ms = ms;
        }
    }
}

#[instrument(skip_all, fields(path = %args.path.display()))]
pub fn run(
    args: RunArgs,
    ctx: &AppContext,
) -> Result<RunStatus>
{
    let mut settings = load_settings(args.config.as_deref(), &args.path)?;
    args.apply(&mut settings);
    let cfg = settings.into_pipeline_config(&args.path, ctx.dry_run);

    // Progress UI (hidden in --quiet and --json modes)
    let progress = if ctx.quiet || args.json
    {
        ProgressBar::hidden()
    }
    else
    {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .context("progress template")?
                .progress_chars("#>-"),
        );
        pb
    };

    let bar = progress.clone();
    let control = RunControl::new().with_progress(move |p| {
        bar.set_length(p.total as u64);
        bar.set_position(p.done as u64);
        bar.set_message(
            p.path
                .to_string(),
        );
    });

    let result = run_with(&cfg, &control)?;
    progress.finish_and_clear();

    if args.json
    {
        println!("{}", serde_json::to_string_pretty(&result).context("serialize run result")?);
    }
    else if !ctx.quiet
    {
        print_summary(&result, ctx);
    }

    // Excluded files are expected; only failed items change the status
    Ok(if result.has_errors()
    {
        RunStatus::CompletedWithSkips
    }
    else
    {
        RunStatus::Clean
    })
}

#[derive(Tabled)]
struct ArtifactRow
{
    artifact: String,
    path: String,
    bytes: usize,
    tokens: usize,
}

/// Artifact table plus a one-line category breakdown
pub fn summary_table(result: &RunResult) -> String
{
    let rows: Vec<ArtifactRow> = result
        .artifacts
        .iter()
        .map(|a| ArtifactRow {
            artifact: a
                .kind
                .key()
                .to_string(),
            path: a
                .path
                .display()
                .to_string(),
            bytes: a.bytes,
            tokens: a.tokens,
        })
        .collect();

    let b = &result.breakdown;
    format!(
        "{}\nmodules: {}  tests: {}  resources: {}  skipped: {}  errors: {}  tokens: {}",
        Table::new(rows),
        b.modules,
        b.tests,
        b.resources,
        result.skipped(),
        result
            .errors
            .len(),
        result.total_tokens()
    )
}

fn print_summary(
    result: &RunResult,
    ctx: &AppContext,
)
{
    let headline = match (result.dry_run, result.truncated)
    {
        (_, true) => "Run cancelled; partial output",
        (true, false) => "DRY RUN: nothing written",
        (false, false) => "Context assembled",
    };

    if ctx.no_color
    {
        println!("{headline}");
    }
    else if result.truncated || result.has_errors()
    {
        println!("{}", headline.yellow());
    }
    else
    {
        println!("{}", headline.green());
    }

    println!("{}", summary_table(result));

    for e in &result.errors
    {
        let line = e.log_line();
        if ctx.no_color
        {
            eprintln!("{line}");
        }
        else
        {
            eprintln!("{}", line.red());
        }
    }
}
