//! Filepath: src/core/staging.rs
//! Staging (dry-run) mode: the same pipeline with the disk sink
//! swapped for an in-memory capture. No directory is created,
//! no lock is taken, nothing is written.

use std::{io, path::PathBuf};

use indexmap::IndexMap;

use crate::{
    core::{
        assemble::{Artifact, ArtifactSink},
        error::ConfigError,
        model::RunResult,
        pipeline::{RunControl, run_with},
    },
    infra::config::PipelineConfig,
};

/// Captures artifacts by file name instead of writing them
#[derive(Debug, Default)]
pub struct StagingSink
{
    dir: PathBuf,
    captured: IndexMap<String, String>,
}

impl StagingSink
{
    /// `dir` is only used to report would-be paths
    pub fn new(dir: impl Into<PathBuf>) -> Self
    {
        Self { dir: dir.into(), captured: IndexMap::new() }
    }

    pub fn into_captured(self) -> IndexMap<String, String>
    {
        self.captured
    }
}

impl ArtifactSink for StagingSink
{
    fn path_for(
        &self,
        file_name: &str,
    ) -> PathBuf
    {
        self.dir
            .join(file_name)
    }

    fn store(
        &mut self,
        artifact: &Artifact,
    ) -> io::Result<PathBuf>
    {
        self.captured
            .insert(
                artifact
                    .file_name
                    .clone(),
                artifact
                    .content
                    .clone(),
            );
        Ok(self.path_for(&artifact.file_name))
    }

    fn written(&self) -> Vec<PathBuf>
    {
        Vec::new()
    }
}

/// Run `cfg` in staging mode regardless of its `dry_run` flag
pub fn simulate(cfg: &PipelineConfig) -> Result<RunResult, ConfigError>
{
    simulate_with(cfg, &RunControl::default())
}

pub fn simulate_with(
    cfg: &PipelineConfig,
    control: &RunControl,
) -> Result<RunResult, ConfigError>
{
    let staged = PipelineConfig { dry_run: true, ..cfg.clone() };
    run_with(&staged, control)
}
