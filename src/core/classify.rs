//! Filepath: src/core/classify.rs
//! Path → category. Referentially transparent: the answer
//! depends only on the path and the compiled configuration,
//! so staging and real runs share it verbatim.

use std::collections::BTreeSet;

use camino::Utf8Path;
use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::{Regex, RegexSet};

use crate::{
    core::{error::ConfigError, model::Category},
    infra::{config::PipelineConfig, utils::PathUtils},
};

/// Documentation, structured config and container manifest extensions
pub const RESOURCE_EXTENSIONS: [&str; 18] = [
    ".md",
    ".markdown",
    ".rst",
    ".txt",
    ".json",
    ".yaml",
    ".yml",
    ".toml",
    ".xml",
    ".csv",
    ".ini",
    ".cfg",
    ".conf",
    ".properties",
    ".dockerignore",
    ".editorconfig",
    ".css",
    ".env",
];

/// Exact file names treated as resources
pub const RESOURCE_FILENAMES: [&str; 11] = [
    "Dockerfile",
    "Makefile",
    "LICENSE",
    "CHANGELOG",
    "README",
    "Gemfile",
    "Procfile",
    ".dockerignore",
    ".editorconfig",
    ".env",
    ".gitignore",
];

/// Compiled classification rules for one run
#[derive(Debug, Clone)]
pub struct Classifier
{
    /// Dot-prefixed lowercase extensions (or `.` + lowercase file name)
    allowed: BTreeSet<String>,

    /// File must match one of these (by name)
    include: RegexSet,

    /// Entry names or relative paths that are always excluded
    exclude: RegexSet,

    /// Test-suite naming conventions (by name)
    tests: GlobSet,
}

impl Classifier
{
    /// Compile the patterns in `cfg`; a bad pattern is fatal
    pub fn new(cfg: &PipelineConfig) -> Result<Self, ConfigError>
    {
        Ok(Self {
            allowed: cfg
                .allowed_extensions
                .clone(),
            include: compile_regexes("include_patterns", &cfg.include_patterns)?,
            exclude: compile_regexes("exclude_patterns", &cfg.exclude_patterns)?,
            tests: compile_globs("test_patterns", &cfg.test_patterns)?,
        })
    }

    /// Exclude set, shared with the walker for early pruning
    pub fn exclude_set(&self) -> &RegexSet
    {
        &self.exclude
    }

    /// Decide the category of a file at relative path `path`
    pub fn classify(
        &self,
        path: &Utf8Path,
    ) -> Category
    {
        let name = path
            .file_name()
            .unwrap_or(path.as_str());

        // Exclude patterns override everything, at any level
        if self
            .exclude
            .is_match(path.as_str())
            || path
                .components()
                .any(|c| {
                    self.exclude
                        .is_match(c.as_str())
                })
        {
            return Category::Excluded;
        }

        if !self
            .include
            .is_match(name)
        {
            return Category::Excluded;
        }

        if !self.is_allowed(name)
        {
            return Category::Excluded;
        }

        if self
            .tests
            .is_match(name)
        {
            return Category::Test;
        }

        if is_resource(name)
        {
            return Category::Resource;
        }

        Category::Module
    }

    fn is_allowed(
        &self,
        name: &str,
    ) -> bool
    {
        let ext = PathUtils::dotted_extension(name);
        (!ext.is_empty()
            && self
                .allowed
                .contains(&ext))
            || self
                .allowed
                .contains(&format!(".{}", name.to_lowercase()))
    }
}

/// Resource by exact file name or by extension
pub fn is_resource(name: &str) -> bool
{
    if RESOURCE_FILENAMES.contains(&name)
    {
        return true;
    }
    let ext = PathUtils::dotted_extension(name);
    RESOURCE_EXTENSIONS.contains(&ext.as_str())
}

/// One-shot convenience: compile and classify
pub fn classify(
    path: &Utf8Path,
    cfg: &PipelineConfig,
) -> Result<Category, ConfigError>
{
    Ok(Classifier::new(cfg)?.classify(path))
}

fn compile_regexes(
    field: &'static str,
    patterns: &[String],
) -> Result<RegexSet, ConfigError>
{
    // Validate one by one so the error names the offending pattern
    for p in patterns
    {
        Regex::new(p).map_err(|e| ConfigError::invalid_pattern(field, p, e))?;
    }
    RegexSet::new(patterns).map_err(|e| ConfigError::invalid_pattern(field, patterns.join(" | "), e))
}

fn compile_globs(
    field: &'static str,
    patterns: &[String],
) -> Result<GlobSet, ConfigError>
{
    let mut builder = GlobSetBuilder::new();
    for p in patterns
    {
        builder.add(Glob::new(p).map_err(|e| ConfigError::invalid_pattern(field, p, e))?);
    }
    builder
        .build()
        .map_err(|e| ConfigError::invalid_pattern(field, patterns.join(" | "), e))
}
