//! Filepath: src/core/error.rs
//! Fatal configuration errors. Anything in here aborts a run
//! before a single file is touched; per-file problems are
//! `ErrorRecord`s instead (see `core::model`).

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError
{
    #[error("root path does not exist: {}", path.display())]
    #[diagnostic(code(ctxpack::config::root_missing), help("pass an existing directory as PATH"))]
    RootMissing
    {
        path: PathBuf,
    },

    #[error("root path is not a directory: {}", path.display())]
    #[diagnostic(code(ctxpack::config::root_not_dir), help("point PATH at the project directory, not a file"))]
    RootNotDirectory
    {
        path: PathBuf,
    },

    #[error("invalid pattern `{pattern}` in {field}: {reason}")]
    #[diagnostic(
        code(ctxpack::config::invalid_pattern),
        help("include/exclude patterns are regexes; test patterns are globs")
    )]
    InvalidPattern
    {
        field: &'static str,
        pattern: String,
        reason: String,
    },

    #[error("cannot create output directory {}: {reason}", path.display())]
    #[diagnostic(code(ctxpack::config::output_uncreatable), help("choose a writable --output-dir"))]
    OutputUncreatable
    {
        path: PathBuf,
        reason: String,
    },

    #[error("conflicting options: {0}")]
    #[diagnostic(code(ctxpack::config::conflict))]
    Conflict(String),

    #[error("output already exists: {}", path.display())]
    #[diagnostic(code(ctxpack::config::collision), help("pass --overwrite or pick another --prefix"))]
    OutputCollision
    {
        path: PathBuf,
    },

    #[error("failed to load configuration: {0}")]
    #[diagnostic(code(ctxpack::config::load))]
    Load(String),

    #[error("failed to initialise {0}")]
    #[diagnostic(code(ctxpack::setup))]
    Setup(String),
}

impl ConfigError
{
    pub fn invalid_pattern(
        field: &'static str,
        pattern: impl Into<String>,
        reason: impl ToString,
    ) -> Self
    {
        Self::InvalidPattern { field, pattern: pattern.into(), reason: reason.to_string() }
    }

    pub fn conflict(msg: impl Into<String>) -> Self
    {
        Self::Conflict(msg.into())
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn messages_name_the_offender()
    {
        let e = ConfigError::invalid_pattern("exclude_patterns", "([", "unclosed group");
        let msg = e.to_string();
        assert!(msg.contains("exclude_patterns"));
        assert!(msg.contains("(["));

        let e = ConfigError::RootMissing { path: PathBuf::from("/nope") };
        assert!(
            e.to_string()
                .contains("/nope")
        );
    }
}
