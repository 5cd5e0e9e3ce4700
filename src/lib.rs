//! **ctxpack** - Assemble a source tree into a bounded, sanitized,
//! structurally-annotated context for LLMs.
//!
//! Gitignore-aware walking, tree-sitter outlines, span-based redaction,
//! conservative minification and model-aware token estimates, run on a
//! bounded worker pool. A staging mode reproduces a real run's results
//! without touching the filesystem.

/// Command-line interface with clap integration
pub mod cli;

/// Shell completion generation
pub mod completion;

/// Command handlers behind the CLI
pub mod cli_ext {
    /// `ctxpack run`: progress, summary table, JSON
    pub mod run_cmd;
}

/// Pipeline stages, leaves first
pub mod core {
    /// Per-run data model (records, errors, results)
    pub mod model;

    /// Fatal configuration errors
    pub mod error;

    /// Category decisions from path + config
    pub mod classify;

    /// Symbol outlines and the per-run extractor registry
    pub mod symbols;

    /// Secret and local-path redaction
    pub mod redact;

    /// Comment stripping and whitespace collapsing
    pub mod minify;

    /// Model-aware token estimates with tiktoken and moka caching
    pub mod tokens;

    /// Tree map rendering
    pub mod tree;

    /// Shared per-file transform
    pub mod transform;

    /// Artifact assembly, sinks and output locking
    pub mod assemble;

    /// Staging (dry-run) mode
    pub mod staging;

    /// Programmatic entry point
    pub mod pipeline;
    pub use pipeline::{RunControl, run, run_with};
    pub use staging::simulate;
}

/// Language processing - tree-sitter outline extractors
pub mod parsers {
    /// Python classes, functions, methods
    pub mod python_parser;
    pub use python_parser::PythonExtractor;

    /// Rust structs/enums/traits with impl and trait methods
    pub mod rust_parser;
    pub use rust_parser::RustExtractor;

    /// JavaScript, TypeScript and TSX
    pub mod ecmascript_parser;
    pub use ecmascript_parser::EcmaExtractor;

    /// Go types and receiver methods
    pub mod go_parser;
    pub use go_parser::GoExtractor;

    // Re-export common extractor interface
    pub use crate::core::symbols::SymbolExtractor;
}

/// Infrastructure - configuration, I/O, walking, helpers
pub mod infra {
    /// Layered configuration (file + environment) and `init`
    pub mod config;
    pub use config::{PipelineConfig, Settings, load_settings};

    /// Memory-mapped and deadline-bounded source reads
    pub mod io;
    pub use io::{ReadPolicy, read_source};

    /// Gitignore-aware, deterministic directory walking
    pub mod walk;
    pub use walk::TreeWalker;

    /// Path and tree-sitter helpers
    pub mod utils;
}

// Strategic re-exports for library consumers
pub use cli::{AppContext, Cli, Commands};
pub use core::error::ConfigError;
pub use core::model::{Category, ErrorReason, ErrorRecord, FileRecord, OutputMode, RunResult};
pub use core::symbols::{SymbolKind, SymbolNode};
pub use core::{run, run_with, simulate};
pub use infra::PipelineConfig;
