use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::core::model::{OutputMode, ProcessingDepth};

/// Shared application context for global flags
#[derive(Clone, Debug)]
pub struct AppContext {
    pub quiet: bool,    // global --quiet
    pub no_color: bool, // global --no-color
    pub dry_run: bool,  // global --dry-run
    pub verbose: bool,  // global --verbose
}

#[derive(Parser)]
#[command(name = "ctxpack")]
#[command(
    about = "Assemble a source tree into a sanitized, structurally-annotated context for LLMs"
)]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress progress bars and non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Compute everything, write nothing (staging mode)
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Debug logging on stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Walk a project and assemble its context artifacts
    Run(RunArgs),

    /// Initialize a ctxpack.toml config file
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Flags override the config file; unset flags leave it alone
#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Project root to scan
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Explicit config file (otherwise ctxpack.toml/.yaml/.json is searched)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print the run result as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Output directory (default: <PATH>/transcript)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Artifact file name prefix
    #[arg(long)]
    pub prefix: Option<String>,

    /// Allowed extensions, comma-separated (e.g. py,rs,md)
    #[arg(long = "ext", value_delimiter = ',')]
    pub extensions: Vec<String>,

    /// Include regexes (file must match one)
    #[arg(long = "include")]
    pub include: Vec<String>,

    /// Extra exclude regexes, added to the configured ones
    #[arg(long = "exclude")]
    pub exclude: Vec<String>,

    /// Test-file globs replacing the configured ones
    #[arg(long = "test-pattern")]
    pub test_patterns: Vec<String>,

    /// Ignore .gitignore files
    #[arg(long)]
    pub no_gitignore: bool,

    /// Redact secrets, emails and IP addresses
    #[arg(long)]
    pub sanitize: bool,

    /// Keep home directory and username visible when sanitizing
    #[arg(long)]
    pub no_mask_paths: bool,

    /// Strip comments and collapse whitespace
    #[arg(long)]
    pub minify: bool,

    /// How much of each file to transcribe
    #[arg(long, value_enum)]
    pub depth: Option<DepthArg>,

    /// Target model for token estimation (e.g. gpt-4o, claude-3-5-sonnet)
    #[arg(long)]
    pub model: Option<String>,

    /// Which artifacts to produce
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Skip the tree map
    #[arg(long)]
    pub no_tree: bool,

    /// Hide class lines in the tree map
    #[arg(long)]
    pub no_classes: bool,

    /// Hide function lines in the tree map
    #[arg(long)]
    pub no_functions: bool,

    /// Hide method lines in the tree map
    #[arg(long)]
    pub no_methods: bool,

    /// Leave modules out
    #[arg(long)]
    pub no_modules: bool,

    /// Leave tests out
    #[arg(long)]
    pub no_tests: bool,

    /// Leave resources out
    #[arg(long)]
    pub no_resources: bool,

    /// Do not write the error log
    #[arg(long)]
    pub no_error_log: bool,

    /// Replace artifacts left by a previous run
    #[arg(long)]
    pub overwrite: bool,

    /// Maximum directory depth
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Worker threads (default: one per core)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Per-file read deadline in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Unified,
    Individual,
    Both,
}

impl From<ModeArg> for OutputMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Unified => OutputMode::UnifiedOnly,
            ModeArg::Individual => OutputMode::IndividualOnly,
            ModeArg::Both => OutputMode::Both,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DepthArg {
    Full,
    Skeleton,
    TreeOnly,
}

impl From<DepthArg> for ProcessingDepth {
    fn from(d: DepthArg) -> Self {
        match d {
            DepthArg::Full => ProcessingDepth::Full,
            DepthArg::Skeleton => ProcessingDepth::Skeleton,
            DepthArg::TreeOnly => ProcessingDepth::TreeOnly,
        }
    }
}

#[derive(Parser)]
pub struct InitArgs {
    /// Directory to initialize config in
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Parser)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,

    /// Output directory; if omitted and --stdout not set, prints error
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Print completion script to stdout instead of a file
    #[arg(long)]
    pub stdout: bool,
}
