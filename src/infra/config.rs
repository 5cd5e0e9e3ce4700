//! Filepath: src/infra/config.rs
//! Layered configuration: built-in defaults, then the first
//! config file found, then `CTXPACK_*` environment variables.
//! The loaded `Settings` is converted once into an immutable
//! `PipelineConfig` that every stage borrows.

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    cli::{AppContext, InitArgs},
    core::{
        error::ConfigError,
        model::{OutputMode, ProcessingDepth},
    },
};

/// Config file names tried in order; first hit wins
pub const CONFIG_FILES: [&str; 4] = ["ctxpack.toml", "ctxpack.yaml", "ctxpack.json", ".ctxpack.toml"];

/// Deserializable configuration file model. Unknown keys are
/// ignored and missing keys take the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings
{
    /// Extensions eligible for output (".py" or "py"; case-insensitive)
    pub allowed_extensions: Vec<String>,

    /// A file must match at least one of these regexes
    pub include_patterns: Vec<String>,

    /// Regexes over entry names or relative paths; excluded everywhere
    pub exclude_patterns: Vec<String>,

    /// Globs over file names marking test suites
    pub test_patterns: Vec<String>,

    /// Honor `.gitignore` files under the root
    pub respect_gitignore: bool,

    /// Redact secrets, emails, IPs
    pub enable_sanitizer: bool,

    /// Mask home directory and username (only when the sanitizer is on)
    pub mask_user_paths: bool,

    /// Strip comments and collapse whitespace
    pub minify: bool,

    /// Full content, declarations only, or nothing beyond the tree map
    pub processing_depth: ProcessingDepth,

    /// Model identifier used to pick a token counting strategy
    pub target_model: String,

    /// Unified file, per-category files, or both
    pub output_mode: OutputMode,

    /// Destination directory (defaults to `<root>/transcript`)
    pub output_dir: Option<PathBuf>,

    /// File name prefix for every artifact
    pub output_prefix: String,

    /// Write `<prefix>_errors.txt` when errors were recorded
    pub save_error_log: bool,

    /// Replace artifacts left by a previous run
    pub overwrite: bool,

    /// Stop descending below this depth
    pub max_depth: Option<usize>,

    /// Worker pool bound; defaults to available parallelism
    pub max_workers: Option<usize>,

    /// Best-effort per-file read deadline
    pub read_timeout_ms: u64,

    pub tree: TreeOptions,

    pub process: ProcessOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeOptions
{
    pub generate: bool,
    pub show_classes: bool,
    pub show_functions: bool,
    pub show_methods: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessOptions
{
    pub modules: bool,
    pub tests: bool,
    pub resources: bool,
}

impl Default for TreeOptions
{
    fn default() -> Self
    {
        Self { generate: true, show_classes: true, show_functions: true, show_methods: true }
    }
}

impl Default for ProcessOptions
{
    fn default() -> Self
    {
        Self { modules: true, tests: true, resources: true }
    }
}

impl TreeOptions
{
    /// Any symbol annotation requested
    pub fn shows_symbols(&self) -> bool
    {
        self.show_classes || self.show_functions || self.show_methods
    }
}

impl ProcessOptions
{
    pub fn any(&self) -> bool
    {
        self.modules || self.tests || self.resources
    }
}

/// Default test-suite globs over common source extensions
pub fn default_test_patterns() -> Vec<String>
{
    let stems = [
        "test_*", "*_test", "Test*", "*Test", "*Tests", "*TestCase", "*.spec", "*.test", "*.e2e",
        "*.cy",
    ];
    let exts = "{py,js,ts,jsx,tsx,java,kt,go,rs,cs,cpp,c,h,hpp,swift,php}";

    stems
        .iter()
        .map(|s| format!("{s}.{exts}"))
        .collect()
}

impl Default for Settings
{
    fn default() -> Self
    {
        Self {
            allowed_extensions: [".py", ".rs", ".js", ".ts", ".go"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            include_patterns: vec![".*".to_string()],
            exclude_patterns: vec![
                r"^__init__\.py$".to_string(),
                r".*\.pyc$".to_string(),
                r"^(__pycache__|\.git|\.idea|\.vscode|node_modules)$".to_string(),
                r"^\.".to_string(),
            ],
            test_patterns: default_test_patterns(),
            respect_gitignore: true,
            enable_sanitizer: false,
            mask_user_paths: true,
            minify: false,
            processing_depth: ProcessingDepth::Full,
            target_model: "gpt-4o".to_string(),
            output_mode: OutputMode::Both,
            output_dir: None,
            output_prefix: "transcription".to_string(),
            save_error_log: true,
            overwrite: false,
            max_depth: None,
            max_workers: None,
            read_timeout_ms: 5_000,
            tree: TreeOptions::default(),
            process: ProcessOptions::default(),
        }
    }
}

/// Immutable per-run configuration, threaded by reference
/// into every stage. Built only via `Settings`.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig
{
    pub root_path: PathBuf,
    /// Lowercase, dot-prefixed
    pub allowed_extensions: BTreeSet<String>,
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub test_patterns: Vec<String>,
    pub respect_gitignore: bool,
    pub enable_sanitizer: bool,
    pub mask_user_paths: bool,
    pub minify: bool,
    pub processing_depth: ProcessingDepth,
    pub target_model: String,
    pub output_mode: OutputMode,
    pub output_dir: PathBuf,
    pub output_prefix: String,
    pub save_error_log: bool,
    pub overwrite: bool,
    pub max_depth: Option<usize>,
    pub max_workers: Option<usize>,
    pub read_timeout_ms: u64,
    pub tree: TreeOptions,
    pub process: ProcessOptions,
    pub dry_run: bool,
}

impl Settings
{
    /// Freeze into a `PipelineConfig` for `root`
    pub fn into_pipeline_config(
        self,
        root: impl AsRef<Path>,
        dry_run: bool,
    ) -> PipelineConfig
    {
        let root_path = expand_path(root.as_ref());

        let output_dir = self
            .output_dir
            .as_deref()
            .map(expand_path)
            .map(|p| if p.is_relative() { root_path.join(p) } else { p })
            .unwrap_or_else(|| root_path.join("transcript"));

        let allowed_extensions = self
            .allowed_extensions
            .iter()
            .map(|e| normalize_extension(e))
            .filter(|e| e.len() > 1)
            .collect();

        PipelineConfig {
            root_path,
            allowed_extensions,
            include_patterns: self.include_patterns,
            exclude_patterns: self.exclude_patterns,
            test_patterns: self.test_patterns,
            respect_gitignore: self.respect_gitignore,
            enable_sanitizer: self.enable_sanitizer,
            mask_user_paths: self.mask_user_paths,
            minify: self.minify,
            processing_depth: self.processing_depth,
            target_model: self.target_model,
            output_mode: self.output_mode,
            output_dir,
            output_prefix: self.output_prefix,
            save_error_log: self.save_error_log,
            overwrite: self.overwrite,
            max_depth: self.max_depth,
            max_workers: self.max_workers,
            read_timeout_ms: self.read_timeout_ms,
            tree: self.tree,
            process: self.process,
            dry_run,
        }
    }
}

impl PipelineConfig
{
    /// Defaults for `root`; handy for library callers and tests
    pub fn for_root(root: impl AsRef<Path>) -> Self
    {
        Settings::default().into_pipeline_config(root, false)
    }

    /// Reject option combinations that cannot produce anything
    pub fn check_conflicts(&self) -> Result<(), ConfigError>
    {
        if !self
            .tree
            .generate
            && !self
                .process
                .any()
        {
            return Err(ConfigError::conflict(
                "tree generation is off and every category is disabled; nothing to emit",
            ));
        }

        if self.processing_depth == ProcessingDepth::TreeOnly
            && !self
                .tree
                .generate
        {
            return Err(ConfigError::conflict(
                "processing depth is tree_only but tree generation is off; nothing to emit",
            ));
        }

        if self.max_workers == Some(0)
        {
            return Err(ConfigError::conflict("max_workers must be at least 1"));
        }

        if self
            .output_prefix
            .trim()
            .is_empty()
            || self
                .output_prefix
                .contains(['/', '\\'])
        {
            return Err(ConfigError::conflict(format!(
                "output prefix `{}` is empty or contains a path separator",
                self.output_prefix
            )));
        }

        Ok(())
    }

    /// Is this category selected for processing
    pub fn processes(
        &self,
        category: crate::core::model::Category,
    ) -> bool
    {
        use crate::core::model::Category;

        match category
        {
            Category::Module => self.process.modules,
            Category::Test => self.process.tests,
            Category::Resource => self.process.resources,
            Category::Excluded => false,
        }
    }
}

/// `py` / `.PY` → `.py`
pub fn normalize_extension(ext: &str) -> String
{
    let trimmed = ext
        .trim()
        .to_lowercase();
    if trimmed.starts_with('.')
    {
        trimmed
    }
    else
    {
        format!(".{trimmed}")
    }
}

/// Expand `~` and `$VAR`; leave the path untouched if a variable is undefined
pub fn expand_path(path: &Path) -> PathBuf
{
    let raw = path.to_string_lossy();
    match shellexpand::full(&raw)
    {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(
            shellexpand::tilde(&raw)
                .as_ref(),
        ),
    }
}

/// Load settings from `explicit` (if given) or the first config
/// file found in `search_dir`, then overlay `CTXPACK_*` variables.
pub fn load_settings(
    explicit: Option<&Path>,
    search_dir: &Path,
) -> Result<Settings, ConfigError>
{
    let mut builder = config::Config::builder();

    match explicit
    {
        Some(path) =>
        {
            if !path.exists()
            {
                return Err(ConfigError::Load(format!("config file not found: {}", path.display())));
            }
            builder = builder.add_source(config::File::from(path));
        }
        None =>
        {
            // Load from config files in priority order
            for name in &CONFIG_FILES
            {
                let candidate = search_dir.join(name);
                if candidate.is_file()
                {
                    tracing::debug!(path = %candidate.display(), "using config file");
                    builder = builder.add_source(config::File::from(candidate));
                    break;
                }
            }
        }
    }

    // CTXPACK_MINIFY=true, CTXPACK_TREE__SHOW_METHODS=false, CTXPACK_ALLOWED_EXTENSIONS=.py,.rs
    builder = builder.add_source(
        config::Environment::with_prefix("CTXPACK")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("allowed_extensions")
            .with_list_parse_key("include_patterns")
            .with_list_parse_key("exclude_patterns")
            .with_list_parse_key("test_patterns"),
    );

    let cfg = builder
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    cfg.try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))
}

/// `ctxpack init`: write a default `ctxpack.toml`
pub fn init(
    args: InitArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config_path = args
        .path
        .join(CONFIG_FILES[0]);

    if config_path.exists() && !args.force
    {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let settings = Settings::default();
    let toml_string =
        toml::to_string_pretty(&settings).context("Failed to serialize default config")?;

    if ctx.dry_run
    {
        if !ctx.quiet
        {
            println!("DRY RUN: would write {}", config_path.display());
        }
        return Ok(());
    }

    std::fs::write(&config_path, toml_string).context("Failed to write config file")?;

    if !ctx.quiet
    {
        println!("Created config file at {}", config_path.display());
    }
    Ok(())
}
