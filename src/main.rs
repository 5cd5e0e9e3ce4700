use std::process::ExitCode;

use clap::Parser;
use ctxpack::cli::{AppContext, Cli, Commands};
use ctxpack::cli_ext::run_cmd::{self, RunStatus};
use ctxpack::core::error::ConfigError;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Build a context once, pass everywhere
    let ctx = AppContext {
        quiet: cli.quiet,
        no_color: cli.no_color,
        dry_run: cli.dry_run,
        verbose: cli.verbose,
    };

    // Logs go to stderr so `--json` output stays clean
    let filter = if ctx.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_ansi(!ctx.no_color)
        .with_target(false)
        .init();

    let outcome = match cli.command {
        Commands::Run(args) => run_cmd::run(args, &ctx),
        Commands::Init(args) => ctxpack::infra::config::init(args, &ctx).map(|_| RunStatus::Clean),
        Commands::Completions(args) => ctxpack::completion::run(args).map(|_| RunStatus::Clean),
    };

    match outcome {
        Ok(RunStatus::Clean) => ExitCode::SUCCESS,
        Ok(RunStatus::CompletedWithSkips) => ExitCode::from(2),
        Err(err) => {
            // Configuration problems get the full diagnostic with help text
            match err.downcast::<ConfigError>() {
                Ok(config) => eprintln!("{:?}", miette::Report::new(config)),
                Err(other) => eprintln!("Error: {other:#}"),
            }
            ExitCode::from(1)
        }
    }
}
