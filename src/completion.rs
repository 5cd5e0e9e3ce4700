//! Shell completion scripts for `ctxpack`, generated from the clap model.

use anyhow::{Context, Result};
use clap::CommandFactory;
use clap_complete::{Shell as CompletionShell, generate, generate_to};
use std::{fs, io::Write};

use crate::cli::{Cli, CompletionsArgs, Shell};

const BIN_NAME: &str = "ctxpack";

impl From<Shell> for CompletionShell {
    fn from(shell: Shell) -> Self {
        match shell {
            Shell::Bash => CompletionShell::Bash,
            Shell::Zsh => CompletionShell::Zsh,
            Shell::Fish => CompletionShell::Fish,
            Shell::PowerShell => CompletionShell::PowerShell,
            Shell::Elvish => CompletionShell::Elvish,
        }
    }
}

/// Write the completion script for `shell` into `out`
pub fn render(shell: Shell, out: &mut dyn Write) {
    let mut cmd = Cli::command();
    generate(CompletionShell::from(shell), &mut cmd, BIN_NAME, out);
}

pub fn run(args: CompletionsArgs) -> Result<()> {
    if args.stdout {
        render(args.shell, &mut std::io::stdout());
        return Ok(());
    }

    let dir = args
        .out_dir
        .context("--out-dir is required unless --stdout is set")?;

    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    let mut cmd = Cli::command();
    let path = generate_to(CompletionShell::from(args.shell), &mut cmd, BIN_NAME, &dir)
        .context("generate completion file")?;

    eprintln!("Wrote {} completion to {}", BIN_NAME, path.display());
    Ok(())
}
