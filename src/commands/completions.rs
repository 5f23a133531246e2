//! # Completions Command Implementation
//!
//! This module implements the `completions` subcommand, which generates shell
//! completion scripts. The scripts are generated with `clap_complete` from the
//! same command table the binary parses, so every `metarepo` subcommand and
//! flag completes.
//!
//! ## Supported Shells
//!
//! Bash, Zsh, Fish, PowerShell and Elvish.
//!
//! ## Example
//!
//! ```bash
//! metarepo completions bash > ~/.local/share/bash-completion/completions/metarepo
//! metarepo completions zsh > ~/.zfunc/_metarepo
//! metarepo completions fish > ~/.config/fish/completions/metarepo.fish
//! ```

use std::io::{self, Write};

use anyhow::Result;
use clap::{Args, CommandFactory, ValueEnum};
use clap_complete::{generate, Shell};

use crate::cli::Cli;

const BIN_NAME: &str = "metarepo";

/// Shell types for completion generation
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CompletionShell {
    /// Bourne Again Shell
    Bash,
    /// Z Shell
    Zsh,
    /// Fish Shell
    Fish,
    /// PowerShell
    #[value(name = "powershell")]
    PowerShell,
    /// Elvish Shell
    Elvish,
}

impl From<CompletionShell> for Shell {
    fn from(shell: CompletionShell) -> Self {
        match shell {
            CompletionShell::Bash => Shell::Bash,
            CompletionShell::Zsh => Shell::Zsh,
            CompletionShell::Fish => Shell::Fish,
            CompletionShell::PowerShell => Shell::PowerShell,
            CompletionShell::Elvish => Shell::Elvish,
        }
    }
}

/// Generate shell completion scripts
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// The shell to generate completions for
    #[arg(value_enum)]
    pub shell: CompletionShell,
}

/// Execute the `completions` command, writing the script to stdout.
pub fn execute(args: CompletionsArgs) -> Result<()> {
    write(args.shell, &mut io::stdout());
    Ok(())
}

fn write(shell: CompletionShell, out: &mut dyn Write) {
    let mut cmd = Cli::command();
    generate(Shell::from(shell), &mut cmd, BIN_NAME, out);
}
