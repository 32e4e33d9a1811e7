mod cli;
mod config;
mod diff;
mod error;
mod format;
mod fs_util;
mod header;
mod logging;
mod orchestrator;
mod process;
mod scanner;
mod walker;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cli::{OutputMode, commands};
use diff::DiffSource;
use orchestrator::{Actions, TargetSelection};
use scanner::ScannerOptions;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "selfmt")]
#[command(about = "Keep C++ source headers and formatting in shape, one changed line at a time")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Repository root (defaults to current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Extra config file, applied after the user and project files
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,

    /// Suppress normal output
    #[arg(long, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputMode::Console)]
    output: OutputMode,

    /// Also append JSON logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Update headers and/or formatting of selected files
    Run {
        /// Files or directories; defaults to the configured directories
        #[arg(conflicts_with_all = ["staged", "commits"])]
        paths: Vec<PathBuf>,

        /// Only lines changed in the index
        #[arg(long, conflicts_with = "commits")]
        staged: bool,

        /// Only lines changed in the last N commits
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        commits: Option<u32>,

        /// Rewrite identification headers
        #[arg(long)]
        header: bool,

        /// Run the formatter (implied when --header is not given)
        #[arg(long)]
        format: bool,

        /// Report what would change instead of writing
        #[arg(long)]
        check: bool,

        /// Formatter executable, skipping discovery
        #[arg(long)]
        formatter: Option<PathBuf>,

        /// Per-invocation formatter timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Regenerate the embedded scanner and patch it
    Scanner {
        /// Lexer generator executable
        #[arg(long)]
        flex: Option<String>,

        /// Patch the existing output instead of regenerating it
        #[arg(long)]
        skip_generate: bool,

        /// Patch this file in place instead of the configured output
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Check which external tools are available
    Doctor,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init_logging(cli.debug, cli.quiet, cli.log_file.as_deref())?;

    let root = match cli.root {
        Some(root) => root,
        None => std::env::current_dir().context("determining current directory")?,
    };
    let mut config = config::SelfmtConfig::load(&root, cli.config.as_deref())?;

    let mode = if cli.quiet { OutputMode::Quiet } else { cli.output };
    let handler = cli::create_handler(mode, cli.debug);

    tokio::spawn(cli::setup_signal_handlers());

    let code = match cli.command {
        Commands::Run {
            paths,
            staged,
            commits,
            header,
            format,
            check,
            formatter,
            timeout,
        } => {
            if let Some(formatter) = formatter {
                config.formatter.path = Some(formatter);
            }
            if let Some(secs) = timeout {
                config.formatter.timeout_secs = secs;
            }

            let selection = if staged {
                TargetSelection::Diff(DiffSource::Staged)
            } else if let Some(n) = commits {
                TargetSelection::Diff(DiffSource::LastCommits(n))
            } else if !paths.is_empty() {
                TargetSelection::Paths(paths)
            } else {
                TargetSelection::Dirs
            };

            let actions = Actions {
                header,
                format: format || !header,
                check,
            };

            commands::run(&config, selection, actions, &*handler).await
        }

        Commands::Scanner {
            flex,
            skip_generate,
            input,
        } => {
            let options = ScannerOptions {
                flex,
                skip_generate,
                input,
            };
            commands::scanner(&config, &options, &*handler).await
        }

        Commands::Doctor => commands::doctor(&config, &*handler).await,
    };

    std::process::exit(code);
}
