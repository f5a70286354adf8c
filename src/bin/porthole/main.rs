//! Porthole CLI - discover the boards attached to this computer

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use miette::Diagnostic as MietteDiagnostic;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands, OutputFormat};
use commands::board::GlobalOpts;
use porthole::ops::BoardListError;
use porthole::util::diagnostic::{self, Diagnostic};
use porthole::util::exit_code;
use porthole::util::Shell;

fn main() {
    let cli = Cli::parse();

    // Set up logging; stdout is reserved for the command's result
    let filter = if cli.verbose {
        EnvFilter::new("porthole=debug")
    } else if cli.quiet {
        EnvFilter::new("porthole=error")
    } else {
        EnvFilter::new("porthole=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let color = cli.format == OutputFormat::Text && cli.color.enabled();

    if let Err(e) = run(cli) {
        std::process::exit(report(&e, color));
    }
}

fn run(cli: Cli) -> Result<()> {
    let shell = Arc::new(Shell::from_flags(
        cli.quiet,
        cli.verbose,
        cli.color,
        cli.format == OutputFormat::Json,
    ));
    let opts = GlobalOpts {
        data_dir: cli.data_dir,
        format: cli.format,
    };

    match cli.command {
        Commands::Board(args) => commands::board::execute(args, &opts, &shell),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}

/// Print a fatal error and pick the exit code for it.
fn report(err: &anyhow::Error, color: bool) -> i32 {
    let mut diag = Diagnostic::from_error(err);

    let code = match err.downcast_ref::<BoardListError>() {
        Some(list_err) => {
            if let Some(help) = list_err.help() {
                diag = diag.with_suggestion(help.to_string());
            }
            list_err.exit_code()
        }
        None => exit_code::GENERIC,
    };

    diagnostic::emit(&diag, color);
    code
}
