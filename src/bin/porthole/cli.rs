//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use porthole::util::shell::ColorChoice;

/// Porthole - discover the boards attached to this computer
#[derive(Parser)]
#[command(name = "porthole")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Coloring: auto, always, never
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    pub color: ColorChoice,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Directory holding installed packages, tools and config.toml
    #[arg(long, global = true, env = "PORTHOLE_DATA_DIR", value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Text,
    /// JSON document on stdout
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Board commands
    Board(BoardArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct BoardArgs {
    #[command(subcommand)]
    pub command: BoardCommands,
}

#[derive(Subcommand)]
pub enum BoardCommands {
    /// List connected boards
    #[command(
        long_about = "Detects and displays a list of boards connected to this computer.",
        after_help = "Example:\n  porthole board list --timeout 10s"
    )]
    List(BoardListArgs),
}

#[derive(Args)]
pub struct BoardListArgs {
    /// How long each discovery may take to answer, e.g. `1s` or `10s`.
    /// Increase it if your board is not found
    #[arg(long, value_name = "DURATION")]
    pub timeout: Option<String>,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}
