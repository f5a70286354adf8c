//! `porthole board` commands

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use crate::cli::{BoardArgs, BoardCommands, BoardListArgs, OutputFormat};
use porthole::ops::{board_list, render_json, render_table, BoardListError, ListOptions};
use porthole::util::{GlobalContext, Shell};
use porthole::{HardwareCatalog, ToolInstaller};

/// Flags shared by every command.
pub struct GlobalOpts {
    pub data_dir: Option<PathBuf>,
    pub format: OutputFormat,
}

pub fn execute(args: BoardArgs, opts: &GlobalOpts, shell: &Arc<Shell>) -> Result<()> {
    match args.command {
        BoardCommands::List(list_args) => list(list_args, opts, shell),
    }
}

fn list(args: BoardListArgs, opts: &GlobalOpts, shell: &Arc<Shell>) -> Result<()> {
    let ctx = GlobalContext::with_data_dir(opts.data_dir.clone())?;
    let config = ctx.config();

    let timeout = args
        .timeout
        .as_deref()
        .unwrap_or_else(|| config.list_timeout());
    let options = ListOptions::parse(timeout)?;

    let mut catalog = HardwareCatalog::load(ctx.packages_dir())
        .map_err(BoardListError::catalog_load)?
        .with_tools_mirror(config.network.tools_mirror.clone());
    let installer = ToolInstaller::new(ctx.staging_dir()).timeout(config.download_timeout());

    let report = board_list(&mut catalog, &installer, shell, &options)?;

    match opts.format {
        OutputFormat::Json => println!("{}", render_json(&report.ports)?),
        OutputFormat::Text => print!("{}", render_table(&report.ports)),
    }

    Ok(())
}
