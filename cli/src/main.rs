#![allow(clippy::exit)]

mod cli;
mod commands;
mod context;
mod output;
mod timing;

use anyhow::Result;
use clap::Parser as _;

use crate::cli::{Cli, Commands};
use crate::commands::{run_list, run_show};
use crate::context::{build_store, resolve_config};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    timing::init_tracing(cli.verbose, cli.timing);

    match cli.command {
        Commands::List {
            search,
            pages,
            page_size,
            reset_page_on_search,
        } => {
            let config = resolve_config(cli.api_url, page_size, reset_page_on_search)?;
            run_list(build_store(config)?, search, pages).await
        }
        Commands::Show { id } => {
            let config = resolve_config(cli.api_url, None, false)?;
            run_show(build_store(config)?, id).await
        }
    }
}
