mod cli {
    pub mod import {
        pub mod args;
        pub mod run;
    }
    pub mod state {
        pub mod args;
        pub mod response;
        pub mod run;
    }
    pub mod cmd;
    pub mod read;
}

use clap::Parser;
use eyre::Result;
use tracing_subscriber::EnvFilter;

use crate::cli::cmd::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli);

    match &cli.command {
        Command::Import(args) => {
            tracing::info!("Import Command: {:?}", args);
            cli::import::run::import(args).await
        }
        Command::State(query) => {
            tracing::info!("State Query: {:?}", query);
            cli::state::run::select(query).await
        }
    }
}

fn init_tracing(cli: &Cli) {
    // configured from RUST_LOG, info by default
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match &cli.command {
        Command::Import(_) => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
        // stdout is reserved for the JSON output
        Command::State(_) => {
            tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
        }
    }
}
