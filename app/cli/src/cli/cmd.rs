use clap::command;
use clap::{Parser, Subcommand};

use crate::cli::import::args::ImportArgs;
use crate::cli::state::args::StateQuery;

#[derive(Parser, Debug)]
#[command(name = "eth-importer")]
#[command(about = "CLI tool for historical ETH log imports", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one import pass over a set of contracts
    Import(ImportArgs),
    /// Print the saved import states as JSON
    State(StateQuery),
}
