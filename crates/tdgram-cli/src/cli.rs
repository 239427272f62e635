//! Command-line interface definitions and parsing

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Session name; also names the session's storage directory
    #[arg(short, long)]
    pub name: String,

    /// Configuration file path
    #[arg(short, long, default_value = "tdgram.toml")]
    pub config: PathBuf,

    /// tdjson shared library; overrides `[settings] library_path`
    #[arg(long, global = true)]
    pub library_path: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Authorize the session and exit
    Login,
    /// Authorize, then print every update as a JSON line until Ctrl-C
    Listen {
        /// Only print updates of these types
        #[arg(long)]
        only: Vec<String>,
    },
    /// Authorize, send one raw JSON query and print the result
    Query {
        /// Query object, e.g. '{"@type": "getMe"}'
        json: String,
        /// Print the correlation id instead of waiting for the result
        #[arg(long)]
        no_wait: bool,
    },
    /// Run one query synchronously in the library, without authorizing
    Execute {
        /// Query object, e.g. '{"@type": "getTextEntities", "text": "@tdgram"}'
        json: String,
    },
}
