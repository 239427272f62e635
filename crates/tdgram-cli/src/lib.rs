//! tdgram CLI library
//!
//! Argument parsing, TOML configuration, logging setup and interactive
//! prompts for the `tdgram` binary.

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod prompts;

pub use app::TdgramApp;
pub use cli::{Cli, Commands};
pub use config::{AppConfig, LoginConfig};
pub use error::{CliError, Result};
