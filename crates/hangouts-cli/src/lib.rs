//! Hangouts CLI library
//!
//! Argument parsing, layered configuration and the command handlers that
//! drive a hangouts engine from the terminal.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;

pub use cli::{Cli, Commands, IntentKind};
pub use commands::CommandDispatcher;
pub use config::{CliAppConfig, ConfigError};
pub use error::{CliError, Result};
