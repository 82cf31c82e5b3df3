//! Vanish CLI library
//!
//! Configuration loading and the interactive console used by the `vanish`
//! binary.

pub mod cli;
pub mod config;
pub mod shell;

pub use cli::Cli;
pub use config::{AppConfig, ConsoleConfig};
pub use shell::{CommandParseError, Flow, Shell, ShellCommand};
