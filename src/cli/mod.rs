//! CLI module for afinar
//!
//! Command handlers over a YAML pipeline document.

mod commands;
mod logging;

pub use commands::run_command;
pub use logging::{init_tracing, LogLevel};

// Re-export Cli from config for convenience
pub use crate::config::Cli;
