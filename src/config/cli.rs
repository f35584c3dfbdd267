//! CLI argument parsing
//!
//! ```bash
//! afinar validate pipeline.yaml
//! afinar validate pipeline.yaml --detailed
//! afinar grid pipeline.yaml --limit 20
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Afinar: nested cross-validated hyperparameter search
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "afinar")]
#[command(version)]
#[command(about = "Hyperparameter search over composable ML pipelines with nested cross-validation")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Parse, validate and build a pipeline document
    Validate(ValidateArgs),

    /// Print the configurations of a pipeline document in search order
    Grid(GridArgs),
}

/// Arguments for the validate command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct ValidateArgs {
    /// Path to YAML pipeline document
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Show the pipeline structure and per-element hyperparameters
    #[arg(short, long)]
    pub detailed: bool,
}

/// Arguments for the grid command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct GridArgs {
    /// Path to YAML pipeline document
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Print at most N configurations
    #[arg(short, long, value_name = "N")]
    pub limit: Option<usize>,
}

/// Parse command line arguments
pub fn parse_args<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(args)
}
