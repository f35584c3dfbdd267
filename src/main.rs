//! Afinar CLI
//!
//! # Usage
//!
//! ```bash
//! # Check a pipeline document and report its search space size
//! afinar validate pipeline.yaml
//!
//! # List the configurations a grid search would visit
//! afinar grid pipeline.yaml --limit 20
//! ```

use afinar::cli::{run_command, Cli};
use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
