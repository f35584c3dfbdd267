//! Grid command implementation

use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::config::{build_pipeline, load_spec, GridArgs};
use crate::pipeline::Pipeline;

/// One line per configuration, in search order
pub fn format_grid(pipeline: &Pipeline, limit: Option<usize>) -> Vec<String> {
    let space = pipeline.config_space();
    let take = limit.unwrap_or(usize::MAX);
    space
        .iter()
        .take(take)
        .enumerate()
        .map(|(i, config)| format!("{:>4}  {}", i + 1, pipeline.describe(&config)))
        .collect()
}

pub fn run_grid(args: GridArgs, level: LogLevel) -> Result<(), String> {
    let spec = load_spec(&args.config).map_err(|e| format!("Config error: {e}"))?;
    let pipeline = build_pipeline(&spec).map_err(|e| format!("Build failed: {e}"))?;
    let total = pipeline.config_space().len();

    log(level, LogLevel::Normal, &format!("{}: {total} configurations", spec.name));
    for line in format_grid(&pipeline, args.limit) {
        println!("{line}");
    }
    if let Some(limit) = args.limit.filter(|limit| *limit < total) {
        log(level, LogLevel::Verbose, &format!("  ... {} more", total - limit));
    }
    Ok(())
}
