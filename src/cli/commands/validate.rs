//! Validate command implementation

use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::config::{build_hyperpipe, load_spec, CvSpec, HyperpipeSpec, NodeSpec, OptimizerSpec, ValidateArgs};

/// Format the search setup as a string
pub fn format_search_info(spec: &HyperpipeSpec) -> String {
    let outer = match &spec.outer_cv {
        CvSpec::KFold(kfold) => format!("{}-fold", kfold.n_splits),
        CvSpec::Holdout(holdout) => format!("hold-out (test_size={})", holdout.test_size),
    };
    let optimizer = match &spec.optimizer {
        OptimizerSpec::Grid => "grid".to_string(),
        OptimizerSpec::RandomGrid { k: Some(k), .. } => format!("random grid (k={k})"),
        OptimizerSpec::RandomGrid { k: None, .. } => "random grid".to_string(),
        OptimizerSpec::TimeboxedRandomGrid { limit_seconds, .. } => {
            format!("time-boxed random grid ({limit_seconds}s)")
        }
    };
    let mut lines = vec![
        format!("  Metrics: {}", spec.metrics.join(", ")),
        format!("  Outer CV: {outer}"),
        format!("  Inner CV: {}-fold", spec.inner_cv.n_splits),
        format!("  Optimizer: {optimizer}"),
    ];
    if !spec.constraints.is_empty() {
        lines.push(format!("  Constraints: {}", spec.constraints.len()));
    }
    if spec.cache.enabled {
        lines.push(format!("  Cache: enabled (single subject: {})", spec.cache.single_subject));
    }
    lines.join("\n")
}

fn format_node(node: &NodeSpec, depth: usize, lines: &mut Vec<String>) {
    let indent = "  ".repeat(depth + 1);
    match node {
        NodeSpec::Element(e) => {
            let mut line = format!("{indent}{} ({})", node.name(), e.element);
            if !e.hyperparameters.is_empty() {
                let names: Vec<&str> = e.hyperparameters.keys().map(String::as_str).collect();
                line.push_str(&format!(" [{}]", names.join(", ")));
            }
            if e.test_disabled {
                line.push_str(" optional");
            }
            lines.push(line);
        }
        NodeSpec::Switch(_) => lines.push(format!("{indent}switch {}", node.name())),
        NodeSpec::Stack(s) => {
            lines.push(format!("{indent}stack {}{}", node.name(), if s.voting { " (voting)" } else { "" }))
        }
        NodeSpec::Branch(b) => {
            let search = if b.local_search.is_some() { " (local search)" } else { "" };
            lines.push(format!("{indent}branch {}{search}", node.name()));
        }
    }
    for child in node.children() {
        format_node(child, depth + 1, lines);
    }
}

/// Format the element tree as an indented list
pub fn format_tree(spec: &HyperpipeSpec) -> String {
    let mut lines = Vec::new();
    for node in &spec.elements {
        format_node(node, 0, &mut lines);
    }
    lines.join("\n")
}

pub fn run_validate(args: ValidateArgs, level: LogLevel) -> Result<(), String> {
    log(level, LogLevel::Normal, &format!("Validating document: {}", args.config.display()));

    let spec = load_spec(&args.config).map_err(|e| format!("Config error: {e}"))?;
    let hyperpipe = build_hyperpipe(&spec).map_err(|e| format!("Build failed: {e}"))?;
    let n_configs = hyperpipe.pipeline().config_space().len();

    log(level, LogLevel::Normal, &format!("Document '{}' is valid", spec.name));
    log(level, LogLevel::Normal, &format!("  Configurations: {n_configs}"));

    if args.detailed {
        println!();
        println!("Search:");
        println!("{}", format_search_info(&spec));
        println!();
        println!("Elements:");
        println!("{}", format_tree(&spec));
    }

    Ok(())
}
