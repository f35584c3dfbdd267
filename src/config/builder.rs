//! Build pipelines and hyperpipes from a validated document

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::schema::{ConstraintSpec, CvSpec, HyperpipeSpec, KFoldSpec, NodeSpec, OptimizerSpec};
use super::validate::validate_spec;
use crate::error::{Error, Result};
use crate::eval::{CrossValidation, HoldoutSplit, KFold};
use crate::hpo::{GridSearch, Optimizer, PerformanceConstraint, RandomGridSearch, TimeBoxedRandomGridSearch};
use crate::pipeline::{Branch, LocalSearch, Pipeline, PipelineElement, PipelineNode, Stack, Switch};
use crate::tracking::JsonFileStore;
use crate::validation::Hyperpipe;

/// Parse a YAML document
pub fn parse_spec(yaml: &str) -> Result<HyperpipeSpec> {
    serde_yaml::from_str(yaml).map_err(|e| Error::Configuration(format!("Failed to parse YAML document: {e}")))
}

/// Read, parse and validate a YAML document
pub fn load_spec<P: AsRef<Path>>(path: P) -> Result<HyperpipeSpec> {
    let path = path.as_ref();
    let yaml = fs::read_to_string(path)
        .map_err(|e| Error::Configuration(format!("Failed to read document {}: {e}", path.display())))?;
    let spec = parse_spec(&yaml)?;
    validate_spec(&spec)?;
    tracing::debug!(path = %path.display(), name = %spec.name, "document loaded");
    Ok(spec)
}

pub fn build_kfold(spec: &KFoldSpec) -> KFold {
    let kfold = KFold::new(spec.n_splits).with_seed(spec.seed);
    if spec.shuffle {
        kfold
    } else {
        kfold.without_shuffle()
    }
}

pub fn build_cv(spec: &CvSpec) -> CrossValidation {
    match spec {
        CvSpec::KFold(kfold) => build_kfold(kfold).into(),
        CvSpec::Holdout(holdout) => HoldoutSplit::new(holdout.test_size).with_seed(holdout.seed).into(),
    }
}

/// Build a search strategy
pub fn build_optimizer(spec: &OptimizerSpec) -> Result<Box<dyn Optimizer>> {
    match spec {
        OptimizerSpec::Grid => Ok(Box::new(GridSearch::new())),
        OptimizerSpec::RandomGrid { k, seed } => {
            let search = match k {
                Some(k) => RandomGridSearch::new(*k),
                None => RandomGridSearch::all(),
            };
            Ok(Box::new(search.with_seed(*seed)))
        }
        OptimizerSpec::TimeboxedRandomGrid { limit_seconds, k, seed } => {
            let limit = Duration::try_from_secs_f64(*limit_seconds).map_err(|e| {
                Error::Configuration(format!("invalid limit_seconds {limit_seconds}: {e}"))
            })?;
            let mut search = TimeBoxedRandomGridSearch::new(limit).with_seed(*seed);
            if let Some(k) = k {
                search = search.with_k(*k);
            }
            Ok(Box::new(search))
        }
    }
}

pub fn build_constraint(spec: &ConstraintSpec) -> PerformanceConstraint {
    match spec {
        ConstraintSpec::Minimum { metric, threshold, strategy } => {
            PerformanceConstraint::minimum(metric.clone(), *threshold).with_strategy(*strategy)
        }
        ConstraintSpec::Dummy { metric, margin, strategy } => {
            PerformanceConstraint::dummy(metric.clone(), *margin).with_strategy(*strategy)
        }
    }
}

/// Build one stage, recursing into composites
pub fn build_node(spec: &NodeSpec) -> Result<PipelineNode> {
    match spec {
        NodeSpec::Element(e) => {
            let mut element = PipelineElement::create(&e.element)?;
            if let Some(name) = &e.name {
                element = element.with_name(name.clone());
            }
            for (name, value) in &e.params {
                element = element.with_param(name, value.clone())?;
            }
            for (name, domain) in &e.hyperparameters {
                element = element.with_hyperparameter(name, domain.clone());
            }
            Ok(element
                .with_test_disabled(e.test_disabled)
                .with_disabled(e.disabled)
                .with_data_only(e.data_only)
                .into())
        }
        NodeSpec::Switch(s) => {
            let mut switch = Switch::new(s.switch.clone());
            for child in &s.elements {
                switch = switch.with_element(build_node(child)?);
            }
            Ok(switch.into())
        }
        NodeSpec::Stack(s) => {
            let mut stack = Stack::new(s.stack.clone()).with_voting(s.voting);
            for child in &s.elements {
                stack = stack.with_element(build_node(child)?);
            }
            Ok(stack.into())
        }
        NodeSpec::Branch(b) => {
            let mut branch = Branch::new(b.branch.clone());
            for child in &b.elements {
                branch = branch.with_element(build_node(child)?);
            }
            if let Some(search) = &b.local_search {
                let local = LocalSearch::new(search.metric.clone(), build_kfold(&search.inner_cv))
                    .with_optimizer(build_optimizer(&search.optimizer)?);
                branch = branch.with_local_search(local);
            }
            Ok(branch.into())
        }
    }
}

/// Build the top-level pipeline and check its structure
pub fn build_pipeline(spec: &HyperpipeSpec) -> Result<Pipeline> {
    let nodes = spec.elements.iter().map(build_node).collect::<Result<Vec<_>>>()?;
    let pipeline = Pipeline::new(nodes);
    pipeline.validate_structure()?;
    Ok(pipeline)
}

/// Validate a document and build the hyperpipe it describes
pub fn build_hyperpipe(spec: &HyperpipeSpec) -> Result<Hyperpipe> {
    validate_spec(spec)?;
    let pipeline = build_pipeline(spec)?;

    let mut hyperpipe = Hyperpipe::new(spec.name.clone(), pipeline)
        .with_optimizer(build_optimizer(&spec.optimizer)?)
        .with_outer_cv(build_cv(&spec.outer_cv))
        .with_inner_cv(build_kfold(&spec.inner_cv))
        .with_metrics(spec.metrics.iter().cloned())
        .with_task(spec.task)
        .with_cache(spec.cache.enabled)
        .with_single_subject_caching(spec.cache.single_subject)
        .with_eval_final_performance(spec.eval_final_performance)
        .with_save_predictions(spec.save_predictions);

    if let Some(metric) = &spec.best_config_metric {
        hyperpipe = hyperpipe.with_best_config_metric(metric.clone());
    }
    for constraint in &spec.constraints {
        hyperpipe = hyperpipe.with_constraint(build_constraint(constraint));
    }
    if let Some(n_jobs) = spec.n_jobs {
        hyperpipe = hyperpipe.with_n_jobs(n_jobs);
    }
    if let Some(dir) = &spec.output_dir {
        hyperpipe = hyperpipe.with_store(Arc::new(JsonFileStore::new(dir)));
    }
    tracing::info!(name = %spec.name, "hyperpipe built from document");
    Ok(hyperpipe)
}
