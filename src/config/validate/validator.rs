//! Document validation logic

use super::error::ValidationError;
use crate::config::schema::{CvSpec, HyperpipeSpec, KFoldSpec, NodeSpec, OptimizerSpec};
use crate::eval::MetricRegistry;
use crate::hpo::SEPARATOR;
use crate::pipeline::is_registered;

fn validate_kfold(spec: &KFoldSpec) -> Result<(), ValidationError> {
    if spec.n_splits < 2 {
        return Err(ValidationError::InvalidSplits(spec.n_splits));
    }
    Ok(())
}

fn validate_optimizer(spec: &OptimizerSpec) -> Result<(), ValidationError> {
    match spec {
        OptimizerSpec::Grid => Ok(()),
        OptimizerSpec::RandomGrid { k: Some(0), .. } | OptimizerSpec::TimeboxedRandomGrid { k: Some(0), .. } => {
            Err(ValidationError::InvalidOptimizer("k must be > 0".to_string()))
        }
        OptimizerSpec::TimeboxedRandomGrid { limit_seconds, .. } if !(*limit_seconds > 0.0) => Err(
            ValidationError::InvalidOptimizer(format!("limit_seconds must be > 0, got {limit_seconds}")),
        ),
        _ => Ok(()),
    }
}

/// Sibling names unique and routable, children present, element types known
fn validate_nodes(owner: &str, nodes: &[NodeSpec], registry: &MetricRegistry) -> Result<(), ValidationError> {
    if nodes.is_empty() {
        return Err(ValidationError::NoElements(owner.to_string()));
    }
    let mut seen: Vec<&str> = Vec::new();
    for node in nodes {
        let name = node.name();
        if name.is_empty() || name.contains(SEPARATOR) {
            return Err(ValidationError::InvalidElementName(name.to_string()));
        }
        if seen.contains(&name) {
            return Err(ValidationError::DuplicateName(name.to_string()));
        }
        seen.push(name);

        match node {
            NodeSpec::Element(element) => {
                if !is_registered(&element.element) {
                    return Err(ValidationError::UnknownElement(element.element.clone()));
                }
                for (param, domain) in &element.hyperparameters {
                    domain.validate().map_err(|reason| ValidationError::InvalidDomain {
                        element: name.to_string(),
                        param: param.clone(),
                        reason,
                    })?;
                }
            }
            NodeSpec::Branch(branch) => {
                if let Some(search) = &branch.local_search {
                    if !registry.contains(&search.metric) {
                        return Err(ValidationError::UnknownMetric(search.metric.clone()));
                    }
                    validate_kfold(&search.inner_cv)?;
                    validate_optimizer(&search.optimizer)?;
                }
                validate_nodes(name, node.children(), registry)?;
            }
            NodeSpec::Switch(_) | NodeSpec::Stack(_) => validate_nodes(name, node.children(), registry)?,
        }
    }
    Ok(())
}

/// Validate a hyperpipe document
///
/// Checks:
/// - Names are present, unique among siblings and free of the key separator
/// - Element types and metrics are registered
/// - Hyperparameter domains are non-empty and well-formed
/// - Split counts and hold-out fractions are in range
pub fn validate_spec(spec: &HyperpipeSpec) -> Result<(), ValidationError> {
    if spec.name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }

    let registry = MetricRegistry::default();
    if spec.metrics.is_empty() {
        return Err(ValidationError::NoMetrics);
    }
    for metric in spec.metrics.iter().map(String::as_str).chain(spec.constraints.iter().map(|c| c.metric())) {
        if !registry.contains(metric) {
            return Err(ValidationError::UnknownMetric(metric.to_string()));
        }
    }
    if let Some(best) = &spec.best_config_metric {
        if !spec.metrics.contains(best) {
            return Err(ValidationError::BestMetricNotListed(best.clone()));
        }
    }

    match &spec.outer_cv {
        CvSpec::KFold(kfold) => validate_kfold(kfold)?,
        CvSpec::Holdout(holdout) => {
            if !(holdout.test_size > 0.0 && holdout.test_size < 1.0) {
                return Err(ValidationError::InvalidTestSize(holdout.test_size));
            }
        }
    }
    validate_kfold(&spec.inner_cv)?;
    validate_optimizer(&spec.optimizer)?;

    if spec.n_jobs == Some(0) {
        return Err(ValidationError::InvalidNJobs);
    }
    if spec.cache.single_subject && !spec.cache.enabled {
        return Err(ValidationError::SingleSubjectWithoutCache);
    }

    validate_nodes(&spec.name, &spec.elements, &registry)
}
