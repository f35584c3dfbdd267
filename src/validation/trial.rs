//! Evaluation of one configuration over the inner folds of an outer fold

use std::time::Instant;

use crate::data::Batch;
use crate::error::Result;
use crate::eval::{Fold, MetricRegistry};
use crate::hpo::{Configuration, PerformanceConstraint};
use crate::pipeline::Pipeline;

use super::results::{summarize, ConfigResult, InnerFoldResult, ScoreInfo};

/// Fixed inputs shared by every trial of one outer fold
pub(crate) struct TrialContext<'a> {
    pub template: &'a Pipeline,
    /// Validation partition of the outer fold
    pub data: &'a Batch,
    pub inner_folds: &'a [Fold],
    pub metrics: &'a [String],
    pub registry: &'a MetricRegistry,
    pub constraints: &'a [PerformanceConstraint],
    pub outer_fold_nr: usize,
    pub save_predictions: bool,
    pub keep_raw: bool,
}

/// Predict on `data` and compute every requested metric
pub(crate) fn score(
    pipeline: &mut Pipeline,
    data: &Batch,
    indices: &[usize],
    metrics: &[String],
    registry: &MetricRegistry,
    save_predictions: bool,
) -> Result<ScoreInfo> {
    let started = Instant::now();
    let y_pred = pipeline.predict(data)?;
    let y_true = data.targets("scoring")?;
    let mut info = ScoreInfo::default();
    for name in metrics {
        info.metrics.insert(name.clone(), registry.compute(name, y_true, &y_pred)?);
    }
    info.score_duration_s = started.elapsed().as_secs_f64();
    if save_predictions {
        info.y_true = y_true.to_vec();
        info.y_pred = y_pred.to_vec();
        info.indices = indices.to_vec();
    }
    Ok(info)
}

fn run_inner_fold(
    ctx: &TrialContext<'_>,
    config: &Configuration,
    fold_nr: usize,
    (train, validation): &Fold,
) -> Result<InnerFoldResult> {
    let mut pipeline = ctx.template.clone();
    pipeline.set_cache_scope(format!("outer{}_inner{fold_nr}", ctx.outer_fold_nr));
    pipeline.set_params(config)?;

    let train_data = ctx.data.select(train);
    let validation_data = ctx.data.select(validation);

    let started = Instant::now();
    pipeline.fit(&train_data)?;
    let fit_duration_s = started.elapsed().as_secs_f64();

    let training = score(&mut pipeline, &train_data, train, ctx.metrics, ctx.registry, ctx.save_predictions)?;
    let validation_scores =
        score(&mut pipeline, &validation_data, validation, ctx.metrics, ctx.registry, ctx.save_predictions)?;

    Ok(InnerFoldResult {
        fold_nr,
        n_train: train.len(),
        n_validation: validation.len(),
        fit_duration_s,
        training,
        validation: validation_scores,
    })
}

/// First constraint that rejects the folds evaluated so far
fn rejecting_constraint(ctx: &TrialContext<'_>, folds: &[InnerFoldResult]) -> Option<String> {
    ctx.constraints.iter().find_map(|constraint| {
        let values: Vec<f64> = folds.iter().filter_map(|f| f.validation.metric(constraint.metric())).collect();
        (!constraint.shall_continue(&values)).then(|| constraint.to_string())
    })
}

/// Evaluate `config` over every inner fold.
///
/// Stage failures mark the result failed and drop all of its metrics;
/// configuration errors are returned to the caller.
pub(crate) fn evaluate_configuration(
    ctx: &TrialContext<'_>,
    config_nr: usize,
    config: Configuration,
) -> Result<ConfigResult> {
    let started = Instant::now();
    let mut result = ConfigResult {
        config_nr,
        human_readable: ctx.template.describe(&config),
        config,
        ..ConfigResult::default()
    };
    tracing::debug!(
        outer_fold = ctx.outer_fold_nr,
        config_nr,
        config = %result.human_readable,
        "evaluating configuration"
    );

    for (i, fold) in ctx.inner_folds.iter().enumerate() {
        match run_inner_fold(ctx, &result.config, i + 1, fold) {
            Ok(inner) => result.inner_folds.push(inner),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!(
                    outer_fold = ctx.outer_fold_nr,
                    config_nr,
                    inner_fold = i + 1,
                    error = %e,
                    "configuration failed"
                );
                result.failed = true;
                result.error = Some(e.to_string());
                result.inner_folds.clear();
                break;
            }
        }

        if let Some(constraint) = rejecting_constraint(ctx, &result.inner_folds) {
            tracing::warn!(
                outer_fold = ctx.outer_fold_nr,
                config_nr,
                constraint = %constraint,
                "configuration rejected by constraint"
            );
            result.rejected_by = Some(constraint);
            break;
        }
    }

    if !result.failed {
        result.metrics_train = summarize(result.inner_folds.iter().map(|f| &f.training), ctx.keep_raw);
        result.metrics_validation = summarize(result.inner_folds.iter().map(|f| &f.validation), ctx.keep_raw);
    }
    result.duration_s = started.elapsed().as_secs_f64();
    Ok(result)
}
