//! Result tree of a nested cross-validated search
//!
//! `PipeResult` → `OuterFoldResult` → `ConfigResult` → `InnerFoldResult` →
//! `ScoreInfo`. Every level is plain serde data so that any
//! [`ResultStore`](crate::tracking::ResultStore) can persist it.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::hpo::Configuration;

pub(crate) fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

/// Mean and population standard deviation of a metric over folds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub mean: f64,
    pub std: f64,
    /// Raw per-fold values, kept on request
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<f64>,
}

impl MetricSummary {
    pub fn from_values(values: &[f64], keep_raw: bool) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Self {
            mean,
            std: variance.sqrt(),
            values: if keep_raw { values.to_vec() } else { Vec::new() },
        }
    }
}

/// Summarize every metric found in `scores`
pub(crate) fn summarize<'a>(
    scores: impl Iterator<Item = &'a ScoreInfo>,
    keep_raw: bool,
) -> BTreeMap<String, MetricSummary> {
    let mut values: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for score in scores {
        for (name, value) in &score.metrics {
            values.entry(name.clone()).or_default().push(*value);
        }
    }
    values
        .into_iter()
        .map(|(name, v)| (name, MetricSummary::from_values(&v, keep_raw)))
        .collect()
}

/// Metrics of one prediction pass, plus the predictions when saved
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreInfo {
    pub metrics: BTreeMap<String, f64>,
    pub score_duration_s: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub y_true: Vec<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub y_pred: Vec<f64>,
    /// Row indices into the partition the scores were computed on
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indices: Vec<usize>,
}

impl ScoreInfo {
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InnerFoldResult {
    pub fold_nr: usize,
    pub n_train: usize,
    pub n_validation: usize,
    pub fit_duration_s: f64,
    pub training: ScoreInfo,
    pub validation: ScoreInfo,
}

/// Outcome of one configuration over the inner folds of an outer fold
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigResult {
    pub config_nr: usize,
    pub config: Configuration,
    pub human_readable: String,
    pub inner_folds: Vec<InnerFoldResult>,
    pub failed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Constraint that stopped the evaluation early
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_by: Option<String>,
    pub metrics_train: BTreeMap<String, MetricSummary>,
    pub metrics_validation: BTreeMap<String, MetricSummary>,
    pub duration_s: f64,
}

impl ConfigResult {
    /// Neither failed nor rejected
    pub fn is_eligible(&self) -> bool {
        !self.failed && self.rejected_by.is_none()
    }

    pub fn validation_mean(&self, metric: &str) -> Option<f64> {
        self.metrics_validation.get(metric).map(|m| m.mean)
    }
}

/// Winning configuration of an outer fold, refit on the whole validation partition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub config_nr: usize,
    pub config: Configuration,
    pub human_readable: String,
    pub training: ScoreInfo,
    /// Held-out scores; absent when final evaluation is suppressed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<ScoreInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OuterFoldResult {
    pub fold_nr: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub tested_configs: Vec<ConfigResult>,
    pub best_config: Option<OptimizationResult>,
    /// Dummy estimator scored on the test partition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dummy: Option<ScoreInfo>,
}

impl OuterFoldResult {
    /// The tested-configuration entry of the winner
    pub fn best_config_result(&self) -> Option<&ConfigResult> {
        let best = self.best_config.as_ref()?;
        self.tested_configs.iter().find(|c| c.config_nr == best.config_nr)
    }

    pub fn n_failed(&self) -> usize {
        self.tested_configs.iter().filter(|c| c.failed).count()
    }

    pub fn n_rejected(&self) -> usize {
        self.tested_configs.iter().filter(|c| c.rejected_by.is_some()).count()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Running,
    Completed,
    Failed,
}

/// Root of the result tree for one hyperpipe run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipeResult {
    pub name: String,
    pub status: RunStatus,
    pub best_config_metric: String,
    pub maximize: bool,
    pub outer_folds: Vec<OuterFoldResult>,
    /// Overall winner, refit on all data
    pub best_config: Option<Configuration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_config_human: Option<String>,
    /// Held-out metrics of the outer-fold winners
    pub metrics_test: BTreeMap<String, MetricSummary>,
    pub metrics_train: BTreeMap<String, MetricSummary>,
    pub started_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PipeResult {
    pub fn new(name: impl Into<String>, best_config_metric: impl Into<String>, maximize: bool) -> Self {
        Self {
            name: name.into(),
            best_config_metric: best_config_metric.into(),
            maximize,
            started_ms: now_ms(),
            ..Self::default()
        }
    }

    /// Insert an outer fold keeping fold order
    pub fn push_outer_fold(&mut self, fold: OuterFoldResult) {
        let at = self.outer_folds.partition_point(|f| f.fold_nr < fold.fold_nr);
        self.outer_folds.insert(at, fold);
    }

    /// Outer-fold winner with the best inner validation score
    pub fn overall_best(&self) -> Option<&ConfigResult> {
        let metric = self.best_config_metric.as_str();
        self.outer_folds
            .iter()
            .filter_map(OuterFoldResult::best_config_result)
            .filter_map(|c| c.validation_mean(metric).map(|score| (score, c)))
            .filter(|(score, _)| score.is_finite())
            .reduce(|best, candidate| {
                let better = if self.maximize { candidate.0 > best.0 } else { candidate.0 < best.0 };
                if better {
                    candidate
                } else {
                    best
                }
            })
            .map(|(_, c)| c)
    }

    /// Aggregate winners' training and test scores over outer folds
    pub fn aggregate(&mut self, keep_raw: bool) {
        let winners: Vec<&OptimizationResult> =
            self.outer_folds.iter().filter_map(|f| f.best_config.as_ref()).collect();
        self.metrics_train = summarize(winners.iter().map(|w| &w.training), keep_raw);
        self.metrics_test = summarize(winners.iter().filter_map(|w| w.test.as_ref()), keep_raw);
    }

    pub fn n_tested(&self) -> usize {
        self.outer_folds.iter().map(|f| f.tested_configs.len()).sum()
    }

    /// Short text summary of the run
    pub fn summary(&self) -> String {
        let mut out = format!("{} [{:?}] optimizing {}\n", self.name, self.status, self.best_config_metric);
        for fold in &self.outer_folds {
            let test = fold
                .best_config
                .as_ref()
                .and_then(|b| b.test.as_ref())
                .and_then(|t| t.metric(&self.best_config_metric));
            let winner = fold.best_config.as_ref().map_or("-", |b| b.human_readable.as_str());
            out.push_str(&format!(
                "  outer fold {}: {} tested, {} failed, {} rejected, best {winner}",
                fold.fold_nr,
                fold.tested_configs.len(),
                fold.n_failed(),
                fold.n_rejected()
            ));
            if let Some(score) = test {
                out.push_str(&format!(" (test {score:.4})"));
            }
            out.push('\n');
        }
        if let Some(best) = &self.best_config_human {
            out.push_str(&format!("  overall best: {best}\n"));
        }
        for (name, summary) in &self.metrics_test {
            out.push_str(&format!("  test {name}: {:.4} ± {:.4}\n", summary.mean, summary.std));
        }
        out
    }
}
