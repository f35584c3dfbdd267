//! Metric registry
//!
//! Maps stable metric names to scoring functions and their optimization
//! direction. The controller only relies on [`MetricRegistry::compute`] and
//! [`MetricRegistry::greater_is_better`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use ndarray::Array1;

use crate::error::{Error, Result};

/// Scoring function `(y_true, y_pred) -> score`
pub type MetricFn = Arc<dyn Fn(&Array1<f64>, &Array1<f64>) -> f64 + Send + Sync>;

#[derive(Clone)]
struct MetricDef {
    compute: MetricFn,
    greater_is_better: bool,
}

impl fmt::Debug for MetricDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricDef").field("greater_is_better", &self.greater_is_better).finish()
    }
}

/// Name -> scoring function registry
#[derive(Debug, Clone)]
pub struct MetricRegistry {
    metrics: BTreeMap<String, MetricDef>,
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl MetricRegistry {
    /// Registry without any metric
    pub fn empty() -> Self {
        Self { metrics: BTreeMap::new() }
    }

    /// Registry holding the classification and regression metrics shipped with the crate
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("accuracy", true, accuracy);
        registry.register("balanced_accuracy", true, balanced_accuracy);
        registry.register("precision", true, |t, p| per_class(t, p).precision);
        registry.register("recall", true, |t, p| per_class(t, p).recall);
        registry.register("f1_score", true, |t, p| per_class(t, p).f1);
        registry.register("mean_squared_error", false, mean_squared_error);
        registry.register("mean_absolute_error", false, mean_absolute_error);
        registry.register("r2", true, r2);
        registry
    }

    /// Register (or replace) a metric
    pub fn register<F>(&mut self, name: &str, greater_is_better: bool, f: F)
    where
        F: Fn(&Array1<f64>, &Array1<f64>) -> f64 + Send + Sync + 'static,
    {
        self.metrics.insert(name.to_string(), MetricDef { compute: Arc::new(f), greater_is_better });
    }

    pub fn contains(&self, name: &str) -> bool {
        self.metrics.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.metrics.keys().map(String::as_str)
    }

    fn get(&self, name: &str) -> Result<&MetricDef> {
        self.metrics.get(name).ok_or_else(|| Error::NotFound(format!("metric '{name}'")))
    }

    /// Score predictions against ground truth
    pub fn compute(&self, name: &str, y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
        let def = self.get(name)?;
        if y_true.len() != y_pred.len() {
            return Err(Error::InvalidData(format!(
                "metric '{name}': {} targets but {} predictions",
                y_true.len(),
                y_pred.len()
            )));
        }
        if y_true.is_empty() {
            return Err(Error::InvalidData(format!("metric '{name}' on empty predictions")));
        }
        Ok((def.compute)(y_true, y_pred))
    }

    /// Whether larger scores are better for `name`
    pub fn greater_is_better(&self, name: &str) -> Result<bool> {
        Ok(self.get(name)?.greater_is_better)
    }
}

fn label(v: f64) -> i64 {
    v.round() as i64
}

fn accuracy(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let hits = y_true.iter().zip(y_pred).filter(|(t, p)| label(**t) == label(**p)).count();
    hits as f64 / y_true.len() as f64
}

/// Mean per-class recall over the classes present in `y_true`
fn balanced_accuracy(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let classes: BTreeSet<i64> = y_true.iter().map(|v| label(*v)).collect();
    let recall_sum: f64 = classes
        .iter()
        .map(|&class| {
            let (support, hits) = y_true.iter().zip(y_pred).filter(|(t, _)| label(**t) == class).fold(
                (0usize, 0usize),
                |(support, hits), (_, p)| (support + 1, hits + usize::from(label(*p) == class)),
            );
            hits as f64 / support as f64
        })
        .sum();
    recall_sum / classes.len().max(1) as f64
}

struct MacroScores {
    precision: f64,
    recall: f64,
    f1: f64,
}

/// Macro-averaged precision, recall and F1 over the labels seen in either vector
fn per_class(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> MacroScores {
    let labels: BTreeSet<i64> = y_true.iter().chain(y_pred.iter()).map(|v| label(*v)).collect();
    let (mut precision, mut recall, mut f1) = (0.0, 0.0, 0.0);
    for &class in &labels {
        let mut tp = 0.0;
        let mut fp = 0.0;
        let mut fn_ = 0.0;
        for (t, p) in y_true.iter().zip(y_pred) {
            match (label(*t) == class, label(*p) == class) {
                (true, true) => tp += 1.0,
                (false, true) => fp += 1.0,
                (true, false) => fn_ += 1.0,
                (false, false) => {}
            }
        }
        let p = if tp + fp > 0.0 { tp / (tp + fp) } else { 0.0 };
        let r = if tp + fn_ > 0.0 { tp / (tp + fn_) } else { 0.0 };
        precision += p;
        recall += r;
        f1 += if p + r > 0.0 { 2.0 * p * r / (p + r) } else { 0.0 };
    }
    let n = labels.len().max(1) as f64;
    MacroScores { precision: precision / n, recall: recall / n, f1: f1 / n }
}

fn mean_squared_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let diff = y_true - y_pred;
    diff.mapv(|d| d * d).sum() / y_true.len() as f64
}

fn mean_absolute_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let diff = y_true - y_pred;
    diff.mapv(f64::abs).sum() / y_true.len() as f64
}

fn r2(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let mean = y_true.sum() / y_true.len() as f64;
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();
    let ss_res: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).powi(2)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}
