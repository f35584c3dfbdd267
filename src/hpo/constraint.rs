//! Performance constraints for early abandonment of configurations
//!
//! After every inner fold the controller asks each constraint whether the
//! configuration under evaluation is still worth pursuing. A constraint never
//! stops the whole search, only the current configuration.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How per-fold values are combined before comparing to the threshold
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintStrategy {
    /// Judge on the first fold only
    #[default]
    First,
    /// Judge on the mean of all folds seen so far
    Mean,
    /// Every fold seen so far must satisfy the threshold
    All,
}

/// Where the threshold comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    /// Fixed bound
    Minimum { threshold: f64 },
    /// Dummy-estimator performance shifted by `margin` in the direction of "better"
    Dummy { margin: f64 },
}

/// Threshold rule on one metric
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceConstraint {
    metric: String,
    kind: ConstraintKind,
    strategy: ConstraintStrategy,
    greater_is_better: bool,
    baseline: Option<f64>,
}

impl PerformanceConstraint {
    /// Reject configurations scoring worse than `threshold` on `metric`
    pub fn minimum(metric: impl Into<String>, threshold: f64) -> Self {
        Self::with_kind(metric, ConstraintKind::Minimum { threshold })
    }

    /// Reject configurations not beating the dummy estimator by `margin`
    pub fn dummy(metric: impl Into<String>, margin: f64) -> Self {
        Self::with_kind(metric, ConstraintKind::Dummy { margin })
    }

    fn with_kind(metric: impl Into<String>, kind: ConstraintKind) -> Self {
        Self {
            metric: metric.into(),
            kind,
            strategy: ConstraintStrategy::default(),
            greater_is_better: true,
            baseline: None,
        }
    }

    pub fn with_strategy(mut self, strategy: ConstraintStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Direction of the metric, resolved from the metric registry by the controller
    pub fn set_greater_is_better(&mut self, greater_is_better: bool) {
        self.greater_is_better = greater_is_better;
    }

    /// Dummy-estimator score for the current outer fold
    pub fn set_baseline(&mut self, value: f64) {
        self.baseline = Some(value);
    }

    pub fn metric(&self) -> &str {
        &self.metric
    }

    pub fn kind(&self) -> &ConstraintKind {
        &self.kind
    }

    pub fn strategy(&self) -> ConstraintStrategy {
        self.strategy
    }

    pub fn needs_baseline(&self) -> bool {
        matches!(self.kind, ConstraintKind::Dummy { .. })
    }

    /// Effective threshold; `None` while a dummy constraint has no baseline
    pub fn threshold(&self) -> Option<f64> {
        match self.kind {
            ConstraintKind::Minimum { threshold } => Some(threshold),
            ConstraintKind::Dummy { margin } => self.baseline.map(|dummy| {
                if self.greater_is_better {
                    dummy + margin
                } else {
                    dummy - margin
                }
            }),
        }
    }

    fn passes(&self, value: f64, threshold: f64) -> bool {
        if self.greater_is_better {
            value >= threshold
        } else {
            value <= threshold
        }
    }

    /// Whether evaluation of the configuration should continue given the
    /// metric's values on the folds evaluated so far.
    ///
    /// Missing values or an unresolved threshold never stop evaluation.
    pub fn shall_continue(&self, fold_values: &[f64]) -> bool {
        let Some(threshold) = self.threshold() else {
            return true;
        };
        if fold_values.is_empty() {
            return true;
        }
        match self.strategy {
            ConstraintStrategy::First => self.passes(fold_values[0], threshold),
            ConstraintStrategy::Mean => {
                let mean = fold_values.iter().sum::<f64>() / fold_values.len() as f64;
                self.passes(mean, threshold)
            }
            ConstraintStrategy::All => fold_values.iter().all(|v| self.passes(*v, threshold)),
        }
    }
}

impl fmt::Display for PerformanceConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let strategy = match self.strategy {
            ConstraintStrategy::First => "first",
            ConstraintStrategy::Mean => "mean",
            ConstraintStrategy::All => "all",
        };
        match self.kind {
            ConstraintKind::Minimum { threshold } => {
                write!(f, "MinimumPerformance({}, {threshold}, {strategy})", self.metric)
            }
            ConstraintKind::Dummy { margin } => {
                write!(f, "DummyPerformance({}, margin {margin}, {strategy})", self.metric)
            }
        }
    }
}
