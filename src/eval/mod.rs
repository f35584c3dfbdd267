//! Evaluation collaborators: fold splitters and the metric registry

mod metric;
mod split;

pub use metric::{MetricFn, MetricRegistry};
pub use split::{CrossValidation, Fold, HoldoutSplit, KFold};
