//! Nested cross-validated optimization
//!
//! [`Hyperpipe`] drives outer folds for the generalization estimate and, in
//! each of them, an optimizer over inner folds for configuration selection.
//! Everything it learns ends up in a [`PipeResult`] tree.
//!
//! # Example
//!
//! ```
//! use afinar::data::Batch;
//! use afinar::eval::KFold;
//! use afinar::hpo::{ParameterDomain, ParameterValue};
//! use afinar::pipeline::builtin::{NearestCentroid, StandardScaler};
//! use afinar::pipeline::{Pipeline, PipelineElement};
//! use afinar::validation::Hyperpipe;
//! use ndarray::{Array1, Array2};
//!
//! # fn main() -> afinar::Result<()> {
//! let x = Array2::from_shape_fn((24, 2), |(i, j)| (i % 2) as f64 * 4.0 + (i * (j + 1)) as f64 * 0.01);
//! let y = Array1::from_shape_fn(24, |i| (i % 2) as f64);
//! let data = Batch::new(x).with_targets(y);
//!
//! let pipeline = Pipeline::new(vec![
//!     PipelineElement::new("scaler", Box::new(StandardScaler::default())).into(),
//!     PipelineElement::new("clf", Box::new(NearestCentroid::default()))
//!         .with_hyperparameter(
//!             "shrink",
//!             ParameterDomain::Values(vec![ParameterValue::Float(0.0), ParameterValue::Float(0.5)]),
//!         )
//!         .into(),
//! ]);
//!
//! let mut hyperpipe = Hyperpipe::new("demo", pipeline)
//!     .with_outer_cv(KFold::new(2))
//!     .with_inner_cv(KFold::new(2))
//!     .with_metrics(["accuracy"]);
//! let result = hyperpipe.fit(&data)?;
//! assert_eq!(result.outer_folds.len(), 2);
//! assert_eq!(result.outer_folds[0].tested_configs.len(), 2);
//! # Ok(())
//! # }
//! ```

mod hyperpipe;
mod results;
mod trial;

#[cfg(test)]
mod tests;

pub use hyperpipe::{Hyperpipe, Task};
pub use results::{
    ConfigResult, InnerFoldResult, MetricSummary, OptimizationResult, OuterFoldResult, PipeResult, RunStatus,
    ScoreInfo,
};
