//! Hyperparameter search
//!
//! Builds the global configuration space of a pipeline tree and drives
//! search strategies through a prepare/ask/tell protocol.
//!
//! # Example
//!
//! ```
//! use afinar::hpo::{GridSearch, Optimizer, ParameterDomain};
//! use afinar::pipeline::{builtin::KNeighborsClassifier, PipelineElement, PipelineNode};
//!
//! let knn = PipelineElement::new("knn", Box::new(KNeighborsClassifier::default()))
//!     .with_hyperparameter("n_neighbors", ParameterDomain::Discrete { low: 1, high: 5, step: 2 });
//! let nodes = vec![PipelineNode::from(knn)];
//!
//! let mut grid = GridSearch::new();
//! grid.prepare(&nodes, true).expect("grid should prepare");
//! let first = grid.ask().expect("grid has configurations");
//! assert_eq!(first.get("knn__n_neighbors").and_then(|v| v.as_int()), Some(1));
//! ```

mod config_space;
mod constraint;
mod grid;
mod optimizer;
mod types;

pub use config_space::ConfigSpace;
pub use constraint::{ConstraintKind, ConstraintStrategy, PerformanceConstraint};
pub use grid::{GridSearch, RandomGridSearch, TimeBoxedRandomGridSearch};
pub use optimizer::Optimizer;
pub use types::{
    qualify, Configuration, HyperparameterSpace, ParameterDomain, ParameterValue, SEPARATOR,
};
