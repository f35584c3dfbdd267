//! Declarative pipeline documents
//!
//! A YAML document describes one hyperpipe: the element tree with its
//! hyperparameter domains, the metrics, the outer and inner splitters, the
//! optimizer and the constraints.
//!
//! # Example
//!
//! ```
//! use afinar::config::{build_hyperpipe, parse_spec};
//!
//! let spec = parse_spec(
//!     r#"
//! name: demo
//! elements:
//!   - element: StandardScaler
//!   - element: KNeighborsClassifier
//!     name: knn
//!     hyperparameters:
//!       n_neighbors: { discrete: { low: 1, high: 5, step: 2 } }
//! "#,
//! )
//! .expect("document should parse");
//! let hyperpipe = build_hyperpipe(&spec).expect("document should build");
//! assert_eq!(hyperpipe.pipeline().config_space().len(), 3);
//! ```

mod builder;
mod cli;
mod schema;
mod validate;

#[cfg(test)]
mod tests;

pub use builder::{
    build_constraint, build_cv, build_hyperpipe, build_kfold, build_node, build_optimizer, build_pipeline,
    load_spec, parse_spec,
};
pub use cli::{parse_args, Cli, Command, GridArgs, ValidateArgs};
pub use schema::{
    BranchSpec, CacheSpec, ConstraintSpec, CvSpec, ElementSpec, HoldoutSpec, HyperpipeSpec, KFoldSpec,
    LocalSearchSpec, NodeSpec, OptimizerSpec, StackSpec, SwitchSpec,
};
pub use validate::{validate_spec, ValidationError};
