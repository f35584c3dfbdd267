//! Afinar: hyperparameter search over composable ML pipelines
//!
//! Afinar wraps processing and modeling units into named pipeline elements,
//! composes them with switches, stacks and branches, enumerates the joint
//! hyperparameter space of the whole tree and searches it with nested
//! cross-validation.
//!
//! # Architecture
//!
//! - `pipeline`: elements, composites, the execution engine and its stage cache
//! - `hpo`: configuration spaces and ask/tell optimizers
//! - `eval`: fold splitters and metrics
//! - `validation`: the nested cross-validation controller and its result tree
//! - `tracking`: result persistence
//! - `config`: declarative YAML documents and the CLI definition
//!
//! # Quick start
//!
//! ```
//! use afinar::config::{build_hyperpipe, parse_spec};
//!
//! # fn main() -> afinar::Result<()> {
//! let spec = parse_spec(
//!     r#"
//! name: quickstart
//! elements:
//!   - element: StandardScaler
//!   - switch: clf
//!     elements:
//!       - element: NearestCentroid
//!       - element: KNeighborsClassifier
//!         hyperparameters:
//!           n_neighbors: { values: [1, 3] }
//! "#,
//! )?;
//! let hyperpipe = build_hyperpipe(&spec)?;
//! assert_eq!(hyperpipe.pipeline().config_space().len(), 3);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod eval;
pub mod hpo;
pub mod pipeline;
pub mod trace;
pub mod tracking;
pub mod validation;

pub use data::Batch;
pub use error::{Error, Result};
pub use pipeline::{Pipeline, PipelineElement, PipelineNode};
pub use validation::Hyperpipe;
