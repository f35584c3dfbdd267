//! Result persistence
//!
//! The controller hands its [`PipeResult`](crate::validation::PipeResult)
//! tree to a [`ResultStore`] after every outer fold and once at the end.
//! Stores are keyed by run name; saving the same name again replaces the
//! previous record (last writer wins).
//!
//! # Example
//!
//! ```
//! use afinar::tracking::{InMemoryStore, ResultStore};
//! use afinar::validation::PipeResult;
//!
//! # fn main() -> afinar::Result<()> {
//! let store = InMemoryStore::new();
//! store.save(&PipeResult::new("baseline", "accuracy", true))?;
//!
//! let loaded = store.load("baseline")?;
//! assert_eq!(loaded.best_config_metric, "accuracy");
//! assert_eq!(store.list()?, vec!["baseline".to_string()]);
//! # Ok(())
//! # }
//! ```

pub mod storage;


pub use storage::{InMemoryStore, JsonFileStore, ResultStore};
