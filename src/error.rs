//! Error types for afinar

use thiserror::Error;

/// Crate-wide error type
#[derive(Debug, Error)]
pub enum Error {
    /// Unroutable or unknown hyperparameter key, name collision, disabled-element misuse,
    /// invalid pipeline document
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Unknown element, metric or stored run identifier
    #[error("Not found: {0}")]
    NotFound(String),

    /// A hyperparameter value outside what the element accepts; fails only the trial using it
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    /// A stage raised during fit, transform or predict
    #[error("Stage '{stage}' failed: {message}")]
    ExecutionFailure { stage: String, message: String },

    #[error("All {tested} tested configurations failed in outer fold {fold_nr}")]
    AllConfigurationsFailed { fold_nr: usize, tested: usize },

    #[error("Optimizer yielded no configurations in outer fold {0}")]
    NoConfigurations(usize),

    #[error("Not fitted: {0}")]
    NotFitted(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build an execution failure for `stage`
    pub fn execution(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ExecutionFailure { stage: stage.into(), message: message.into() }
    }

    /// Attach the enclosing stage name to an error raised inside it.
    ///
    /// Execution failures get their stage path extended (`parent/child`), configuration
    /// errors pass through untouched, anything else becomes an execution failure of `parent`.
    pub fn in_stage(self, parent: &str) -> Self {
        match self {
            Error::ExecutionFailure { stage, message } => {
                Error::ExecutionFailure { stage: format!("{parent}/{stage}"), message }
            }
            err @ Error::Configuration(_) => err,
            other => Error::ExecutionFailure { stage: parent.to_string(), message: other.to_string() },
        }
    }

    /// Whether the error must abort the whole search instead of failing one trial
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Configuration(_) | Error::NotFound(_))
    }
}

/// Result type for afinar operations
pub type Result<T> = std::result::Result<T, Error>;
