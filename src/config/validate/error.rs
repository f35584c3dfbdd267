//! Validation error types

/// Validation error type
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Hyperpipe name must not be empty")]
    EmptyName,

    #[error("'{0}' has no elements")]
    NoElements(String),

    #[error("Invalid element name '{0}' (must be non-empty and must not contain '__')")]
    InvalidElementName(String),

    #[error("Duplicate element name '{0}' among siblings")]
    DuplicateName(String),

    #[error("Unknown element type: {0}")]
    UnknownElement(String),

    #[error("Invalid hyperparameter '{param}' of '{element}': {reason}")]
    InvalidDomain { element: String, param: String, reason: String },

    #[error("At least one metric is required")]
    NoMetrics,

    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    #[error("best_config_metric '{0}' is not among the metrics")]
    BestMetricNotListed(String),

    #[error("Invalid n_splits: {0} (must be >= 2)")]
    InvalidSplits(usize),

    #[error("Invalid test_size: {0} (must be in (0.0, 1.0))")]
    InvalidTestSize(f64),

    #[error("Invalid optimizer: {0}")]
    InvalidOptimizer(String),

    #[error("Invalid n_jobs: 0 (must be > 0)")]
    InvalidNJobs,

    #[error("Single-subject caching requires the cache to be enabled")]
    SingleSubjectWithoutCache,
}

impl From<ValidationError> for crate::error::Error {
    fn from(e: ValidationError) -> Self {
        crate::error::Error::Configuration(e.to_string())
    }
}
