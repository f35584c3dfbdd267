//! Name -> factory registry for wrapped processing units
//!
//! The process-wide [`REGISTRY`] is populated with the built-in elements on
//! first use. Callers add their own units with [`register_element`] before
//! assembling pipelines from names.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use crate::error::{Error, Result};

use super::builtin;
use super::element::BaseElement;

/// Constructor for a fresh, unfitted unit
pub type ElementFactory = Arc<dyn Fn() -> Box<dyn BaseElement> + Send + Sync>;

/// Registry of element factories keyed by stable identifiers
#[derive(Clone, Default)]
pub struct ElementRegistry {
    factories: BTreeMap<String, ElementFactory>,
}

impl fmt::Debug for ElementRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementRegistry").field("names", &self.factories.keys()).finish()
    }
}

impl ElementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in units
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("StandardScaler", || Box::new(builtin::StandardScaler::default()));
        registry.register("SelectFirst", || Box::new(builtin::SelectFirst::default()));
        registry.register("Passthrough", || Box::new(builtin::Passthrough));
        registry.register("NearestCentroid", || Box::new(builtin::NearestCentroid::default()));
        registry.register("KNeighborsClassifier", || {
            Box::new(builtin::KNeighborsClassifier::default())
        });
        registry.register("DummyClassifier", || Box::new(builtin::DummyClassifier::default()));
        registry.register("DummyRegressor", || Box::new(builtin::DummyRegressor::default()));
        registry
    }

    /// Register (or replace) a factory
    pub fn register<F>(&mut self, identifier: &str, factory: F)
    where
        F: Fn() -> Box<dyn BaseElement> + Send + Sync + 'static,
    {
        self.factories.insert(identifier.to_string(), Arc::new(factory));
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.factories.contains_key(identifier)
    }

    pub fn names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    /// Instantiate a unit by identifier
    pub fn create(&self, identifier: &str) -> Result<Box<dyn BaseElement>> {
        let factory = self
            .factories
            .get(identifier)
            .ok_or_else(|| Error::NotFound(format!("element '{identifier}'")))?;
        Ok(factory())
    }
}

/// Global element registry.
pub static REGISTRY: LazyLock<RwLock<ElementRegistry>> =
    LazyLock::new(|| RwLock::new(ElementRegistry::with_builtins()));

/// Add a factory to the global registry
pub fn register_element<F>(identifier: &str, factory: F)
where
    F: Fn() -> Box<dyn BaseElement> + Send + Sync + 'static,
{
    REGISTRY.write().unwrap_or_else(PoisonError::into_inner).register(identifier, factory);
}

/// Whether the global registry knows `identifier`
pub fn is_registered(identifier: &str) -> bool {
    REGISTRY.read().unwrap_or_else(PoisonError::into_inner).contains(identifier)
}

/// Instantiate a unit from the global registry
pub fn create_element(identifier: &str) -> Result<Box<dyn BaseElement>> {
    REGISTRY.read().unwrap_or_else(PoisonError::into_inner).create(identifier)
}
