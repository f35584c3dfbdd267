//! Declared hyperparameters of a single element

use serde::{Deserialize, Serialize};

use super::parameter::{ParameterDomain, ParameterValue};

/// Ordered parameter name -> domain mapping
///
/// Declaration order is kept so that grids expand deterministically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HyperparameterSpace {
    params: Vec<(String, ParameterDomain)>,
}

impl HyperparameterSpace {
    /// Create an empty search space
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter; re-adding a name replaces its domain in place
    pub fn add(&mut self, name: &str, domain: ParameterDomain) {
        match self.params.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = domain,
            None => self.params.push((name.to_string(), domain)),
        }
    }

    /// Get a parameter domain
    pub fn get(&self, name: &str) -> Option<&ParameterDomain> {
        self.params.iter().find(|(n, _)| n == name).map(|(_, d)| d)
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Iterate over parameters in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParameterDomain)> {
        self.params.iter().map(|(n, d)| (n, d))
    }

    /// Expanded candidate values per parameter, in declaration order
    pub fn grid_values(&self) -> Vec<(String, Vec<ParameterValue>)> {
        self.params.iter().map(|(n, d)| (n.clone(), d.grid_values())).collect()
    }
}
