//! Lazy, deterministic configuration spaces
//!
//! A [`ConfigSpace`] is a tree of explicit lists, Cartesian products and
//! concatenations. Nothing is materialized until a configuration is requested
//! by index, so very large products stay cheap to build, count and sample.
//!
//! Index order is fixed: in a product the first factor varies slowest, and a
//! chain enumerates its parts one after another.

use crate::hpo::types::{Configuration, HyperparameterSpace, ParameterValue};
use crate::pipeline::PipelineNode;

/// Enumerable collection of configurations
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSpace {
    /// Explicit configurations in order
    List(Vec<Configuration>),
    /// Cartesian product; the merged fragments form one configuration
    Product(Vec<ConfigSpace>),
    /// Concatenation of sub-spaces
    Chain(Vec<ConfigSpace>),
}

impl ConfigSpace {
    /// The space holding exactly one empty configuration
    pub fn unit() -> Self {
        ConfigSpace::List(vec![Configuration::new()])
    }

    /// Global space of a pipeline: the product of its stages' qualified spaces
    pub fn from_nodes(nodes: &[PipelineNode]) -> Self {
        ConfigSpace::Product(nodes.iter().map(PipelineNode::space).collect())
    }

    /// Expand one element's declared hyperparameters (keys are unqualified).
    ///
    /// With `test_disabled`, every regular configuration pins `disabled = false`
    /// and one extra configuration `disabled = true` is appended.
    pub fn from_hyperparameters(params: &HyperparameterSpace, test_disabled: bool) -> Self {
        let factors: Vec<ConfigSpace> = params
            .grid_values()
            .into_iter()
            .map(|(name, values)| {
                ConfigSpace::List(
                    values.into_iter().map(|v| Configuration::new().with(name.clone(), v)).collect(),
                )
            })
            .collect();

        if !test_disabled {
            return ConfigSpace::Product(factors);
        }
        let mut enabled = factors;
        enabled.push(ConfigSpace::List(vec![Configuration::new().with("disabled", false)]));
        ConfigSpace::Chain(vec![
            ConfigSpace::Product(enabled),
            ConfigSpace::List(vec![Configuration::new().with("disabled", true)]),
        ])
    }

    /// Switch space: one selector configuration per (child, child-config) pair
    pub fn selectors(child_lens: &[usize]) -> Self {
        ConfigSpace::List(
            child_lens
                .iter()
                .enumerate()
                .flat_map(|(child, &len)| {
                    (0..len).map(move |config| {
                        Configuration::new()
                            .with("current_element", ParameterValue::Selector { child, config })
                    })
                })
                .collect(),
        )
    }

    /// Number of configurations (saturating)
    pub fn len(&self) -> usize {
        match self {
            ConfigSpace::List(items) => items.len(),
            ConfigSpace::Product(factors) => {
                factors.iter().fold(1usize, |acc, f| acc.saturating_mul(f.len()))
            }
            ConfigSpace::Chain(parts) => {
                parts.iter().fold(0usize, |acc, p| acc.saturating_add(p.len()))
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configuration at `index`, or `None` past the end
    pub fn get(&self, index: usize) -> Option<Configuration> {
        match self {
            ConfigSpace::List(items) => items.get(index).cloned(),
            ConfigSpace::Product(factors) => {
                if index >= self.len() {
                    return None;
                }
                let mut remaining = index;
                let mut picks = vec![0usize; factors.len()];
                for (slot, factor) in factors.iter().enumerate().rev() {
                    let n = factor.len();
                    picks[slot] = remaining % n;
                    remaining /= n;
                }
                let mut merged = Configuration::new();
                for (factor, pick) in factors.iter().zip(picks) {
                    merged.merge(&factor.get(pick)?);
                }
                Some(merged)
            }
            ConfigSpace::Chain(parts) => {
                let mut offset = index;
                for part in parts {
                    let n = part.len();
                    if offset < n {
                        return part.get(offset);
                    }
                    offset -= n;
                }
                None
            }
        }
    }

    /// Prefix every key in the space with `prefix__`
    pub fn qualified(&self, prefix: &str) -> ConfigSpace {
        match self {
            ConfigSpace::List(items) => {
                ConfigSpace::List(items.iter().map(|c| c.qualified(prefix)).collect())
            }
            ConfigSpace::Product(factors) => {
                ConfigSpace::Product(factors.iter().map(|f| f.qualified(prefix)).collect())
            }
            ConfigSpace::Chain(parts) => {
                ConfigSpace::Chain(parts.iter().map(|p| p.qualified(prefix)).collect())
            }
        }
    }

    /// Iterate over all configurations in index order
    pub fn iter(&self) -> impl Iterator<Item = Configuration> + '_ {
        (0..self.len()).map_while(move |i| self.get(i))
    }

    /// Materialize the whole grid
    pub fn to_vec(&self) -> Vec<Configuration> {
        self.iter().collect()
    }
}
