//! Flat configurations keyed by qualified parameter names

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

use super::parameter::ParameterValue;

/// Separator joining ancestor names into a qualified key (`stack__svc__C`)
pub const SEPARATOR: &str = "__";

/// Join a prefix and a key with [`SEPARATOR`]
pub fn qualify(prefix: &str, key: &str) -> String {
    format!("{prefix}{SEPARATOR}{key}")
}

/// One concrete assignment of values to qualified hyperparameter keys
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configuration(BTreeMap<String, ParameterValue>);

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParameterValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ParameterValue> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParameterValue)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Merge `other` into `self`; keys in `other` win
    pub fn merge(&mut self, other: &Configuration) {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }

    /// Prefix every key with `prefix__`
    pub fn qualified(&self, prefix: &str) -> Configuration {
        Configuration(self.0.iter().map(|(k, v)| (qualify(prefix, k), v.clone())).collect())
    }

    /// Keep only keys whose first path segment is one of `names`
    pub fn restrict_to(&self, names: &[&str]) -> Configuration {
        Configuration(
            self.0
                .iter()
                .filter(|(k, _)| names.contains(&first_segment(k)))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Route keys to the named components by their first path segment.
    ///
    /// The returned configurations are aligned with `names` and carry the
    /// remainder of each key. A key that no component claims, or that has no
    /// remainder, is a configuration error.
    pub fn route(&self, names: &[&str]) -> Result<Vec<Configuration>> {
        let mut routed = vec![Configuration::new(); names.len()];
        for (key, value) in &self.0 {
            let (head, rest) = key.split_once(SEPARATOR).ok_or_else(|| {
                Error::Configuration(format!("key '{key}' does not name a component parameter"))
            })?;
            let slot = names.iter().position(|n| *n == head).ok_or_else(|| {
                Error::Configuration(format!("no element named '{head}' for key '{key}'"))
            })?;
            routed[slot].0.insert(rest.to_string(), value.clone());
        }
        Ok(routed)
    }

    /// Stable SHA-256 fingerprint of keys and values
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for (k, v) in &self.0 {
            hasher.update(k.as_bytes());
            hasher.update(b"=");
            hasher.update(v.to_string().as_bytes());
            hasher.update(b";");
        }
        hex::encode(hasher.finalize())
    }
}

fn first_segment(key: &str) -> &str {
    key.split_once(SEPARATOR).map_or(key, |(head, _)| head)
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{k}: {v}")?;
        }
        f.write_str("}")
    }
}

impl FromIterator<(String, ParameterValue)> for Configuration {
    fn from_iter<I: IntoIterator<Item = (String, ParameterValue)>>(iter: I) -> Self {
        Configuration(iter.into_iter().collect())
    }
}
