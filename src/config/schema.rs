//! YAML schema of a hyperpipe document

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::hpo::{ConstraintStrategy, ParameterDomain, ParameterValue};
use crate::validation::Task;

fn default_true() -> bool {
    true
}

fn default_seed() -> u64 {
    42
}

fn default_metrics() -> Vec<String> {
    vec!["accuracy".to_string()]
}

/// Complete hyperpipe document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HyperpipeSpec {
    /// Run name; also the name results are stored under
    pub name: String,

    #[serde(default = "default_metrics")]
    pub metrics: Vec<String>,

    /// Defaults to the first metric
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_config_metric: Option<String>,

    #[serde(default)]
    pub outer_cv: CvSpec,

    #[serde(default)]
    pub inner_cv: KFoldSpec,

    #[serde(default)]
    pub optimizer: OptimizerSpec,

    #[serde(default = "default_true")]
    pub eval_final_performance: bool,

    #[serde(default)]
    pub save_predictions: bool,

    #[serde(default)]
    pub cache: CacheSpec,

    #[serde(default)]
    pub task: Task,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<ConstraintSpec>,

    /// Outer folds processed concurrently
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_jobs: Option<usize>,

    /// Directory for the JSON result store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,

    pub elements: Vec<NodeSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KFoldSpec {
    pub n_splits: usize,
    #[serde(default = "default_true")]
    pub shuffle: bool,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for KFoldSpec {
    fn default() -> Self {
        Self { n_splits: 3, shuffle: true, seed: default_seed() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HoldoutSpec {
    pub test_size: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

/// Outer-fold strategy: `{n_splits, ...}` or `{test_size, ...}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CvSpec {
    KFold(KFoldSpec),
    Holdout(HoldoutSpec),
}

impl Default for CvSpec {
    fn default() -> Self {
        CvSpec::KFold(KFoldSpec::default())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum OptimizerSpec {
    #[default]
    Grid,
    RandomGrid {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        k: Option<usize>,
        #[serde(default = "default_seed")]
        seed: u64,
    },
    TimeboxedRandomGrid {
        limit_seconds: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        k: Option<usize>,
        #[serde(default = "default_seed")]
        seed: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSpec {
    #[serde(default)]
    pub enabled: bool,
    /// Per-item caching of `data_only` elements
    #[serde(default)]
    pub single_subject: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConstraintSpec {
    Minimum {
        metric: String,
        threshold: f64,
        #[serde(default)]
        strategy: ConstraintStrategy,
    },
    Dummy {
        metric: String,
        margin: f64,
        #[serde(default)]
        strategy: ConstraintStrategy,
    },
}

impl ConstraintSpec {
    pub fn metric(&self) -> &str {
        match self {
            ConstraintSpec::Minimum { metric, .. } | ConstraintSpec::Dummy { metric, .. } => metric,
        }
    }
}

/// One stage of the document; the key naming the kind selects the variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeSpec {
    Switch(SwitchSpec),
    Stack(StackSpec),
    Branch(BranchSpec),
    Element(ElementSpec),
}

impl NodeSpec {
    /// Name the built node will carry
    pub fn name(&self) -> &str {
        match self {
            NodeSpec::Switch(s) => &s.switch,
            NodeSpec::Stack(s) => &s.stack,
            NodeSpec::Branch(b) => &b.branch,
            NodeSpec::Element(e) => e.name.as_deref().unwrap_or(&e.element),
        }
    }

    pub fn children(&self) -> &[NodeSpec] {
        match self {
            NodeSpec::Switch(s) => &s.elements,
            NodeSpec::Stack(s) => &s.elements,
            NodeSpec::Branch(b) => &b.elements,
            NodeSpec::Element(_) => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SwitchSpec {
    pub switch: String,
    pub elements: Vec<NodeSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StackSpec {
    pub stack: String,
    pub elements: Vec<NodeSpec>,
    /// Average member predictions
    #[serde(default)]
    pub voting: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BranchSpec {
    pub branch: String,
    pub elements: Vec<NodeSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_search: Option<LocalSearchSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocalSearchSpec {
    pub metric: String,
    #[serde(default)]
    pub inner_cv: KFoldSpec,
    #[serde(default)]
    pub optimizer: OptimizerSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ElementSpec {
    /// Registry identifier of the wrapped unit
    pub element: String,
    /// Defaults to the identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Fixed construction parameters
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, ParameterValue>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub hyperparameters: BTreeMap<String, ParameterDomain>,
    #[serde(default)]
    pub test_disabled: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub data_only: bool,
}
