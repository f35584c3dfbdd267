//! Closed set of pipeline stage kinds

use ndarray::Array1;

use crate::data::Batch;
use crate::error::{Error, Result};
use crate::hpo::{ConfigSpace, Configuration, SEPARATOR};

use super::branch::Branch;
use super::element::{Capabilities, PipelineElement};
use super::stack::Stack;
use super::switch::Switch;

/// One stage of a pipeline: a plain element or a composite
#[derive(Debug, Clone)]
pub enum PipelineNode {
    Element(PipelineElement),
    Switch(Switch),
    Stack(Stack),
    Branch(Branch),
}

impl PipelineNode {
    pub fn name(&self) -> &str {
        match self {
            PipelineNode::Element(e) => e.name(),
            PipelineNode::Switch(s) => s.name(),
            PipelineNode::Stack(s) => s.name(),
            PipelineNode::Branch(b) => b.name(),
        }
    }

    /// Effective capabilities; a switch reports its active alternative
    pub fn capabilities(&self) -> Capabilities {
        match self {
            PipelineNode::Element(e) => e.capabilities(),
            PipelineNode::Switch(s) => s.capabilities(),
            PipelineNode::Stack(s) => s.capabilities(),
            PipelineNode::Branch(b) => b.capabilities(),
        }
    }

    /// Usable as an intermediate stage
    pub fn is_transformer(&self) -> bool {
        let caps = self.capabilities();
        caps.transformer || caps.estimator
    }

    pub fn is_estimator(&self) -> bool {
        self.capabilities().estimator
    }

    /// Runs its own internal search; excluded from enclosing products
    pub fn is_self_optimizing(&self) -> bool {
        matches!(self, PipelineNode::Branch(b) if b.has_local_search())
    }

    /// Eligible for single-subject caching
    pub fn is_data_only(&self) -> bool {
        matches!(self, PipelineNode::Element(e) if e.is_data_only())
    }

    /// Configuration grid with keys relative to this node
    pub fn local_space(&self) -> ConfigSpace {
        match self {
            PipelineNode::Element(e) => e.local_space(),
            PipelineNode::Switch(s) => s.local_space(),
            PipelineNode::Stack(s) => s.local_space(),
            PipelineNode::Branch(b) => b.local_space(),
        }
    }

    /// Configuration grid with keys qualified by this node's name
    pub fn space(&self) -> ConfigSpace {
        self.local_space().qualified(self.name())
    }

    /// Apply a configuration whose keys are relative to this node
    pub fn set_params(&mut self, config: &Configuration) -> Result<()> {
        match self {
            PipelineNode::Element(e) => e.set_params(config),
            PipelineNode::Switch(s) => s.set_params(config),
            PipelineNode::Stack(s) => s.set_params(config),
            PipelineNode::Branch(b) => b.set_params(config),
        }
    }

    pub fn fit(&mut self, batch: &Batch) -> Result<()> {
        match self {
            PipelineNode::Element(e) => e.fit(batch),
            PipelineNode::Switch(s) => s.fit(batch),
            PipelineNode::Stack(s) => s.fit(batch),
            PipelineNode::Branch(b) => b.fit(batch),
        }
    }

    pub fn transform(&mut self, batch: &Batch) -> Result<Batch> {
        match self {
            PipelineNode::Element(e) => e.transform(batch),
            PipelineNode::Switch(s) => s.transform(batch),
            PipelineNode::Stack(s) => s.transform(batch),
            PipelineNode::Branch(b) => b.transform(batch),
        }
    }

    pub fn predict(&mut self, batch: &Batch) -> Result<Array1<f64>> {
        match self {
            PipelineNode::Element(e) => e.predict(batch),
            PipelineNode::Switch(s) => s.predict(batch),
            PipelineNode::Stack(s) => s.predict(batch),
            PipelineNode::Branch(b) => b.predict(batch),
        }
    }

    /// Structural checks of composites (children present, sibling names unique)
    pub fn validate(&self) -> Result<()> {
        match self {
            PipelineNode::Element(e) => e.validate(),
            PipelineNode::Switch(s) => validate_children(s.name(), s.elements()),
            PipelineNode::Stack(s) => {
                validate_children(s.name(), s.elements())?;
                match s.elements().iter().find(|c| !c.is_transformer()) {
                    Some(child) => Err(Error::Configuration(format!(
                        "stack '{}' child '{}' can neither transform nor predict",
                        s.name(),
                        child.name()
                    ))),
                    None => Ok(()),
                }
            }
            PipelineNode::Branch(b) => b.pipeline().validate_structure(),
        }
    }

    /// Human-readable rendering of a relative configuration
    pub fn describe(&self, config: &Configuration) -> String {
        match self {
            PipelineNode::Element(e) => e.describe(config),
            PipelineNode::Switch(s) => s.describe(config),
            PipelineNode::Stack(s) => s.describe(config),
            PipelineNode::Branch(b) => b.describe(config),
        }
    }

    pub fn as_element(&self) -> Option<&PipelineElement> {
        match self {
            PipelineNode::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_switch(&self) -> Option<&Switch> {
        match self {
            PipelineNode::Switch(s) => Some(s),
            _ => None,
        }
    }
}

/// Children must exist, carry routable names and be unique among siblings
pub(crate) fn validate_children(owner: &str, children: &[PipelineNode]) -> Result<()> {
    if children.is_empty() {
        return Err(Error::Configuration(format!("'{owner}' has no elements")));
    }
    check_sibling_names(children.iter().map(PipelineNode::name))?;
    children.iter().try_for_each(PipelineNode::validate)
}

pub(crate) fn check_sibling_names<'a>(names: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen: Vec<&str> = Vec::new();
    for name in names {
        if name.is_empty() || name.contains(SEPARATOR) {
            return Err(Error::Configuration(format!(
                "element name '{name}' must be non-empty and must not contain '{SEPARATOR}'"
            )));
        }
        if seen.contains(&name) {
            return Err(Error::Configuration(format!("duplicate element name '{name}'")));
        }
        seen.push(name);
    }
    Ok(())
}

impl From<PipelineElement> for PipelineNode {
    fn from(e: PipelineElement) -> Self {
        PipelineNode::Element(e)
    }
}

impl From<Switch> for PipelineNode {
    fn from(s: Switch) -> Self {
        PipelineNode::Switch(s)
    }
}

impl From<Stack> for PipelineNode {
    fn from(s: Stack) -> Self {
        PipelineNode::Stack(s)
    }
}

impl From<Branch> for PipelineNode {
    fn from(b: Branch) -> Self {
        PipelineNode::Branch(b)
    }
}
