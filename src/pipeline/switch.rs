//! Switch: exactly one of several alternatives is active

use ndarray::Array1;

use crate::data::Batch;
use crate::error::{Error, Result};
use crate::hpo::{ConfigSpace, Configuration, ParameterValue};

use super::element::Capabilities;
use super::node::PipelineNode;

/// Key of the active-alternative selector
pub const SELECTOR_KEY: &str = "current_element";

/// Mutually exclusive alternatives searched as one categorical choice.
///
/// The switch's grid lists `(child, config)` selector pairs in declaration
/// order; setting a pair binds the child's `config`-th grid entry to that child.
#[derive(Debug, Clone)]
pub struct Switch {
    name: String,
    elements: Vec<PipelineNode>,
    current: usize,
    current_config: Option<usize>,
}

impl Switch {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), elements: Vec::new(), current: 0, current_config: None }
    }

    /// Append an alternative
    pub fn with_element(mut self, element: impl Into<PipelineNode>) -> Self {
        self.elements.push(element.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn elements(&self) -> &[PipelineNode] {
        &self.elements
    }

    /// The active alternative
    pub fn base_element(&self) -> Option<&PipelineNode> {
        self.elements.get(self.current)
    }

    /// The selector bound by the last `set_params`
    pub fn current_selection(&self) -> Option<(usize, usize)> {
        self.current_config.map(|config| (self.current, config))
    }

    pub(crate) fn capabilities(&self) -> Capabilities {
        self.base_element().map(PipelineNode::capabilities).unwrap_or_default()
    }

    pub(crate) fn local_space(&self) -> ConfigSpace {
        let lens: Vec<usize> = self.elements.iter().map(|e| e.space().len()).collect();
        ConfigSpace::selectors(&lens)
    }

    /// Resolve a selector to the child index and the child's relative configuration
    fn resolve(&self, value: &ParameterValue) -> Result<(usize, Configuration)> {
        let (child, config) = value.as_selector().ok_or_else(|| {
            Error::Configuration(format!("'{}__{SELECTOR_KEY}' expects a selector, got {value}", self.name))
        })?;
        let element = self.elements.get(child).ok_or_else(|| {
            Error::Configuration(format!("switch '{}' has no alternative {child}", self.name))
        })?;
        let qualified = element.space().get(config).ok_or_else(|| {
            Error::Configuration(format!(
                "alternative '{}' of switch '{}' has no configuration {config}",
                element.name(),
                self.name
            ))
        })?;
        let relative = qualified.route(&[element.name()])?.pop().unwrap_or_default();
        Ok((child, relative))
    }

    pub(crate) fn set_params(&mut self, config: &Configuration) -> Result<()> {
        for (key, value) in config.iter() {
            if key != SELECTOR_KEY {
                return Err(Error::Configuration(format!(
                    "switch '{}' has no parameter '{key}'",
                    self.name
                )));
            }
            let (child, relative) = self.resolve(value)?;
            self.elements[child].set_params(&relative)?;
            self.current = child;
            self.current_config = value.as_selector().map(|(_, c)| c);
        }
        Ok(())
    }

    fn active_mut(&mut self) -> Result<&mut PipelineNode> {
        let name = &self.name;
        self.elements
            .get_mut(self.current)
            .ok_or_else(|| Error::Configuration(format!("switch '{name}' has no elements")))
    }

    pub(crate) fn fit(&mut self, batch: &Batch) -> Result<()> {
        let active = self.active_mut()?;
        let child = active.name().to_string();
        active.fit(batch).map_err(|e| e.in_stage(&child))
    }

    pub(crate) fn transform(&mut self, batch: &Batch) -> Result<Batch> {
        let active = self.active_mut()?;
        let child = active.name().to_string();
        active.transform(batch).map_err(|e| e.in_stage(&child))
    }

    pub(crate) fn predict(&mut self, batch: &Batch) -> Result<Array1<f64>> {
        let active = self.active_mut()?;
        let child = active.name().to_string();
        active.predict(batch).map_err(|e| e.in_stage(&child))
    }

    pub(crate) fn describe(&self, config: &Configuration) -> String {
        match config.get(SELECTOR_KEY).map(|v| self.resolve(v)) {
            Some(Ok((child, relative))) => {
                format!("{}={}", self.name, self.elements[child].describe(&relative))
            }
            _ => format!("{}={config}", self.name),
        }
    }
}
