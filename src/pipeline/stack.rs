//! Stack: run all children on the same input and fuse their outputs

use ndarray::{Array1, ArrayView2, Axis};

use crate::data::Batch;
use crate::error::{Error, Result};
use crate::hpo::{ConfigSpace, Configuration};

use super::element::Capabilities;
use super::node::PipelineNode;

/// Parallel fusion of children.
///
/// `transform` concatenates the children's feature outputs column-wise. With
/// voting enabled the stack is itself an estimator whose prediction is the
/// mean of the children's predictions.
#[derive(Debug, Clone)]
pub struct Stack {
    name: String,
    elements: Vec<PipelineNode>,
    voting: bool,
}

impl Stack {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), elements: Vec::new(), voting: false }
    }

    pub fn with_element(mut self, element: impl Into<PipelineNode>) -> Self {
        self.elements.push(element.into());
        self
    }

    pub fn with_voting(mut self, voting: bool) -> Self {
        self.voting = voting;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn elements(&self) -> &[PipelineNode] {
        &self.elements
    }

    pub fn voting(&self) -> bool {
        self.voting
    }

    pub(crate) fn capabilities(&self) -> Capabilities {
        let estimators = !self.elements.is_empty() && self.elements.iter().all(PipelineNode::is_estimator);
        Capabilities {
            transformer: true,
            estimator: self.voting && estimators,
            needs_y: self.elements.iter().any(|e| e.capabilities().needs_y),
            needs_annotations: self.elements.iter().any(|e| e.capabilities().needs_annotations),
        }
    }

    /// Product of the children's spaces; self-optimizing children are left out
    pub(crate) fn local_space(&self) -> ConfigSpace {
        ConfigSpace::Product(
            self.elements
                .iter()
                .filter(|e| !e.is_self_optimizing())
                .map(PipelineNode::space)
                .collect(),
        )
    }

    pub(crate) fn set_params(&mut self, config: &Configuration) -> Result<()> {
        let names: Vec<&str> = self.elements.iter().map(PipelineNode::name).collect();
        let routed = config.route(&names).map_err(|e| match e {
            Error::Configuration(msg) => Error::Configuration(format!("stack '{}': {msg}", self.name)),
            other => other,
        })?;
        for (element, relative) in self.elements.iter_mut().zip(routed) {
            if !relative.is_empty() {
                element.set_params(&relative)?;
            }
        }
        Ok(())
    }

    pub(crate) fn fit(&mut self, batch: &Batch) -> Result<()> {
        for element in &mut self.elements {
            let child = element.name().to_string();
            element.fit(batch).map_err(|e| e.in_stage(&child))?;
        }
        Ok(())
    }

    pub(crate) fn transform(&mut self, batch: &Batch) -> Result<Batch> {
        let mut outputs = Vec::with_capacity(self.elements.len());
        for element in &mut self.elements {
            let child = element.name().to_string();
            outputs.push(element.transform(batch).map_err(|e| e.in_stage(&child))?);
        }
        let views: Vec<ArrayView2<f64>> = outputs.iter().map(|o| o.x.view()).collect();
        let fused = ndarray::concatenate(Axis(1), &views)
            .map_err(|e| Error::execution(&self.name, format!("cannot fuse child outputs: {e}")))?;
        Ok(batch.with_features(fused))
    }

    pub(crate) fn predict(&mut self, batch: &Batch) -> Result<Array1<f64>> {
        if !self.voting {
            return Err(Error::NotSupported(format!(
                "stack '{}' predicts only with voting enabled",
                self.name
            )));
        }
        let mut sum = Array1::<f64>::zeros(batch.n_samples());
        for element in &mut self.elements {
            let child = element.name().to_string();
            let prediction = element.predict(batch).map_err(|e| e.in_stage(&child))?;
            if prediction.len() != sum.len() {
                return Err(Error::execution(
                    &child,
                    format!("{} predictions for {} samples", prediction.len(), sum.len()),
                ));
            }
            sum += &prediction;
        }
        Ok(sum / self.elements.len().max(1) as f64)
    }

    pub(crate) fn describe(&self, config: &Configuration) -> String {
        let names: Vec<&str> = self.elements.iter().map(PipelineNode::name).collect();
        match config.route(&names) {
            Ok(routed) => {
                let parts: Vec<String> = self
                    .elements
                    .iter()
                    .zip(&routed)
                    .map(|(element, relative)| element.describe(relative))
                    .collect();
                format!("{}({})", self.name, parts.join(", "))
            }
            Err(_) => format!("{}={config}", self.name),
        }
    }
}
