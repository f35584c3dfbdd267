//! Pipeline elements and the contract of wrapped processing units

use std::fmt;

use ndarray::{Array1, Axis};

use crate::data::Batch;
use crate::error::{Error, Result};
use crate::hpo::{ConfigSpace, Configuration, HyperparameterSpace, ParameterDomain, ParameterValue, SEPARATOR};

use super::registry;

/// Capability set of a wrapped unit, fixed at construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Implements `transform`
    pub transformer: bool,
    /// Implements `predict`
    pub estimator: bool,
    /// `fit` requires targets
    pub needs_y: bool,
    /// `fit`/`transform` read per-sample annotations
    pub needs_annotations: bool,
}

impl Capabilities {
    pub const fn transformer() -> Self {
        Self { transformer: true, estimator: false, needs_y: false, needs_annotations: false }
    }

    /// Estimators need targets to fit
    pub const fn estimator() -> Self {
        Self { transformer: false, estimator: true, needs_y: true, needs_annotations: false }
    }

    pub const fn with_needs_y(mut self, needs_y: bool) -> Self {
        self.needs_y = needs_y;
        self
    }

    pub const fn with_annotations(mut self) -> Self {
        self.needs_annotations = true;
        self
    }
}

/// A processing or modeling unit wrapped by a [`PipelineElement`].
///
/// Implementations declare what they can do through [`BaseElement::capabilities`];
/// the default `transform` and `predict` bodies report the operation as unsupported.
pub trait BaseElement: Send + Sync + fmt::Debug {
    fn capabilities(&self) -> Capabilities;

    /// Set one named parameter; unknown names are configuration errors
    fn set_param(&mut self, name: &str, value: &ParameterValue) -> Result<()>;

    /// Current parameter values
    fn params(&self) -> Configuration;

    fn fit(&mut self, batch: &Batch) -> Result<()>;

    fn transform(&self, _batch: &Batch) -> Result<Batch> {
        Err(Error::NotSupported(format!("{self:?} does not implement transform")))
    }

    fn predict(&self, _batch: &Batch) -> Result<Array1<f64>> {
        Err(Error::NotSupported(format!("{self:?} does not implement predict")))
    }

    fn clone_boxed(&self) -> Box<dyn BaseElement>;
}

impl Clone for Box<dyn BaseElement> {
    fn clone(&self) -> Self {
        self.clone_boxed()
    }
}

/// Build the error for a parameter the unit does not know
pub fn unknown_param(unit: &str, name: &str) -> Error {
    Error::Configuration(format!("{unit} has no parameter '{name}'"))
}

/// Build the error for a parameter value of the wrong type or range
pub fn invalid_value(unit: &str, name: &str, value: &ParameterValue) -> Error {
    Error::InvalidValue(format!("{value} for {unit}.{name}"))
}

/// A named stage wrapping one [`BaseElement`]
#[derive(Debug, Clone)]
pub struct PipelineElement {
    name: String,
    base: Box<dyn BaseElement>,
    capabilities: Capabilities,
    hyperparameters: HyperparameterSpace,
    test_disabled: bool,
    disabled: bool,
    data_only: bool,
}

impl PipelineElement {
    pub fn new(name: impl Into<String>, base: Box<dyn BaseElement>) -> Self {
        let capabilities = base.capabilities();
        Self {
            name: name.into(),
            base,
            capabilities,
            hyperparameters: HyperparameterSpace::new(),
            test_disabled: false,
            disabled: false,
            data_only: false,
        }
    }

    /// Construct from a registered identifier; the element takes the identifier as its name
    pub fn create(identifier: &str) -> Result<Self> {
        Ok(Self::new(identifier, registry::create_element(identifier)?))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Declare a searchable hyperparameter
    pub fn with_hyperparameter(mut self, name: &str, domain: ParameterDomain) -> Self {
        self.hyperparameters.add(name, domain);
        self
    }

    /// Set a fixed construction parameter on the wrapped unit.
    ///
    /// A rejected fixed value is a configuration error, unlike a rejected searched value.
    pub fn with_param(mut self, name: &str, value: impl Into<ParameterValue>) -> Result<Self> {
        self.base.set_param(name, &value.into()).map_err(|e| match e {
            Error::InvalidValue(msg) => Error::Configuration(format!("invalid value {msg}")),
            other => other,
        })?;
        Ok(self)
    }

    /// Every declared hyperparameter domain yields at least one candidate
    pub fn validate(&self) -> Result<()> {
        for (param, domain) in self.hyperparameters.iter() {
            domain.validate().map_err(|reason| {
                Error::Configuration(format!("hyperparameter '{}{SEPARATOR}{param}': {reason}", self.name))
            })?;
        }
        Ok(())
    }

    /// Also search the configuration in which this element is switched off
    pub fn with_test_disabled(mut self, test_disabled: bool) -> Self {
        self.test_disabled = test_disabled;
        self
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Mark as a fit-free, per-sample transform eligible for single-subject caching
    pub fn with_data_only(mut self, data_only: bool) -> Self {
        self.data_only = data_only;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn hyperparameters(&self) -> &HyperparameterSpace {
        &self.hyperparameters
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn is_data_only(&self) -> bool {
        self.data_only
    }

    /// Usable as an intermediate stage (predict doubles as transform)
    pub fn is_transformer(&self) -> bool {
        self.capabilities.transformer || self.capabilities.estimator
    }

    pub fn is_estimator(&self) -> bool {
        self.capabilities.estimator
    }

    pub fn base_element(&self) -> &dyn BaseElement {
        self.base.as_ref()
    }

    /// Expanded grid with keys relative to this element
    pub fn local_space(&self) -> ConfigSpace {
        ConfigSpace::from_hyperparameters(&self.hyperparameters, self.test_disabled)
    }

    /// Apply a configuration whose keys are relative to this element
    pub fn set_params(&mut self, config: &Configuration) -> Result<()> {
        for (key, value) in config.iter() {
            if key == "disabled" {
                self.disabled = value.as_bool().ok_or_else(|| {
                    Error::Configuration(format!("'{}__disabled' must be a boolean", self.name))
                })?;
                continue;
            }
            self.base.set_param(key, value)?;
        }
        Ok(())
    }

    /// Fit the wrapped unit; a no-op while disabled
    pub fn fit(&mut self, batch: &Batch) -> Result<()> {
        if self.disabled {
            return Ok(());
        }
        if self.capabilities.needs_y {
            batch.targets(&self.name)?;
        }
        if self.capabilities.needs_annotations && batch.annotations.is_empty() {
            return Err(Error::InvalidData(format!("{} requires annotations", self.name)));
        }
        self.base.fit(batch)
    }

    /// Transform, falling back to predictions as a single feature column
    pub fn transform(&self, batch: &Batch) -> Result<Batch> {
        if self.disabled {
            return Ok(batch.clone());
        }
        if self.capabilities.transformer {
            return self.base.transform(batch);
        }
        if self.capabilities.estimator {
            let predictions = self.base.predict(batch)?;
            return Ok(batch.with_features(predictions.insert_axis(Axis(1))));
        }
        Err(Error::NotSupported(format!("{} neither transforms nor predicts", self.name)))
    }

    /// Predict; a disabled element passes a single feature column through
    pub fn predict(&self, batch: &Batch) -> Result<Array1<f64>> {
        if self.disabled {
            if batch.n_features() != 1 {
                return Err(Error::Configuration(format!(
                    "disabled element '{}' cannot pass {} feature columns through predict",
                    self.name,
                    batch.n_features()
                )));
            }
            return Ok(batch.x.column(0).to_owned());
        }
        if !self.capabilities.estimator {
            return Err(Error::NotSupported(format!("{} is not an estimator", self.name)));
        }
        self.base.predict(batch)
    }

    /// Human-readable view of a relative configuration
    pub fn describe(&self, config: &Configuration) -> String {
        if config.get("disabled").and_then(ParameterValue::as_bool) == Some(true) {
            return format!("{}[disabled]", self.name);
        }
        let mut params: Vec<String> = Vec::new();
        if config.get("disabled").is_some() {
            params.push("enabled".to_string());
        }
        params.extend(config.iter().filter(|(k, _)| k.as_str() != "disabled").map(|(k, v)| format!("{k}={v}")));
        if params.is_empty() {
            self.name.clone()
        } else {
            format!("{}[{}]", self.name, params.join(", "))
        }
    }
}
