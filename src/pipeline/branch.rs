//! Branch: a sequential sub-pipeline acting as a single stage
//!
//! A branch may carry its own local search. It then picks its best inner
//! configuration during `fit` and exposes no hyperparameters to the
//! enclosing search.

use ndarray::{Array1, Axis};

use crate::data::Batch;
use crate::error::{Error, Result};
use crate::eval::{KFold, MetricRegistry};
use crate::hpo::{ConfigSpace, Configuration, GridSearch, Optimizer};

use super::element::Capabilities;
use super::engine::Pipeline;
use super::node::PipelineNode;

/// Self-contained search run by a branch on the data it is fitted on
#[derive(Debug, Clone)]
pub struct LocalSearch {
    optimizer: Box<dyn Optimizer>,
    cv: KFold,
    metric: String,
    registry: MetricRegistry,
    best: Option<Configuration>,
}

impl LocalSearch {
    /// Exhaustive grid search scored by `metric` over `cv`
    pub fn new(metric: impl Into<String>, cv: KFold) -> Self {
        Self {
            optimizer: Box::new(GridSearch::new()),
            cv,
            metric: metric.into(),
            registry: MetricRegistry::default(),
            best: None,
        }
    }

    pub fn with_optimizer(mut self, optimizer: Box<dyn Optimizer>) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn with_registry(mut self, registry: MetricRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn metric(&self) -> &str {
        &self.metric
    }

    /// Configuration chosen by the last fit
    pub fn best(&self) -> Option<&Configuration> {
        self.best.as_ref()
    }

    fn score(&self, pipeline: &Pipeline, config: &Configuration, batch: &Batch, folds: &[(Vec<usize>, Vec<usize>)]) -> Result<f64> {
        let mut total = 0.0;
        for (train, test) in folds {
            let mut candidate = pipeline.clone();
            candidate.set_params(config)?;
            candidate.fit(&batch.select(train))?;
            let held_out = batch.select(test);
            let predictions = candidate.predict(&held_out)?;
            total += self.registry.compute(&self.metric, held_out.targets("local search")?, &predictions)?;
        }
        Ok(total / folds.len().max(1) as f64)
    }

    fn run(&mut self, owner: &str, pipeline: &Pipeline, batch: &Batch) -> Result<Configuration> {
        let maximize = self.registry.greater_is_better(&self.metric)?;
        let folds = self.cv.split(batch.n_samples())?;
        self.optimizer.prepare(pipeline.nodes(), maximize)?;

        let mut best: Option<(f64, Configuration)> = None;
        while let Some(config) = self.optimizer.ask() {
            match self.score(pipeline, &config, batch, &folds) {
                Ok(score) => {
                    self.optimizer.tell(&config, score);
                    let better = match &best {
                        None => true,
                        Some((current, _)) if maximize => score > *current,
                        Some((current, _)) => score < *current,
                    };
                    if better {
                        best = Some((score, config));
                    }
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => tracing::warn!(branch = owner, %config, error = %e, "local search trial failed"),
            }
        }

        let (score, config) = best.ok_or_else(|| {
            Error::execution(owner, "local search found no working configuration")
        })?;
        tracing::debug!(branch = owner, %config, score, "local search selected configuration");
        self.best = Some(config.clone());
        Ok(config)
    }
}

/// Sequential sub-pipeline wrapped as one stage
#[derive(Debug, Clone)]
pub struct Branch {
    name: String,
    pipeline: Pipeline,
    local_search: Option<LocalSearch>,
}

impl Branch {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), pipeline: Pipeline::new(Vec::new()), local_search: None }
    }

    pub fn with_element(mut self, element: impl Into<PipelineNode>) -> Self {
        self.pipeline.push(element.into());
        self
    }

    pub fn with_local_search(mut self, search: LocalSearch) -> Self {
        self.local_search = Some(search);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn has_local_search(&self) -> bool {
        self.local_search.is_some()
    }

    pub fn local_search(&self) -> Option<&LocalSearch> {
        self.local_search.as_ref()
    }

    pub(crate) fn capabilities(&self) -> Capabilities {
        let Some(last) = self.pipeline.nodes().last() else {
            return Capabilities::default();
        };
        let caps = last.capabilities();
        Capabilities {
            transformer: caps.transformer || caps.estimator,
            estimator: caps.estimator,
            needs_y: self.pipeline.nodes().iter().any(|n| n.capabilities().needs_y),
            needs_annotations: self.pipeline.nodes().iter().any(|n| n.capabilities().needs_annotations),
        }
    }

    pub(crate) fn local_space(&self) -> ConfigSpace {
        if self.local_search.is_some() {
            ConfigSpace::unit()
        } else {
            self.pipeline.config_space()
        }
    }

    pub(crate) fn set_params(&mut self, config: &Configuration) -> Result<()> {
        self.pipeline.set_params(config)
    }

    pub(crate) fn fit(&mut self, batch: &Batch) -> Result<()> {
        if let Some(search) = self.local_search.as_mut() {
            let best = search.run(&self.name, &self.pipeline, batch)?;
            self.pipeline.set_params(&best)?;
        }
        self.pipeline.fit(batch)
    }

    pub(crate) fn transform(&mut self, batch: &Batch) -> Result<Batch> {
        let final_transforms = self.pipeline.nodes().last().is_some_and(|n| n.capabilities().transformer);
        if final_transforms || !self.pipeline.is_estimator() {
            return self.pipeline.transform(batch);
        }
        let predictions = self.pipeline.predict(batch)?;
        Ok(batch.with_features(predictions.insert_axis(Axis(1))))
    }

    pub(crate) fn predict(&mut self, batch: &Batch) -> Result<Array1<f64>> {
        self.pipeline.predict(batch)
    }

    pub(crate) fn describe(&self, config: &Configuration) -> String {
        let inner = match self.local_search.as_ref().and_then(LocalSearch::best) {
            Some(best) => self.pipeline.describe(best),
            None => self.pipeline.describe(config),
        };
        format!("{}({inner})", self.name)
    }
}
