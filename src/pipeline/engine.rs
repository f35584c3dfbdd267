//! Pipeline execution engine
//!
//! Runs stages in order for fit, transform and predict. With a
//! [`StageCache`] attached, each stage's output is looked up by
//! (stage, upstream configuration, data identity, fold scope). Consecutive
//! hits are not materialized: only the last hit before the first miss is
//! loaded, and every stage from the first miss onwards is recomputed.

use std::sync::Arc;
use std::time::Instant;

use ndarray::Array1;

use crate::data::{Batch, Row};
use crate::error::{Error, Result};
use crate::hpo::{ConfigSpace, Configuration};
use crate::trace::{StageOperation, TimeMonitor};

use super::cache::{CacheEntry, CacheKey, CachePhase, RowKey, StageCache};
use super::node::{check_sibling_names, PipelineNode};

/// Execution state of the last pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Idle,
    Validating,
    Running(usize),
    Done,
    /// The run failed inside stage `n`
    Failed(usize),
}

/// Ordered sequence of stages
#[derive(Debug, Clone)]
pub struct Pipeline {
    nodes: Vec<PipelineNode>,
    config: Configuration,
    cache: Option<StageCache>,
    scope: String,
    single_subject: bool,
    monitor: TimeMonitor,
    state: ExecutionState,
    fitted_on: Option<String>,
}

/// Batch-level cache walk state: the newest hit not yet materialized
enum Walk {
    Loaded(Batch),
    Pending(Arc<Batch>),
}

impl Walk {
    fn materialize(self) -> Batch {
        match self {
            Walk::Loaded(batch) => batch,
            Walk::Pending(output) => Arc::unwrap_or_clone(output),
        }
    }
}

impl Pipeline {
    pub fn new(nodes: Vec<PipelineNode>) -> Self {
        Self {
            nodes,
            config: Configuration::new(),
            cache: None,
            scope: "default".to_string(),
            single_subject: false,
            monitor: TimeMonitor::new(),
            state: ExecutionState::Idle,
            fitted_on: None,
        }
    }

    /// Append a stage
    pub fn push(&mut self, node: PipelineNode) {
        self.nodes.push(node);
    }

    pub fn with_element(mut self, node: impl Into<PipelineNode>) -> Self {
        self.push(node.into());
        self
    }

    pub fn with_cache(mut self, cache: StageCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Cache outputs of data-only stages per item, across fold scopes
    pub fn with_single_subject_caching(mut self, enabled: bool) -> Self {
        self.single_subject = enabled;
        self
    }

    pub fn with_monitor(mut self, monitor: TimeMonitor) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn set_cache(&mut self, cache: Option<StageCache>) {
        self.cache = cache;
    }

    /// Fold scope used for batch-level cache entries
    pub fn set_cache_scope(&mut self, scope: impl Into<String>) {
        self.scope = scope.into();
    }

    pub fn cache(&self) -> Option<&StageCache> {
        self.cache.as_ref()
    }

    pub fn monitor(&self) -> &TimeMonitor {
        &self.monitor
    }

    pub fn nodes(&self) -> &[PipelineNode] {
        &self.nodes
    }

    pub fn node(&self, name: &str) -> Option<&PipelineNode> {
        self.nodes.iter().find(|n| n.name() == name)
    }

    /// Configuration bound by `set_params`
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn state(&self) -> ExecutionState {
        self.state
    }

    /// Final stage can predict
    pub fn is_estimator(&self) -> bool {
        self.nodes.last().is_some_and(PipelineNode::is_estimator)
    }

    /// Global configuration space of this pipeline
    pub fn config_space(&self) -> ConfigSpace {
        ConfigSpace::from_nodes(&self.nodes)
    }

    /// Structural checks independent of execution state
    pub fn validate_structure(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(Error::Configuration("pipeline has no elements".to_string()));
        }
        check_sibling_names(self.nodes.iter().map(PipelineNode::name))?;
        for node in &self.nodes {
            node.validate()?;
        }
        let intermediate = &self.nodes[..self.nodes.len() - 1];
        if let Some(node) = intermediate.iter().find(|n| !n.is_transformer()) {
            return Err(Error::Configuration(format!(
                "stage '{}' is not the final stage but cannot transform",
                node.name()
            )));
        }
        Ok(())
    }

    pub fn validate(&mut self) -> Result<()> {
        self.state = ExecutionState::Validating;
        self.validate_structure()
    }

    /// Route a flat configuration down to the stages
    pub fn set_params(&mut self, config: &Configuration) -> Result<()> {
        let names: Vec<&str> = self.nodes.iter().map(PipelineNode::name).collect();
        let routed = config.route(&names)?;
        for (node, relative) in self.nodes.iter_mut().zip(routed) {
            if !relative.is_empty() {
                node.set_params(&relative)?;
            }
        }
        self.config.merge(config);
        Ok(())
    }

    /// Human-readable rendering of a configuration of this pipeline
    pub fn describe(&self, config: &Configuration) -> String {
        let names: Vec<&str> = self.nodes.iter().map(PipelineNode::name).collect();
        match config.route(&names) {
            Ok(routed) => self
                .nodes
                .iter()
                .zip(&routed)
                .map(|(node, relative)| node.describe(relative))
                .collect::<Vec<_>>()
                .join(" > "),
            Err(_) => config.to_string(),
        }
    }

    /// Fit every stage; intermediate outputs feed the next stage
    pub fn fit(&mut self, batch: &Batch) -> Result<()> {
        self.validate()?;
        batch.validate()?;
        let data_id = self.cache.as_ref().map(|_| batch.fingerprint());
        let last = self.nodes.len() - 1;

        let current = self.run_stages(batch, last, CachePhase::Fit, data_id.as_deref())?;

        self.state = ExecutionState::Running(last);
        let node = &mut self.nodes[last];
        let name = node.name().to_string();
        let fitted = self.monitor.measure(&name, StageOperation::Fit, current.n_samples(), || node.fit(&current));
        if let Err(e) = fitted {
            self.state = ExecutionState::Failed(last);
            return Err(e.in_stage(&name));
        }
        self.fitted_on = data_id;
        self.state = ExecutionState::Done;
        Ok(())
    }

    /// Transform through every stage; the final stage only if it transforms
    pub fn transform(&mut self, batch: &Batch) -> Result<Batch> {
        self.validate()?;
        batch.validate()?;
        let final_transforms = self.nodes.last().is_some_and(|n| n.capabilities().transformer);
        let upto = if final_transforms { self.nodes.len() } else { self.nodes.len() - 1 };
        let data_id = self.transform_data_id(batch);
        let out = self.run_stages(batch, upto, CachePhase::Transform, data_id.as_deref())?;
        self.state = ExecutionState::Done;
        Ok(out)
    }

    /// Transform through all but the final stage, then predict with it
    pub fn predict(&mut self, batch: &Batch) -> Result<Array1<f64>> {
        self.validate()?;
        batch.validate()?;
        let last = self.nodes.len() - 1;
        if !self.nodes[last].is_estimator() {
            return Err(Error::NotSupported(format!(
                "final stage '{}' is not an estimator",
                self.nodes[last].name()
            )));
        }
        let data_id = self.transform_data_id(batch);
        let current = self.run_stages(batch, last, CachePhase::Transform, data_id.as_deref())?;

        self.state = ExecutionState::Running(last);
        let node = &mut self.nodes[last];
        let name = node.name().to_string();
        let predicted =
            self.monitor.measure(&name, StageOperation::Predict, current.n_samples(), || node.predict(&current));
        match predicted {
            Ok(predictions) => {
                self.state = ExecutionState::Done;
                Ok(predictions)
            }
            Err(e) => {
                self.state = ExecutionState::Failed(last);
                Err(e.in_stage(&name))
            }
        }
    }

    fn transform_data_id(&self, batch: &Batch) -> Option<String> {
        self.cache.as_ref()?;
        let fitted_on = self.fitted_on.as_ref()?;
        Some(format!("{fitted_on}:{}", batch.fingerprint()))
    }

    fn cache_key(&self, position: usize, phase: CachePhase, data_id: &str) -> CacheKey {
        let upstream: Vec<&str> = self.nodes[..=position].iter().map(PipelineNode::name).collect();
        CacheKey {
            scope: self.scope.clone(),
            position,
            stage: self.nodes[position].name().to_string(),
            config: self.config.restrict_to(&upstream).fingerprint(),
            data: data_id.to_string(),
            phase,
        }
    }

    /// Run stages `0..upto`, honouring the cache when one is attached
    fn run_stages(&mut self, batch: &Batch, upto: usize, phase: CachePhase, data_id: Option<&str>) -> Result<Batch> {
        let mut walk = Walk::Loaded(batch.clone());
        let mut missed = false;
        for position in 0..upto {
            self.state = ExecutionState::Running(position);
            let name = self.nodes[position].name().to_string();
            match self.run_stage(position, walk, phase, data_id, &mut missed) {
                Ok(next) => walk = next,
                Err(e) => {
                    self.state = ExecutionState::Failed(position);
                    return Err(e.in_stage(&name));
                }
            }
        }
        Ok(walk.materialize())
    }

    fn run_stage(
        &mut self,
        position: usize,
        walk: Walk,
        phase: CachePhase,
        data_id: Option<&str>,
        missed: &mut bool,
    ) -> Result<Walk> {
        let (Some(cache), Some(data_id)) = (self.cache.clone(), data_id) else {
            return self.compute(position, &walk.materialize(), phase).map(Walk::Loaded);
        };

        if self.single_subject && self.nodes[position].is_data_only() {
            let input = walk.materialize();
            return self.compute_per_item(position, &cache, input, phase).map(Walk::Loaded);
        }

        let key = self.cache_key(position, phase, data_id);
        let name = key.stage.clone();
        if !*missed {
            let started = Instant::now();
            if let Some(entry) = cache.get(&key) {
                if let Some(fitted) = entry.fitted {
                    self.nodes[position] = Arc::unwrap_or_clone(fitted);
                }
                self.monitor.record(&name, StageOperation::TransformCached, started.elapsed(), entry.output.n_samples());
                tracing::debug!(stage = %name, scope = %key.scope, "cache hit");
                return Ok(Walk::Pending(entry.output));
            }
        }

        *missed = true;
        tracing::debug!(stage = %name, scope = %key.scope, "cache miss");
        let output = self.compute(position, &walk.materialize(), phase)?;
        let fitted = (phase == CachePhase::Fit).then(|| Arc::new(self.nodes[position].clone()));
        cache.insert(key, CacheEntry { output: Arc::new(output.clone()), fitted });
        Ok(Walk::Loaded(output))
    }

    fn compute(&mut self, position: usize, input: &Batch, phase: CachePhase) -> Result<Batch> {
        let node = &mut self.nodes[position];
        let name = node.name().to_string();
        let n = input.n_samples();
        if phase == CachePhase::Fit {
            self.monitor.measure(&name, StageOperation::Fit, n, || node.fit(input))?;
        }
        self.monitor.measure(&name, StageOperation::TransformComputed, n, || node.transform(input))
    }

    /// Single-subject mode: reuse per-item outputs, computing only unseen items in one batch
    fn compute_per_item(&mut self, position: usize, cache: &StageCache, input: Batch, phase: CachePhase) -> Result<Batch> {
        if input.n_samples() == 0 {
            return self.compute(position, &input, phase);
        }
        let name = self.nodes[position].name().to_string();
        let stage_config = self.config.restrict_to(&[name.as_str()]).fingerprint();

        let started = Instant::now();
        let rows = input.rows();
        let keys: Vec<RowKey> = rows
            .iter()
            .map(|row| RowKey {
                position,
                stage: name.clone(),
                config: stage_config.clone(),
                item: row.fingerprint(),
            })
            .collect();
        let mut outputs: Vec<Option<Row>> = keys.iter().map(|k| cache.get_row(k)).collect();
        let missing: Vec<usize> = outputs
            .iter()
            .enumerate()
            .filter_map(|(i, o)| o.is_none().then_some(i))
            .collect();
        let n_cached = rows.len() - missing.len();
        if n_cached > 0 {
            self.monitor.record(&name, StageOperation::TransformCached, started.elapsed(), n_cached);
        }

        if !missing.is_empty() {
            let unseen = input.select(&missing);
            // data-only stages do not learn from fold data; fitting on the unseen items is enough
            let computed = self.compute(position, &unseen, CachePhase::Fit)?;
            if computed.n_samples() != missing.len() {
                return Err(Error::execution(
                    &name,
                    format!(
                        "data-only stage returned {} rows for {} inputs",
                        computed.n_samples(),
                        missing.len()
                    ),
                ));
            }
            for (slot, row) in missing.iter().zip(computed.rows()) {
                cache.insert_row(keys[*slot].clone(), row.clone());
                outputs[*slot] = Some(row);
            }
        }
        tracing::debug!(stage = %name, cached = n_cached, computed = missing.len(), ?phase, "per-item cache");

        let rows: Vec<Row> = outputs.into_iter().flatten().collect();
        Batch::from_rows(&rows)
    }
}
