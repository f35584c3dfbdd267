//! Grid search strategies
//!
//! - [`GridSearch`]: the whole space in deterministic order
//! - [`RandomGridSearch`]: `k` configurations sampled without replacement
//! - [`TimeBoxedRandomGridSearch`]: random grid that stops yielding at a deadline

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::Result;
use crate::hpo::config_space::ConfigSpace;
use crate::hpo::optimizer::Optimizer;
use crate::hpo::types::Configuration;
use crate::pipeline::PipelineNode;

/// Exhaustive grid search
#[derive(Debug, Clone, Default)]
pub struct GridSearch {
    space: Option<ConfigSpace>,
    cursor: usize,
}

impl GridSearch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Size of the prepared grid
    pub fn len(&self) -> usize {
        self.space.as_ref().map_or(0, ConfigSpace::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Optimizer for GridSearch {
    fn prepare(&mut self, elements: &[PipelineNode], _maximize: bool) -> Result<()> {
        let space = ConfigSpace::from_nodes(elements);
        tracing::debug!(n_configs = space.len(), "prepared grid search");
        self.space = Some(space);
        self.cursor = 0;
        Ok(())
    }

    fn ask(&mut self) -> Option<Configuration> {
        let config = self.space.as_ref()?.get(self.cursor)?;
        self.cursor += 1;
        Some(config)
    }

    fn name(&self) -> &str {
        "grid_search"
    }

    fn clone_boxed(&self) -> Box<dyn Optimizer> {
        Box::new(self.clone())
    }
}

/// Random subset of the grid, sampled without replacement
#[derive(Debug, Clone)]
pub struct RandomGridSearch {
    k: Option<usize>,
    seed: u64,
    space: Option<ConfigSpace>,
    order: Vec<usize>,
    cursor: usize,
}

impl RandomGridSearch {
    /// Sample at most `k` configurations; `k` is clamped to the space size
    pub fn new(k: usize) -> Self {
        Self { k: Some(k), seed: 42, space: None, order: Vec::new(), cursor: 0 }
    }

    /// Visit the whole space in shuffled order
    pub fn all() -> Self {
        Self { k: None, ..Self::new(0) }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Number of configurations the prepared run will yield
    pub fn planned(&self) -> usize {
        self.order.len()
    }

    fn shuffle(&mut self, space: ConfigSpace) {
        let n = space.len();
        let amount = self.k.map_or(n, |k| k.min(n));
        let mut rng = StdRng::seed_from_u64(self.seed);
        self.order = rand::seq::index::sample(&mut rng, n, amount).into_vec();
        self.space = Some(space);
        self.cursor = 0;
    }
}

impl Optimizer for RandomGridSearch {
    fn prepare(&mut self, elements: &[PipelineNode], _maximize: bool) -> Result<()> {
        self.shuffle(ConfigSpace::from_nodes(elements));
        tracing::debug!(n_configs = self.order.len(), seed = self.seed, "prepared random grid search");
        Ok(())
    }

    fn ask(&mut self) -> Option<Configuration> {
        let index = *self.order.get(self.cursor)?;
        let config = self.space.as_ref()?.get(index)?;
        self.cursor += 1;
        Some(config)
    }

    fn name(&self) -> &str {
        "random_grid_search"
    }

    fn clone_boxed(&self) -> Box<dyn Optimizer> {
        Box::new(self.clone())
    }
}

/// Random grid search bounded by wall-clock time.
///
/// The deadline is fixed at `prepare` (now + limit, or an explicit instant)
/// and checked before every yield; a configuration already handed out is
/// never interrupted.
#[derive(Debug, Clone)]
pub struct TimeBoxedRandomGridSearch {
    inner: RandomGridSearch,
    limit: Duration,
    fixed_deadline: Option<Instant>,
    deadline: Option<Instant>,
}

impl TimeBoxedRandomGridSearch {
    /// Stop yielding `limit` after `prepare`
    pub fn new(limit: Duration) -> Self {
        Self { inner: RandomGridSearch::all(), limit, fixed_deadline: None, deadline: None }
    }

    /// Stop yielding at an absolute instant
    pub fn until(deadline: Instant) -> Self {
        Self { fixed_deadline: Some(deadline), ..Self::new(Duration::ZERO) }
    }

    /// Additionally cap the number of configurations
    pub fn with_k(mut self, k: usize) -> Self {
        self.inner.k = Some(k);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.inner.seed = seed;
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

impl Optimizer for TimeBoxedRandomGridSearch {
    fn prepare(&mut self, elements: &[PipelineNode], maximize: bool) -> Result<()> {
        self.inner.prepare(elements, maximize)?;
        self.deadline = Some(self.fixed_deadline.unwrap_or_else(|| Instant::now() + self.limit));
        Ok(())
    }

    fn ask(&mut self) -> Option<Configuration> {
        let deadline = self.deadline?;
        if Instant::now() >= deadline {
            tracing::debug!("time box elapsed, no further configurations");
            return None;
        }
        self.inner.ask()
    }

    fn name(&self) -> &str {
        "timeboxed_random_grid_search"
    }

    fn clone_boxed(&self) -> Box<dyn Optimizer> {
        Box::new(self.clone())
    }
}
