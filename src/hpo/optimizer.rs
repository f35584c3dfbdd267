//! Ask/tell contract implemented by every search strategy

use std::fmt;

use crate::error::Result;
use crate::hpo::types::Configuration;
use crate::pipeline::PipelineNode;

/// Search strategy driven by the nested cross-validation controller.
///
/// `prepare` starts a new run; `ask` then yields configurations one at a time
/// until it returns `None`. Calling `prepare` again restarts the sequence.
pub trait Optimizer: Send + Sync + fmt::Debug {
    /// Build the configuration source for the given pipeline stages
    fn prepare(&mut self, elements: &[PipelineNode], maximize: bool) -> Result<()>;

    /// Next configuration to evaluate
    fn ask(&mut self) -> Option<Configuration>;

    /// Report an evaluated outcome; exhaustive strategies ignore it.
    ///
    /// Failed, rejected and non-finite configurations are reported with the worst possible
    /// score (`-inf` when maximizing, `+inf` otherwise).
    fn tell(&mut self, _config: &Configuration, _performance: f64) {}

    /// Short identifier used in logs and result records
    fn name(&self) -> &str;

    fn clone_boxed(&self) -> Box<dyn Optimizer>;
}

impl Clone for Box<dyn Optimizer> {
    fn clone(&self) -> Self {
        self.clone_boxed()
    }
}
