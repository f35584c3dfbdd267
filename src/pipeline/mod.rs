//! Composable pipelines
//!
//! A pipeline is an ordered list of [`PipelineNode`]s. Nodes are plain
//! [`PipelineElement`]s wrapping a [`BaseElement`] or one of the composites
//! [`Switch`] (alternatives), [`Stack`] (parallel, concatenated outputs) and
//! [`Branch`] (a nested sequential pipeline). The [`Pipeline`] engine runs
//! the stages and consults an optional [`StageCache`].

pub mod builtin;
mod branch;
mod cache;
mod element;
mod engine;
mod node;
mod registry;
mod stack;
mod switch;


pub use branch::{Branch, LocalSearch};
pub use cache::{CacheEntry, CacheKey, CachePhase, CacheStats, RowKey, StageCache};
pub use element::{invalid_value, unknown_param, BaseElement, Capabilities, PipelineElement};
pub use engine::{ExecutionState, Pipeline};
pub use node::PipelineNode;
pub use registry::{
    create_element, is_registered, register_element, ElementFactory, ElementRegistry, REGISTRY,
};
pub use stack::Stack;
pub use switch::{Switch, SELECTOR_KEY};
