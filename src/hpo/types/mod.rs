//! Core HPO types

mod configuration;
mod parameter;
mod space;


pub use configuration::{qualify, Configuration, SEPARATOR};
pub use parameter::{ParameterDomain, ParameterValue};
pub use space::HyperparameterSpace;
