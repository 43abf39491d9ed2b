//! Configuration and the decision pipeline.

pub mod config;
pub mod pipeline;

pub use config::{PackConfig, PackRegistry, RedactionConfig};
pub use pipeline::{Pipeline, RunRequest, ScopedInput};
