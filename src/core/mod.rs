//! Core orchestration logic.
//!
//! This module contains:
//! - Orchestrator: Sequential pipelines and fan-out/fan-in runs
//! - Join: Group execution and the completion barrier
//! - Pipeline: Declarative pipeline definitions and loading
//! - Actions: Built-in string transformations
//! - Policy: Time scale, deadline and failure handling

pub mod actions;
mod join;
pub mod orchestrator;
pub mod pipeline;
pub mod policy;

// Re-export commonly used types
pub use actions::Action;
pub use orchestrator::{Orchestrator, RunHandle, RunReport};
pub use pipeline::{ActionKind, PipelineSpec, TaskSpec, MAX_DEMO_WIDTH};
pub use policy::{FailurePolicy, OrchestratorError, RunPolicy};
