//! fanjoin - Fan-out/fan-in task orchestrator
//!
//! Runs a two-phase computation: a sequential setup pipeline produces a
//! shared value, every member of a task group then runs concurrently on that
//! value, and a single completion handler receives all results once the last
//! member has finished.
//!
//! # Guarantees
//!
//! - Setup stages run in declaration order, each after the previous finished
//! - The completion handler runs exactly once per run, after the join
//! - Results keep declaration order regardless of completion order
//! - Each group member owns exactly one result slot
//!
//! # Modules
//!
//! - `adapters`: Completion contexts and timing observers
//! - `core`: Orchestration logic (Orchestrator, join, Pipeline, Policy)
//! - `domain`: Data structures (Task, TaskOutcome, ResultSet, Run)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Fetch, process, then calculate one after another
//! fanjoin sequential --scale 0.1
//!
//! # Same work with the calculations in parallel
//! fanjoin parallel --width 8 --scale 0.1
//!
//! # Run a pipeline file
//! fanjoin run pipelines/greeting.yaml --mode parallel
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use adapters::{CompletionContext, Inline, MainLoop, MainQueue, RunObserver};
pub use self::core::{FailurePolicy, Orchestrator, OrchestratorError, RunPolicy, RunReport};
pub use domain::{ResultSet, Run, RunKind, RunState, Task, TaskError, TaskOutcome};
