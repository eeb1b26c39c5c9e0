//! Domain types for the fanjoin orchestrator.
//!
//! This module contains the core data structures:
//! - Task: Labelled blocking computation with simulated latency
//! - TaskOutcome: What happened to one slot
//! - ResultSet: Ordered results of a run
//! - Run: Invocation metadata and state

pub mod outcome;
pub mod result_set;
pub mod run;
pub mod task;

// Re-export commonly used types
pub use outcome::TaskOutcome;
pub use result_set::{ResultEntry, ResultSet};
pub use run::{Run, RunKind, RunState};
pub use task::{Task, TaskError};
