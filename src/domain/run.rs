//! Run state.
//!
//! A Run represents a single invocation of the orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One invocation of the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    /// Unique identifier for this run
    pub id: Uuid,

    /// How the run executes its tasks
    pub kind: RunKind,

    /// Current state of the run
    pub state: RunState,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// When the run finished (if applicable)
    pub finished_at: Option<DateTime<Utc>>,

    /// Number of setup stages
    pub setup_len: usize,

    /// Number of group members
    pub group_len: usize,
}

impl Run {
    /// Create a new running run
    pub fn new(id: Uuid, kind: RunKind, setup_len: usize, group_len: usize) -> Self {
        Self {
            id,
            kind,
            state: RunState::Running,
            started_at: Utc::now(),
            finished_at: None,
            setup_len,
            group_len,
        }
    }

    /// Mark the run finished with the given state
    pub fn finish(&mut self, state: RunState) {
        self.state = state;
        self.finished_at = Some(Utc::now());
    }

    /// Check if the run is still in progress
    pub fn is_running(&self) -> bool {
        matches!(self.state, RunState::Running)
    }

    /// Wall-clock time between start and finish, in milliseconds
    pub fn elapsed_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }
}

/// Execution shape of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    /// Pipeline only, one result
    Sequential,

    /// Setup pipeline, then concurrent group
    Parallel,

    /// Setup pipeline, then group members one at a time
    Serial,
}

impl std::fmt::Display for RunKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Sequential => "sequential",
            Self::Parallel => "parallel",
            Self::Serial => "serial",
        };
        f.write_str(name)
    }
}

/// State of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum RunState {
    /// Currently executing
    Running,

    /// Every task completed
    Completed,

    /// The join released but some slots did not complete
    PartiallyFailed { failed: Vec<String> },

    /// A setup stage failed; nothing after it ran
    Failed { error: String },
}

impl Default for RunState {
    fn default() -> Self {
        Self::Running
    }
}
