//! Per-slot outcome of a task.

use serde::{Deserialize, Serialize};

use super::task::TaskError;

/// What happened to one task of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum TaskOutcome<T> {
    /// The task produced a value
    Completed { value: T },

    /// The task's computation failed or panicked
    Failed { error: String },

    /// The run's deadline elapsed before the task finished
    TimedOut,

    /// The task never ran, or its result was discarded
    Skipped { reason: String },
}

impl<T> TaskOutcome<T> {
    /// Wrap a computation result
    pub fn from_result(result: Result<T, TaskError>) -> Self {
        match result {
            Ok(value) => Self::Completed { value },
            Err(e) => Self::Failed {
                error: e.to_string(),
            },
        }
    }

    /// Create a skipped outcome
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// The produced value, if any
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Completed { value } => Some(value),
            _ => None,
        }
    }

    /// Consume the outcome, returning the produced value
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Completed { value } => Some(value),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_result() {
        let ok: TaskOutcome<String> = TaskOutcome::from_result(Ok("done".to_string()));
        assert_eq!(ok.value(), Some(&"done".to_string()));

        let err: TaskOutcome<String> = TaskOutcome::from_result(Err(TaskError::failed("boom")));
        assert!(err.is_failed());
        assert_eq!(err.into_value(), None);
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = TaskOutcome::Completed {
            value: "HI THeRe".to_string(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["value"], "HI THeRe");

        let timed_out: TaskOutcome<String> = TaskOutcome::TimedOut;
        let json = serde_json::to_string(&timed_out).unwrap();
        let parsed: TaskOutcome<String> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, TaskOutcome::TimedOut);
    }
}
