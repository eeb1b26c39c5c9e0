//! Run policy: time scaling, deadline and failure handling.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Policy applied to every run of an orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunPolicy {
    /// Multiplier applied to every task's simulated duration (default: 1.0)
    #[serde(default = "default_time_scale")]
    pub time_scale: f64,

    /// Deadline for the whole run in milliseconds, measured from its start
    #[serde(default)]
    pub deadline_ms: Option<u64>,

    /// What a failing group member does to its siblings
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

fn default_time_scale() -> f64 {
    1.0
}

impl Default for RunPolicy {
    fn default() -> Self {
        Self {
            time_scale: default_time_scale(),
            deadline_ms: None,
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl RunPolicy {
    /// The run deadline as a duration
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }

    pub fn with_time_scale(mut self, time_scale: f64) -> Self {
        self.time_scale = time_scale;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline_ms = Some(deadline.as_millis() as u64);
        self
    }

    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    /// Reject settings no run can honour
    pub fn validate(&self) -> Result<(), OrchestratorError> {
        if !self.time_scale.is_finite() || self.time_scale < 0.0 {
            return Err(OrchestratorError::InvalidTimeScale {
                time_scale: self.time_scale,
            });
        }
        Ok(())
    }
}

/// Handling of a failed group member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Let siblings finish; report the failure in its own slot
    #[default]
    WaitAll,

    /// Release the join on the first failure; unfinished slots are skipped
    FailFast,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "wait_all" => Ok(Self::WaitAll),
            "fail_fast" => Ok(Self::FailFast),
            other => Err(format!(
                "Unknown failure policy '{}' (expected wait_all or fail_fast)",
                other
            )),
        }
    }
}

/// Errors detected before a run starts
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrchestratorError {
    #[error("Pipeline must have at least one stage")]
    EmptyPipeline,

    #[error("Duplicate task label in group: {label}")]
    DuplicateLabel { label: String },

    #[error("No tokio runtime available to schedule the run")]
    NoRuntime,

    #[error("time_scale must be a non-negative number, got {time_scale}")]
    InvalidTimeScale { time_scale: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RunPolicy::default();
        assert_eq!(policy.time_scale, 1.0);
        assert!(policy.deadline().is_none());
        assert_eq!(policy.failure_policy, FailurePolicy::WaitAll);
    }

    #[test]
    fn test_policy_from_yaml_defaults() {
        let policy: RunPolicy = serde_yaml::from_str("deadline_ms: 1500").unwrap();
        assert_eq!(policy.time_scale, 1.0);
        assert_eq!(policy.deadline(), Some(Duration::from_millis(1500)));

        let policy: RunPolicy = serde_yaml::from_str("failure_policy: fail_fast").unwrap();
        assert_eq!(policy.failure_policy, FailurePolicy::FailFast);
    }

    #[test]
    fn test_failure_policy_parsing() {
        assert_eq!("wait_all".parse::<FailurePolicy>(), Ok(FailurePolicy::WaitAll));
        assert_eq!("Fail-Fast".parse::<FailurePolicy>(), Ok(FailurePolicy::FailFast));
        assert!("sometimes".parse::<FailurePolicy>().is_err());
    }

    #[test]
    fn test_validate_time_scale() {
        assert!(RunPolicy::default().validate().is_ok());
        assert!(RunPolicy::default().with_time_scale(0.0).validate().is_ok());
        assert!(RunPolicy::default().with_time_scale(1e20).validate().is_ok());

        assert_eq!(
            RunPolicy::default().with_time_scale(-0.5).validate(),
            Err(OrchestratorError::InvalidTimeScale { time_scale: -0.5 })
        );
        assert!(RunPolicy::default()
            .with_time_scale(f64::INFINITY)
            .validate()
            .is_err());
        assert!(RunPolicy::default()
            .with_time_scale(f64::NAN)
            .validate()
            .is_err());
    }
}
