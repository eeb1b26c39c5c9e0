//! Tasks: labelled units of blocking work with a simulated latency.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Error raised by a task's computation.
///
/// Task errors never escape the orchestrator; they are recorded in the
/// task's slot of the result set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The computation returned an error
    #[error("{0}")]
    Failed(String),

    /// The computation panicked on its worker
    #[error("task panicked: {0}")]
    Panicked(String),
}

impl TaskError {
    /// Create a failure with a message
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

type Compute<T> = dyn Fn(&T) -> Result<T, TaskError> + Send + Sync;

/// A unit of work: label, simulated duration and computation.
///
/// The computation receives the shared input by reference and produces a new
/// value. Cloning a task is cheap; the computation is reference counted.
pub struct Task<T> {
    label: String,
    duration: Duration,
    compute: Arc<Compute<T>>,
}

impl<T> Clone for Task<T> {
    fn clone(&self) -> Self {
        Self {
            label: self.label.clone(),
            duration: self.duration,
            compute: Arc::clone(&self.compute),
        }
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("label", &self.label)
            .field("duration", &self.duration)
            .finish_non_exhaustive()
    }
}

impl<T> Task<T> {
    /// Create a task from a fallible computation
    pub fn new<F>(label: impl Into<String>, compute: F) -> Self
    where
        F: Fn(&T) -> Result<T, TaskError> + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            duration: Duration::ZERO,
            compute: Arc::new(compute),
        }
    }

    /// Create a task from a computation that always succeeds
    pub fn infallible<F>(label: impl Into<String>, compute: F) -> Self
    where
        F: Fn(&T) -> T + Send + Sync + 'static,
    {
        Self::new(label, move |input| Ok(compute(input)))
    }

    /// Set the simulated execution latency
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Task label (unique within a group)
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Declared simulated latency
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Run the task on the current thread.
    ///
    /// Blocks for the declared duration multiplied by `time_scale`, then
    /// applies the computation. Must only be called from a blocking worker.
    pub fn execute_blocking(&self, input: &T, time_scale: f64) -> Result<T, TaskError> {
        let latency = scaled(self.duration, time_scale);
        if !latency.is_zero() {
            std::thread::sleep(latency);
        }
        (self.compute)(input)
    }
}

/// Scale a duration, treating negative or NaN factors as zero.
///
/// Results too large for a `Duration` saturate at `Duration::MAX`.
pub fn scaled(duration: Duration, time_scale: f64) -> Duration {
    if time_scale.is_nan() || time_scale <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(duration.as_secs_f64() * time_scale).unwrap_or(Duration::MAX)
}
