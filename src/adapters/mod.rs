//! Interfaces to the collaborators around a run.
//!
//! The orchestrator does not know how results are displayed or timed. It
//! hands its completion handler to a `CompletionContext` and reports run
//! boundaries to a `RunObserver`.

pub mod completion;
pub mod timing;

pub use completion::{Inline, MainLoop, MainQueue};
pub use timing::{NoopObserver, TracingObserver};

use crate::domain::Run;

/// A boxed completion job
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Where completion handlers execute
pub trait CompletionContext: Send + Sync {
    /// Schedule a job on this context
    fn dispatch(&self, job: Job);
}

/// Receives start and end notifications for every run
pub trait RunObserver: Send + Sync {
    /// Called before the first task starts
    fn run_started(&self, run: &Run);

    /// Called after the join releases, before the completion handler runs
    fn run_finished(&self, run: &Run);
}
