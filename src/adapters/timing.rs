//! Timing instrumentation for runs.

use tracing::info;

use crate::domain::{Run, RunState};

use super::RunObserver;

/// Logs run start and elapsed time through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl RunObserver for TracingObserver {
    fn run_started(&self, run: &Run) {
        info!(
            run_id = %run.id,
            kind = %run.kind,
            setup = run.setup_len,
            group = run.group_len,
            "Run started"
        );
    }

    fn run_finished(&self, run: &Run) {
        let elapsed_ms = run.elapsed_ms().unwrap_or_default();
        match &run.state {
            RunState::Completed => {
                info!(run_id = %run.id, kind = %run.kind, elapsed_ms, "Run completed")
            }
            RunState::PartiallyFailed { failed } => info!(
                run_id = %run.id,
                kind = %run.kind,
                elapsed_ms,
                failed = ?failed,
                "Run completed with unsuccessful tasks"
            ),
            RunState::Failed { error } => {
                info!(run_id = %run.id, kind = %run.kind, elapsed_ms, %error, "Run failed")
            }
            RunState::Running => {}
        }
    }
}

/// Observer that records nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl RunObserver for NoopObserver {
    fn run_started(&self, _run: &Run) {}
    fn run_finished(&self, _run: &Run) {}
}
