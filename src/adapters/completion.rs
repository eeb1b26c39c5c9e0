//! Completion contexts: where a run's completion handler executes.
//!
//! `Inline` runs the handler on the worker that finished the join.
//! `MainQueue` forwards it to a serial loop driven by the caller, the way a
//! UI toolkit hops back to its main thread before touching widgets.

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{CompletionContext, Job};

/// Run the completion handler on the orchestrating worker
#[derive(Debug, Clone, Copy, Default)]
pub struct Inline;

impl CompletionContext for Inline {
    fn dispatch(&self, job: Job) {
        job();
    }
}

/// Sending half of a serial completion queue
#[derive(Debug, Clone)]
pub struct MainQueue {
    tx: mpsc::UnboundedSender<Job>,
}

/// Receiving half of a serial completion queue.
///
/// Jobs execute on whichever thread calls `turn` or `run_until_idle`, one at
/// a time, in dispatch order.
pub struct MainLoop {
    rx: mpsc::UnboundedReceiver<Job>,
}

impl MainQueue {
    /// Create a queue and the loop that drains it
    pub fn new() -> (Self, MainLoop) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, MainLoop { rx })
    }
}

impl CompletionContext for MainQueue {
    fn dispatch(&self, job: Job) {
        if self.tx.send(job).is_err() {
            warn!("Main loop dropped, completion handler discarded");
        }
    }
}

impl MainLoop {
    /// Wait for the next job and run it.
    ///
    /// Returns `false` once every `MainQueue` handle is gone and the queue is
    /// empty.
    pub async fn turn(&mut self) -> bool {
        match self.rx.recv().await {
            Some(job) => {
                debug!("Running queued completion handler");
                job();
                true
            }
            None => false,
        }
    }

    /// Blocking variant of `turn` for threads outside the runtime
    pub fn turn_blocking(&mut self) -> bool {
        match self.rx.blocking_recv() {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Run every job already queued without waiting; returns how many ran
    pub fn run_until_idle(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            job();
            ran += 1;
        }
        ran
    }
}
