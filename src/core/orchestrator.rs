//! Main orchestrator for two-phase runs.
//!
//! A run executes a sequential setup pipeline, fans the final setup value out
//! to a task group, joins on every member, and hands the ordered result set
//! to a completion handler exactly once.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, Instrument};
use uuid::Uuid;

use crate::adapters::{CompletionContext, Inline, RunObserver, TracingObserver};
use crate::domain::{
    ResultEntry, ResultSet, Run, RunKind, RunState, Task, TaskError, TaskOutcome,
};

use super::join::{join_concurrent, join_serial, run_blocking, JoinParams};
use super::policy::{OrchestratorError, RunPolicy};

/// A finished run together with its results
#[derive(Debug, Clone)]
pub struct RunReport<T> {
    pub run: Run,
    pub results: ResultSet<T>,
}

/// Handle to a run scheduled in the background
#[derive(Debug)]
pub struct RunHandle {
    run_id: Uuid,
    join: JoinHandle<()>,
}

impl RunHandle {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Wait until the run has finished and its completion handler was dispatched
    pub async fn wait(self) {
        if let Err(e) = self.join.await {
            error!(run_id = %self.run_id, error = %e, "Run task ended abnormally");
        }
    }
}

/// Orchestrates sequential pipelines and fan-out/fan-in groups
#[derive(Clone)]
pub struct Orchestrator {
    policy: RunPolicy,
    completion: Arc<dyn CompletionContext>,
    observer: Arc<dyn RunObserver>,
    runtime: Option<Handle>,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("policy", &self.policy)
            .field("runtime", &self.runtime.is_some())
            .finish_non_exhaustive()
    }
}

/// A setup stage that did not produce a value
struct StageFailure {
    label: String,
    outcome: TaskOutcome<()>,
}

impl StageFailure {
    fn describe(&self) -> String {
        match &self.outcome {
            TaskOutcome::Failed { error } => format!("stage '{}' failed: {}", self.label, error),
            TaskOutcome::TimedOut => format!("deadline elapsed during stage '{}'", self.label),
            _ => format!("stage '{}' did not run", self.label),
        }
    }

    /// The outcome reported for slots that depend on the failed stage
    fn downstream<T>(&self) -> TaskOutcome<T> {
        match &self.outcome {
            TaskOutcome::TimedOut => TaskOutcome::TimedOut,
            _ => TaskOutcome::skipped(self.describe()),
        }
    }
}

impl Orchestrator {
    /// Create an orchestrator that completes inline and logs timings
    pub fn new() -> Self {
        Self {
            policy: RunPolicy::default(),
            completion: Arc::new(Inline),
            observer: Arc::new(TracingObserver),
            runtime: None,
        }
    }

    pub fn with_policy(mut self, policy: RunPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Deliver completion handlers on the given context
    pub fn with_completion_context(mut self, context: impl CompletionContext + 'static) -> Self {
        self.completion = Arc::new(context);
        self
    }

    pub fn with_observer(mut self, observer: impl RunObserver + 'static) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    /// Schedule background runs on this runtime instead of the ambient one
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn policy(&self) -> &RunPolicy {
        &self.policy
    }

    /// Run `stages` in order in the background.
    ///
    /// Each stage receives the previous stage's output; the first receives
    /// `input`. `on_complete` gets a one-entry result set keyed by the last
    /// stage's label. Returns immediately.
    pub fn run_sequential<T, F>(
        &self,
        input: T,
        stages: Vec<Task<T>>,
        on_complete: F,
    ) -> Result<RunHandle, OrchestratorError>
    where
        T: Send + Sync + 'static,
        F: FnOnce(ResultSet<T>) + Send + 'static,
    {
        self.policy.validate()?;
        if stages.is_empty() {
            return Err(OrchestratorError::EmptyPipeline);
        }
        let this = self.clone();
        self.spawn_run(move |run_id| async move {
            let report = this.sequential(run_id, input, stages).await;
            this.complete(report.results, on_complete);
        })
    }

    /// Run `setup` in order, then every `group` member concurrently, in the
    /// background.
    ///
    /// `on_complete` is called once, after every member finished, with one
    /// entry per member in declaration order. Returns immediately.
    pub fn run_parallel<T, F>(
        &self,
        input: T,
        setup: Vec<Task<T>>,
        group: Vec<Task<T>>,
        on_complete: F,
    ) -> Result<RunHandle, OrchestratorError>
    where
        T: Send + Sync + 'static,
        F: FnOnce(ResultSet<T>) + Send + 'static,
    {
        self.policy.validate()?;
        validate_group(&group)?;
        let this = self.clone();
        self.spawn_run(move |run_id| async move {
            let report = this
                .two_phase(run_id, RunKind::Parallel, input, setup, group)
                .await;
            this.complete(report.results, on_complete);
        })
    }

    /// Like `run_parallel`, but group members run one after another
    pub fn run_in_series<T, F>(
        &self,
        input: T,
        setup: Vec<Task<T>>,
        group: Vec<Task<T>>,
        on_complete: F,
    ) -> Result<RunHandle, OrchestratorError>
    where
        T: Send + Sync + 'static,
        F: FnOnce(ResultSet<T>) + Send + 'static,
    {
        self.policy.validate()?;
        validate_group(&group)?;
        let this = self.clone();
        self.spawn_run(move |run_id| async move {
            let report = this
                .two_phase(run_id, RunKind::Serial, input, setup, group)
                .await;
            this.complete(report.results, on_complete);
        })
    }

    /// Awaitable form of `run_sequential`
    pub async fn execute_sequential<T>(
        &self,
        input: T,
        stages: Vec<Task<T>>,
    ) -> Result<RunReport<T>, OrchestratorError>
    where
        T: Send + Sync + 'static,
    {
        self.policy.validate()?;
        if stages.is_empty() {
            return Err(OrchestratorError::EmptyPipeline);
        }
        Ok(self.sequential(Uuid::new_v4(), input, stages).await)
    }

    /// Awaitable form of `run_parallel`
    pub async fn execute_parallel<T>(
        &self,
        input: T,
        setup: Vec<Task<T>>,
        group: Vec<Task<T>>,
    ) -> Result<RunReport<T>, OrchestratorError>
    where
        T: Send + Sync + 'static,
    {
        self.policy.validate()?;
        validate_group(&group)?;
        Ok(self
            .two_phase(Uuid::new_v4(), RunKind::Parallel, input, setup, group)
            .await)
    }

    /// Awaitable form of `run_in_series`
    pub async fn execute_in_series<T>(
        &self,
        input: T,
        setup: Vec<Task<T>>,
        group: Vec<Task<T>>,
    ) -> Result<RunReport<T>, OrchestratorError>
    where
        T: Send + Sync + 'static,
    {
        self.policy.validate()?;
        validate_group(&group)?;
        Ok(self
            .two_phase(Uuid::new_v4(), RunKind::Serial, input, setup, group)
            .await)
    }

    fn spawn_run<M, Fut>(&self, make: M) -> Result<RunHandle, OrchestratorError>
    where
        M: FnOnce(Uuid) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let runtime = match &self.runtime {
            Some(handle) => handle.clone(),
            None => Handle::try_current().map_err(|_| OrchestratorError::NoRuntime)?,
        };
        let run_id = Uuid::new_v4();
        let join = runtime.spawn(make(run_id).instrument(tracing::info_span!("run", %run_id)));
        Ok(RunHandle { run_id, join })
    }

    fn complete<T, F>(&self, results: ResultSet<T>, on_complete: F)
    where
        T: Send + 'static,
        F: FnOnce(ResultSet<T>) + Send + 'static,
    {
        self.completion.dispatch(Box::new(move || on_complete(results)));
    }

    fn deadline(&self) -> Option<Instant> {
        self.policy.deadline().map(|d| Instant::now() + d)
    }

    #[instrument(skip_all, fields(stages = stages.len()))]
    async fn sequential<T>(&self, run_id: Uuid, input: T, stages: Vec<Task<T>>) -> RunReport<T>
    where
        T: Send + Sync + 'static,
    {
        let mut run = Run::new(run_id, RunKind::Sequential, stages.len(), 0);
        self.observer.run_started(&run);

        let deadline = self.deadline();
        let final_label = stages
            .last()
            .map(|s| s.label().to_string())
            .unwrap_or_default();

        let outcome = match self.run_setup(input, &stages, deadline).await {
            Ok(value) => {
                run.finish(RunState::Completed);
                TaskOutcome::Completed { value }
            }
            Err(failure) => {
                run.finish(RunState::Failed {
                    error: failure.describe(),
                });
                match &failure.outcome {
                    TaskOutcome::TimedOut => TaskOutcome::TimedOut,
                    _ => TaskOutcome::Failed {
                        error: failure.describe(),
                    },
                }
            }
        };

        self.observer.run_finished(&run);
        let results = ResultSet::from_entries(vec![ResultEntry {
            label: final_label,
            outcome,
        }]);
        RunReport { run, results }
    }

    #[instrument(skip_all, fields(kind = %kind, setup = setup.len(), group = group.len()))]
    async fn two_phase<T>(
        &self,
        run_id: Uuid,
        kind: RunKind,
        input: T,
        setup: Vec<Task<T>>,
        group: Vec<Task<T>>,
    ) -> RunReport<T>
    where
        T: Send + Sync + 'static,
    {
        let mut run = Run::new(run_id, kind, setup.len(), group.len());
        self.observer.run_started(&run);

        let deadline = self.deadline();

        let results = match self.run_setup(input, &setup, deadline).await {
            Ok(shared) => {
                let params = JoinParams {
                    time_scale: self.policy.time_scale,
                    deadline,
                    failure_policy: self.policy.failure_policy,
                };
                let shared = Arc::new(shared);
                let results = match kind {
                    RunKind::Serial => join_serial(shared, &group, params).await,
                    _ => join_concurrent(shared, &group, params).await,
                };

                let failed = results.unsuccessful();
                if failed.is_empty() {
                    run.finish(RunState::Completed);
                } else {
                    run.finish(RunState::PartiallyFailed { failed });
                }
                results
            }
            Err(failure) => {
                run.finish(RunState::Failed {
                    error: failure.describe(),
                });
                let entries = group
                    .iter()
                    .map(|task| ResultEntry {
                        label: task.label().to_string(),
                        outcome: failure.downstream(),
                    })
                    .collect();
                ResultSet::from_entries(entries)
            }
        };

        self.observer.run_finished(&run);
        RunReport { run, results }
    }

    /// Execute stages strictly in order, each on a blocking worker
    async fn run_setup<T>(
        &self,
        input: T,
        stages: &[Task<T>],
        deadline: Option<Instant>,
    ) -> Result<T, StageFailure>
    where
        T: Send + Sync + 'static,
    {
        let mut value = input;

        for stage in stages {
            debug!(stage = stage.label(), "Stage started");
            let work = run_stage(stage.clone(), value, self.policy.time_scale);

            let result = match deadline {
                Some(at) => match tokio::time::timeout_at(at, work).await {
                    Ok(result) => result,
                    Err(_) => {
                        return Err(StageFailure {
                            label: stage.label().to_string(),
                            outcome: TaskOutcome::TimedOut,
                        })
                    }
                },
                None => work.await,
            };

            match result {
                Ok(next) => value = next,
                Err(e) => {
                    error!(stage = stage.label(), error = %e, "Stage failed");
                    return Err(StageFailure {
                        label: stage.label().to_string(),
                        outcome: TaskOutcome::Failed {
                            error: e.to_string(),
                        },
                    });
                }
            }
            debug!(stage = stage.label(), "Stage completed");
        }

        info!(stages = stages.len(), "Setup finished");
        Ok(value)
    }
}

/// Run a stage, moving its input onto the blocking worker
async fn run_stage<T>(stage: Task<T>, input: T, time_scale: f64) -> Result<T, TaskError>
where
    T: Send + Sync + 'static,
{
    run_blocking(stage, Arc::new(input), time_scale).await
}

/// Reject groups whose labels would collide in the result set
fn validate_group<T>(group: &[Task<T>]) -> Result<(), OrchestratorError> {
    let mut seen = HashSet::new();
    for task in group {
        if !seen.insert(task.label()) {
            return Err(OrchestratorError::DuplicateLabel {
                label: task.label().to_string(),
            });
        }
    }
    Ok(())
}
