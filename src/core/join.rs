//! Fan-out/fan-in over a task group.
//!
//! Every member runs on its own blocking worker and reports back through a
//! `JoinSet` tagged with its slot index. Only the joining loop writes slots,
//! one write per slot, and the join releases when the completion count
//! reaches the group size (or earlier on deadline / fail-fast).

use std::any::Any;
use std::sync::Arc;

use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::domain::{ResultEntry, ResultSet, Task, TaskError, TaskOutcome};

use super::policy::FailurePolicy;

/// Parameters shared by both join strategies
#[derive(Debug, Clone, Copy)]
pub(crate) struct JoinParams {
    pub time_scale: f64,
    pub deadline: Option<Instant>,
    pub failure_policy: FailurePolicy,
}

/// Run one task on the blocking pool, mapping a panic to a task error
pub(crate) async fn run_blocking<T>(
    task: Task<T>,
    input: Arc<T>,
    time_scale: f64,
) -> Result<T, TaskError>
where
    T: Send + Sync + 'static,
{
    tokio::task::spawn_blocking(move || task.execute_blocking(&input, time_scale))
        .await
        .unwrap_or_else(|e| Err(join_error(e)))
}

pub(crate) fn join_error(e: JoinError) -> TaskError {
    if e.is_panic() {
        TaskError::Panicked(panic_message(e.into_panic()))
    } else {
        TaskError::failed("worker cancelled")
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Run every member concurrently and wait for all of them
pub(crate) async fn join_concurrent<T>(
    input: Arc<T>,
    group: &[Task<T>],
    params: JoinParams,
) -> ResultSet<T>
where
    T: Send + Sync + 'static,
{
    let total = group.len();
    if total == 0 {
        return ResultSet::empty();
    }

    let mut slots: Vec<Option<TaskOutcome<T>>> = (0..total).map(|_| None).collect();
    let mut set = JoinSet::new();

    for (index, task) in group.iter().cloned().enumerate() {
        let input = Arc::clone(&input);
        set.spawn(async move {
            let result = run_blocking(task, input, params.time_scale).await;
            (index, TaskOutcome::from_result(result))
        });
    }
    debug!(total, "Group fanned out");

    let mut finished = 0usize;
    while finished < total {
        let next = match params.deadline {
            Some(at) => match tokio::time::timeout_at(at, set.join_next()).await {
                Ok(next) => next,
                Err(_) => {
                    warn!(finished, total, "Deadline elapsed before group finished");
                    fill_unfinished(&mut slots, || TaskOutcome::TimedOut);
                    break;
                }
            },
            None => set.join_next().await,
        };

        let (index, outcome) = match next {
            Some(Ok(pair)) => pair,
            Some(Err(e)) => {
                error!(error = %e, "Group worker lost");
                continue;
            }
            None => break,
        };

        if slots[index].is_some() {
            error!(label = group[index].label(), "Slot reported twice, ignoring");
            continue;
        }

        let failed = outcome.is_failed();
        debug!(label = group[index].label(), failed, "Group member finished");
        slots[index] = Some(outcome);
        finished += 1;

        if failed && params.failure_policy == FailurePolicy::FailFast && finished < total {
            let reason = format!("aborted after {} failed", group[index].label());
            warn!(label = group[index].label(), "Failing fast");
            fill_unfinished(&mut slots, || TaskOutcome::skipped(reason.clone()));
            break;
        }
    }

    // Workers still sleeping keep running on the blocking pool; their
    // results are no longer wanted.
    set.detach_all();

    collect(group, slots)
}

/// Run every member one after another on the blocking pool
pub(crate) async fn join_serial<T>(
    input: Arc<T>,
    group: &[Task<T>],
    params: JoinParams,
) -> ResultSet<T>
where
    T: Send + Sync + 'static,
{
    let mut slots: Vec<Option<TaskOutcome<T>>> = (0..group.len()).map(|_| None).collect();

    for (index, task) in group.iter().enumerate() {
        let work = run_blocking(task.clone(), Arc::clone(&input), params.time_scale);
        let outcome = match params.deadline {
            Some(at) => match tokio::time::timeout_at(at, work).await {
                Ok(result) => TaskOutcome::from_result(result),
                Err(_) => {
                    warn!(label = task.label(), "Deadline elapsed during serial group");
                    fill_unfinished(&mut slots, || TaskOutcome::TimedOut);
                    break;
                }
            },
            None => TaskOutcome::from_result(work.await),
        };

        let failed = outcome.is_failed();
        slots[index] = Some(outcome);

        if failed && params.failure_policy == FailurePolicy::FailFast {
            let reason = format!("aborted after {} failed", task.label());
            fill_unfinished(&mut slots, || TaskOutcome::skipped(reason.clone()));
            break;
        }
    }

    collect(group, slots)
}

fn fill_unfinished<T>(slots: &mut [Option<TaskOutcome<T>>], make: impl Fn() -> TaskOutcome<T>) {
    for slot in slots.iter_mut().filter(|s| s.is_none()) {
        *slot = Some(make());
    }
}

fn collect<T>(group: &[Task<T>], slots: Vec<Option<TaskOutcome<T>>>) -> ResultSet<T> {
    let entries = group
        .iter()
        .zip(slots)
        .map(|(task, slot)| ResultEntry {
            label: task.label().to_string(),
            outcome: slot.unwrap_or_else(|| TaskOutcome::Failed {
                error: "worker lost before reporting".to_string(),
            }),
        })
        .collect();
    ResultSet::from_entries(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn params() -> JoinParams {
        JoinParams {
            time_scale: 1.0,
            deadline: None,
            failure_policy: FailurePolicy::WaitAll,
        }
    }

    fn sleeper(label: &str, ms: u64) -> Task<String> {
        let tag = label.to_string();
        Task::infallible(label, move |s: &String| format!("{}:{}", tag, s))
            .with_duration(Duration::from_millis(ms))
    }

    #[tokio::test]
    async fn test_empty_group_releases_immediately() {
        let set = join_concurrent(Arc::new("x".to_string()), &[], params()).await;
        assert!(set.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_slots_follow_declaration_order() {
        let group = vec![sleeper("a", 150), sleeper("b", 80), sleeper("c", 10)];
        let set = join_concurrent(Arc::new("in".to_string()), &group, params()).await;

        assert_eq!(set.labels().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(set.value("a"), Some(&"a:in".to_string()));
        assert_eq!(set.value("c"), Some(&"c:in".to_string()));
    }

    #[tokio::test]
    async fn test_panic_becomes_failed_slot() {
        let group = vec![
            Task::infallible("boom", |_: &String| -> String { panic!("kaboom") }),
            sleeper("ok", 5),
        ];
        let set = join_concurrent(Arc::new(String::new()), &group, params()).await;

        match set.get("boom") {
            Some(TaskOutcome::Failed { error }) => assert!(error.contains("kaboom")),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(set.get("ok").unwrap().is_completed());
    }

    #[tokio::test]
    async fn test_serial_runs_in_order() {
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let group: Vec<Task<u32>> = (0..3)
            .map(|i| {
                let log = Arc::clone(&log);
                Task::infallible(format!("t{}", i), move |n: &u32| {
                    log.lock().unwrap().push(i);
                    n + i
                })
            })
            .collect();

        let set = join_serial(Arc::new(10), &group, params()).await;

        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(set.value("t2"), Some(&12));
    }
    #[tokio::test]
    async fn test_series_deadline_times_out_rest() {
        let group = vec![sleeper("a", 20), sleeper("b", 300), sleeper("c", 20)];
        let params = JoinParams {
            deadline: Some(tokio::time::Instant::now() + Duration::from_millis(120)),
            ..params()
        };

        let set = join_serial(Arc::new("in".to_string()), &group, params).await;

        assert_eq!(set.value("a"), Some(&"a:in".to_string()));
        assert_eq!(set.get("b"), Some(&TaskOutcome::TimedOut));
        assert_eq!(set.get("c"), Some(&TaskOutcome::TimedOut));
    }
}
