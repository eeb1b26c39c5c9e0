//! Pipeline Integration Tests
//!
//! Declarative pipelines loaded from YAML and the built-in demo, run end to
//! end through the orchestrator.

use std::io::Write;

use fanjoin::adapters::NoopObserver;
use fanjoin::cli::summarize;
use fanjoin::core::{ActionKind, PipelineSpec, TaskSpec};
use fanjoin::{Orchestrator, RunPolicy, RunState, TaskOutcome};
use tempfile::NamedTempFile;

fn instant() -> Orchestrator {
    Orchestrator::new()
        .with_observer(NoopObserver)
        .with_policy(RunPolicy::default().with_time_scale(0.0))
}

#[tokio::test]
async fn test_demo_pipeline_results() {
    let demo = PipelineSpec::demo(3);

    let report = instant()
        .execute_parallel(
            demo.input.clone(),
            demo.setup_tasks().unwrap(),
            demo.group_tasks().unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        summarize(&report.results),
        "First: [Number of chars: 8]\nSecond: [HI THeRe]\nThird: [Third result for: HI THERE]"
    );
}

#[tokio::test]
async fn test_demo_series_matches_parallel() {
    let demo = PipelineSpec::demo(8);
    let orch = instant();

    let parallel = orch
        .execute_parallel(
            demo.input.clone(),
            demo.setup_tasks().unwrap(),
            demo.group_tasks().unwrap(),
        )
        .await
        .unwrap();
    let series = orch
        .execute_in_series(
            demo.input.clone(),
            demo.setup_tasks().unwrap(),
            demo.group_tasks().unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(parallel.results, series.results);
    assert_eq!(
        parallel.results.value("eighth"),
        Some(&"Eighth result for: HI THERE".to_string())
    );
}

#[tokio::test]
async fn test_pipeline_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
name: shout
input: hello world
setup:
  - label: upper
    action: uppercase
    duration_ms: 10
group:
  - label: count
    action: count_chars
  - label: wrap
    action: format
    template: "<<{{input}}>>"
  - label: broken
    action: fail
    message: disk full
"#
    )
    .unwrap();

    let pipeline = PipelineSpec::from_file(file.path()).unwrap();
    pipeline.validate().unwrap();

    let report = instant()
        .execute_parallel(
            pipeline.input.clone(),
            pipeline.setup_tasks().unwrap(),
            pipeline.group_tasks().unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        report.results.value("count"),
        Some(&"Number of chars: 11".to_string())
    );
    assert_eq!(
        report.results.value("wrap"),
        Some(&"<<HELLO WORLD>>".to_string())
    );
    assert_eq!(
        report.results.get("broken"),
        Some(&TaskOutcome::Failed {
            error: "disk full".to_string()
        })
    );
    assert_eq!(
        summarize(&report.results).lines().last(),
        Some("Broken: failed: disk full")
    );
    assert!(matches!(report.run.state, RunState::PartiallyFailed { .. }));
}

#[tokio::test]
async fn test_sequential_pipeline_from_specs() {
    let pipeline = PipelineSpec {
        name: "chain".to_string(),
        description: String::new(),
        input: "abc".to_string(),
        policy: None,
        setup: vec![
            TaskSpec::new("upper", ActionKind::Uppercase, 0),
            TaskSpec::new("swap", ActionKind::Replace, 0).with_replace("B", "-"),
            TaskSpec::new("count", ActionKind::CountChars, 0),
        ],
        group: vec![],
    };
    pipeline.validate().unwrap();

    let report = instant()
        .execute_sequential(pipeline.input.clone(), pipeline.setup_tasks().unwrap())
        .await
        .unwrap();

    assert_eq!(
        report.results.value("count"),
        Some(&"Number of chars: 3".to_string())
    );
}

#[test]
fn test_fail_action_default_message() {
    let task = TaskSpec::new("oops", ActionKind::Fail, 0).to_task().unwrap();
    let err = task.execute_blocking(&String::new(), 1.0).unwrap_err();
    assert_eq!(err.to_string(), "task 'oops' failed");

    let task = TaskSpec::new("oops", ActionKind::Fail, 0)
        .with_message("custom")
        .to_task()
        .unwrap();
    assert_eq!(
        task.execute_blocking(&String::new(), 1.0).unwrap_err().to_string(),
        "custom"
    );
}
