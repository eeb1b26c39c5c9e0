//! Command-line interface for fanjoin.
//!
//! Runs the built-in fetch/process/calculate demo in series or in parallel,
//! runs pipelines from YAML files, and shows the resolved configuration.
//! Results are rendered by the main thread through a `MainQueue`.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::error;

use crate::adapters::MainQueue;
use crate::config::config;
use crate::core::pipeline::capitalize;
use crate::core::{FailurePolicy, Orchestrator, PipelineSpec, RunPolicy};
use crate::domain::task::scaled;
use crate::domain::{ResultSet, TaskOutcome};

/// fanjoin - sequential setup, parallel fan-out, single completion
#[derive(Parser, Debug)]
#[command(name = "fanjoin")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the demo with every calculation one after another
    Sequential {
        #[command(flatten)]
        demo: DemoArgs,
    },

    /// Run the demo with the calculations in parallel
    Parallel {
        #[command(flatten)]
        demo: DemoArgs,
    },

    /// Run a pipeline from a YAML file
    Run {
        /// Pipeline file
        file: PathBuf,

        /// Execution mode
        #[arg(short, long, value_enum, default_value = "parallel")]
        mode: Mode,

        #[command(flatten)]
        overrides: PolicyArgs,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show resolved configuration (debug)
    Config,
}

#[derive(clap::Args, Debug)]
pub struct DemoArgs {
    /// Number of calculations in the group (1-8)
    #[arg(short, long)]
    width: Option<usize>,

    #[command(flatten)]
    overrides: PolicyArgs,

    /// Print results as JSON
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args, Debug, Default)]
pub struct PolicyArgs {
    /// Multiply every simulated delay by this factor
    #[arg(long, env = "FANJOIN_TIME_SCALE")]
    scale: Option<f64>,

    /// Release the join after this many milliseconds
    #[arg(long)]
    deadline_ms: Option<u64>,

    /// Stop waiting for siblings after the first failure
    #[arg(long)]
    fail_fast: bool,
}

impl PolicyArgs {
    fn apply(&self, mut policy: RunPolicy) -> RunPolicy {
        if let Some(scale) = self.scale {
            policy.time_scale = scale;
        }
        if let Some(ms) = self.deadline_ms {
            policy.deadline_ms = Some(ms);
        }
        if self.fail_fast {
            policy.failure_policy = FailurePolicy::FailFast;
        }
        policy
    }
}

/// How a pipeline's tasks are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Setup stages only, one result
    Sequential,

    /// Setup, then the group concurrently
    Parallel,

    /// Setup, then the group one member at a time
    Series,
}

impl Cli {
    /// Execute the CLI command on a runtime of its own.
    ///
    /// Workers released by a deadline or fail-fast may still be sleeping on
    /// the blocking pool; the runtime is shut down without waiting for them.
    pub fn run(self) -> Result<()> {
        let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;

        let result = runtime.block_on(self.execute());
        runtime.shutdown_background();
        result
    }

    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Sequential { demo } => run_demo(Mode::Series, demo).await,
            Commands::Parallel { demo } => run_demo(Mode::Parallel, demo).await,
            Commands::Run {
                file,
                mode,
                overrides,
                json,
            } => run_file(&file, mode, &overrides, json).await,
            Commands::Config => show_config(),
        }
    }
}

async fn run_demo(mode: Mode, args: DemoArgs) -> Result<()> {
    let config = config()?;
    let pipeline = PipelineSpec::demo(args.width.unwrap_or(config.demo_width));
    let policy = args.overrides.apply(config.policy.clone());

    execute_pipeline(&pipeline, mode, policy, args.json).await
}

async fn run_file(file: &Path, mode: Mode, overrides: &PolicyArgs, json: bool) -> Result<()> {
    let config = config()?;
    let pipeline = PipelineSpec::from_file(file)?;
    let base = pipeline
        .policy
        .clone()
        .unwrap_or_else(|| config.policy.clone());
    let policy = overrides.apply(base);

    execute_pipeline(&pipeline, mode, policy, json).await
}

/// Start a run, then act as the display sink until its handler has run
async fn execute_pipeline(
    pipeline: &PipelineSpec,
    mode: Mode,
    policy: RunPolicy,
    json: bool,
) -> Result<()> {
    pipeline.validate()?;
    policy.validate()?;

    let setup = pipeline.setup_tasks()?;
    let group = pipeline.group_tasks()?;
    let input = pipeline.input.clone();

    let time_scale = policy.time_scale;
    let (queue, mut main_loop) = MainQueue::new();
    let orchestrator = Orchestrator::new()
        .with_policy(policy)
        .with_completion_context(queue);

    let render = move |results: ResultSet<String>| {
        if json {
            match serde_json::to_string_pretty(&results) {
                Ok(text) => println!("{}", text),
                Err(e) => error!(error = %e, "Failed to serialize results"),
            }
        } else {
            println!("{}", summarize(&results));
        }
    };

    let started = Instant::now();
    eprintln!("Working on '{}' ({:?})...", pipeline.name, mode);
    eprintln!("{}", expectation(pipeline, mode, time_scale));

    let handle = match mode {
        Mode::Sequential => orchestrator.run_sequential(input, setup, render),
        Mode::Parallel => orchestrator.run_parallel(input, setup, group, render),
        Mode::Series => orchestrator.run_in_series(input, setup, group, render),
    }
    .context("Failed to start run")?;

    // Only the run task keeps the queue alive now
    drop(orchestrator);

    if !main_loop.turn().await {
        anyhow::bail!("Run {} ended without delivering results", handle.run_id());
    }
    handle.wait().await;

    eprintln!(
        "Completed in {:.2} seconds",
        started.elapsed().as_secs_f64()
    );
    Ok(())
}

/// Describe how long the run should take, next to its one-at-a-time cost
fn expectation(pipeline: &PipelineSpec, mode: Mode, time_scale: f64) -> String {
    let secs = |d: Duration| scaled(d, time_scale).as_secs_f64();
    let serial = secs(pipeline.serial_duration());
    match mode {
        Mode::Sequential => format!("Expected ~{:.2}s", secs(pipeline.setup_duration())),
        Mode::Parallel => format!(
            "Expected ~{:.2}s (in series ~{:.2}s)",
            secs(pipeline.parallel_duration()),
            serial
        ),
        Mode::Series => format!("Expected ~{:.2}s", serial),
    }
}

/// Render results as "Label: [value]" lines in declaration order
pub fn summarize(results: &ResultSet<String>) -> String {
    results
        .iter()
        .map(|entry| {
            let shown = match &entry.outcome {
                TaskOutcome::Completed { value } => format!("[{}]", value),
                TaskOutcome::Failed { error } => format!("failed: {}", error),
                TaskOutcome::TimedOut => "timed out".to_string(),
                TaskOutcome::Skipped { reason } => format!("skipped: {}", reason),
            };
            format!("{}: {}", capitalize(&entry.label), shown)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Show resolved configuration
fn show_config() -> Result<()> {
    let config = config()?;

    println!("fanjoin configuration");
    println!("=====================");
    match &config.config_file {
        Some(path) => println!("Config file:    {}", path.display()),
        None => println!("Config file:    (none, using defaults)"),
    }
    println!("Time scale:     {}", config.policy.time_scale);
    match config.policy.deadline_ms {
        Some(ms) => println!("Deadline:       {} ms", ms),
        None => println!("Deadline:       none"),
    }
    println!("Failure policy: {:?}", config.policy.failure_policy);
    println!("Demo width:     {}", config.demo_width);

    Ok(())
}
