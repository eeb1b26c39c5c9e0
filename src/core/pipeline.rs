//! Pipeline definitions and loading.
//!
//! A pipeline is defined in YAML: an ordered `setup` list whose final value
//! fans out to every `group` member.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::Task;

use super::actions::Action;
use super::policy::RunPolicy;

const ORDINALS: [&str; 8] = [
    "first", "second", "third", "fourth", "fifth", "sixth", "seventh", "eighth",
];

/// Widest demo group
pub const MAX_DEMO_WIDTH: usize = ORDINALS.len();

/// A complete pipeline definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSpec {
    /// Pipeline name
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Value handed to the first setup stage
    #[serde(default)]
    pub input: String,

    /// Overrides the configured run policy
    #[serde(default)]
    pub policy: Option<RunPolicy>,

    /// Stages executed in order
    #[serde(default)]
    pub setup: Vec<TaskSpec>,

    /// Members executed concurrently on the setup output
    #[serde(default)]
    pub group: Vec<TaskSpec>,
}

impl PipelineSpec {
    /// Load a pipeline from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline file: {}", path.display()))?;

        Self::from_yaml(&content)
    }

    /// Parse a pipeline from YAML content
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse pipeline YAML")
    }

    /// Validate the pipeline definition
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            anyhow::bail!("Pipeline name cannot be empty");
        }

        if self.setup.is_empty() && self.group.is_empty() {
            anyhow::bail!("Pipeline must have at least one setup stage or group member");
        }

        check_labels("setup", &self.setup)?;
        check_labels("group", &self.group)?;

        for spec in self.setup.iter().chain(&self.group) {
            spec.action()?;
        }

        Ok(())
    }

    /// Build the setup stages
    pub fn setup_tasks(&self) -> Result<Vec<Task<String>>> {
        self.setup.iter().map(TaskSpec::to_task).collect()
    }

    /// Build the group members
    pub fn group_tasks(&self) -> Result<Vec<Task<String>>> {
        self.group.iter().map(TaskSpec::to_task).collect()
    }

    /// Total declared duration if every task ran one after another
    pub fn serial_duration(&self) -> Duration {
        self.setup
            .iter()
            .chain(&self.group)
            .map(TaskSpec::duration)
            .sum()
    }

    /// Declared duration of the setup stages alone
    pub fn setup_duration(&self) -> Duration {
        self.setup.iter().map(TaskSpec::duration).sum()
    }

    /// Declared duration of the setup plus the slowest group member
    pub fn parallel_duration(&self) -> Duration {
        let setup = self.setup_duration();
        let slowest = self
            .group
            .iter()
            .map(TaskSpec::duration)
            .max()
            .unwrap_or_default();
        setup + slowest
    }

    /// The fetch / process / calculate demo.
    ///
    /// Fetches "Hi there" (2s), uppercases it (2s), then fans out to `width`
    /// members labelled "first".."eighth": a character count (3s), an E→e
    /// replacement (4s), and "<Ordinal> result for: <input>" for the rest,
    /// each one second slower than the previous.
    pub fn demo(width: usize) -> Self {
        let width = width.clamp(1, MAX_DEMO_WIDTH);

        let setup = vec![
            TaskSpec::new("fetch", ActionKind::Constant, 2000).with_value("Hi there"),
            TaskSpec::new("process", ActionKind::Uppercase, 2000),
        ];

        let group = ORDINALS
            .iter()
            .take(width)
            .enumerate()
            .map(|(i, label)| {
                let duration_ms = 3000 + 1000 * i as u64;
                match i {
                    0 => TaskSpec::new(*label, ActionKind::CountChars, duration_ms),
                    1 => TaskSpec::new(*label, ActionKind::Replace, duration_ms)
                        .with_replace("E", "e"),
                    _ => TaskSpec::new(*label, ActionKind::Format, duration_ms)
                        .with_template(format!("{} result for: {{input}}", capitalize(label))),
                }
            })
            .collect();

        Self {
            name: "demo".to_string(),
            description: "Fetch, process, then calculate".to_string(),
            input: String::new(),
            policy: None,
            setup,
            group,
        }
    }
}

fn check_labels(section: &str, specs: &[TaskSpec]) -> Result<()> {
    let mut seen = HashSet::new();
    for (i, spec) in specs.iter().enumerate() {
        if spec.label.is_empty() {
            anyhow::bail!("{} task {} has an empty label", section, i);
        }
        if !seen.insert(spec.label.as_str()) {
            anyhow::bail!("Duplicate {} label '{}'", section, spec.label);
        }
    }
    Ok(())
}

/// Uppercase the first character of a label
pub(crate) fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Name of a built-in action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Identity,
    Constant,
    Uppercase,
    Lowercase,
    CountChars,
    Replace,
    Format,
    Fail,
}

/// A single task in a pipeline file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Task label (unique within its section)
    pub label: String,

    /// Built-in action to perform
    pub action: ActionKind,

    /// Simulated latency in milliseconds
    #[serde(default)]
    pub duration_ms: u64,

    /// Value for `constant`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Pattern for `replace`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,

    /// Replacement for `replace`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,

    /// Template for `format`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,

    /// Error message for `fail`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TaskSpec {
    pub fn new(label: impl Into<String>, action: ActionKind, duration_ms: u64) -> Self {
        Self {
            label: label.into(),
            action,
            duration_ms,
            value: None,
            from: None,
            to: None,
            template: None,
            message: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_replace(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self.to = Some(to.into());
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// Resolve the action and its parameters
    pub fn action(&self) -> Result<Action> {
        let action = match self.action {
            ActionKind::Identity => Action::Identity,
            ActionKind::Constant => Action::Constant(self.require("value", &self.value)?),
            ActionKind::Uppercase => Action::Uppercase,
            ActionKind::Lowercase => Action::Lowercase,
            ActionKind::CountChars => Action::CountChars,
            ActionKind::Replace => {
                let from = self.require("from", &self.from)?;
                if from.is_empty() {
                    anyhow::bail!("Task '{}': 'from' cannot be empty", self.label);
                }
                Action::Replace {
                    from,
                    to: self.to.clone().unwrap_or_default(),
                }
            }
            ActionKind::Format => Action::Format {
                template: self.require("template", &self.template)?,
            },
            ActionKind::Fail => Action::Fail {
                message: self
                    .message
                    .clone()
                    .unwrap_or_else(|| format!("task '{}' failed", self.label)),
            },
        };
        Ok(action)
    }

    fn require(&self, field: &str, value: &Option<String>) -> Result<String> {
        value.clone().ok_or_else(|| {
            anyhow::anyhow!(
                "Task '{}' ({:?}) requires '{}'",
                self.label,
                self.action,
                field
            )
        })
    }

    /// Build a runnable task
    pub fn to_task(&self) -> Result<Task<String>> {
        let action = self.action()?;
        Ok(Task::new(self.label.clone(), move |input: &String| action.apply(input))
            .with_duration(self.duration()))
    }
}
