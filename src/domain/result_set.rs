//! Ordered, label-keyed results of one run.

use serde::{Deserialize, Serialize};

use super::outcome::TaskOutcome;

/// One labelled slot of a result set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultEntry<T> {
    /// Label of the task that owns this slot
    pub label: String,

    #[serde(flatten)]
    pub outcome: TaskOutcome<T>,
}

/// Results of a run in declaration order.
///
/// Only the orchestrator builds result sets, and only once every slot has an
/// outcome, so a caller never sees a partially populated set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSet<T> {
    entries: Vec<ResultEntry<T>>,
}

impl<T> Default for ResultSet<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> ResultSet<T> {
    /// A result set with no entries (the join over an empty group)
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub(crate) fn from_entries(entries: Vec<ResultEntry<T>>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an outcome by label
    pub fn get(&self, label: &str) -> Option<&TaskOutcome<T>> {
        self.entries
            .iter()
            .find(|e| e.label == label)
            .map(|e| &e.outcome)
    }

    /// Look up a completed value by label
    pub fn value(&self, label: &str) -> Option<&T> {
        self.get(label).and_then(TaskOutcome::value)
    }

    /// Labels in declaration order
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.label.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResultEntry<T>> {
        self.entries.iter()
    }

    /// True when every slot completed successfully
    pub fn is_complete(&self) -> bool {
        self.entries.iter().all(|e| e.outcome.is_completed())
    }

    /// Labels whose task did not complete
    pub fn unsuccessful(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| !e.outcome.is_completed())
            .map(|e| e.label.clone())
            .collect()
    }
}

impl<T> IntoIterator for ResultSet<T> {
    type Item = ResultEntry<T>;
    type IntoIter = std::vec::IntoIter<ResultEntry<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
