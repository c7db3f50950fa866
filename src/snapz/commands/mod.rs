//! # Commands
//!
//! One module per operation. Each exposes plain functions of the form
//! `run(store, ...) -> Result<CmdResult>`: load the tree from the
//! [`DataStore`](crate::store::DataStore), do the work, save when something
//! changed. Commands never print; they describe what happened in
//! [`CmdResult`] and leave presentation to the caller.
//!
//! Per-item runner failures during `take`/`prune` do not abort the batch.
//! They are collected in [`CmdResult::failures`] and the remaining datasets
//! are still processed.

use chrono::{DateTime, FixedOffset};

use crate::error::SnapzError;
use crate::model::{RecordKind, RecursionMode};

pub mod discover;
pub mod list;
pub mod properties;
pub mod prune;
pub mod records;
pub mod take;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct CmdMessage {
    pub level: MessageLevel,
    pub content: String,
}

impl CmdMessage {
    pub fn info(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Info,
            content: content.into(),
        }
    }

    pub fn success(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Success,
            content: content.into(),
        }
    }

    pub fn warning(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Warning,
            content: content.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Error,
            content: content.into(),
        }
    }
}

/// One row of `snapz list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSummary {
    pub path: String,
    pub kind: RecordKind,
    pub enabled: bool,
    pub take: bool,
    pub prune: bool,
    pub recursion: RecursionMode,
    pub snapshot_count: usize,
    pub latest_snapshot: Option<DateTime<FixedOffset>>,
}

/// Where a property value shown by `snapz get` comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertySource {
    Local,
    /// Inherited from the record at this path.
    Inherited(String),
    /// Inherited from the root defaults.
    Default,
    /// Fixed snapshot identity.
    Identity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyView {
    pub name: String,
    pub value: String,
    pub source: PropertySource,
}

#[derive(Debug, Default)]
pub struct CmdResult {
    /// Paths of records created, destroyed or changed.
    pub affected: Vec<String>,
    pub listed: Vec<DatasetSummary>,
    pub properties: Vec<PropertyView>,
    pub failures: Vec<SnapzError>,
    pub messages: Vec<CmdMessage>,
}

impl CmdResult {
    pub fn add_message(&mut self, message: CmdMessage) {
        self.messages.push(message);
    }

    pub fn add_failure(&mut self, error: SnapzError) {
        self.messages.push(CmdMessage::error(error.to_string()));
        self.failures.push(error);
    }

    pub fn with_listed(mut self, listed: Vec<DatasetSummary>) -> Self {
        self.listed = listed;
        self
    }

    pub fn with_properties(mut self, properties: Vec<PropertyView>) -> Self {
        self.properties = properties;
        self
    }

    /// Append everything from `other`, keeping order.
    pub fn merge(mut self, other: CmdResult) -> Self {
        self.affected.extend(other.affected);
        self.listed.extend(other.listed);
        self.properties.extend(other.properties);
        self.failures.extend(other.failures);
        self.messages.extend(other.messages);
        self
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Split `a/b/c` into (`a/b`, `c`). Top-level names have an empty parent.
pub(crate) fn split_dataset_path(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some((parent, leaf)) => (parent, leaf),
        None => ("", path),
    }
}
