use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::period::SnapshotPeriod;
use super::property::{Property, PropertyValue};
use crate::error::SnapzError;

/// Index of a record inside its [`RecordTree`](super::tree::RecordTree).
///
/// Ids are only meaningful for the tree (or a clone of the tree) that issued
/// them. Parent links and provenance are ids, never owning references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub(crate) usize);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// Synthetic top of the tree; carries the defaults.
    Root,
    Pool,
    FileSystem,
    Volume,
    Snapshot,
}

impl RecordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::Root => "root",
            RecordKind::Pool => "pool",
            RecordKind::FileSystem => "filesystem",
            RecordKind::Volume => "volume",
            RecordKind::Snapshot => "snapshot",
        }
    }

    /// Whether a record of this kind may hold a child of kind `child`.
    pub fn accepts_child(self, child: RecordKind) -> bool {
        use RecordKind::*;
        match (self, child) {
            (Root, Pool) => true,
            (Pool | FileSystem, FileSystem | Volume) => true,
            (Pool | FileSystem | Volume, Snapshot) => true,
            _ => false,
        }
    }

    /// Datasets are the records snapshots are taken of.
    pub fn is_dataset(self) -> bool {
        matches!(
            self,
            RecordKind::Pool | RecordKind::FileSystem | RecordKind::Volume
        )
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = SnapzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pool" => Ok(RecordKind::Pool),
            "filesystem" | "fs" => Ok(RecordKind::FileSystem),
            "volume" | "vol" => Ok(RecordKind::Volume),
            "snapshot" | "snap" => Ok(RecordKind::Snapshot),
            other => Err(SnapzError::InvalidValue {
                property: "kind".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Identity of a snapshot; fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotInfo {
    period: SnapshotPeriod,
    timestamp: DateTime<FixedOffset>,
}

impl SnapshotInfo {
    pub fn new(period: SnapshotPeriod, timestamp: DateTime<FixedOffset>) -> Self {
        Self { period, timestamp }
    }

    pub fn period(&self) -> SnapshotPeriod {
        self.period
    }

    pub fn timestamp(&self) -> DateTime<FixedOffset> {
        self.timestamp
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub(crate) name: String,
    pub(crate) kind: RecordKind,
    pub(crate) properties: BTreeMap<String, Property>,
    pub(crate) children: BTreeMap<String, RecordId>,
    pub(crate) parent: Option<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) snapshot: Option<SnapshotInfo>,
}

impl Record {
    pub(crate) fn new(name: String, kind: RecordKind, parent: Option<RecordId>) -> Self {
        Self {
            name,
            kind,
            properties: BTreeMap::new(),
            children: BTreeMap::new(),
            parent,
            snapshot: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn parent(&self) -> Option<RecordId> {
        self.parent
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    pub fn properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.values()
    }

    pub fn value(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name).map(|p| &p.value)
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, RecordId)> {
        self.children.iter().map(|(name, id)| (name.as_str(), *id))
    }

    pub fn child(&self, name: &str) -> Option<RecordId> {
        self.children.get(name).copied()
    }

    pub fn snapshot_info(&self) -> Option<&SnapshotInfo> {
        self.snapshot.as_ref()
    }

    /// Structural equality: kind, name, snapshot identity and property values.
    /// Provenance, locality and child links are ignored.
    pub fn content_eq(&self, other: &Record) -> bool {
        self.kind == other.kind
            && self.name == other.name
            && self.snapshot == other.snapshot
            && self.properties.len() == other.properties.len()
            && self
                .properties
                .iter()
                .all(|(name, prop)| other.value(name) == Some(&prop.value))
    }
}
