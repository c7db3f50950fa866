//! # Record Tree and Property Inheritance
//!
//! The tree is an arena: records live in a `Vec` and refer to each other by
//! [`RecordId`]. A parent owns its children through the arena; the child's
//! `parent` link and every property's provenance are plain ids, so removing a
//! subtree never leaves anything holding it alive.
//!
//! ## Inheritance
//!
//! Properties cascade down the tree. A property is either *local* (set on the
//! record itself) or *inherited*, in which case it carries the id of the
//! nearest ancestor that holds it locally.
//!
//! Propagation is eager: [`RecordTree::set_local`] and
//! [`RecordTree::inherit_from_parent`] push the new value into every descendant
//! that does not override it, stopping at descendants that hold the property
//! locally. After any mutation the stored values are already what
//! [`RecordTree::resolve`] would compute.
//!
//! ```text
//! (root)            snapshot:recursion = snapz   (local)
//!  └── tank         snapshot:recursion = zfs     (local)
//!       ├── home    snapshot:recursion = zfs     (inherited from tank)
//!       └── vm      snapshot:recursion = snapz   (local)
//! ```
//!
//! ## Paths
//!
//! Datasets are addressed by their ZFS path (`tank/home/alice`), snapshots by
//! `dataset@name`. The root has the empty path.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::period::SnapshotPeriod;
use super::property::{
    check_text, is_snapshot_identity, root_defaults, value_kind, Property, PropertyValue, RecursionMode,
    ValueKind,
};
use super::record::{Record, RecordId, RecordKind, SnapshotInfo};
use crate::error::{Result, SnapzError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordTree {
    records: Vec<Option<Record>>,
    root: RecordId,
}

impl RecordTree {
    /// Create a tree whose root holds `defaults` as local properties.
    pub fn new<I, K>(defaults: I) -> Self
    where
        I: IntoIterator<Item = (K, PropertyValue)>,
        K: Into<String>,
    {
        let mut root = Record::new(String::new(), RecordKind::Root, None);
        for (name, value) in defaults {
            let name = name.into();
            root.properties
                .insert(name.clone(), Property::local(name, value));
        }
        Self {
            records: vec![Some(root)],
            root: RecordId(0),
        }
    }

    /// A tree whose root carries the standard snapz defaults.
    pub fn with_defaults(source_system: &str) -> Self {
        Self::new(root_defaults(source_system))
    }

    pub fn root(&self) -> RecordId {
        self.root
    }

    pub fn get(&self, id: RecordId) -> Result<&Record> {
        self.records
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or_else(|| SnapzError::RecordNotFound(id.to_string()))
    }

    pub(crate) fn get_mut(&mut self, id: RecordId) -> Result<&mut Record> {
        self.records
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or_else(|| SnapzError::RecordNotFound(id.to_string()))
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.get(id).is_ok()
    }

    /// Number of live records, root included.
    pub fn record_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_some()).count()
    }

    /// Full ZFS-style path of a record.
    pub fn path(&self, id: RecordId) -> String {
        let Ok(record) = self.get(id) else {
            return id.to_string();
        };
        match record.parent {
            None => String::new(),
            Some(parent) if parent == self.root => record.name.clone(),
            Some(parent) => {
                let separator = if record.kind == RecordKind::Snapshot {
                    '@'
                } else {
                    '/'
                };
                format!("{}{}{}", self.path(parent), separator, record.name)
            }
        }
    }

    /// Look a record up by path. The empty path is the root.
    pub fn find(&self, path: &str) -> Option<RecordId> {
        let path = path.trim();
        if path.is_empty() {
            return Some(self.root);
        }
        let (dataset, snapshot) = match path.split_once('@') {
            Some((dataset, snapshot)) => (dataset, Some(snapshot)),
            None => (path, None),
        };

        let mut current = self.root;
        for segment in dataset.split('/') {
            current = self.get(current).ok()?.child(segment)?;
        }
        match snapshot {
            Some(name) => {
                let id = self.get(current).ok()?.child(name)?;
                (self.get(id).ok()?.kind == RecordKind::Snapshot).then_some(id)
            }
            None => Some(current),
        }
    }

    /// Resolve a path or fail with `RecordNotFound`.
    pub fn lookup(&self, path: &str) -> Result<RecordId> {
        self.find(path)
            .ok_or_else(|| SnapzError::RecordNotFound(path.to_string()))
    }

    /// Ancestors of `id`, nearest first, ending at the root.
    pub fn ancestors(&self, id: RecordId) -> Vec<RecordId> {
        let mut out = Vec::new();
        let mut current = self.get(id).ok().and_then(|r| r.parent);
        while let Some(ancestor) = current {
            out.push(ancestor);
            current = self.get(ancestor).ok().and_then(|r| r.parent);
        }
        out
    }

    /// All descendants of `id` in pre-order, `id` excluded.
    pub fn descendants(&self, id: RecordId) -> Vec<RecordId> {
        let mut out = Vec::new();
        let mut stack: Vec<RecordId> = self.child_ids(id).into_iter().rev().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.child_ids(next).into_iter().rev());
        }
        out
    }

    fn child_ids(&self, id: RecordId) -> Vec<RecordId> {
        self.get(id)
            .map(|r| r.children.values().copied().collect())
            .unwrap_or_default()
    }

    /// Every pool, filesystem and volume, parents before children.
    pub fn datasets(&self) -> Vec<RecordId> {
        self.descendants(self.root)
            .into_iter()
            .filter(|id| self.get(*id).map(|r| r.kind.is_dataset()).unwrap_or(false))
            .collect()
    }

    /// Snapshots taken directly of `dataset`.
    pub fn snapshots_of(&self, dataset: RecordId) -> Vec<RecordId> {
        self.child_ids(dataset)
            .into_iter()
            .filter(|id| {
                self.get(*id)
                    .map(|r| r.kind == RecordKind::Snapshot)
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Add a record under `parent`. It starts out inheriting every property
    /// the parent has.
    pub fn add_child(&mut self, parent: RecordId, name: &str, kind: RecordKind) -> Result<RecordId> {
        validate_leaf_name(name)?;
        let parent_record = self.get(parent)?;
        if !parent_record.kind.accepts_child(kind) {
            return Err(SnapzError::InvalidHierarchy(format!(
                "a {} cannot contain a {} ({})",
                parent_record.kind,
                kind,
                name
            )));
        }
        if parent_record.children.contains_key(name) {
            let path = self.path(parent);
            return Err(SnapzError::DuplicateRecord(if path.is_empty() {
                name.to_string()
            } else {
                format!("{}/{}", path, name)
            }));
        }

        let mut record = Record::new(name.to_string(), kind, Some(parent));
        for (prop_name, prop) in &parent_record.properties {
            let source = provenance_for_child(parent, prop);
            record.properties.insert(
                prop_name.clone(),
                Property::inherited(prop_name.clone(), prop.value.clone(), source),
            );
        }

        let id = match self.records.iter().position(Option::is_none) {
            Some(free) => {
                self.records[free] = Some(record);
                RecordId(free)
            }
            None => {
                self.records.push(Some(record));
                RecordId(self.records.len() - 1)
            }
        };
        self.get_mut(parent)?.children.insert(name.to_string(), id);
        Ok(id)
    }

    /// Add a snapshot of `dataset`. Period and timestamp are fixed from here on.
    pub fn add_snapshot(
        &mut self,
        dataset: RecordId,
        name: &str,
        period: SnapshotPeriod,
        timestamp: DateTime<FixedOffset>,
    ) -> Result<RecordId> {
        let id = self.add_child(dataset, name, RecordKind::Snapshot)?;
        self.get_mut(id)?.snapshot = Some(SnapshotInfo::new(period, timestamp));
        Ok(id)
    }

    /// Remove a record and its whole subtree.
    ///
    /// Freed slots are reused by later insertions and trailing ones are
    /// dropped, so the arena stays as large as its live records.
    pub fn remove(&mut self, id: RecordId) -> Result<Record> {
        if id == self.root {
            return Err(SnapzError::InvalidHierarchy(
                "the root record cannot be removed".to_string(),
            ));
        }
        let descendants = self.descendants(id);
        let record = self
            .records
            .get_mut(id.0)
            .and_then(Option::take)
            .ok_or_else(|| SnapzError::RecordNotFound(id.to_string()))?;
        for descendant in descendants {
            self.records[descendant.0] = None;
        }
        if let Some(parent) = record.parent {
            self.get_mut(parent)?.children.remove(&record.name);
        }
        while matches!(self.records.last(), Some(None)) {
            self.records.pop();
        }
        Ok(record)
    }

    /// Set a property locally on `id` and push it to inheriting descendants.
    ///
    /// Snapshot identity (`snapshot:period`, `snapshot:timestamp`) is rejected
    /// with `InvalidMutation` and left untouched.
    pub fn set_local(&mut self, id: RecordId, name: &str, value: PropertyValue) -> Result<()> {
        self.check_mutable(id, name)?;
        check_value_kind(name, &value)?;

        self.get_mut(id)?
            .properties
            .insert(name.to_string(), Property::local(name, value.clone()));
        self.propagate(id, name, &value, id);
        Ok(())
    }

    /// Drop the local value of `name` on `id` and take the parent's instead.
    pub fn inherit_from_parent(&mut self, id: RecordId, name: &str) -> Result<()> {
        self.check_mutable(id, name)?;
        let no_such_property = || SnapzError::NoSuchProperty {
            record: self.path(id),
            property: name.to_string(),
        };
        let parent = self.get(id)?.parent.ok_or_else(no_such_property)?;
        let parent_prop = self
            .get(parent)?
            .property(name)
            .ok_or_else(no_such_property)?;
        let source = provenance_for_child(parent, parent_prop);
        let value = parent_prop.value.clone();

        self.get_mut(id)?.properties.insert(
            name.to_string(),
            Property::inherited(name, value.clone(), source),
        );
        self.propagate(id, name, &value, source);
        Ok(())
    }

    fn check_mutable(&self, id: RecordId, name: &str) -> Result<()> {
        let record = self.get(id)?;
        if is_snapshot_identity(name) {
            return Err(if record.kind == RecordKind::Snapshot {
                SnapzError::InvalidMutation {
                    record: self.path(id),
                    property: name.to_string(),
                }
            } else {
                SnapzError::InvalidValue {
                    property: name.to_string(),
                    value: format!("only snapshots carry {}", name),
                }
            });
        }
        Ok(())
    }

    fn propagate(&mut self, from: RecordId, name: &str, value: &PropertyValue, source: RecordId) {
        let mut stack = self.child_ids(from);
        while let Some(child) = stack.pop() {
            let Some(Some(record)) = self.records.get_mut(child.0) else {
                continue;
            };
            if record.property(name).is_some_and(|p| p.is_local) {
                continue;
            }
            record.properties.insert(
                name.to_string(),
                Property::inherited(name, value.clone(), source),
            );
            stack.extend(record.children.values().copied());
        }
    }

    /// The property `name` in effect on `id`: its own entry if present,
    /// otherwise the nearest ancestor's local entry.
    pub fn resolve_property(&self, id: RecordId, name: &str) -> Result<&Property> {
        if let Some(prop) = self.get(id)?.property(name) {
            return Ok(prop);
        }
        for ancestor in self.ancestors(id) {
            if let Some(prop) = self.get(ancestor)?.property(name) {
                if prop.is_local {
                    return Ok(prop);
                }
            }
        }
        Err(SnapzError::PropertyNotFound {
            record: self.path(id),
            property: name.to_string(),
        })
    }

    pub fn resolve(&self, id: RecordId, name: &str) -> Result<&PropertyValue> {
        self.resolve_property(id, name).map(|p| &p.value)
    }

    pub fn resolve_bool(&self, id: RecordId, name: &str) -> Result<bool> {
        self.resolve_typed(id, name, PropertyValue::as_bool)
    }

    pub fn resolve_int(&self, id: RecordId, name: &str) -> Result<i64> {
        self.resolve_typed(id, name, PropertyValue::as_int)
    }

    pub fn resolve_timestamp(&self, id: RecordId, name: &str) -> Result<DateTime<FixedOffset>> {
        self.resolve_typed(id, name, PropertyValue::as_timestamp)
    }

    pub fn resolve_recursion(&self, id: RecordId, name: &str) -> Result<RecursionMode> {
        self.resolve_typed(id, name, PropertyValue::as_recursion)
    }

    fn resolve_typed<T>(
        &self,
        id: RecordId,
        name: &str,
        extract: impl Fn(&PropertyValue) -> Option<T>,
    ) -> Result<T> {
        let value = self.resolve(id, name)?;
        extract(value).ok_or_else(|| SnapzError::InvalidValue {
            property: name.to_string(),
            value: value.to_string(),
        })
    }

    /// Structural equality of the subtree at `id` with the one at `other_id`
    /// in `other`.
    pub fn subtree_eq(&self, id: RecordId, other: &RecordTree, other_id: RecordId) -> bool {
        let (Ok(a), Ok(b)) = (self.get(id), other.get(other_id)) else {
            return false;
        };
        if !a.content_eq(b) || a.children.len() != b.children.len() {
            return false;
        }
        a.children.iter().all(|(name, child)| match b.children.get(name) {
            Some(other_child) => self.subtree_eq(*child, other, *other_child),
            None => false,
        })
    }
}

fn provenance_for_child(parent: RecordId, prop: &Property) -> RecordId {
    if prop.is_local {
        parent
    } else {
        prop.inherited_from.unwrap_or(parent)
    }
}

fn validate_leaf_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(['/', '@']) || name.trim() != name {
        return Err(SnapzError::InvalidValue {
            property: "name".to_string(),
            value: name.to_string(),
        });
    }
    Ok(())
}

fn check_value_kind(name: &str, value: &PropertyValue) -> Result<()> {
    let matches = matches!(
        (value_kind(name), value),
        (ValueKind::Bool, PropertyValue::Bool(_))
            | (ValueKind::Int, PropertyValue::Int(_))
            | (ValueKind::Text, PropertyValue::Text(_))
            | (ValueKind::Timestamp, PropertyValue::Timestamp(_))
            | (ValueKind::Recursion, PropertyValue::Recursion(_))
    );
    if matches {
        match value {
            PropertyValue::Text(text) => check_text(name, text),
            _ => Ok(()),
        }
    } else {
        Err(SnapzError::InvalidValue {
            property: name.to_string(),
            value: value.to_string(),
        })
    }
}
