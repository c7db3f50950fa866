//! # Commit Node
//!
//! Edits to a record are staged on a working copy of the tree and only reach
//! the baseline on an explicit commit. Both copies are independent clones of
//! the same [`RecordTree`], so the node's [`RecordId`] is valid in either.
//!
//! ```text
//! baseline ──clone──► working ──update_working_property()──► working'
//!     ▲                                                         │
//!     └─────────────── copy_working_to_baseline() ──────────────┘   (commit)
//!     working' ◄────── copy_baseline_to_working() ── baseline       (rollback)
//! ```
//!
//! Flags:
//! - `is_locally_modified`: the property touched by the last edit differs
//!   from the baseline on this record.
//! - `is_modified`: any record of the subtree differs from the baseline
//!   (provenance ignored).

use crate::error::Result;
use crate::model::{PropertyValue, Record, RecordId, RecordTree};

#[derive(Debug, Clone)]
pub struct CommitNode {
    id: RecordId,
    baseline: RecordTree,
    working: RecordTree,
    is_locally_modified: bool,
    is_modified: bool,
}

impl CommitNode {
    /// Wrap `tree` for editing the record `id`.
    pub fn new(tree: RecordTree, id: RecordId) -> Result<Self> {
        tree.get(id)?;
        let working = tree.clone();
        Ok(Self {
            id,
            baseline: tree,
            working,
            is_locally_modified: false,
            is_modified: false,
        })
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn baseline(&self) -> &RecordTree {
        &self.baseline
    }

    pub fn working(&self) -> &RecordTree {
        &self.working
    }

    pub fn baseline_record(&self) -> Result<&Record> {
        self.baseline.get(self.id)
    }

    pub fn working_record(&self) -> Result<&Record> {
        self.working.get(self.id)
    }

    pub fn is_locally_modified(&self) -> bool {
        self.is_locally_modified
    }

    pub fn is_modified(&self) -> bool {
        self.is_modified
    }

    /// Discard working edits.
    pub fn copy_baseline_to_working(&mut self) {
        self.working = self.baseline.clone();
        self.clear_flags();
    }

    /// Commit working edits.
    pub fn copy_working_to_baseline(&mut self) {
        self.baseline = self.working.clone();
        self.clear_flags();
    }

    pub fn update_working_property(&mut self, name: &str, value: PropertyValue) -> Result<()> {
        self.working.set_local(self.id, name, value)?;
        self.refresh_flags(name);
        Ok(())
    }

    pub fn inherit_working_property(&mut self, name: &str) -> Result<()> {
        self.working.inherit_from_parent(self.id, name)?;
        self.refresh_flags(name);
        Ok(())
    }

    /// Names of properties on this record whose working value differs from
    /// the baseline.
    pub fn changed_properties(&self) -> Vec<String> {
        let (Ok(baseline), Ok(working)) = (self.baseline_record(), self.working_record()) else {
            return Vec::new();
        };
        let mut names: Vec<String> = working
            .properties()
            .filter(|prop| baseline.value(&prop.name) != Some(&prop.value))
            .map(|prop| prop.name.clone())
            .collect();
        names.extend(
            baseline
                .properties()
                .filter(|prop| working.property(&prop.name).is_none())
                .map(|prop| prop.name.clone()),
        );
        names
    }

    /// Give up the node and keep the baseline tree.
    pub fn into_baseline(self) -> RecordTree {
        self.baseline
    }

    fn refresh_flags(&mut self, name: &str) {
        let baseline_value = self.baseline_record().ok().and_then(|r| r.value(name));
        let working_value = self.working_record().ok().and_then(|r| r.value(name));
        self.is_locally_modified = baseline_value != working_value;
        self.is_modified = !self
            .baseline
            .subtree_eq(self.id, &self.working, self.id);
    }

    fn clear_flags(&mut self) {
        self.is_locally_modified = false;
        self.is_modified = false;
    }
}
