//! # Storage Layer
//!
//! The [`DataStore`] trait persists the whole [`RecordTree`]: datasets, the
//! snapshots snapz took of them and every local property, including the
//! `snapshot:last-*` timestamps the scheduler reads on the next run.
//!
//! ## Implementations
//!
//! - [`fs::FileStore`]: the tree as pretty-printed JSON in a single state file.
//!   Writes go to a sibling temp file that is renamed over the original.
//! - [`memory::InMemoryStore`]: in-memory storage for testing.
//!
//! A store that has never been written returns `None` from
//! [`DataStore::load_tree`]; callers start from a fresh tree with defaults.

use crate::error::Result;
use crate::model::RecordTree;

pub mod fs;
pub mod memory;

/// Abstract interface for record tree persistence.
pub trait DataStore {
    /// Load the persisted tree, if any.
    fn load_tree(&self) -> Result<Option<RecordTree>>;

    /// Replace the persisted tree.
    fn save_tree(&mut self, tree: &RecordTree) -> Result<()>;

    /// Load the persisted tree, or a fresh one with the standard defaults.
    fn load_or_default(&self, source_system: &str) -> Result<RecordTree> {
        Ok(self
            .load_tree()?
            .unwrap_or_else(|| RecordTree::with_defaults(source_system)))
    }
}
