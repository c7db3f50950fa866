use super::DataStore;
use crate::error::Result;
use crate::model::RecordTree;

/// In-memory storage for testing and development.
/// Does NOT persist data.
#[derive(Default)]
pub struct InMemoryStore {
    tree: Option<RecordTree>,
    saves: usize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tree(tree: RecordTree) -> Self {
        Self {
            tree: Some(tree),
            saves: 0,
        }
    }

    /// How many times the tree was saved.
    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl DataStore for InMemoryStore {
    fn load_tree(&self) -> Result<Option<RecordTree>> {
        Ok(self.tree.clone())
    }

    fn save_tree(&mut self, tree: &RecordTree) -> Result<()> {
        self.tree = Some(tree.clone());
        self.saves += 1;
        Ok(())
    }
}

// --- Test Fixtures ---

#[cfg(any(test, feature = "test_utils"))]
pub mod fixtures {
    use super::*;
    use crate::model::{names, PropertyValue, RecordId, RecordKind, SnapshotPeriod};
    use chrono::{DateTime, FixedOffset};

    pub const SOURCE_SYSTEM: &str = "test-host";

    /// Builds record trees addressed by path.
    pub struct TreeFixture {
        pub tree: RecordTree,
    }

    impl Default for TreeFixture {
        fn default() -> Self {
            Self::new()
        }
    }

    impl TreeFixture {
        pub fn new() -> Self {
            Self {
                tree: RecordTree::with_defaults(SOURCE_SYSTEM),
            }
        }

        /// Add a dataset at `path`; the parent must already exist.
        pub fn with_dataset(mut self, path: &str, kind: RecordKind) -> Self {
            let (parent, name) = match path.rsplit_once('/') {
                Some((parent, name)) => (self.id(parent), name),
                None => (self.tree.root(), path),
            };
            self.tree.add_child(parent, name, kind).unwrap();
            self
        }

        pub fn with_property(mut self, path: &str, name: &str, raw: &str) -> Self {
            let id = self.id(path);
            let value = PropertyValue::parse(name, raw).unwrap();
            self.tree.set_local(id, name, value).unwrap();
            self
        }

        /// Enable snapshots (and pruning) on a dataset.
        pub fn enabled(self, path: &str) -> Self {
            self.with_property(path, names::ENABLED, "true")
                .with_property(path, names::PRUNE, "true")
        }

        pub fn with_snapshot(mut self, path: &str, name: &str, period: SnapshotPeriod, at: &str) -> Self {
            let id = self.id(path);
            self.tree.add_snapshot(id, name, period, ts(at)).unwrap();
            self
        }

        pub fn id(&self, path: &str) -> RecordId {
            self.tree.find(path).unwrap()
        }

        pub fn store(self) -> InMemoryStore {
            InMemoryStore::with_tree(self.tree)
        }
    }

    pub fn ts(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }
}
