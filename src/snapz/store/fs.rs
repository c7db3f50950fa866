use super::DataStore;
use crate::error::Result;
use crate::model::RecordTree;
use std::fs;
use std::path::{Path, PathBuf};

pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl DataStore for FileStore {
    fn load_tree(&self) -> Result<Option<RecordTree>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        let tree: RecordTree = serde_json::from_str(&content)?;
        Ok(Some(tree))
    }

    fn save_tree(&mut self, tree: &RecordTree) -> Result<()> {
        self.ensure_parent_dir()?;
        let content = serde_json::to_string_pretty(tree)?;
        let temp = self.temp_path();
        fs::write(&temp, content)?;
        fs::rename(&temp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{names, PropertyValue, RecordKind, SnapshotPeriod};
    use chrono::DateTime;

    #[test]
    fn missing_state_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("state.json"));
        assert!(store.load_tree().unwrap().is_none());
        let tree = store.load_or_default("host-a").unwrap();
        assert_eq!(tree.record_count(), 1);
    }

    #[test]
    fn save_and_load_preserves_tree() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(dir.path().join("nested").join("state.json"));

        let mut tree = RecordTree::with_defaults("host-a");
        let tank = tree.add_child(tree.root(), "tank", RecordKind::Pool).unwrap();
        let home = tree.add_child(tank, "home", RecordKind::FileSystem).unwrap();
        tree.set_local(tank, names::ENABLED, PropertyValue::Bool(true))
            .unwrap();
        let ts = DateTime::parse_from_rfc3339("2024-03-01T10:15:00.1234567+01:00").unwrap();
        tree.add_snapshot(home, "s1", SnapshotPeriod::Hourly, ts)
            .unwrap();
        store.save_tree(&tree).unwrap();

        let loaded = store.load_tree().unwrap().unwrap();
        assert!(tree.subtree_eq(tree.root(), &loaded, loaded.root()));
        let snap = loaded.find("tank/home@s1").unwrap();
        let info = loaded.get(snap).unwrap().snapshot_info().unwrap();
        assert_eq!(info.timestamp(), ts);
        let prop = loaded.resolve_property(home, names::ENABLED).unwrap();
        assert_eq!(prop.inherited_from, Some(tank));
        assert!(!dir.path().join("nested").join("state.json.tmp").exists());
    }

    #[test]
    fn corrupt_state_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();
        let store = FileStore::new(path);
        assert!(matches!(
            store.load_tree(),
            Err(crate::error::SnapzError::Serialization(_))
        ));
    }
}
