use crate::commands::{split_dataset_path, CmdMessage, CmdResult};
use crate::error::{Result, SnapzError};
use crate::model::{names, PropertyValue, RecordId, RecordTree};
use crate::runner::{CommandRunner, SnapshotListing};
use crate::store::DataStore;

/// Mirror the datasets and tagged snapshots reported by the system into the
/// record tree.
///
/// Missing datasets are added. Records the system no longer reports are kept
/// and only reported, so their settings survive a temporarily missing pool.
/// Snapshots taken by an earlier install (or recorded in a lost state file)
/// are adopted with the tags they carry, so `prune` sees them again.
pub fn run<S: DataStore, R: CommandRunner>(
    store: &mut S,
    runner: &mut R,
    source_system: &str,
) -> Result<CmdResult> {
    let mut tree = store.load_or_default(source_system)?;
    let mut listing = runner.list_datasets()?;
    // A parent path always sorts before its descendants.
    listing.sort_by(|a, b| a.path.cmp(&b.path));

    let mut result = CmdResult::default();
    for dataset in &listing {
        if let Some(existing) = tree.find(&dataset.path) {
            let kind = tree.get(existing)?.kind();
            if kind != dataset.kind {
                result.add_message(CmdMessage::warning(format!(
                    "{} is recorded as {} but the system reports {}",
                    dataset.path, kind, dataset.kind
                )));
            }
            continue;
        }

        let (parent_path, leaf) = split_dataset_path(&dataset.path);
        let added = match tree.lookup(parent_path) {
            Ok(parent) => tree.add_child(parent, leaf, dataset.kind),
            Err(e) => Err(e),
        };
        match added {
            Ok(_) => {
                tracing::info!(dataset = %dataset.path, kind = %dataset.kind, "discovered dataset");
                result.affected.push(dataset.path.clone());
                result.add_message(CmdMessage::success(format!(
                    "Discovered {} {}",
                    dataset.kind, dataset.path
                )));
            }
            Err(e) => {
                tracing::warn!(dataset = %dataset.path, error = %e, "cannot record dataset");
                result.add_message(CmdMessage::warning(format!(
                    "Skipped {}: {}",
                    dataset.path, e
                )));
            }
        }
    }

    for listing in runner.list_snapshots()? {
        let path = listing.path();
        if tree.find(&path).is_some() {
            continue;
        }
        match adopt_snapshot(&mut tree, &listing) {
            Ok(_) => {
                tracing::info!(snapshot = %path, period = %listing.period, "discovered snapshot");
                result.affected.push(path.clone());
                result.add_message(CmdMessage::success(format!("Discovered snapshot {}", path)));
            }
            Err(e) => {
                tracing::warn!(snapshot = %path, error = %e, "cannot record snapshot");
                result.add_message(CmdMessage::warning(format!("Skipped {}: {}", path, e)));
            }
        }
    }

    for id in tree.datasets() {
        let path = tree.path(id);
        if !listing.iter().any(|d| d.path == path) {
            result.add_message(CmdMessage::warning(format!(
                "{} is no longer reported by the system",
                path
            )));
        }
    }

    if !result.affected.is_empty() {
        store.save_tree(&tree)?;
    } else {
        result.add_message(CmdMessage::info("No new datasets or snapshots found"));
    }
    Ok(result)
}

/// Record a listed snapshot with its tags pinned locally, or leave the tree
/// as it was.
fn adopt_snapshot(tree: &mut RecordTree, listing: &SnapshotListing) -> Result<RecordId> {
    let source_system = listing
        .source_system
        .clone()
        .ok_or_else(|| SnapzError::InvalidValue {
            property: names::SOURCE_SYSTEM.to_string(),
            value: "-".to_string(),
        })?;
    let dataset = tree.lookup(&listing.dataset)?;
    let snapshot = tree.add_snapshot(dataset, &listing.name, listing.period, listing.timestamp)?;

    let pinned = pin_tags(tree, snapshot, listing, source_system);
    if let Err(e) = pinned {
        tree.remove(snapshot)?;
        return Err(e);
    }
    Ok(snapshot)
}

fn pin_tags(
    tree: &mut RecordTree,
    snapshot: RecordId,
    listing: &SnapshotListing,
    source_system: String,
) -> Result<()> {
    let recursion = match listing.recursion {
        Some(mode) => PropertyValue::Recursion(mode),
        None => tree.resolve(snapshot, names::RECURSION)?.clone(),
    };
    tree.set_local(snapshot, names::RECURSION, recursion)?;
    tree.set_local(snapshot, names::SOURCE_SYSTEM, PropertyValue::Text(source_system))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::prune;
    use crate::model::{RecordKind, SnapshotPeriod};
    use crate::runner::fixtures::RecordingRunner;
    use crate::store::memory::fixtures::{ts, TreeFixture, SOURCE_SYSTEM};
    use crate::store::memory::InMemoryStore;

    #[test]
    fn adds_reported_datasets_parents_first() {
        let mut store = InMemoryStore::new();
        let mut runner = RecordingRunner::new()
            .with_dataset("tank/home/user", RecordKind::FileSystem)
            .with_dataset("tank", RecordKind::Pool)
            .with_dataset("tank/home", RecordKind::FileSystem)
            .with_dataset("tank/vm", RecordKind::Volume);

        let result = run(&mut store, &mut runner, SOURCE_SYSTEM).unwrap();

        assert_eq!(
            result.affected,
            vec!["tank", "tank/home", "tank/home/user", "tank/vm"]
        );
        let tree = store.load_tree().unwrap().unwrap();
        let vm = tree.lookup("tank/vm").unwrap();
        assert_eq!(tree.get(vm).unwrap().kind(), RecordKind::Volume);
    }

    #[test]
    fn known_datasets_are_left_alone() {
        let mut store = TreeFixture::new()
            .with_dataset("tank", RecordKind::Pool)
            .enabled("tank")
            .store();
        let mut runner = RecordingRunner::new().with_dataset("tank", RecordKind::Pool);

        let result = run(&mut store, &mut runner, SOURCE_SYSTEM).unwrap();

        assert!(result.affected.is_empty());
        assert_eq!(store.save_count(), 0);
    }

    #[test]
    fn tagged_snapshots_are_adopted() {
        let mut store = InMemoryStore::new();
        let mut runner = RecordingRunner::new()
            .with_dataset("tank", RecordKind::Pool)
            .with_dataset("tank/home", RecordKind::FileSystem)
            .with_snapshot(
                "tank/home@autosnap_2024-03-01_00:00:00_daily",
                SnapshotPeriod::Daily,
                "2024-03-01T00:00:00.0000000+00:00",
                "old-host",
            );

        let result = run(&mut store, &mut runner, SOURCE_SYSTEM).unwrap();

        assert!(result
            .affected
            .contains(&"tank/home@autosnap_2024-03-01_00:00:00_daily".to_string()));
        let tree = store.load_tree().unwrap().unwrap();
        let snap = tree
            .lookup("tank/home@autosnap_2024-03-01_00:00:00_daily")
            .unwrap();
        let info = tree.get(snap).unwrap().snapshot_info().unwrap();
        assert_eq!(info.period(), SnapshotPeriod::Daily);
        assert_eq!(info.timestamp(), ts("2024-03-01T00:00:00Z"));
        let tag = tree.resolve_property(snap, names::SOURCE_SYSTEM).unwrap();
        assert!(tag.is_local);
        assert_eq!(tag.value, PropertyValue::Text("old-host".into()));
        assert!(tree.resolve_property(snap, names::RECURSION).unwrap().is_local);
    }

    #[test]
    fn adopted_snapshots_are_pruned_again() {
        let mut store = TreeFixture::new()
            .with_dataset("tank", RecordKind::Pool)
            .enabled("tank")
            .with_property("tank", names::RETENTION_DAILY, "1")
            .store();
        let mut runner = RecordingRunner::new()
            .with_dataset("tank", RecordKind::Pool)
            .with_snapshot("tank@d1", SnapshotPeriod::Daily, "2024-03-01T00:00:00Z", SOURCE_SYSTEM)
            .with_snapshot("tank@d2", SnapshotPeriod::Daily, "2024-03-02T00:00:00Z", SOURCE_SYSTEM);

        run(&mut store, &mut runner, SOURCE_SYSTEM).unwrap();
        let result = prune::run(&mut store, &mut runner, SOURCE_SYSTEM, true).unwrap();

        assert_eq!(runner.destroyed, vec!["tank@d1"]);
        assert_eq!(result.affected, vec!["tank@d1"]);
    }

    #[test]
    fn unusable_snapshots_are_skipped() {
        let mut store = InMemoryStore::new();
        let mut runner = RecordingRunner::new()
            .with_dataset("tank", RecordKind::Pool)
            .with_snapshot("gone@s1", SnapshotPeriod::Daily, "2024-03-01T00:00:00Z", "host-a")
            .with_snapshot("tank@s2", SnapshotPeriod::Daily, "2024-03-01T00:00:00Z", "two words");
        let untagged = SnapshotListing {
            source_system: None,
            name: "s3".to_string(),
            ..runner.snapshots[1].clone()
        };
        runner.snapshots.push(untagged);

        let result = run(&mut store, &mut runner, SOURCE_SYSTEM).unwrap();

        assert_eq!(result.affected, vec!["tank"]);
        let skipped = result
            .messages
            .iter()
            .filter(|m| m.content.starts_with("Skipped"))
            .count();
        assert_eq!(skipped, 3);
        let tree = store.load_tree().unwrap().unwrap();
        let tank = tree.lookup("tank").unwrap();
        assert!(tree.snapshots_of(tank).is_empty());
    }

    #[test]
    fn vanished_datasets_are_reported_not_removed() {
        let mut store = TreeFixture::new()
            .with_dataset("tank", RecordKind::Pool)
            .with_dataset("tank/old", RecordKind::FileSystem)
            .store();
        let mut runner = RecordingRunner::new().with_dataset("tank", RecordKind::Pool);

        let result = run(&mut store, &mut runner, SOURCE_SYSTEM).unwrap();

        assert!(result
            .messages
            .iter()
            .any(|m| m.content.contains("tank/old is no longer reported")));
        let tree = store.load_tree().unwrap().unwrap();
        assert!(tree.find("tank/old").is_some());
    }
}
