//! Destroy snapshots beyond their period's retention.
//!
//! Only datasets with `snapshot:enabled` and `snapshot:prune` take part. Per
//! period the newest `snapshot:retention-<period>` snapshots survive, newest
//! meaning last in the snapshot total order. Snapshots tagged with another
//! host's `snapshot:source-system` are neither counted nor destroyed, and
//! snapshots without a period are never pruned.

use crate::commands::{CmdMessage, CmdResult};
use crate::error::Result;
use crate::model::{names, RecordId, RecordTree, SnapshotPeriod};
use crate::runner::CommandRunner;
use crate::store::DataStore;

pub fn run<S: DataStore, R: CommandRunner>(
    store: &mut S,
    runner: &mut R,
    source_system: &str,
    persist: bool,
) -> Result<CmdResult> {
    let mut tree = store.load_or_default(source_system)?;
    let mut result = CmdResult::default();

    let mut victims = Vec::new();
    for dataset in tree.datasets() {
        let expired = is_prunable(&tree, dataset).and_then(|prunable| {
            if !prunable {
                tracing::debug!(dataset = %tree.path(dataset), "pruning disabled");
                return Ok(Vec::new());
            }
            expired_snapshots(&tree, dataset, source_system)
        });
        match expired {
            Ok(expired) => victims.extend(expired),
            Err(e) => {
                tracing::warn!(dataset = %tree.path(dataset), error = %e, "skipping dataset");
                result.add_failure(e);
            }
        }
    }

    for victim in victims {
        let path = tree.path(victim);
        match runner.destroy_snapshot(&path) {
            Ok(()) => {
                tree.remove(victim)?;
                tracing::info!(snapshot = %path, "snapshot pruned");
                result.add_message(CmdMessage::success(format!("Pruned {}", path)));
                result.affected.push(path);
            }
            Err(e) => {
                tracing::warn!(snapshot = %path, error = %e, "prune failed");
                result.add_failure(e);
            }
        }
    }

    if result.affected.is_empty() && result.failures.is_empty() {
        result.add_message(CmdMessage::info("Nothing to prune"));
    }
    if persist && !result.affected.is_empty() {
        store.save_tree(&tree)?;
    }
    Ok(result)
}

fn is_prunable(tree: &RecordTree, id: RecordId) -> Result<bool> {
    Ok(tree.resolve_bool(id, names::ENABLED)? && tree.resolve_bool(id, names::PRUNE)?)
}

/// Snapshots of `dataset` that fall outside retention, oldest first.
pub fn expired_snapshots(
    tree: &RecordTree,
    dataset: RecordId,
    source_system: &str,
) -> Result<Vec<RecordId>> {
    let sorted = tree.sorted_snapshots(dataset)?;
    let mut expired = Vec::new();

    for period in SnapshotPeriod::ALL {
        let Some(retention) = period.retention_property() else {
            continue;
        };
        let keep = usize::try_from(tree.resolve_int(dataset, retention)?).unwrap_or(0);

        let mut ours = Vec::new();
        for &snapshot in &sorted {
            let info = tree.get(snapshot)?.snapshot_info().copied();
            if info.map(|i| i.period()) != Some(period) {
                continue;
            }
            if tree.resolve(snapshot, names::SOURCE_SYSTEM)?.to_string() == source_system {
                ours.push(snapshot);
            }
        }

        let excess = ours.len().saturating_sub(keep);
        expired.extend(ours.into_iter().take(excess));
    }

    expired.sort_by(|a, b| {
        tree.snapshot_key(*a)
            .ok()
            .cmp(&tree.snapshot_key(*b).ok())
    });
    Ok(expired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SnapzError;
    use crate::model::property::root_defaults;
    use crate::model::RecordKind;
    use crate::runner::fixtures::RecordingRunner;
    use crate::store::memory::fixtures::{TreeFixture, SOURCE_SYSTEM};

    fn dailies(count: usize) -> TreeFixture {
        let mut fixture = TreeFixture::new()
            .with_dataset("tank", RecordKind::Pool)
            .enabled("tank")
            .with_property("tank", names::RETENTION_DAILY, "2");
        for day in 1..=count {
            fixture = fixture.with_snapshot(
                "tank",
                &format!("d{}", day),
                SnapshotPeriod::Daily,
                &format!("2024-03-{:02}T00:00:00Z", day),
            );
        }
        fixture
    }

    #[test]
    fn keeps_newest_per_period() {
        let mut store = dailies(4)
            .with_snapshot("tank", "h1", SnapshotPeriod::Hourly, "2024-03-01T01:00:00Z")
            .store();
        let mut runner = RecordingRunner::new();

        let result = run(&mut store, &mut runner, SOURCE_SYSTEM, true).unwrap();

        assert_eq!(runner.destroyed, vec!["tank@d1", "tank@d2"]);
        assert_eq!(result.affected, vec!["tank@d1", "tank@d2"]);
        let tree = store.load_tree().unwrap().unwrap();
        assert!(tree.find("tank@d1").is_none());
        assert!(tree.find("tank@d3").is_some());
        assert!(tree.find("tank@h1").is_some());
    }

    #[test]
    fn within_retention_nothing_happens() {
        let mut store = dailies(2).store();
        let mut runner = RecordingRunner::new();

        let result = run(&mut store, &mut runner, SOURCE_SYSTEM, true).unwrap();

        assert!(runner.destroyed.is_empty());
        assert_eq!(result.messages[0].content, "Nothing to prune");
        assert_eq!(store.save_count(), 0);
    }

    #[test]
    fn foreign_snapshots_are_left_alone() {
        let fixture = dailies(3)
            .with_property("tank@d1", names::SOURCE_SYSTEM, "other-host")
            .with_property("tank@d2", names::SOURCE_SYSTEM, "other-host");
        let mut store = fixture.store();
        let mut runner = RecordingRunner::new();

        run(&mut store, &mut runner, SOURCE_SYSTEM, true).unwrap();

        assert!(runner.destroyed.is_empty());
    }

    #[test]
    fn prune_disabled_is_skipped() {
        let mut store = dailies(4)
            .with_property("tank", names::PRUNE, "false")
            .store();
        let mut runner = RecordingRunner::new();

        run(&mut store, &mut runner, SOURCE_SYSTEM, true).unwrap();
        assert!(runner.destroyed.is_empty());
    }

    #[test]
    fn failed_destroy_keeps_record() {
        let mut store = dailies(4).store();
        let mut runner = RecordingRunner::new().failing("tank@d1");

        let result = run(&mut store, &mut runner, SOURCE_SYSTEM, true).unwrap();

        assert_eq!(runner.destroyed, vec!["tank@d2"]);
        assert!(matches!(
            result.failures.as_slice(),
            [SnapzError::CommandExecutionFailed { .. }]
        ));
        let tree = store.load_tree().unwrap().unwrap();
        assert!(tree.find("tank@d1").is_some());
        assert!(tree.find("tank@d2").is_none());
    }

    #[test]
    fn unresolvable_dataset_does_not_stop_the_batch() {
        let defaults = root_defaults(SOURCE_SYSTEM)
            .into_iter()
            .filter(|(name, _)| *name != names::RETENTION_WEEKLY);
        let mut store = TreeFixture {
            tree: RecordTree::new(defaults),
        }
        .with_dataset("spare", RecordKind::Pool)
        .with_dataset("tank", RecordKind::Pool)
        .enabled("spare")
        .enabled("tank")
        .with_property("tank", names::RETENTION_WEEKLY, "0")
        .with_property("tank", names::RETENTION_DAILY, "1")
        .with_snapshot("tank", "d1", SnapshotPeriod::Daily, "2024-03-01T00:00:00Z")
        .with_snapshot("tank", "d2", SnapshotPeriod::Daily, "2024-03-02T00:00:00Z")
        .store();
        let mut runner = RecordingRunner::new();

        let result = run(&mut store, &mut runner, SOURCE_SYSTEM, true).unwrap();

        assert!(matches!(
            result.failures.as_slice(),
            [SnapzError::PropertyNotFound { .. }]
        ));
        assert_eq!(runner.destroyed, vec!["tank@d1"]);
    }

    #[test]
    fn zero_retention_expires_everything_of_that_period() {
        let fixture = dailies(2).with_property("tank", names::RETENTION_DAILY, "0");
        let tank = fixture.id("tank");
        let expired = expired_snapshots(&fixture.tree, tank, SOURCE_SYSTEM).unwrap();
        assert_eq!(expired.len(), 2);
    }

    #[test]
    fn unclassified_snapshots_are_never_expired() {
        let fixture = dailies(0)
            .with_snapshot("tank", "manual", SnapshotPeriod::NotSet, "2020-01-01T00:00:00Z");
        let tank = fixture.id("tank");
        assert!(expired_snapshots(&fixture.tree, tank, SOURCE_SYSTEM)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn dry_run_does_not_save() {
        let mut store = dailies(4).store();
        let mut runner = RecordingRunner::new();

        let result = run(&mut store, &mut runner, SOURCE_SYSTEM, false).unwrap();
        assert_eq!(result.affected.len(), 2);
        assert_eq!(store.save_count(), 0);
    }
}
