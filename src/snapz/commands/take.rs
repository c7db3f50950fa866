//! Take every snapshot that is due.
//!
//! A dataset is eligible when `snapshot:enabled` and `snapshot:take` both
//! resolve to true. A period is wanted when its retention is above zero and
//! due according to the [`TimingPolicy`](crate::timing::TimingPolicy) and the
//! dataset's `snapshot:last-<period>` property.
//!
//! With `snapshot:recursion=zfs` one `zfs snapshot -r` covers the whole
//! subtree, so descendants of such a dataset are not visited on their own;
//! the snapshots `zfs` creates for them are recorded under each descendant.
//!
//! For each due period:
//! 1. add the snapshot record (identity fixed, tags pinned locally)
//! 2. render its option string and hand it to the runner
//! 3. on success set `snapshot:last-<period>` on the dataset; on failure
//!    drop the record again and note the failure
//!
//! A dataset whose settings cannot be resolved is reported and skipped; the
//! rest of the batch still runs.

use chrono::{DateTime, FixedOffset};

use crate::commands::{CmdMessage, CmdResult};
use crate::config::SnapzConfig;
use crate::error::Result;
use crate::model::property::truncate_to_ticks;
use crate::model::{
    names, render_snapshot_options, snapshot_name, PropertyValue, RecordId, RecordTree,
    RecursionMode, SnapshotPeriod,
};
use crate::runner::{CommandRunner, SnapshotRequest};
use crate::store::DataStore;

pub fn run<S: DataStore, R: CommandRunner>(
    store: &mut S,
    runner: &mut R,
    config: &SnapzConfig,
    now: DateTime<FixedOffset>,
    persist: bool,
) -> Result<CmdResult> {
    let mut tree = store.load_or_default(&config.source_system)?;
    let now = truncate_to_ticks(now);
    let mut result = CmdResult::default();

    for dataset in tree.datasets() {
        let path = tree.path(dataset);
        let checked = is_eligible(&tree, dataset).and_then(|eligible| {
            if !eligible {
                tracing::debug!(dataset = %path, "snapshots disabled");
                return Ok(None);
            }
            if covered_by_ancestor(&tree, dataset)? {
                tracing::debug!(dataset = %path, "covered by a recursive ancestor");
                return Ok(None);
            }
            due_periods(&tree, dataset, config, now).map(Some)
        });
        let due = match checked {
            Ok(Some(due)) => due,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(dataset = %path, error = %e, "skipping dataset");
                result.add_failure(e);
                continue;
            }
        };
        if due.is_empty() {
            tracing::debug!(dataset = %path, "nothing due");
            continue;
        }

        for period in due {
            match take_one(&mut tree, runner, config, dataset, period, now) {
                Ok(target) => {
                    tracing::info!(snapshot = %target, period = %period, "snapshot taken");
                    result.add_message(CmdMessage::success(format!("Took {}", target)));
                    result.affected.push(target);
                }
                Err(e) => {
                    tracing::warn!(dataset = %path, period = %period, error = %e, "snapshot failed");
                    result.add_failure(e);
                }
            }
        }
    }

    if result.affected.is_empty() && result.failures.is_empty() {
        result.add_message(CmdMessage::info("No snapshots due"));
    }
    if persist && !result.affected.is_empty() {
        store.save_tree(&tree)?;
    }
    Ok(result)
}

fn is_eligible(tree: &RecordTree, id: RecordId) -> Result<bool> {
    Ok(tree.resolve_bool(id, names::ENABLED)? && tree.resolve_bool(id, names::TAKE)?)
}

fn covered_by_ancestor(tree: &RecordTree, id: RecordId) -> Result<bool> {
    for ancestor in tree.ancestors(id) {
        if ancestor == tree.root() {
            break;
        }
        if is_eligible(tree, ancestor)?
            && tree.resolve_recursion(ancestor, names::RECURSION)? == RecursionMode::Native
        {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Periods with a non-zero retention that are due at `now`, finest first.
pub fn due_periods(
    tree: &RecordTree,
    dataset: RecordId,
    config: &SnapzConfig,
    now: DateTime<FixedOffset>,
) -> Result<Vec<SnapshotPeriod>> {
    let mut wanted = Vec::new();
    for period in SnapshotPeriod::ALL {
        if let Some(retention) = period.retention_property() {
            if tree.resolve_int(dataset, retention)? > 0 {
                wanted.push(period);
            }
        }
    }

    let last_of = |period: SnapshotPeriod| {
        period
            .last_timestamp_property()
            .and_then(|name| tree.resolve_timestamp(dataset, name).ok())
    };
    Ok(config
        .timing
        .due_periods(now, last_of)
        .into_iter()
        .filter(|period| wanted.contains(period))
        .collect())
}

fn take_one<R: CommandRunner>(
    tree: &mut RecordTree,
    runner: &mut R,
    config: &SnapzConfig,
    dataset: RecordId,
    period: SnapshotPeriod,
    now: DateTime<FixedOffset>,
) -> Result<String> {
    let dataset_path = tree.path(dataset);
    let name = snapshot_name(&config.snapshot_prefix, period, &now);
    let recursive = tree.resolve_recursion(dataset, names::RECURSION)? == RecursionMode::Native;

    let snapshot = tree.add_snapshot(dataset, &name, period, now)?;
    let created = prepare(tree, snapshot).and_then(|options| {
        let request = SnapshotRequest {
            dataset: dataset_path,
            snapshot_name: name.clone(),
            options,
            recursive,
        };
        runner.create_snapshot(&request).map(|_| request.target())
    });
    let target = match created {
        Ok(target) => target,
        Err(e) => {
            tree.remove(snapshot)?;
            return Err(e);
        }
    };

    // The snapshot exists from here on; bookkeeping errors are only logged.
    if let Some(last) = period.last_timestamp_property() {
        if let Err(e) = tree.set_local(dataset, last, PropertyValue::Timestamp(now)) {
            tracing::warn!(snapshot = %target, error = %e, "could not update {}", last);
        }
    }
    if recursive {
        record_recursive_children(tree, dataset, &name, period, now);
    }
    Ok(target)
}

/// Pin the inherited tags so later changes on the dataset do not rewrite
/// what the snapshot was created with.
fn prepare(tree: &mut RecordTree, snapshot: RecordId) -> Result<String> {
    for name in [names::RECURSION, names::SOURCE_SYSTEM] {
        let value = tree.resolve(snapshot, name)?.clone();
        tree.set_local(snapshot, name, value)?;
    }
    render_snapshot_options(tree, snapshot)
}

fn record_recursive_children(
    tree: &mut RecordTree,
    dataset: RecordId,
    name: &str,
    period: SnapshotPeriod,
    now: DateTime<FixedOffset>,
) {
    let children: Vec<RecordId> = tree
        .descendants(dataset)
        .into_iter()
        .filter(|id| tree.get(*id).map(|r| r.kind().is_dataset()).unwrap_or(false))
        .collect();
    for child in children {
        let recorded = tree
            .add_snapshot(child, name, period, now)
            .and_then(|snapshot| prepare(tree, snapshot));
        if let Err(e) = recorded {
            tracing::warn!(dataset = %tree.path(child), error = %e, "recursive snapshot not recorded");
        }
    }
}
