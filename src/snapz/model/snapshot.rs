//! Snapshot ordering, naming and option-string rendering.
//!
//! Snapshots are records of kind [`RecordKind::Snapshot`] with a
//! [`SnapshotInfo`](super::record::SnapshotInfo) attached. Retention works on
//! the total order defined by [`SnapshotOrderKey`]:
//!
//! 1. timestamp, earliest first
//! 2. period rank, finer first (`frequent` < … < `yearly` < `-`)
//! 3. dataset path, then snapshot name (ordinal)

use chrono::{DateTime, FixedOffset};
use std::cmp::Ordering;

use super::period::SnapshotPeriod;
use super::property::{format_timestamp, names};
use super::record::{RecordId, RecordKind};
use super::tree::RecordTree;
use crate::error::{Result, SnapzError};

/// Sort key of a snapshot. Field order is the comparison order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SnapshotOrderKey {
    pub timestamp: DateTime<FixedOffset>,
    pub period: SnapshotPeriod,
    pub dataset: String,
    pub name: String,
}

impl RecordTree {
    pub fn snapshot_key(&self, id: RecordId) -> Result<SnapshotOrderKey> {
        let record = self.get(id)?;
        let info = record
            .snapshot_info()
            .filter(|_| record.kind() == RecordKind::Snapshot)
            .ok_or_else(|| SnapzError::InvalidHierarchy(format!("{} is not a snapshot", self.path(id))))?;
        let dataset = record
            .parent()
            .map(|parent| self.path(parent))
            .unwrap_or_default();
        Ok(SnapshotOrderKey {
            timestamp: info.timestamp(),
            period: info.period(),
            dataset,
            name: record.name().to_string(),
        })
    }

    pub fn compare_snapshots(&self, a: RecordId, b: RecordId) -> Result<Ordering> {
        Ok(self.snapshot_key(a)?.cmp(&self.snapshot_key(b)?))
    }

    /// Snapshots of `dataset`, oldest first.
    pub fn sorted_snapshots(&self, dataset: RecordId) -> Result<Vec<RecordId>> {
        let mut keyed = self
            .snapshots_of(dataset)
            .into_iter()
            .map(|id| self.snapshot_key(id).map(|key| (key, id)))
            .collect::<Result<Vec<_>>>()?;
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(keyed.into_iter().map(|(_, id)| id).collect())
    }
}

/// The `-o key=value` options handed to `zfs snapshot`.
///
/// Field order is fixed: period, timestamp, recursion, source-system.
pub fn render_snapshot_options(tree: &RecordTree, snapshot: RecordId) -> Result<String> {
    let key = tree.snapshot_key(snapshot)?;
    let recursion = tree.resolve_recursion(snapshot, names::RECURSION)?;
    let source_system = tree.resolve(snapshot, names::SOURCE_SYSTEM)?;
    Ok(format!(
        "-o {}={} -o {}={} -o {}={} -o {}={}",
        names::PERIOD,
        key.period,
        names::TIMESTAMP,
        format_timestamp(&key.timestamp),
        names::RECURSION,
        recursion,
        names::SOURCE_SYSTEM,
        source_system
    ))
}

/// Snapshot leaf name, e.g. `autosnap_2024-03-01_10:15:00_hourly`.
pub fn snapshot_name(prefix: &str, period: SnapshotPeriod, timestamp: &DateTime<FixedOffset>) -> String {
    format!(
        "{}_{}_{}",
        prefix,
        timestamp.format("%Y-%m-%d_%H:%M:%S"),
        period.short_name()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::property::PropertyValue;

    fn ts(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn tree_with_datasets() -> (RecordTree, RecordId, RecordId) {
        let mut tree = RecordTree::with_defaults("host-a");
        let tank = tree.add_child(tree.root(), "tank", RecordKind::Pool).unwrap();
        let home = tree.add_child(tank, "home", RecordKind::FileSystem).unwrap();
        (tree, tank, home)
    }

    #[test]
    fn earlier_timestamp_sorts_first() {
        let (mut tree, _, home) = tree_with_datasets();
        let older = tree
            .add_snapshot(home, "b", SnapshotPeriod::Yearly, ts("2024-01-01T00:00:00Z"))
            .unwrap();
        let newer = tree
            .add_snapshot(home, "a", SnapshotPeriod::Frequent, ts("2024-01-01T00:15:00Z"))
            .unwrap();
        assert_eq!(tree.compare_snapshots(older, newer).unwrap(), Ordering::Less);
    }

    #[test]
    fn frequent_sorts_before_hourly_at_same_instant() {
        let (mut tree, _, home) = tree_with_datasets();
        let at = ts("2024-01-01T10:00:00Z");
        let hourly = tree
            .add_snapshot(home, "h", SnapshotPeriod::Hourly, at)
            .unwrap();
        let frequent = tree
            .add_snapshot(home, "f", SnapshotPeriod::Frequent, at)
            .unwrap();
        assert_eq!(
            tree.compare_snapshots(frequent, hourly).unwrap(),
            Ordering::Less
        );
        assert_eq!(
            tree.compare_snapshots(hourly, frequent).unwrap(),
            Ordering::Greater
        );
    }

    #[test]
    fn names_break_remaining_ties() {
        let (mut tree, tank, home) = tree_with_datasets();
        let at = ts("2024-01-01T10:00:00Z");
        let on_tank = tree
            .add_snapshot(tank, "same", SnapshotPeriod::Daily, at)
            .unwrap();
        let on_home = tree
            .add_snapshot(home, "same", SnapshotPeriod::Daily, at)
            .unwrap();
        let on_home_b = tree
            .add_snapshot(home, "zzz", SnapshotPeriod::Daily, at)
            .unwrap();

        // "tank" sorts before "tank/home".
        assert_eq!(tree.compare_snapshots(on_tank, on_home).unwrap(), Ordering::Less);
        assert_eq!(tree.compare_snapshots(on_home, on_home_b).unwrap(), Ordering::Less);
        assert_eq!(tree.compare_snapshots(on_home, on_home).unwrap(), Ordering::Equal);
    }

    #[test]
    fn same_instant_in_different_offsets_is_equal_time() {
        let (mut tree, _, home) = tree_with_datasets();
        let a = tree
            .add_snapshot(home, "a", SnapshotPeriod::Daily, ts("2024-01-01T10:00:00+00:00"))
            .unwrap();
        let b = tree
            .add_snapshot(home, "b", SnapshotPeriod::Daily, ts("2024-01-01T11:00:00+01:00"))
            .unwrap();
        // Falls through to the name tie-break.
        assert_eq!(tree.compare_snapshots(a, b).unwrap(), Ordering::Less);
    }

    #[test]
    fn order_is_total_and_transitive() {
        let (mut tree, tank, home) = tree_with_datasets();
        let stamps = ["2024-01-01T00:00:00Z", "2024-01-01T00:00:00Z", "2024-01-02T00:00:00Z"];
        let periods = [
            SnapshotPeriod::Frequent,
            SnapshotPeriod::Weekly,
            SnapshotPeriod::NotSet,
        ];
        let mut ids = Vec::new();
        for (i, stamp) in stamps.iter().enumerate() {
            for (j, period) in periods.iter().enumerate() {
                for dataset in [tank, home] {
                    let name = format!("s{}{}", i, j);
                    ids.push(tree.add_snapshot(dataset, &name, *period, ts(stamp)).unwrap());
                }
            }
        }

        for &a in &ids {
            for &b in &ids {
                let ab = tree.compare_snapshots(a, b).unwrap();
                let ba = tree.compare_snapshots(b, a).unwrap();
                assert_eq!(ab, ba.reverse());
                assert_eq!(ab == Ordering::Equal, a == b);
                for &c in &ids {
                    let bc = tree.compare_snapshots(b, c).unwrap();
                    if ab == Ordering::Less && bc == Ordering::Less {
                        assert_eq!(tree.compare_snapshots(a, c).unwrap(), Ordering::Less);
                    }
                }
            }
        }
    }

    #[test]
    fn sorted_snapshots_are_oldest_first() {
        let (mut tree, _, home) = tree_with_datasets();
        let c = tree
            .add_snapshot(home, "c", SnapshotPeriod::Daily, ts("2024-01-03T00:00:00Z"))
            .unwrap();
        let a = tree
            .add_snapshot(home, "a", SnapshotPeriod::Daily, ts("2024-01-01T00:00:00Z"))
            .unwrap();
        let b = tree
            .add_snapshot(home, "b", SnapshotPeriod::Daily, ts("2024-01-02T00:00:00Z"))
            .unwrap();
        tree.add_child(home, "child", RecordKind::FileSystem).unwrap();
        assert_eq!(tree.sorted_snapshots(home).unwrap(), vec![a, b, c]);
    }

    #[test]
    fn key_of_non_snapshot_fails() {
        let (tree, _, home) = tree_with_datasets();
        assert!(tree.snapshot_key(home).is_err());
    }

    #[test]
    fn renders_options_in_fixed_order() {
        let (mut tree, tank, home) = tree_with_datasets();
        tree.set_local(
            tank,
            names::RECURSION,
            PropertyValue::parse(names::RECURSION, "zfs").unwrap(),
        )
        .unwrap();
        let snap = tree
            .add_snapshot(
                home,
                "s",
                SnapshotPeriod::Hourly,
                ts("2024-03-01T10:15:00.5+01:00"),
            )
            .unwrap();

        let rendered = render_snapshot_options(&tree, snap).unwrap();
        assert_eq!(
            rendered,
            "-o snapshot:period=hourly \
             -o snapshot:timestamp=2024-03-01T10:15:00.5000000+01:00 \
             -o snapshot:recursion=zfs \
             -o snapshot:source-system=host-a"
        );
        assert_eq!(render_snapshot_options(&tree, snap).unwrap(), rendered);
    }

    #[test]
    fn snapshot_names_carry_period() {
        let name = snapshot_name("autosnap", SnapshotPeriod::Weekly, &ts("2024-03-04T00:00:00Z"));
        assert_eq!(name, "autosnap_2024-03-04_00:00:00_weekly");
    }
}
