use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SnapzError;

/// Snapshot cadence.
///
/// Declaration order is the retention rank: finer periods sort before coarser
/// ones and `NotSet` sorts last. The derived `Ord` relies on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotPeriod {
    Frequent,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
    NotSet,
}

impl SnapshotPeriod {
    /// Every schedulable period, in rank order.
    pub const ALL: [SnapshotPeriod; 6] = [
        SnapshotPeriod::Frequent,
        SnapshotPeriod::Hourly,
        SnapshotPeriod::Daily,
        SnapshotPeriod::Weekly,
        SnapshotPeriod::Monthly,
        SnapshotPeriod::Yearly,
    ];

    /// Canonical short form used in option strings and snapshot names.
    pub fn short_name(self) -> &'static str {
        match self {
            SnapshotPeriod::Frequent => "frequent",
            SnapshotPeriod::Hourly => "hourly",
            SnapshotPeriod::Daily => "daily",
            SnapshotPeriod::Weekly => "weekly",
            SnapshotPeriod::Monthly => "monthly",
            SnapshotPeriod::Yearly => "yearly",
            SnapshotPeriod::NotSet => "-",
        }
    }

    /// Name of the property that records when this period last fired.
    pub fn last_timestamp_property(self) -> Option<&'static str> {
        use super::property::names;
        match self {
            SnapshotPeriod::Frequent => Some(names::LAST_FREQUENT),
            SnapshotPeriod::Hourly => Some(names::LAST_HOURLY),
            SnapshotPeriod::Daily => Some(names::LAST_DAILY),
            SnapshotPeriod::Weekly => Some(names::LAST_WEEKLY),
            SnapshotPeriod::Monthly => Some(names::LAST_MONTHLY),
            SnapshotPeriod::Yearly => Some(names::LAST_YEARLY),
            SnapshotPeriod::NotSet => None,
        }
    }

    /// Name of the property holding how many snapshots of this period to keep.
    pub fn retention_property(self) -> Option<&'static str> {
        use super::property::names;
        match self {
            SnapshotPeriod::Frequent => Some(names::RETENTION_FREQUENT),
            SnapshotPeriod::Hourly => Some(names::RETENTION_HOURLY),
            SnapshotPeriod::Daily => Some(names::RETENTION_DAILY),
            SnapshotPeriod::Weekly => Some(names::RETENTION_WEEKLY),
            SnapshotPeriod::Monthly => Some(names::RETENTION_MONTHLY),
            SnapshotPeriod::Yearly => Some(names::RETENTION_YEARLY),
            SnapshotPeriod::NotSet => None,
        }
    }
}

impl fmt::Display for SnapshotPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

impl FromStr for SnapshotPeriod {
    type Err = SnapzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "frequent" | "frequently" => Ok(SnapshotPeriod::Frequent),
            "hourly" => Ok(SnapshotPeriod::Hourly),
            "daily" => Ok(SnapshotPeriod::Daily),
            "weekly" => Ok(SnapshotPeriod::Weekly),
            "monthly" => Ok(SnapshotPeriod::Monthly),
            "yearly" => Ok(SnapshotPeriod::Yearly),
            "-" | "" | "notset" => Ok(SnapshotPeriod::NotSet),
            other => Err(SnapzError::InvalidValue {
                property: "snapshot:period".to_string(),
                value: other.to_string(),
            }),
        }
    }
}
