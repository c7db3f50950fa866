//! Property values and the schema of well-known property names.
//!
//! Every record carries a map of [`Property`] entries. Values are typed
//! ([`PropertyValue`]) but always have a canonical string form, which is what
//! the CLI accepts and what ends up in option strings handed to `zfs`.
//!
//! Names follow the ZFS user-property convention (`namespace:name`). Names
//! outside the well-known set are accepted and stored as text.

use chrono::{DateTime, FixedOffset, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::record::RecordId;
use crate::error::{Result, SnapzError};

pub mod names {
    pub const ENABLED: &str = "snapshot:enabled";
    pub const TAKE: &str = "snapshot:take";
    pub const PRUNE: &str = "snapshot:prune";
    pub const RECURSION: &str = "snapshot:recursion";
    pub const SOURCE_SYSTEM: &str = "snapshot:source-system";

    // Snapshot identity, never stored in a property map.
    pub const PERIOD: &str = "snapshot:period";
    pub const TIMESTAMP: &str = "snapshot:timestamp";

    pub const LAST_FREQUENT: &str = "snapshot:last-frequent";
    pub const LAST_HOURLY: &str = "snapshot:last-hourly";
    pub const LAST_DAILY: &str = "snapshot:last-daily";
    pub const LAST_WEEKLY: &str = "snapshot:last-weekly";
    pub const LAST_MONTHLY: &str = "snapshot:last-monthly";
    pub const LAST_YEARLY: &str = "snapshot:last-yearly";

    pub const RETENTION_FREQUENT: &str = "snapshot:retention-frequent";
    pub const RETENTION_HOURLY: &str = "snapshot:retention-hourly";
    pub const RETENTION_DAILY: &str = "snapshot:retention-daily";
    pub const RETENTION_WEEKLY: &str = "snapshot:retention-weekly";
    pub const RETENTION_MONTHLY: &str = "snapshot:retention-monthly";
    pub const RETENTION_YEARLY: &str = "snapshot:retention-yearly";
}

/// Who creates recursive snapshots of a subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecursionMode {
    /// snapz walks the tree and snapshots each dataset individually.
    Managed,
    /// A single `zfs snapshot -r` on the dataset covers its descendants.
    Native,
}

impl RecursionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RecursionMode::Managed => "snapz",
            RecursionMode::Native => "zfs",
        }
    }
}

impl fmt::Display for RecursionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecursionMode {
    type Err = SnapzError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "snapz" => Ok(RecursionMode::Managed),
            "zfs" => Ok(RecursionMode::Native),
            other => Err(SnapzError::InvalidValue {
                property: names::RECURSION.to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Value kinds of the property schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    Int,
    Text,
    Timestamp,
    Recursion,
}

/// Schema lookup for a property name. Unknown names are text.
pub fn value_kind(name: &str) -> ValueKind {
    match name {
        names::ENABLED | names::TAKE | names::PRUNE => ValueKind::Bool,
        names::RECURSION => ValueKind::Recursion,
        names::LAST_FREQUENT
        | names::LAST_HOURLY
        | names::LAST_DAILY
        | names::LAST_WEEKLY
        | names::LAST_MONTHLY
        | names::LAST_YEARLY
        | names::TIMESTAMP => ValueKind::Timestamp,
        names::RETENTION_FREQUENT
        | names::RETENTION_HOURLY
        | names::RETENTION_DAILY
        | names::RETENTION_WEEKLY
        | names::RETENTION_MONTHLY
        | names::RETENTION_YEARLY => ValueKind::Int,
        _ => ValueKind::Text,
    }
}

/// Text values that end up as a single `-o` argument to `zfs` must be one
/// non-empty word.
pub fn check_text(name: &str, value: &str) -> Result<()> {
    if name == names::SOURCE_SYSTEM && (value.is_empty() || value.contains(char::is_whitespace)) {
        return Err(SnapzError::InvalidValue {
            property: name.to_string(),
            value: value.to_string(),
        });
    }
    Ok(())
}

/// True for the write-once snapshot identity fields.
pub fn is_snapshot_identity(name: &str) -> bool {
    name == names::PERIOD || name == names::TIMESTAMP
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Text(String),
    Timestamp(DateTime<FixedOffset>),
    Recursion(RecursionMode),
}

impl PropertyValue {
    /// Parse a raw string according to the schema of `name`.
    pub fn parse(name: &str, raw: &str) -> Result<Self> {
        let invalid = || SnapzError::InvalidValue {
            property: name.to_string(),
            value: raw.to_string(),
        };
        let raw_trimmed = raw.trim();
        match value_kind(name) {
            ValueKind::Bool => match raw_trimmed.to_ascii_lowercase().as_str() {
                "true" | "on" | "yes" => Ok(PropertyValue::Bool(true)),
                "false" | "off" | "no" => Ok(PropertyValue::Bool(false)),
                _ => Err(invalid()),
            },
            ValueKind::Int => raw_trimmed
                .parse::<i64>()
                .ok()
                .filter(|n| *n >= 0)
                .map(PropertyValue::Int)
                .ok_or_else(invalid),
            ValueKind::Timestamp => DateTime::parse_from_rfc3339(raw_trimmed)
                .map(PropertyValue::Timestamp)
                .map_err(|_| invalid()),
            ValueKind::Recursion => raw_trimmed.parse().map(PropertyValue::Recursion),
            ValueKind::Text => {
                check_text(name, raw)?;
                Ok(PropertyValue::Text(raw.to_string()))
            }
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<FixedOffset>> {
        match self {
            PropertyValue::Timestamp(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_recursion(&self) -> Option<RecursionMode> {
        match self {
            PropertyValue::Recursion(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(v) => write!(f, "{}", v),
            PropertyValue::Int(v) => write!(f, "{}", v),
            PropertyValue::Text(v) => f.write_str(v),
            PropertyValue::Timestamp(v) => f.write_str(&format_timestamp(v)),
            PropertyValue::Recursion(v) => write!(f, "{}", v),
        }
    }
}

/// Round-trippable ISO-8601 with seven fractional digits and the UTC offset,
/// e.g. `2024-03-01T10:15:00.1234567+01:00`.
pub fn format_timestamp(ts: &DateTime<FixedOffset>) -> String {
    let ticks = ts.timestamp_subsec_nanos() % 1_000_000_000 / 100;
    format!(
        "{}.{:07}{}",
        ts.format("%Y-%m-%dT%H:%M:%S"),
        ticks,
        ts.format("%:z")
    )
}

/// Drop precision below 100ns so a timestamp survives [`format_timestamp`].
pub fn truncate_to_ticks(ts: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    ts.trunc_subsecs(7)
}

/// A named value on a record, with provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub value: PropertyValue,
    pub is_local: bool,
    /// Nearest ancestor holding the value locally; `None` when local.
    pub inherited_from: Option<RecordId>,
}

impl Property {
    pub fn local(name: impl Into<String>, value: PropertyValue) -> Self {
        Self {
            name: name.into(),
            value,
            is_local: true,
            inherited_from: None,
        }
    }

    pub fn inherited(name: impl Into<String>, value: PropertyValue, source: RecordId) -> Self {
        Self {
            name: name.into(),
            value,
            is_local: false,
            inherited_from: Some(source),
        }
    }
}

/// Values every root record starts with.
pub fn root_defaults(source_system: &str) -> Vec<(&'static str, PropertyValue)> {
    let epoch = DateTime::<Utc>::UNIX_EPOCH.fixed_offset();
    vec![
        (names::ENABLED, PropertyValue::Bool(false)),
        (names::TAKE, PropertyValue::Bool(true)),
        (names::PRUNE, PropertyValue::Bool(false)),
        (
            names::RECURSION,
            PropertyValue::Recursion(RecursionMode::Managed),
        ),
        (
            names::SOURCE_SYSTEM,
            PropertyValue::Text(source_system.to_string()),
        ),
        (names::LAST_FREQUENT, PropertyValue::Timestamp(epoch)),
        (names::LAST_HOURLY, PropertyValue::Timestamp(epoch)),
        (names::LAST_DAILY, PropertyValue::Timestamp(epoch)),
        (names::LAST_WEEKLY, PropertyValue::Timestamp(epoch)),
        (names::LAST_MONTHLY, PropertyValue::Timestamp(epoch)),
        (names::LAST_YEARLY, PropertyValue::Timestamp(epoch)),
        (names::RETENTION_FREQUENT, PropertyValue::Int(4)),
        (names::RETENTION_HOURLY, PropertyValue::Int(48)),
        (names::RETENTION_DAILY, PropertyValue::Int(90)),
        (names::RETENTION_WEEKLY, PropertyValue::Int(0)),
        (names::RETENTION_MONTHLY, PropertyValue::Int(6)),
        (names::RETENTION_YEARLY, PropertyValue::Int(0)),
    ]
}
