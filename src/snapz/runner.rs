//! # Command Runner
//!
//! Everything that touches the real system goes through [`CommandRunner`].
//! The scheduler hands it a [`SnapshotRequest`] with the option string already
//! rendered and only needs a success/failure answer back.
//!
//! - [`ZfsRunner`]: spawns the `zfs` binary.
//! - [`DryRunRunner`]: logs what would run and reports success.

use chrono::{DateTime, FixedOffset};
use std::process::Command;

use crate::error::{Result, SnapzError};
use crate::model::{names, RecordKind, RecursionMode, SnapshotPeriod};

/// One `zfs snapshot` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRequest {
    pub dataset: String,
    pub snapshot_name: String,
    pub options: String,
    pub recursive: bool,
}

impl SnapshotRequest {
    pub fn target(&self) -> String {
        format!("{}@{}", self.dataset, self.snapshot_name)
    }

    /// Arguments after the `zfs` binary name.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec!["snapshot".to_string()];
        if self.recursive {
            args.push("-r".to_string());
        }
        args.extend(self.options.split_whitespace().map(str::to_string));
        args.push(self.target());
        args
    }
}

/// A dataset reported by the system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetListing {
    pub path: String,
    pub kind: RecordKind,
}

/// A snapshot reported by the system, with the tags snapz wrote on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotListing {
    pub dataset: String,
    pub name: String,
    pub period: SnapshotPeriod,
    pub timestamp: DateTime<FixedOffset>,
    pub recursion: Option<RecursionMode>,
    pub source_system: Option<String>,
}

impl SnapshotListing {
    pub fn path(&self) -> String {
        format!("{}@{}", self.dataset, self.name)
    }
}

pub trait CommandRunner {
    fn create_snapshot(&mut self, request: &SnapshotRequest) -> Result<()>;

    fn destroy_snapshot(&mut self, snapshot_path: &str) -> Result<()>;

    fn list_datasets(&mut self) -> Result<Vec<DatasetListing>>;

    /// Snapshots carrying snapz tags. Untagged snapshots are left out.
    fn list_snapshots(&mut self) -> Result<Vec<SnapshotListing>>;
}

pub struct ZfsRunner {
    zfs_path: String,
}

impl ZfsRunner {
    pub fn new(zfs_path: impl Into<String>) -> Self {
        Self {
            zfs_path: zfs_path.into(),
        }
    }

    fn run(&self, target: &str, args: &[String]) -> Result<String> {
        let output = Command::new(&self.zfs_path)
            .args(args)
            .output()
            .map_err(|e| SnapzError::CommandExecutionFailed {
                target: target.to_string(),
                reason: format!("could not run {}: {}", self.zfs_path, e),
            })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(SnapzError::CommandExecutionFailed {
                target: target.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

impl CommandRunner for ZfsRunner {
    fn create_snapshot(&mut self, request: &SnapshotRequest) -> Result<()> {
        self.run(&request.target(), &request.args()).map(|_| ())
    }

    fn destroy_snapshot(&mut self, snapshot_path: &str) -> Result<()> {
        let args = vec!["destroy".to_string(), snapshot_path.to_string()];
        self.run(snapshot_path, &args).map(|_| ())
    }

    fn list_datasets(&mut self) -> Result<Vec<DatasetListing>> {
        let args: Vec<String> = ["list", "-H", "-p", "-o", "name,type", "-t", "filesystem,volume"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let stdout = self.run("zfs list", &args)?;
        parse_dataset_listing(&stdout)
    }

    fn list_snapshots(&mut self) -> Result<Vec<SnapshotListing>> {
        let columns = format!(
            "name,{},{},{},{}",
            names::PERIOD,
            names::TIMESTAMP,
            names::RECURSION,
            names::SOURCE_SYSTEM
        );
        let args: Vec<String> = ["list", "-H", "-p", "-t", "snapshot", "-o", &columns]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let stdout = self.run("zfs list", &args)?;
        Ok(parse_snapshot_listing(&stdout))
    }
}

/// Parse `zfs list -H -o name,type` output. Top-level filesystems are pools.
pub fn parse_dataset_listing(output: &str) -> Result<Vec<DatasetListing>> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let mut fields = line.split('\t');
            let path = fields.next().unwrap_or_default().trim().to_string();
            let kind = match fields.next().map(str::trim) {
                Some("filesystem") if !path.contains('/') => RecordKind::Pool,
                Some("filesystem") => RecordKind::FileSystem,
                Some("volume") => RecordKind::Volume,
                other => {
                    return Err(SnapzError::InvalidValue {
                        property: "type".to_string(),
                        value: format!("{}: {}", path, other.unwrap_or("")),
                    })
                }
            };
            Ok(DatasetListing { path, kind })
        })
        .collect()
}

/// Parse `zfs list -H -t snapshot -o name,<period>,<timestamp>,<recursion>,<source-system>`.
///
/// `zfs` prints `-` for unset user properties. Rows without a period and a
/// timestamp were not created by snapz and are dropped; rows whose tags do
/// not parse are dropped with a warning.
pub fn parse_snapshot_listing<'a>(output: &'a str) -> Vec<SnapshotListing> {
    let tag = |field: Option<&'a str>| field.map(str::trim).filter(|v| !v.is_empty() && *v != "-");

    let mut listings = Vec::new();
    for line in output.lines().filter(|line| !line.trim().is_empty()) {
        let mut fields = line.split('\t');
        let full = fields.next().unwrap_or_default().trim();
        let (period, timestamp, recursion, source_system) =
            (tag(fields.next()), tag(fields.next()), tag(fields.next()), tag(fields.next()));

        let (Some((dataset, name)), Some(period), Some(timestamp)) =
            (full.split_once('@'), period, timestamp)
        else {
            continue;
        };
        let period = match period.parse::<SnapshotPeriod>() {
            Ok(SnapshotPeriod::NotSet) => continue,
            Ok(period) => period,
            Err(e) => {
                tracing::warn!(snapshot = %full, error = %e, "ignoring snapshot");
                continue;
            }
        };
        let timestamp = match DateTime::parse_from_rfc3339(timestamp) {
            Ok(timestamp) => timestamp,
            Err(e) => {
                tracing::warn!(snapshot = %full, error = %e, "ignoring snapshot");
                continue;
            }
        };

        listings.push(SnapshotListing {
            dataset: dataset.to_string(),
            name: name.to_string(),
            period,
            timestamp,
            recursion: recursion.and_then(|r| r.parse().ok()),
            source_system: source_system.map(str::to_string),
        });
    }
    listings
}

/// Logs commands instead of running them.
#[derive(Debug, Default)]
pub struct DryRunRunner {
    commands: Vec<String>,
}

impl DryRunRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Command lines that would have run, in order.
    pub fn commands(&self) -> &[String] {
        &self.commands
    }
}

impl CommandRunner for DryRunRunner {
    fn create_snapshot(&mut self, request: &SnapshotRequest) -> Result<()> {
        let line = format!("zfs {}", request.args().join(" "));
        tracing::info!(command = %line, "dry run");
        self.commands.push(line);
        Ok(())
    }

    fn destroy_snapshot(&mut self, snapshot_path: &str) -> Result<()> {
        let line = format!("zfs destroy {}", snapshot_path);
        tracing::info!(command = %line, "dry run");
        self.commands.push(line);
        Ok(())
    }

    fn list_datasets(&mut self) -> Result<Vec<DatasetListing>> {
        Ok(Vec::new())
    }

    fn list_snapshots(&mut self) -> Result<Vec<SnapshotListing>> {
        Ok(Vec::new())
    }
}

// --- Test Fixtures ---

#[cfg(any(test, feature = "test_utils"))]
pub mod fixtures {
    use super::*;
    use std::collections::HashSet;

    /// Records every call; fails for targets registered with `failing`.
    #[derive(Debug, Default)]
    pub struct RecordingRunner {
        pub created: Vec<SnapshotRequest>,
        pub destroyed: Vec<String>,
        pub datasets: Vec<DatasetListing>,
        pub snapshots: Vec<SnapshotListing>,
        failing: HashSet<String>,
    }

    impl RecordingRunner {
        pub fn new() -> Self {
            Self::default()
        }

        /// Fail every command whose target starts with `prefix`.
        pub fn failing(mut self, prefix: &str) -> Self {
            self.failing.insert(prefix.to_string());
            self
        }

        pub fn with_dataset(mut self, path: &str, kind: RecordKind) -> Self {
            self.datasets.push(DatasetListing {
                path: path.to_string(),
                kind,
            });
            self
        }

        /// Report a tagged snapshot at `path` (`dataset@name`).
        pub fn with_snapshot(
            mut self,
            path: &str,
            period: SnapshotPeriod,
            timestamp: &str,
            source_system: &str,
        ) -> Self {
            let (dataset, name) = path.split_once('@').unwrap();
            self.snapshots.push(SnapshotListing {
                dataset: dataset.to_string(),
                name: name.to_string(),
                period,
                timestamp: DateTime::parse_from_rfc3339(timestamp).unwrap(),
                recursion: None,
                source_system: Some(source_system.to_string()),
            });
            self
        }

        fn check(&self, target: &str) -> Result<()> {
            if self.failing.iter().any(|prefix| target.starts_with(prefix.as_str())) {
                return Err(SnapzError::CommandExecutionFailed {
                    target: target.to_string(),
                    reason: "scripted failure".to_string(),
                });
            }
            Ok(())
        }
    }

    impl CommandRunner for RecordingRunner {
        fn create_snapshot(&mut self, request: &SnapshotRequest) -> Result<()> {
            self.check(&request.target())?;
            self.created.push(request.clone());
            Ok(())
        }

        fn destroy_snapshot(&mut self, snapshot_path: &str) -> Result<()> {
            self.check(snapshot_path)?;
            self.destroyed.push(snapshot_path.to_string());
            Ok(())
        }

        fn list_datasets(&mut self) -> Result<Vec<DatasetListing>> {
            Ok(self.datasets.clone())
        }

        fn list_snapshots(&mut self) -> Result<Vec<SnapshotListing>> {
            Ok(self.snapshots.clone())
        }
    }
}
