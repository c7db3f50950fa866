//! # API Facade
//!
//! The API layer is a **thin facade** over the command layer and the single
//! entry point for every snapz operation.
//!
//! The facade:
//! - **Dispatches** to the command function
//! - **Supplies context** the commands need (config, the current instant)
//! - **Returns structured types** (`Result<CmdResult>`)
//!
//! It does no printing and holds no business logic.
//!
//! ## Generic Over DataStore and CommandRunner
//!
//! `SnapzApi<S: DataStore, R: CommandRunner>`:
//! - Production: `SnapzApi<FileStore, ZfsRunner>`
//! - Testing: `SnapzApi<InMemoryStore, RecordingRunner>`
//!
//! ## Runs and the lock
//!
//! `take`, `prune` and `run` mutate both the system and the stored tree, so
//! they demand a [`RunLock`] as proof that no other run is active. Dry runs
//! swap in a [`DryRunRunner`] and never save.

use chrono::{DateTime, FixedOffset, Local};

use crate::commands::{self, CmdResult};
use crate::config::SnapzConfig;
use crate::error::Result;
use crate::lock::RunLock;
use crate::model::RecordKind;
use crate::runner::{CommandRunner, DryRunRunner};
use crate::store::DataStore;

pub struct SnapzApi<S: DataStore, R: CommandRunner> {
    store: S,
    runner: R,
    config: SnapzConfig,
}

impl<S: DataStore, R: CommandRunner> SnapzApi<S, R> {
    pub fn new(store: S, runner: R, config: SnapzConfig) -> Self {
        Self {
            store,
            runner,
            config,
        }
    }

    pub fn config(&self) -> &SnapzConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn discover(&mut self) -> Result<CmdResult> {
        commands::discover::run(&mut self.store, &mut self.runner, &self.config.source_system)
    }

    pub fn add_dataset(&mut self, path: &str, kind: RecordKind) -> Result<CmdResult> {
        commands::records::add(&mut self.store, path, kind, &self.config.source_system)
    }

    pub fn list(&self) -> Result<CmdResult> {
        commands::list::run(&self.store, &self.config.source_system)
    }

    pub fn get_properties(&self, path: &str, property: Option<&str>) -> Result<CmdResult> {
        commands::properties::get(&self.store, path, property, &self.config.source_system)
    }

    pub fn set_properties<A: AsRef<str>>(
        &mut self,
        path: &str,
        assignments: &[A],
        dry_run: bool,
    ) -> Result<CmdResult> {
        let assignments: Vec<String> = assignments.iter().map(|a| a.as_ref().to_string()).collect();
        commands::properties::set(
            &mut self.store,
            path,
            &assignments,
            dry_run,
            &self.config.source_system,
        )
    }

    pub fn inherit_property(&mut self, path: &str, property: &str, dry_run: bool) -> Result<CmdResult> {
        commands::properties::inherit(
            &mut self.store,
            path,
            property,
            dry_run,
            &self.config.source_system,
        )
    }

    pub fn take(&mut self, lock: &RunLock, dry_run: bool) -> Result<CmdResult> {
        self.take_at(lock, Local::now().fixed_offset(), dry_run)
    }

    /// `take` as if the clock read `now`.
    pub fn take_at(
        &mut self,
        _lock: &RunLock,
        now: DateTime<FixedOffset>,
        dry_run: bool,
    ) -> Result<CmdResult> {
        if dry_run {
            let mut runner = DryRunRunner::new();
            commands::take::run(&mut self.store, &mut runner, &self.config, now, false)
        } else {
            commands::take::run(&mut self.store, &mut self.runner, &self.config, now, true)
        }
    }

    pub fn prune(&mut self, _lock: &RunLock, dry_run: bool) -> Result<CmdResult> {
        if dry_run {
            let mut runner = DryRunRunner::new();
            commands::prune::run(&mut self.store, &mut runner, &self.config.source_system, false)
        } else {
            commands::prune::run(
                &mut self.store,
                &mut self.runner,
                &self.config.source_system,
                true,
            )
        }
    }

    /// `take` followed by `prune`.
    pub fn run(&mut self, lock: &RunLock, dry_run: bool) -> Result<CmdResult> {
        self.run_at(lock, Local::now().fixed_offset(), dry_run)
    }

    pub fn run_at(
        &mut self,
        lock: &RunLock,
        now: DateTime<FixedOffset>,
        dry_run: bool,
    ) -> Result<CmdResult> {
        let taken = self.take_at(lock, now, dry_run)?;
        let pruned = self.prune(lock, dry_run)?;
        Ok(taken.merge(pruned))
    }
}
