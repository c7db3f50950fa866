//! # Snapz Architecture
//!
//! Snapz manages **inheritable snapshot policies** for ZFS pools, filesystems
//! and volumes. It is a library that happens to have a CLI: the binary only
//! parses arguments, picks collaborators and prints results.
//!
//! ## The Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI Layer (main.rs, args.rs)                               │
//! │  - Parses arguments, formats output, sets up logging        │
//! │  - The ONLY place that knows about stdout/exit codes        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  API Layer (api.rs)                                         │
//! │  - Thin facade over commands                                │
//! │  - Requires a RunLock for take/prune                        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Command Layer (commands/*.rs)                              │
//! │  - discover, add, list, get/set/inherit, take, prune        │
//! │  - Returns CmdResult, collects per-item runner failures     │
//! └─────────────────────────────────────────────────────────────┘
//!                 │                              │
//!                 ▼                              ▼
//! ┌───────────────────────────────┐  ┌──────────────────────────┐
//! │  Engine (model/, timing, diff)│  │  Collaborators           │
//! │  - record tree + inheritance  │  │  - store/ (DataStore)    │
//! │  - snapshot order, options    │  │  - runner (CommandRunner)│
//! │  - due periods, commit node   │  │  - lock (RunLock)        │
//! └───────────────────────────────┘  └──────────────────────────┘
//! ```
//!
//! ## Inheritance in one paragraph
//!
//! Every record holds a full property map. A value set on a record is
//! *local*; every descendant without its own local value receives a copy
//! marked *inherited* together with the id of the record it came from.
//! Changing or clearing a local value re-propagates eagerly, so reading a
//! property never walks the tree in the common case.
//!
//! ## Key Principle: No I/O Assumptions in Core
//!
//! From `api.rs` inward, code takes Rust arguments and returns
//! `Result<CmdResult>`. It never writes to stdout, never exits the process
//! and only reaches the system through [`runner::CommandRunner`].
//! Logging goes through `tracing`.
//!
//! ## Testing Strategy
//!
//! 1. **Engine and commands**: unit tests next to the code, on
//!    [`store::memory::InMemoryStore`] and a recording runner.
//! 2. **API**: dispatch and dry-run wiring.
//! 3. **CLI**: `tests/` drives the binary with `assert_cmd`.
//!
//! ## Module Overview
//!
//! - [`api`]: The API facade
//! - [`commands`]: One module per operation
//! - [`model`]: Records, properties, the record tree and snapshot ordering
//! - [`timing`]: Which snapshot periods are due
//! - [`diff`]: Baseline/working copies for staged edits
//! - [`store`]: Persistence of the record tree
//! - [`runner`]: The `zfs` command runner
//! - [`lock`]: Host-wide run lock
//! - [`config`]: Configuration management
//! - [`exit`]: Exit codes
//! - [`error`]: Error types

pub mod api;
pub mod commands;
pub mod config;
pub mod diff;
pub mod error;
pub mod exit;
pub mod lock;
pub mod model;
pub mod runner;
pub mod store;
pub mod timing;
