//! # Domain Model
//!
//! - [`property`]: typed property values, provenance, well-known names and defaults
//! - [`record`]: records, their kinds and snapshot identity
//! - [`tree`]: the record arena and the inheritance engine
//! - [`period`]: snapshot periods and their rank
//! - [`snapshot`]: snapshot ordering, naming and option rendering

pub mod period;
pub mod property;
pub mod record;
pub mod snapshot;
pub mod tree;

pub use period::SnapshotPeriod;
pub use property::{names, Property, PropertyValue, RecursionMode};
pub use record::{Record, RecordId, RecordKind, SnapshotInfo};
pub use snapshot::{render_snapshot_options, snapshot_name, SnapshotOrderKey};
pub use tree::RecordTree;
