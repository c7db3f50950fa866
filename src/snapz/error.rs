use thiserror::Error;

#[derive(Error, Debug)]
pub enum SnapzError {
    #[error("Property {property} not found on {record} or any of its ancestors")]
    PropertyNotFound { record: String, property: String },

    #[error("Cannot inherit {property} on {record}: parent does not have it")]
    NoSuchProperty { record: String, property: String },

    #[error("Cannot change {property} on {record}: snapshot identity is immutable")]
    InvalidMutation { record: String, property: String },

    #[error("Could not acquire run lock {name} (os status {code})")]
    MutexAcquisitionFailed { name: String, code: i32 },

    #[error("Command failed for {target}: {reason}")]
    CommandExecutionFailed { target: String, reason: String },

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Record already exists: {0}")]
    DuplicateRecord(String),

    #[error("Invalid hierarchy: {0}")]
    InvalidHierarchy(String),

    #[error("Invalid value for {property}: {value}")]
    InvalidValue { property: String, value: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SnapzError>;
