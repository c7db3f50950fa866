//! Exit codes for the snapz CLI.
//!
//! Following Unix conventions for exit codes.

use crate::error::SnapzError;

/// Exit code constants.
pub mod codes {
    /// Successful execution.
    pub const SUCCESS: i32 = 0;
    /// Invalid arguments or property values.
    pub const INVALID_ARGS: i32 = 1;
    /// IO or serialization error.
    pub const IO_ERROR: i32 = 2;
    /// Unknown record or property.
    pub const NOT_FOUND: i32 = 3;
    /// One or more `zfs` commands failed.
    pub const COMMAND_FAILED: i32 = 4;
    /// Bad configuration.
    pub const CONFIG_ERROR: i32 = 5;
}

/// Map an error to an exit code. Lock failures exit with the OS status.
pub fn exit_code(error: &SnapzError) -> i32 {
    match error {
        SnapzError::MutexAcquisitionFailed { code, .. } => *code,
        SnapzError::PropertyNotFound { .. }
        | SnapzError::NoSuchProperty { .. }
        | SnapzError::RecordNotFound(_) => codes::NOT_FOUND,
        SnapzError::InvalidMutation { .. }
        | SnapzError::DuplicateRecord(_)
        | SnapzError::InvalidHierarchy(_)
        | SnapzError::InvalidValue { .. } => codes::INVALID_ARGS,
        SnapzError::CommandExecutionFailed { .. } => codes::COMMAND_FAILED,
        SnapzError::Config(_) => codes::CONFIG_ERROR,
        SnapzError::Io(_) | SnapzError::Serialization(_) => codes::IO_ERROR,
    }
}
