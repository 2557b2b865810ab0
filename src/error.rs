//! Internal error taxonomy for the extension module.

use thiserror::Error;

/// Errors produced inside the module.
///
/// Boundary functions translate these into [`crate::status::ModuleStatus`]
/// codes; no error unwinds across the module boundary.
#[derive(Debug, Error)]
pub enum ModuleError {
    /// The requested version key has no construction recipe.
    #[error("no capability recipe for version key {0}")]
    UnknownVersion(u32),

    /// A recipe ran but could not produce an instance.
    #[error("capability construction failed for version key {key}: {reason}")]
    ConstructionFailed { key: u32, reason: String },

    /// The registry was already torn down by `trellis_pre_unload`.
    #[error("capability registry is torn down")]
    TornDown,

    /// A required boundary pointer argument was null.
    #[error("boundary argument `{0}` is null")]
    NullArgument(&'static str),

    /// A capability table name was registered twice.
    #[error("capability table entry already registered: {0}")]
    DuplicateEntry(String),

    /// A capability table name cannot be represented as a C string.
    #[error("capability table entry name is not a valid C string: {0}")]
    InvalidEntryName(String),
}
