//! Trellis Native Extension Module
//!
//! This dynamic library is loaded by the Trellis host engine. After loading,
//! the host resolves three exported symbols and drives the module through
//! them:
//!
//! - `trellis_export_capabilities` - two-phase (count, then fill) export of
//!   the module's capability function table
//! - `trellis_request_capability` - obtain a lazily-constructed, cached
//!   capability instance for a minor version
//! - `trellis_pre_unload` - one-shot teardown of every capability instance
//!   before the host unmaps the module
//!
//! Everything else is private implementation: the versioned capability
//! registry, the baseline capability surface, and the module settings.

pub mod baseline;
pub mod boundary;
pub mod capability;
pub mod config;
pub mod error;
pub mod registry;
pub mod status;
pub mod table;

pub use capability::{Capability, CapabilityHandle, CapabilityInstance};
pub use config::ModuleSettings;
pub use error::ModuleError;
pub use registry::{CapabilityRegistry, RecipeFn};
pub use status::ModuleStatus;
pub use table::{CapabilityEntry, CapabilityTable};
