//! Capability surface and instance types.

use std::fmt;
use std::ptr::NonNull;

/// Behavior one capability instance exposes to the host.
///
/// The host holds an opaque handle to a [`CapabilityInstance`] and invokes
/// the surface through it. Implementations must be callable from any host
/// thread.
pub trait Capability: Send + Sync {
    /// Minor version this surface implements.
    fn version(&self) -> u32;

    /// Log a fixed greeting through the module's logging stack.
    fn emit_greeting(&self);

    /// Combine two numeric values.
    fn combine(&self, a: i64, b: i64) -> i64;
}

/// One live realization of a capability for a specific minor version.
///
/// Instances are heap-pinned by the registry: their address is stable from
/// construction until teardown, so the host may retain the handle between
/// requests. The instance owns its surface and every resource the surface
/// allocated; both are released when the registry drops the instance.
pub struct CapabilityInstance {
    version_key: u32,
    surface: Box<dyn Capability>,
}

impl CapabilityInstance {
    pub fn new(version_key: u32, surface: Box<dyn Capability>) -> Self {
        Self {
            version_key,
            surface,
        }
    }

    /// Version key this instance was constructed for.
    pub fn version_key(&self) -> u32 {
        self.version_key
    }

    /// The capability surface the host invokes.
    pub fn surface(&self) -> &dyn Capability {
        self.surface.as_ref()
    }
}

impl fmt::Debug for CapabilityInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityInstance")
            .field("version_key", &self.version_key)
            .finish_non_exhaustive()
    }
}

/// Opaque, stable reference to a registry-owned capability instance.
///
/// The registry keeps the pointee alive and never moves it; the handle stays
/// valid until the registry's teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityHandle(NonNull<CapabilityInstance>);

impl CapabilityHandle {
    pub(crate) fn new(instance: &CapabilityInstance) -> Self {
        Self(NonNull::from(instance))
    }

    /// Raw pointer form handed across the module boundary.
    pub fn as_ptr(&self) -> *const CapabilityInstance {
        self.0.as_ptr()
    }

    /// Borrow the referenced instance.
    ///
    /// # Safety
    /// The registry that produced this handle must not have been torn down.
    pub unsafe fn instance(&self) -> &CapabilityInstance {
        self.0.as_ref()
    }
}

// The pointee is Send + Sync (its surface is) and the registry guarantees it
// outlives every handle, so handles may cross host threads.
unsafe impl Send for CapabilityHandle {}
unsafe impl Sync for CapabilityHandle {}
