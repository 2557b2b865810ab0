//! Module boundary: the exported symbols the host resolves after loading.
//!
//! Only the functions in this module cross the module boundary. Each one
//! returns a [`ModuleStatus`] from the closed boundary set and never
//! unwinds; every other item in the crate is private implementation behind
//! these three symbols.
//!
//! Host contract:
//! 1. Load the module and resolve `trellis_export_capabilities`,
//!    `trellis_request_capability`, and `trellis_pre_unload` by name.
//! 2. Call `trellis_request_capability` from any thread, any number of
//!    times, until quiescence.
//! 3. Call `trellis_pre_unload` once, after no further requests will be
//!    issued, then unmap the module. The module never unmaps itself.

use std::sync::Once;

use log::{debug, error, info};
use once_cell::sync::Lazy;

use crate::capability::CapabilityInstance;
use crate::config::ModuleSettings;
use crate::registry::CapabilityRegistry;
use crate::status::ModuleStatus;
use crate::table::{CapabilityEntry, CapabilityTable};

/// Module-wide state: created when the host first calls into the module,
/// logically destroyed by `trellis_pre_unload`.
struct ModuleState {
    registry: CapabilityRegistry,
    exports: CapabilityTable,
}

static MODULE: Lazy<ModuleState> = Lazy::new(|| {
    init_logging();
    info!("Trellis extension module initialized");
    ModuleState {
        registry: CapabilityRegistry::new(),
        // The scaffold exports no table entries; real modules register one
        // entry per node or feature kind here.
        exports: CapabilityTable::new(),
    }
});

/// Initialize the logging stack once, before the first log line.
fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let settings = ModuleSettings::load().unwrap_or_default();
        let _ = env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or(settings.effective_filter()),
        )
        .format_timestamp_millis()
        .try_init();
    });
}

/// Resolve a capability request against `registry`, writing the instance
/// handle through `out_instance` on success.
///
/// The output slot is written only on `Success`; unknown versions are
/// reported as `NotFound` so the host can keep probing.
///
/// # Safety
/// `out_instance`, when non-null, must point to writable storage for one
/// pointer.
pub unsafe fn request_capability_with(
    registry: &CapabilityRegistry,
    version_key: u32,
    out_instance: *mut *const CapabilityInstance,
) -> ModuleStatus {
    if out_instance.is_null() {
        error!("trellis_request_capability: out_instance is null");
        return ModuleStatus::InvalidCall;
    }

    match registry.get_or_create(version_key) {
        Ok(handle) => {
            *out_instance = handle.as_ptr();
            ModuleStatus::Success
        }
        Err(err) => {
            let status = ModuleStatus::from(&err);
            if status == ModuleStatus::NotFound {
                debug!("trellis_request_capability: {}", err);
            } else {
                error!("trellis_request_capability: {}", err);
            }
            status
        }
    }
}

/// Tear down every instance owned by `registry`. Idempotent.
pub fn pre_unload_with(registry: &CapabilityRegistry) -> ModuleStatus {
    let released = registry.teardown_all();
    if released > 0 {
        info!("released {} capability instance(s)", released);
    }
    ModuleStatus::Success
}

/// Report the module's capability table to the host.
///
/// Two-phase protocol: the host first calls with `out_entries` null to learn
/// the entry count and size its own storage, then calls again with a buffer
/// of at least `*out_count` entries. The count is always written; the module
/// never allocates host-visible memory.
///
/// # Safety
/// `out_count` must point to writable storage for one `usize`. `out_entries`
/// must be null or point to writable storage for at least the previously
/// reported number of entries.
#[no_mangle]
pub unsafe extern "C" fn trellis_export_capabilities(
    out_count: *mut usize,
    out_entries: *mut CapabilityEntry,
) -> ModuleStatus {
    let module = &*MODULE;

    if out_count.is_null() {
        error!("trellis_export_capabilities: out_count is null");
        return ModuleStatus::InvalidCall;
    }

    let entries = module.exports.entries();
    *out_count = entries.len();

    if out_entries.is_null() {
        return ModuleStatus::Success;
    }
    std::ptr::copy_nonoverlapping(entries.as_ptr(), out_entries, entries.len());
    ModuleStatus::Success
}

/// Obtain the capability instance for `version_key`, constructing it on
/// first request.
///
/// Repeated requests for the same key return the same instance. Safe to
/// call concurrently from multiple host threads.
///
/// # Safety
/// `out_instance` must be null or point to writable storage for one
/// pointer. The returned instance stays valid until `trellis_pre_unload`.
#[no_mangle]
pub unsafe extern "C" fn trellis_request_capability(
    version_key: u32,
    out_instance: *mut *const CapabilityInstance,
) -> ModuleStatus {
    request_capability_with(&MODULE.registry, version_key, out_instance)
}

/// Release every capability instance before the host unmaps the module.
///
/// Idempotent, and safe to call even if no capability was ever requested.
/// After this returns, further `trellis_request_capability` calls are a
/// host contract violation and report `InvalidCall`.
#[no_mangle]
pub extern "C" fn trellis_pre_unload() -> ModuleStatus {
    pre_unload_with(&MODULE.registry)
}
