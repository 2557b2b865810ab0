//! Versioned capability registry: lazy construction, caching, and teardown.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use log::{debug, info};

use crate::baseline::{BaselineCapability, BASELINE_VERSION_KEY};
use crate::capability::{CapabilityHandle, CapabilityInstance};
use crate::error::ModuleError;

/// Construction recipe for one version key.
///
/// Recipes must be cheap and must not block: they run under the registry
/// lock so that concurrent first requests for one key collapse into a single
/// construction.
pub type RecipeFn = fn(u32) -> Result<CapabilityInstance, ModuleError>;

struct RegistryState {
    instances: HashMap<u32, Box<CapabilityInstance>>,
    torn_down: bool,
}

/// Owner of every capability instance the module hands out.
///
/// Instances are created on first request for their version key, cached for
/// the lifetime of the module, and destroyed together by [`teardown_all`]
/// before the host unmaps the module. No other component frees an instance.
///
/// [`teardown_all`]: CapabilityRegistry::teardown_all
pub struct CapabilityRegistry {
    recipes: BTreeMap<u32, RecipeFn>,
    state: Mutex<RegistryState>,
}

impl CapabilityRegistry {
    /// Registry with the module's built-in recipes (version 0 only).
    pub fn new() -> Self {
        let mut recipes = BTreeMap::new();
        recipes.insert(BASELINE_VERSION_KEY, baseline_recipe as RecipeFn);
        Self::with_recipes(recipes)
    }

    /// Registry with an explicit recipe table.
    pub fn with_recipes(recipes: BTreeMap<u32, RecipeFn>) -> Self {
        Self {
            recipes,
            state: Mutex::new(RegistryState {
                instances: HashMap::new(),
                torn_down: false,
            }),
        }
    }

    /// Version keys that have a construction recipe, in ascending order.
    ///
    /// Hosts probe unknown versions and treat `NotFound` as recoverable;
    /// this is the authoritative list of keys that will succeed.
    pub fn supported_versions(&self) -> Vec<u32> {
        self.recipes.keys().copied().collect()
    }

    /// Return the instance for `version_key`, constructing it on first
    /// request.
    ///
    /// A cache hit performs no construction work. A miss consults the recipe
    /// table; an absent recipe is `UnknownVersion`, a failed recipe leaves
    /// the key unoccupied so a later request retries it. The whole
    /// check/construct/insert sequence holds the registry lock, so at most
    /// one instance is ever constructed per key.
    pub fn get_or_create(&self, version_key: u32) -> Result<CapabilityHandle, ModuleError> {
        let mut state = self.lock_state();
        if state.torn_down {
            return Err(ModuleError::TornDown);
        }

        if let Some(existing) = state.instances.get(&version_key) {
            debug!("capability cache hit for version {}", version_key);
            return Ok(CapabilityHandle::new(existing.as_ref()));
        }

        let recipe = self
            .recipes
            .get(&version_key)
            .ok_or(ModuleError::UnknownVersion(version_key))?;

        let instance = Box::new(recipe(version_key)?);
        info!("constructed capability instance for version {}", version_key);

        // The box pins the instance; moving the box into the map does not
        // move the pointee, so the handle taken here stays valid.
        let handle = CapabilityHandle::new(instance.as_ref());
        state.instances.insert(version_key, instance);
        Ok(handle)
    }

    /// Destroy every currently-held instance and empty the map.
    ///
    /// Idempotent: a second call is a no-op. Each instance releases its own
    /// resources (surface first) as it is dropped out of the map. Returns
    /// the number of instances released.
    pub fn teardown_all(&self) -> usize {
        let mut state = self.lock_state();
        if state.torn_down {
            debug!("capability registry already torn down");
            return 0;
        }
        state.torn_down = true;

        let count = state.instances.len();
        for (version_key, instance) in state.instances.drain() {
            debug!("releasing capability instance for version {}", version_key);
            drop(instance);
        }
        count
    }

    /// Number of live instances. Zero after teardown.
    pub fn live_instances(&self) -> usize {
        self.lock_state().instances.len()
    }

    /// Whether [`teardown_all`](CapabilityRegistry::teardown_all) has run.
    pub fn is_torn_down(&self) -> bool {
        self.lock_state().torn_down
    }

    fn lock_state(&self) -> MutexGuard<'_, RegistryState> {
        // No code path panics while holding the lock; recover the guard
        // rather than propagate poison.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn baseline_recipe(_version_key: u32) -> Result<CapabilityInstance, ModuleError> {
    Ok(CapabilityInstance::new(
        BASELINE_VERSION_KEY,
        Box::new(BaselineCapability::new()),
    ))
}
