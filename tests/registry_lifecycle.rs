//! Lifecycle coverage for the versioned capability registry.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use trellis_ext_module::baseline::BASELINE_VERSION_KEY;
use trellis_ext_module::{
    Capability, CapabilityInstance, CapabilityRegistry, ModuleError, RecipeFn,
};

/// Inert surface for registry-focused tests.
struct ProbeCapability {
    version_key: u32,
}

impl Capability for ProbeCapability {
    fn version(&self) -> u32 {
        self.version_key
    }

    fn emit_greeting(&self) {}

    fn combine(&self, a: i64, b: i64) -> i64 {
        a.wrapping_add(b)
    }
}

#[test]
fn repeated_requests_return_one_identity() {
    let registry = CapabilityRegistry::new();

    let first = registry
        .get_or_create(BASELINE_VERSION_KEY)
        .expect("first request constructs");
    let second = registry
        .get_or_create(BASELINE_VERSION_KEY)
        .expect("second request is a cache hit");
    let third = registry
        .get_or_create(BASELINE_VERSION_KEY)
        .expect("third request is a cache hit");

    assert_eq!(first.as_ptr(), second.as_ptr());
    assert_eq!(second.as_ptr(), third.as_ptr());
    assert_eq!(registry.live_instances(), 1);
}

#[test]
fn unknown_version_leaves_the_map_unchanged() {
    let registry = CapabilityRegistry::new();

    let err = registry.get_or_create(7).expect_err("no recipe for 7");
    assert!(matches!(err, ModuleError::UnknownVersion(7)));
    assert_eq!(registry.live_instances(), 0);

    // A later request for a known key is unaffected by the failed probe.
    registry
        .get_or_create(BASELINE_VERSION_KEY)
        .expect("baseline still constructible");
    assert_eq!(registry.live_instances(), 1);
}

#[test]
fn concurrent_first_requests_construct_exactly_once() {
    static CONSTRUCTIONS: AtomicUsize = AtomicUsize::new(0);

    fn counting_recipe(version_key: u32) -> Result<CapabilityInstance, ModuleError> {
        CONSTRUCTIONS.fetch_add(1, Ordering::SeqCst);
        Ok(CapabilityInstance::new(
            version_key,
            Box::new(ProbeCapability { version_key }),
        ))
    }

    const THREADS: usize = 8;
    const VERSION: u32 = 3;

    let recipes = BTreeMap::from([(VERSION, counting_recipe as RecipeFn)]);
    let registry = Arc::new(CapabilityRegistry::with_recipes(recipes));
    let barrier = Arc::new(Barrier::new(THREADS));

    let mut workers = Vec::with_capacity(THREADS);
    for _ in 0..THREADS {
        let registry = Arc::clone(&registry);
        let barrier = Arc::clone(&barrier);
        workers.push(thread::spawn(move || {
            barrier.wait();
            let handle = registry
                .get_or_create(VERSION)
                .expect("concurrent request succeeds");
            handle.as_ptr() as usize
        }));
    }

    let addresses: Vec<usize> = workers
        .into_iter()
        .map(|worker| worker.join().expect("worker thread"))
        .collect();

    assert_eq!(CONSTRUCTIONS.load(Ordering::SeqCst), 1);
    assert!(addresses.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(registry.live_instances(), 1);
}

#[test]
fn teardown_releases_instance_resources_once() {
    static DROPPED: AtomicUsize = AtomicUsize::new(0);

    struct DropTrackingCapability;

    impl Capability for DropTrackingCapability {
        fn version(&self) -> u32 {
            9
        }

        fn emit_greeting(&self) {}

        fn combine(&self, a: i64, b: i64) -> i64 {
            a.wrapping_add(b)
        }
    }

    impl Drop for DropTrackingCapability {
        fn drop(&mut self) {
            DROPPED.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn tracking_recipe(version_key: u32) -> Result<CapabilityInstance, ModuleError> {
        Ok(CapabilityInstance::new(
            version_key,
            Box::new(DropTrackingCapability),
        ))
    }

    let recipes = BTreeMap::from([(9u32, tracking_recipe as RecipeFn)]);
    let registry = CapabilityRegistry::with_recipes(recipes);
    registry.get_or_create(9).expect("construction");
    assert_eq!(DROPPED.load(Ordering::SeqCst), 0);

    assert_eq!(registry.teardown_all(), 1);
    assert_eq!(DROPPED.load(Ordering::SeqCst), 1);

    // The second teardown must not double-free anything.
    assert_eq!(registry.teardown_all(), 0);
    assert_eq!(DROPPED.load(Ordering::SeqCst), 1);
}

#[test]
fn failed_construction_is_retried_on_the_next_request() {
    static FAILED_ONCE: AtomicBool = AtomicBool::new(false);

    fn flaky_recipe(version_key: u32) -> Result<CapabilityInstance, ModuleError> {
        if !FAILED_ONCE.swap(true, Ordering::SeqCst) {
            return Err(ModuleError::ConstructionFailed {
                key: version_key,
                reason: "transient allocation failure".to_string(),
            });
        }
        Ok(CapabilityInstance::new(
            version_key,
            Box::new(ProbeCapability { version_key }),
        ))
    }

    let recipes = BTreeMap::from([(4u32, flaky_recipe as RecipeFn)]);
    let registry = CapabilityRegistry::with_recipes(recipes);

    let err = registry.get_or_create(4).expect_err("first attempt fails");
    assert!(matches!(err, ModuleError::ConstructionFailed { key: 4, .. }));
    assert_eq!(registry.live_instances(), 0);

    // The failure is not remembered; the key stays constructible.
    registry.get_or_create(4).expect("retry succeeds");
    assert_eq!(registry.live_instances(), 1);
}

#[test]
fn full_module_lifetime_scenario() {
    let registry = CapabilityRegistry::new();

    // First request constructs instance A.
    let a = registry
        .get_or_create(BASELINE_VERSION_KEY)
        .expect("instance A");

    // Second request returns the same identity, no new construction.
    let again = registry
        .get_or_create(BASELINE_VERSION_KEY)
        .expect("cache hit");
    assert_eq!(a.as_ptr(), again.as_ptr());
    assert_eq!(registry.live_instances(), 1);

    // Probing an unsupported version is recoverable.
    assert!(matches!(
        registry.get_or_create(7),
        Err(ModuleError::UnknownVersion(7))
    ));

    // Teardown empties the map; a second teardown is a no-op.
    assert_eq!(registry.teardown_all(), 1);
    assert_eq!(registry.live_instances(), 0);
    assert!(registry.is_torn_down());
    assert_eq!(registry.teardown_all(), 0);

    // Defensive behavior on contract violation: no corruption, typed error.
    assert!(matches!(
        registry.get_or_create(BASELINE_VERSION_KEY),
        Err(ModuleError::TornDown)
    ));
}
