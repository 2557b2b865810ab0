//! Baseline capability constructed by the version-0 recipe.

use log::info;

use crate::capability::Capability;

/// Version key the baseline recipe is registered under.
pub const BASELINE_VERSION_KEY: u32 = 0;

/// Greeting line emitted by the baseline surface.
pub const BASELINE_GREETING: &str = "Hello from the Trellis baseline capability";

/// Minimal capability surface: a greeting logger and an integer combiner.
pub struct BaselineCapability {
    greeting: String,
}

impl BaselineCapability {
    pub fn new() -> Self {
        Self {
            greeting: BASELINE_GREETING.to_string(),
        }
    }
}

impl Default for BaselineCapability {
    fn default() -> Self {
        Self::new()
    }
}

impl Capability for BaselineCapability {
    fn version(&self) -> u32 {
        BASELINE_VERSION_KEY
    }

    fn emit_greeting(&self) {
        info!("{}", self.greeting);
    }

    fn combine(&self, a: i64, b: i64) -> i64 {
        a.wrapping_add(b)
    }
}
