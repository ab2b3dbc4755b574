use rand::rngs::StdRng;
use rand::Rng;

use crate::{SimResult, SimulationError};

pub const DEFAULT_FAULT_PROBABILITY: f64 = 0.1;

/// Probabilistic fault gate shared by the simulated peripherals.
///
/// Every mutating operation rolls against the gate before touching any
/// state, so a rejected call is guaranteed side-effect free. The roll
/// draws from the owning peripheral's seeded RNG, which keeps failing
/// sequences reproducible.
#[derive(Debug, Clone)]
pub struct FaultInjector {
    enabled: bool,
    probability: f64,
}

impl Default for FaultInjector {
    fn default() -> Self {
        Self {
            enabled: false,
            probability: DEFAULT_FAULT_PROBABILITY,
        }
    }
}

impl FaultInjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        tracing::info!(
            "fault injection {}",
            if enabled { "enabled" } else { "disabled" }
        );
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Set the per-call rejection probability, clamped to 0.0..=1.0.
    pub fn set_probability(&mut self, probability: f64) {
        self.probability = probability.clamp(0.0, 1.0);
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// Roll the gate. Draws from `rng` only while enabled, so disabled
    /// injection does not perturb the peripheral's random sequence.
    pub(crate) fn roll(&self, rng: &mut StdRng) -> SimResult<()> {
        if self.enabled && rng.gen_bool(self.probability) {
            tracing::warn!("fault injected");
            return Err(SimulationError::InjectedFault);
        }
        Ok(())
    }
}
