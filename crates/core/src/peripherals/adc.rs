use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{SimResult, SimulationError};

pub const ADC_CHANNEL_COUNT: u8 = 16;
/// 10-bit conversions.
pub const ADC_RESOLUTION: u16 = 1024;

/// Trivial ADC stub: every read draws a fresh sample from the seeded
/// RNG and caches it as the channel's last conversion.
#[derive(Debug)]
pub struct VirtualAdc {
    channels: [u16; ADC_CHANNEL_COUNT as usize],
    rng: StdRng,
}

impl VirtualAdc {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            channels: [0; ADC_CHANNEL_COUNT as usize],
            rng,
        }
    }

    pub fn read(&mut self, channel: u8) -> SimResult<u16> {
        if channel >= ADC_CHANNEL_COUNT {
            return Err(SimulationError::InvalidAdcChannel(channel));
        }

        let sample = self.rng.gen_range(0..ADC_RESOLUTION);
        self.channels[channel as usize] = sample;
        tracing::debug!("ADC channel {} -> {}", channel, sample);
        Ok(sample)
    }

    /// Last conversion for the channel, if it is in range.
    pub fn last_value(&self, channel: u8) -> Option<u16> {
        self.channels.get(channel as usize).copied()
    }
}

impl Default for VirtualAdc {
    fn default() -> Self {
        Self::new()
    }
}
