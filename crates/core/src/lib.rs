pub mod fault;
pub mod peripherals;
pub mod snapshot;

mod tests;

use peripherals::adc::VirtualAdc;
use peripherals::gpio::{port_name, VirtualGpio};
use peripherals::nvic::VirtualNvic;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SimulationError {
    #[error("invalid GPIO port {0}")]
    InvalidPort(u8),
    #[error("invalid GPIO pin {0}")]
    InvalidPin(u8),
    #[error("clock not enabled for GPIO{}", port_name(*.0))]
    ClockNotEnabled(u8),
    #[error("unsupported pin configuration")]
    ConfigurationError,
    #[error("invalid interrupt configuration")]
    InterruptConfigurationError,
    #[error("invalid pin mux request")]
    PinMuxError,
    #[error("invalid IRQ number {0}")]
    InvalidIrq(u16),
    #[error("invalid priority {0} (max 15)")]
    InvalidPriority(u8),
    #[error("invalid ADC channel {0}")]
    InvalidAdcChannel(u8),
    #[error("injected fault")]
    InjectedFault,
}

pub type SimResult<T> = Result<T, SimulationError>;

/// One simulated board: GPIO banks, interrupt controller and ADC.
///
/// All peripheral state is owned here, so independent boards can run
/// side by side (e.g. in parallel tests). Construction performs the
/// whole reset-state initialization; there is no lazy global table.
#[derive(Debug)]
pub struct Board {
    pub gpio: VirtualGpio,
    pub nvic: VirtualNvic,
    pub adc: VirtualAdc,
}

impl Board {
    /// Build a board seeded from OS entropy.
    pub fn new() -> Self {
        Self {
            gpio: VirtualGpio::new(),
            nvic: VirtualNvic::new(),
            adc: VirtualAdc::new(),
        }
    }

    /// Build a board with a fixed seed so floating-input reads, ADC
    /// samples and fault-injection rolls replay exactly.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            gpio: VirtualGpio::with_seed(seed),
            nvic: VirtualNvic::with_seed(seed.wrapping_add(1)),
            adc: VirtualAdc::with_seed(seed.wrapping_add(2)),
        }
    }

    /// Toggle fault injection for both the GPIO and NVIC subsystems.
    pub fn set_fault_injection(&mut self, enabled: bool) {
        self.gpio.faults_mut().set_enabled(enabled);
        self.nvic.faults_mut().set_enabled(enabled);
    }

    pub fn snapshot(&self) -> snapshot::BoardSnapshot {
        snapshot::BoardSnapshot::capture(self)
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}
