//! HAL-flavored facade over the simulated peripherals.
//!
//! Firmware-style code talks to this thin adapter the way it would talk
//! to a vendor HAL: one init struct per pin, combined preempt/sub
//! priorities, and passthrough pin accessors. Everything lands on the
//! virtual GPIO/NVIC underneath.

use tracing::info;

use vperiph_core::peripherals::gpio::{OutputType, PinMode};
use vperiph_core::{Board, SimResult};

pub use vperiph_core::peripherals::gpio::{Edge, Pull, Speed, Trigger};
pub use vperiph_core::SimulationError;

/// Pin mode vocabulary as a HAL presents it: mode and output type
/// folded into one value, interrupt triggers included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpioMode {
    Input,
    OutputPushPull,
    OutputOpenDrain,
    AlternatePushPull,
    AlternateOpenDrain,
    Analog,
    ItRising,
    ItFalling,
    ItRisingFalling,
}

impl GpioMode {
    fn trigger(self) -> Option<Trigger> {
        match self {
            GpioMode::ItRising => Some(Trigger::Rising),
            GpioMode::ItFalling => Some(Trigger::Falling),
            GpioMode::ItRisingFalling => Some(Trigger::Both),
            _ => None,
        }
    }

    fn pin_mode(self) -> PinMode {
        match self {
            GpioMode::Input => PinMode::Input,
            GpioMode::OutputPushPull | GpioMode::OutputOpenDrain => PinMode::Output,
            GpioMode::AlternatePushPull | GpioMode::AlternateOpenDrain => PinMode::Alternate,
            GpioMode::Analog => PinMode::Analog,
            // Interrupt modes never reach configure_pin.
            GpioMode::ItRising | GpioMode::ItFalling | GpioMode::ItRisingFalling => PinMode::Input,
        }
    }

    fn output_type(self) -> OutputType {
        match self {
            GpioMode::OutputOpenDrain | GpioMode::AlternateOpenDrain => OutputType::OpenDrain,
            _ => OutputType::PushPull,
        }
    }
}

/// Per-pin init request, the shape firmware passes to `gpio_init`.
#[derive(Debug, Clone)]
pub struct GpioInit {
    pub pin: u8,
    pub mode: GpioMode,
    pub pull: Pull,
    pub speed: Speed,
    pub alternate: u8,
}

impl GpioInit {
    pub fn new(pin: u8, mode: GpioMode) -> Self {
        Self {
            pin,
            mode,
            pull: Pull::None,
            speed: Speed::Low,
            alternate: 0,
        }
    }
}

/// The adapter. Owns the board; peripheral tables are initialized
/// exactly once, at construction.
pub struct Hal {
    pub board: Board,
}

impl Hal {
    pub fn new() -> Self {
        info!("HAL initialization");
        Self {
            board: Board::new(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        info!("HAL initialization (seed {})", seed);
        Self {
            board: Board::with_seed(seed),
        }
    }

    /// Initialize one pin: enables the port clock, then dispatches on
    /// the mode category. Interrupt modes arm the pin without a
    /// handler; alternate modes configure and then apply the mux.
    pub fn gpio_init(&mut self, port: u8, init: &GpioInit) -> SimResult<()> {
        self.board.gpio.enable_clock(port)?;

        if let Some(trigger) = init.mode.trigger() {
            self.board
                .gpio
                .configure_interrupt(port, init.pin, trigger, None)?;
        } else {
            self.board.gpio.configure_pin(
                port,
                init.pin,
                init.mode.pin_mode(),
                init.mode.output_type(),
                init.speed,
                init.pull,
            )?;
            if init.mode.pin_mode() == PinMode::Alternate {
                self.board
                    .gpio
                    .set_alternate_function(port, init.pin, init.alternate)?;
            }
        }

        info!("GPIO init complete for port {} pin {}", port, init.pin);
        Ok(())
    }

    pub fn write_pin(&mut self, port: u8, pin: u8, value: bool) -> SimResult<()> {
        self.board.gpio.write_pin(port, pin, value).map(|_| ())
    }

    pub fn read_pin(&mut self, port: u8, pin: u8) -> SimResult<bool> {
        self.board.gpio.read_pin(port, pin)
    }

    pub fn toggle_pin(&mut self, port: u8, pin: u8) -> SimResult<bool> {
        self.board.gpio.toggle_pin(port, pin)
    }

    pub fn enable_irq(&mut self, id: u16) -> SimResult<()> {
        self.board.nvic.enable_irq(id)
    }

    pub fn disable_irq(&mut self, id: u16) -> SimResult<()> {
        self.board.nvic.disable_irq(id)
    }

    /// Fold the preempt/sub pair into one 4-bit priority the way the
    /// usual grouping does: bits [3:2] preempt, bits [1:0] sub. The
    /// result is clamped to 15; there is no preemptive nesting behind
    /// it, the nibble only orders dispatch.
    pub fn set_priority(&mut self, id: u16, preempt: u8, sub: u8) -> SimResult<()> {
        let priority = ((u16::from(preempt) << 2) | u16::from(sub & 0b11)).min(15) as u8;
        self.board.nvic.set_priority(id, priority)
    }

    pub fn read_adc(&mut self, channel: u8) -> SimResult<u16> {
        self.board.adc.read(channel)
    }

    /// No real timing is modeled; the delay only shows up in the log.
    pub fn delay_ms(&self, ms: u64) {
        info!("delay {} ms (simulated)", ms);
    }
}

impl Default for Hal {
    fn default() -> Self {
        Self::new()
    }
}
