use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::fault::FaultInjector;
use crate::{SimResult, SimulationError};

/// GPIOA through GPIOI.
pub const PORT_COUNT: u8 = 9;
pub const PINS_PER_PORT: u8 = 16;
pub const MAX_ALTERNATE_FUNCTION: u8 = 15;

/// Port letter for a port index ('A' for 0).
pub fn port_name(port: u8) -> char {
    (b'A' + port) as char
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinMode {
    #[default]
    Input,
    Output,
    Alternate,
    Analog,
    InterruptRising,
    InterruptFalling,
    InterruptBoth,
}

impl PinMode {
    pub fn is_interrupt(self) -> bool {
        self.trigger().is_some()
    }

    /// The edge trigger an interrupt mode reacts to, `None` for
    /// non-interrupt modes.
    pub fn trigger(self) -> Option<Trigger> {
        match self {
            PinMode::InterruptRising => Some(Trigger::Rising),
            PinMode::InterruptFalling => Some(Trigger::Falling),
            PinMode::InterruptBoth => Some(Trigger::Both),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputType {
    #[default]
    PushPull,
    OpenDrain,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speed {
    #[default]
    Low,
    Medium,
    Fast,
    High,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pull {
    #[default]
    None,
    Up,
    Down,
}

/// A single simulated signal transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Edge {
    Rising,
    Falling,
}

/// The transition type an interrupt-configured pin reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Rising,
    Falling,
    Both,
}

impl Trigger {
    pub fn matches(self, edge: Edge) -> bool {
        match self {
            Trigger::Rising => edge == Edge::Rising,
            Trigger::Falling => edge == Edge::Falling,
            Trigger::Both => true,
        }
    }
}

impl From<Trigger> for PinMode {
    fn from(trigger: Trigger) -> Self {
        match trigger {
            Trigger::Rising => PinMode::InterruptRising,
            Trigger::Falling => PinMode::InterruptFalling,
            Trigger::Both => PinMode::InterruptBoth,
        }
    }
}

/// Non-fatal conditions an operation reports inside `Ok`.
///
/// These model register writes real hardware silently accepts even
/// though they rarely do what the firmware intended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigWarning {
    /// Alternate function applied to a pin not in alternate mode.
    NotAlternateMode,
    /// Level driven onto a pin not in output mode.
    NotOutputMode,
}

/// Callback invoked on a matching simulated edge, with (port, pin).
pub type PinHandler = Box<dyn FnMut(u8, u8) + Send>;

#[derive(Default)]
pub struct Pin {
    pub(crate) mode: PinMode,
    pub(crate) output_type: OutputType,
    pub(crate) speed: Speed,
    pub(crate) pull: Pull,
    pub(crate) alternate_function: u8,
    pub(crate) value: bool,
    pub(crate) handler: Option<PinHandler>,
}

impl fmt::Debug for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pin")
            .field("mode", &self.mode)
            .field("output_type", &self.output_type)
            .field("speed", &self.speed)
            .field("pull", &self.pull)
            .field("alternate_function", &self.alternate_function)
            .field("value", &self.value)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

#[derive(Debug)]
pub struct GpioPort {
    pub(crate) pins: [Pin; PINS_PER_PORT as usize],
    pub(crate) clock_enabled: bool,
    index: u8,
}

impl GpioPort {
    fn new(index: u8) -> Self {
        Self {
            pins: std::array::from_fn(|_| Pin::default()),
            clock_enabled: false,
            index,
        }
    }

    pub fn name(&self) -> char {
        port_name(self.index)
    }

    pub fn clock_enabled(&self) -> bool {
        self.clock_enabled
    }
}

/// The virtual GPIO subsystem: nine 16-pin ports with clock gating,
/// pin multiplexing and edge-interrupt simulation.
#[derive(Debug)]
pub struct VirtualGpio {
    pub(crate) ports: [GpioPort; PORT_COUNT as usize],
    faults: FaultInjector,
    rng: StdRng,
}

impl VirtualGpio {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        tracing::info!(
            "initialized {} GPIO ports with {} pins each",
            PORT_COUNT,
            PINS_PER_PORT
        );
        Self {
            ports: std::array::from_fn(|i| GpioPort::new(i as u8)),
            faults: FaultInjector::new(),
            rng,
        }
    }

    pub fn faults_mut(&mut self) -> &mut FaultInjector {
        &mut self.faults
    }

    pub fn port(&self, port: u8) -> SimResult<&GpioPort> {
        Self::check_port(port)?;
        Ok(&self.ports[port as usize])
    }

    fn check_port(port: u8) -> SimResult<()> {
        if port >= PORT_COUNT {
            return Err(SimulationError::InvalidPort(port));
        }
        Ok(())
    }

    fn check_pin(port: u8, pin: u8) -> SimResult<()> {
        Self::check_port(port)?;
        if pin >= PINS_PER_PORT {
            return Err(SimulationError::InvalidPin(pin));
        }
        Ok(())
    }

    fn pin_mut(&mut self, port: u8, pin: u8) -> &mut Pin {
        &mut self.ports[port as usize].pins[pin as usize]
    }

    pub fn enable_clock(&mut self, port: u8) -> SimResult<()> {
        Self::check_port(port)?;
        self.faults.roll(&mut self.rng)?;

        self.ports[port as usize].clock_enabled = true;
        tracing::info!("clock enabled for GPIO{}", port_name(port));
        Ok(())
    }

    pub fn configure_pin(
        &mut self,
        port: u8,
        pin: u8,
        mode: PinMode,
        output_type: OutputType,
        speed: Speed,
        pull: Pull,
    ) -> SimResult<()> {
        Self::check_pin(port, pin)?;
        if !self.ports[port as usize].clock_enabled {
            tracing::warn!("configure rejected, GPIO{} clock is off", port_name(port));
            return Err(SimulationError::ClockNotEnabled(port));
        }
        // Interrupt modes carry a handler and go through
        // configure_interrupt instead.
        if mode.is_interrupt() {
            return Err(SimulationError::ConfigurationError);
        }
        self.faults.roll(&mut self.rng)?;

        let p = self.pin_mut(port, pin);
        p.mode = mode;
        p.output_type = output_type;
        p.speed = speed;
        p.pull = pull;

        tracing::info!(
            "configured GPIO{}.{}: mode={:?} type={:?} speed={:?} pull={:?}",
            port_name(port),
            pin,
            mode,
            output_type,
            speed,
            pull
        );
        Ok(())
    }

    /// Select which peripheral signal (AF0-AF15) drives the pin.
    ///
    /// Applying a mux to a pin that is not in alternate mode is accepted
    /// but reported back, mirroring the silent misconfiguration real
    /// silicon allows.
    pub fn set_alternate_function(
        &mut self,
        port: u8,
        pin: u8,
        af: u8,
    ) -> SimResult<Option<ConfigWarning>> {
        if port >= PORT_COUNT || pin >= PINS_PER_PORT || af > MAX_ALTERNATE_FUNCTION {
            return Err(SimulationError::PinMuxError);
        }
        self.faults.roll(&mut self.rng)?;

        let name = port_name(port);
        let p = self.pin_mut(port, pin);
        let warning = if p.mode != PinMode::Alternate {
            tracing::warn!("GPIO{}.{} is not in alternate mode", name, pin);
            Some(ConfigWarning::NotAlternateMode)
        } else {
            None
        };
        p.alternate_function = af;

        tracing::info!("GPIO{}.{} alternate function set to AF{}", name, pin, af);
        Ok(warning)
    }

    /// Drive a logic level onto the pin. Writing to a non-output pin is
    /// honored (the register accepts it) but reported back.
    pub fn write_pin(&mut self, port: u8, pin: u8, value: bool) -> SimResult<Option<ConfigWarning>> {
        Self::check_pin(port, pin)?;
        self.faults.roll(&mut self.rng)?;

        let name = port_name(port);
        let p = self.pin_mut(port, pin);
        let warning = if p.mode != PinMode::Output {
            tracing::warn!("writing to non-output pin GPIO{}.{}", name, pin);
            Some(ConfigWarning::NotOutputMode)
        } else {
            None
        };
        p.value = value;

        tracing::debug!("GPIO{}.{} <- {}", name, pin, value as u8);
        Ok(warning)
    }

    /// Read the pin level. Input pins resolve through their pull
    /// resistor (a floating input reads a random level); any other mode
    /// returns the last driven value.
    pub fn read_pin(&mut self, port: u8, pin: u8) -> SimResult<bool> {
        Self::check_pin(port, pin)?;
        self.faults.roll(&mut self.rng)?;

        let name = port_name(port);
        let (mode, pull) = {
            let p = &self.ports[port as usize].pins[pin as usize];
            (p.mode, p.pull)
        };
        let value = if mode == PinMode::Input {
            let level = match pull {
                Pull::Up => true,
                Pull::Down => false,
                Pull::None => self.rng.gen(),
            };
            self.pin_mut(port, pin).value = level;
            level
        } else {
            self.ports[port as usize].pins[pin as usize].value
        };

        tracing::debug!("GPIO{}.{} -> {}", name, pin, value as u8);
        Ok(value)
    }

    /// Invert the pin level regardless of mode; returns the new level.
    pub fn toggle_pin(&mut self, port: u8, pin: u8) -> SimResult<bool> {
        Self::check_pin(port, pin)?;
        self.faults.roll(&mut self.rng)?;

        let name = port_name(port);
        let p = self.pin_mut(port, pin);
        p.value = !p.value;
        let value = p.value;

        tracing::debug!("GPIO{}.{} toggled to {}", name, pin, value as u8);
        Ok(value)
    }

    /// Arm the pin for edge interrupts and store the handler invoked on
    /// a matching simulated edge.
    pub fn configure_interrupt(
        &mut self,
        port: u8,
        pin: u8,
        trigger: Trigger,
        handler: Option<PinHandler>,
    ) -> SimResult<()> {
        if port >= PORT_COUNT || pin >= PINS_PER_PORT {
            return Err(SimulationError::InterruptConfigurationError);
        }
        self.faults.roll(&mut self.rng)?;

        let name = port_name(port);
        let p = self.pin_mut(port, pin);
        p.mode = trigger.into();
        p.handler = handler;

        tracing::info!(
            "interrupt configured for GPIO{}.{} ({:?} trigger)",
            name,
            pin,
            trigger
        );
        Ok(())
    }

    /// Simulate an external edge on the pin. Invokes the stored handler
    /// synchronously iff the pin is armed and the edge matches its
    /// trigger; everything else is a warning-level no-op.
    pub fn simulate_interrupt(&mut self, port: u8, pin: u8, edge: Edge) {
        if port >= PORT_COUNT || pin >= PINS_PER_PORT {
            tracing::warn!("cannot simulate interrupt on invalid pin {}.{}", port, pin);
            return;
        }

        let name = port_name(port);
        let p = self.pin_mut(port, pin);
        let Some(trigger) = p.mode.trigger() else {
            tracing::warn!("GPIO{}.{} is not configured for interrupts", name, pin);
            return;
        };
        if !trigger.matches(edge) {
            tracing::debug!(
                "GPIO{}.{} ignores {:?} edge ({:?} trigger)",
                name,
                pin,
                edge,
                trigger
            );
            return;
        }

        match p.handler.as_mut() {
            Some(handler) => {
                tracing::info!("interrupt triggered on GPIO{}.{} ({:?} edge)", name, pin, edge);
                handler(port, pin);
            }
            None => tracing::warn!("no interrupt handler registered for GPIO{}.{}", name, pin),
        }
    }
}

impl Default for VirtualGpio {
    fn default() -> Self {
        Self::new()
    }
}
