use serde::{Deserialize, Serialize};

use crate::peripherals::gpio::{OutputType, PinMode, Pull, Speed, VirtualGpio};
use crate::peripherals::nvic::VirtualNvic;
use crate::Board;

/// Serializable dump of the whole board, handlers elided.
#[derive(Debug, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub gpio: Vec<PortSnapshot>,
    pub nvic: NvicSnapshot,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PortSnapshot {
    pub name: char,
    pub clock_enabled: bool,
    pub pins: Vec<PinSnapshot>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PinSnapshot {
    pub pin: u8,
    pub mode: PinMode,
    pub output_type: OutputType,
    pub speed: Speed,
    pub pull: Pull,
    pub alternate_function: u8,
    pub value: bool,
    pub has_handler: bool,
}

/// The global gate plus every line worth showing: enabled, pending or
/// active ones. Untouched lines are omitted.
#[derive(Debug, Serialize, Deserialize)]
pub struct NvicSnapshot {
    pub global_enabled: bool,
    pub lines: Vec<IrqSnapshot>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IrqSnapshot {
    pub id: u16,
    pub name: String,
    pub enabled: bool,
    pub pending: bool,
    pub active: bool,
    pub priority: u8,
    pub has_handler: bool,
}

impl BoardSnapshot {
    pub fn capture(board: &Board) -> Self {
        Self {
            gpio: capture_gpio(&board.gpio),
            nvic: capture_nvic(&board.nvic),
        }
    }
}

fn capture_gpio(gpio: &VirtualGpio) -> Vec<PortSnapshot> {
    gpio.ports
        .iter()
        .map(|port| PortSnapshot {
            name: port.name(),
            clock_enabled: port.clock_enabled,
            pins: port
                .pins
                .iter()
                .enumerate()
                .map(|(n, pin)| PinSnapshot {
                    pin: n as u8,
                    mode: pin.mode,
                    output_type: pin.output_type,
                    speed: pin.speed,
                    pull: pin.pull,
                    alternate_function: pin.alternate_function,
                    value: pin.value,
                    has_handler: pin.handler.is_some(),
                })
                .collect(),
        })
        .collect()
}

fn capture_nvic(nvic: &VirtualNvic) -> NvicSnapshot {
    NvicSnapshot {
        global_enabled: nvic.global_enabled(),
        lines: nvic
            .lines
            .iter()
            .enumerate()
            .filter(|(_, line)| line.enabled || line.pending || line.active)
            .map(|(id, line)| IrqSnapshot {
                id: id as u16,
                name: line.name.clone(),
                enabled: line.enabled,
                pending: line.pending,
                active: line.active,
                priority: line.priority,
                has_handler: line.handler.is_some(),
            })
            .collect(),
    }
}
