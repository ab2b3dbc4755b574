use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const MAX_PORT: u8 = 8;
pub const MAX_PIN: u8 = 15;
pub const MAX_IRQ: u16 = 239;
pub const MAX_ALTERNATE: u8 = 15;

/// HAL-flavored pin mode vocabulary used in scenario files. The runner
/// maps these onto the simulator's mode/output-type/trigger split.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PinMode {
    Input,
    OutputPushPull,
    OutputOpenDrain,
    AlternatePushPull,
    AlternateOpenDrain,
    Analog,
    InterruptRising,
    InterruptFalling,
    InterruptBoth,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Pull {
    #[default]
    None,
    Up,
    Down,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Speed {
    #[default]
    Low,
    Medium,
    Fast,
    High,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Rising,
    Falling,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct BoardConfig {
    /// Fixed RNG seed; omit for an entropy-seeded run.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub fault_injection: bool,
    #[serde(default)]
    pub fault_probability: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct PinConfig {
    pub port: u8,
    pub pin: u8,
    pub mode: PinMode,
    #[serde(default)]
    pub pull: Pull,
    #[serde(default)]
    pub speed: Speed,
    #[serde(default)]
    pub alternate: u8,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct IrqConfig {
    pub id: u16,
    #[serde(default)]
    pub preempt_priority: u8,
    #[serde(default)]
    pub sub_priority: u8,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct PinLevel {
    pub port: u8,
    pub pin: u8,
    pub value: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct PinRef {
    pub port: u8,
    pub pin: u8,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct EdgeSpec {
    pub port: u8,
    pub pin: u8,
    pub edge: EdgeKind,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct WriteEvent {
    pub write: PinLevel,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ToggleEvent {
    pub toggle: PinRef,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ReadEvent {
    pub read: PinRef,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct EdgeEvent {
    pub simulate_edge: EdgeSpec,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct PendEvent {
    pub set_pending: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ProcessAllEvent {
    pub process_all: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct DelayEvent {
    pub delay_ms: u64,
}

/// One stimulus step. Each wrapper struct carries a distinct key, so
/// the untagged representation stays unambiguous.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum ScenarioEvent {
    Write(WriteEvent),
    Toggle(ToggleEvent),
    Read(ReadEvent),
    SimulateEdge(EdgeEvent),
    SetPending(PendEvent),
    ProcessAll(ProcessAllEvent),
    Delay(DelayEvent),
}

/// A full simulation scenario: board options, pin and IRQ setup, and a
/// stimulus script replayed against the board.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    pub schema_version: String,
    #[serde(default)]
    pub board: BoardConfig,
    #[serde(default)]
    pub pins: Vec<PinConfig>,
    #[serde(default)]
    pub irqs: Vec<IrqConfig>,
    #[serde(default)]
    pub events: Vec<ScenarioEvent>,
}

impl Scenario {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open scenario at {:?}", path.as_ref()))?;
        let scenario: Self =
            serde_yaml::from_reader(f).context("Failed to parse scenario YAML")?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != "1.0" {
            anyhow::bail!(
                "Unsupported schema_version '{}'. Supported versions: '1.0'",
                self.schema_version
            );
        }

        for pin in &self.pins {
            if pin.port > MAX_PORT {
                anyhow::bail!("Pin setup references port {} (max {})", pin.port, MAX_PORT);
            }
            if pin.pin > MAX_PIN {
                anyhow::bail!("Pin setup references pin {} (max {})", pin.pin, MAX_PIN);
            }
            if pin.alternate > MAX_ALTERNATE {
                anyhow::bail!(
                    "Pin setup references AF{} (max AF{})",
                    pin.alternate,
                    MAX_ALTERNATE
                );
            }
        }

        for irq in &self.irqs {
            if irq.id > MAX_IRQ {
                anyhow::bail!("IRQ setup references line {} (max {})", irq.id, MAX_IRQ);
            }
        }

        if let Some(p) = self.board.fault_probability {
            if !(0.0..=1.0).contains(&p) {
                anyhow::bail!("fault_probability {} is outside 0.0..=1.0", p);
            }
        }

        Ok(())
    }
}
