use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use vperiph_config::{Scenario, ScenarioEvent};
use vperiph_hal::{Edge, GpioInit, GpioMode, Hal, Pull, Speed, Trigger};

#[derive(Parser, Debug)]
#[command(author, version, about = "VPeriph Simulator - virtual GPIO/NVIC playground", long_about = None)]
struct Args {
    /// Path to a scenario file (YAML); runs the built-in demo when omitted
    #[arg(short, long)]
    scenario: Option<PathBuf>,

    /// Override the RNG seed for a deterministic run
    #[arg(long)]
    seed: Option<u64>,

    /// Enable debug-level execution tracing
    #[arg(short, long)]
    trace: bool,

    /// Write a JSON board snapshot to this path after the run
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.trace {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();
    }

    info!("Starting VPeriph Simulator");

    let hal = match &args.scenario {
        Some(path) => run_scenario(path, args.seed)?,
        None => run_demo(args.seed)?,
    };

    if let Some(path) = &args.snapshot {
        let snapshot = hal.board.snapshot();
        let json = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write snapshot to {:?}", path))?;
        info!("Snapshot written to {:?}", path);
    }

    Ok(())
}

fn build_hal(seed: Option<u64>) -> Hal {
    match seed {
        Some(seed) => Hal::with_seed(seed),
        None => Hal::new(),
    }
}

fn hal_mode(mode: vperiph_config::PinMode) -> GpioMode {
    match mode {
        vperiph_config::PinMode::Input => GpioMode::Input,
        vperiph_config::PinMode::OutputPushPull => GpioMode::OutputPushPull,
        vperiph_config::PinMode::OutputOpenDrain => GpioMode::OutputOpenDrain,
        vperiph_config::PinMode::AlternatePushPull => GpioMode::AlternatePushPull,
        vperiph_config::PinMode::AlternateOpenDrain => GpioMode::AlternateOpenDrain,
        vperiph_config::PinMode::Analog => GpioMode::Analog,
        vperiph_config::PinMode::InterruptRising => GpioMode::ItRising,
        vperiph_config::PinMode::InterruptFalling => GpioMode::ItFalling,
        vperiph_config::PinMode::InterruptBoth => GpioMode::ItRisingFalling,
    }
}

fn hal_pull(pull: vperiph_config::Pull) -> Pull {
    match pull {
        vperiph_config::Pull::None => Pull::None,
        vperiph_config::Pull::Up => Pull::Up,
        vperiph_config::Pull::Down => Pull::Down,
    }
}

fn hal_speed(speed: vperiph_config::Speed) -> Speed {
    match speed {
        vperiph_config::Speed::Low => Speed::Low,
        vperiph_config::Speed::Medium => Speed::Medium,
        vperiph_config::Speed::Fast => Speed::Fast,
        vperiph_config::Speed::High => Speed::High,
    }
}

fn trigger_of(mode: vperiph_config::PinMode) -> Option<Trigger> {
    match mode {
        vperiph_config::PinMode::InterruptRising => Some(Trigger::Rising),
        vperiph_config::PinMode::InterruptFalling => Some(Trigger::Falling),
        vperiph_config::PinMode::InterruptBoth => Some(Trigger::Both),
        _ => None,
    }
}

fn edge_of(edge: vperiph_config::EdgeKind) -> Edge {
    match edge {
        vperiph_config::EdgeKind::Rising => Edge::Rising,
        vperiph_config::EdgeKind::Falling => Edge::Falling,
    }
}

fn run_scenario(path: &Path, cli_seed: Option<u64>) -> anyhow::Result<Hal> {
    info!("Loading scenario: {:?}", path);
    let scenario = Scenario::from_file(path)?;

    let mut hal = build_hal(cli_seed.or(scenario.board.seed));
    if let Some(p) = scenario.board.fault_probability {
        hal.board.gpio.faults_mut().set_probability(p);
        hal.board.nvic.faults_mut().set_probability(p);
    }
    if scenario.board.fault_injection {
        hal.board.set_fault_injection(true);
    }

    for pin in &scenario.pins {
        match trigger_of(pin.mode) {
            Some(trigger) => {
                hal.board
                    .gpio
                    .enable_clock(pin.port)
                    .with_context(|| format!("Failed to clock port {}", pin.port))?;
                hal.board
                    .gpio
                    .configure_interrupt(
                        pin.port,
                        pin.pin,
                        trigger,
                        Some(Box::new(|port, pin| {
                            info!("edge handler fired for GPIO {}.{}", port, pin);
                        })),
                    )
                    .with_context(|| {
                        format!("Failed to arm interrupt pin {}.{}", pin.port, pin.pin)
                    })?;
            }
            None => {
                let init = GpioInit {
                    pin: pin.pin,
                    mode: hal_mode(pin.mode),
                    pull: hal_pull(pin.pull),
                    speed: hal_speed(pin.speed),
                    alternate: pin.alternate,
                };
                hal.gpio_init(pin.port, &init)
                    .with_context(|| format!("Failed to init pin {}.{}", pin.port, pin.pin))?;
            }
        }
    }

    for irq in &scenario.irqs {
        hal.enable_irq(irq.id)
            .with_context(|| format!("Failed to enable IRQ {}", irq.id))?;
        hal.set_priority(irq.id, irq.preempt_priority, irq.sub_priority)
            .with_context(|| format!("Failed to set priority of IRQ {}", irq.id))?;
        let label = irq
            .name
            .clone()
            .unwrap_or_else(|| format!("IRQ_{}", irq.id));
        hal.board.nvic.set_handler(
            irq.id,
            Box::new(move |_| info!("[{}] handler executed", label)),
            irq.name.as_deref(),
        )?;
    }

    let mut dispatched = 0;
    for event in &scenario.events {
        // A rejected stimulus (e.g. an injected fault) is reported and
        // the script keeps running.
        match event {
            ScenarioEvent::Write(e) => {
                if let Err(err) = hal.write_pin(e.write.port, e.write.pin, e.write.value) {
                    warn!("write {}.{} failed: {}", e.write.port, e.write.pin, err);
                }
            }
            ScenarioEvent::Toggle(e) => {
                if let Err(err) = hal.toggle_pin(e.toggle.port, e.toggle.pin) {
                    warn!("toggle {}.{} failed: {}", e.toggle.port, e.toggle.pin, err);
                }
            }
            ScenarioEvent::Read(e) => match hal.read_pin(e.read.port, e.read.pin) {
                Ok(value) => info!("read GPIO {}.{} -> {}", e.read.port, e.read.pin, value as u8),
                Err(err) => warn!("read {}.{} failed: {}", e.read.port, e.read.pin, err),
            },
            ScenarioEvent::SimulateEdge(e) => {
                hal.board.gpio.simulate_interrupt(
                    e.simulate_edge.port,
                    e.simulate_edge.pin,
                    edge_of(e.simulate_edge.edge),
                );
            }
            ScenarioEvent::SetPending(e) => {
                if let Err(err) = hal.board.nvic.set_pending(e.set_pending) {
                    warn!("set_pending {} failed: {}", e.set_pending, err);
                }
            }
            ScenarioEvent::ProcessAll(e) => {
                if e.process_all {
                    dispatched += hal.board.nvic.process_all();
                }
            }
            ScenarioEvent::Delay(e) => hal.delay_ms(e.delay_ms),
        }
    }

    info!(
        "Scenario complete: {} events, {} interrupts dispatched",
        scenario.events.len(),
        dispatched
    );
    Ok(hal)
}

/// Self-contained walkthrough: blink an LED, take a button interrupt,
/// drain the NVIC and sweep the ADC.
fn run_demo(seed: Option<u64>) -> anyhow::Result<Hal> {
    info!("No scenario given, running built-in demo");
    let mut hal = build_hal(seed);

    // LED on PA5.
    let led = GpioInit::new(5, GpioMode::OutputPushPull);
    hal.gpio_init(0, &led)?;
    for cycle in 1..=3 {
        info!("blink cycle {}", cycle);
        hal.write_pin(0, 5, true)?;
        hal.delay_ms(500);
        hal.write_pin(0, 5, false)?;
        hal.delay_ms(500);
    }

    // User button on PC13, falling edge.
    hal.board.gpio.enable_clock(2)?;
    hal.board.gpio.configure_interrupt(
        2,
        13,
        Trigger::Falling,
        Some(Box::new(|port, pin| {
            info!("button pressed on GPIO {}.{}", port, pin);
        })),
    )?;
    hal.set_priority(40, 0, 0)?;
    hal.enable_irq(40)?;
    hal.board.nvic.set_handler(
        40,
        Box::new(|_| info!("[EXTI15_10] handler executed")),
        Some("EXTI15_10"),
    )?;

    hal.board.gpio.simulate_interrupt(2, 13, Edge::Falling);
    hal.board.nvic.set_pending(40)?;
    let dispatched = hal.board.nvic.process_all();
    info!("{} interrupts dispatched", dispatched);

    for channel in 0..4 {
        let sample = hal.read_adc(channel)?;
        info!("ADC channel {} reading: {}", channel, sample);
    }

    Ok(hal)
}
