use std::fmt;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::fault::FaultInjector;
use crate::{SimResult, SimulationError};

/// Enough lines for the largest supported device family.
pub const IRQ_LINE_COUNT: u16 = 240;
/// 4-bit priority; 0 is the most urgent.
pub const MAX_PRIORITY: u8 = 15;

/// Backstop for `process_all` against handlers that keep re-pending
/// their own line.
const PROCESS_ALL_CAP: usize = 100;

/// Callback run while its line is active. It receives the controller
/// so it can re-pend lines or adjust priorities mid-dispatch.
pub type IrqHandler = Box<dyn FnMut(&mut VirtualNvic) + Send>;

pub struct IrqLine {
    pub(crate) enabled: bool,
    pub(crate) pending: bool,
    pub(crate) active: bool,
    pub(crate) priority: u8,
    pub(crate) handler: Option<IrqHandler>,
    pub(crate) name: String,
}

impl IrqLine {
    fn new(id: u16) -> Self {
        Self {
            enabled: false,
            pending: false,
            active: false,
            priority: MAX_PRIORITY,
            handler: None,
            name: format!("IRQ_{id}"),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl fmt::Debug for IrqLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IrqLine")
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .field("pending", &self.pending)
            .field("active", &self.active)
            .field("priority", &self.priority)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

/// The virtual interrupt controller: per-line enable/priority/pending
/// state with priority-ordered cooperative dispatch.
///
/// "Priority" picks among already-pending lines when `process_one`
/// runs; a running handler is never preempted.
#[derive(Debug)]
pub struct VirtualNvic {
    pub(crate) lines: Vec<IrqLine>,
    global_enabled: bool,
    faults: FaultInjector,
    rng: StdRng,
}

impl VirtualNvic {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        tracing::info!("initialized NVIC with {} IRQ lines", IRQ_LINE_COUNT);
        Self {
            lines: (0..IRQ_LINE_COUNT).map(IrqLine::new).collect(),
            global_enabled: true,
            faults: FaultInjector::new(),
            rng,
        }
    }

    pub fn faults_mut(&mut self) -> &mut FaultInjector {
        &mut self.faults
    }

    pub fn line(&self, id: u16) -> SimResult<&IrqLine> {
        Self::check_irq(id)?;
        Ok(&self.lines[id as usize])
    }

    fn check_irq(id: u16) -> SimResult<()> {
        if id >= IRQ_LINE_COUNT {
            return Err(SimulationError::InvalidIrq(id));
        }
        Ok(())
    }

    pub fn enable_irq(&mut self, id: u16) -> SimResult<()> {
        Self::check_irq(id)?;
        self.faults.roll(&mut self.rng)?;

        let line = &mut self.lines[id as usize];
        line.enabled = true;
        tracing::info!("IRQ {} ({}) enabled", id, line.name);
        Ok(())
    }

    /// Remove the line from dispatch eligibility. Pending state and
    /// priority are preserved.
    pub fn disable_irq(&mut self, id: u16) -> SimResult<()> {
        Self::check_irq(id)?;

        let line = &mut self.lines[id as usize];
        line.enabled = false;
        tracing::info!("IRQ {} ({}) disabled", id, line.name);
        Ok(())
    }

    pub fn set_priority(&mut self, id: u16, priority: u8) -> SimResult<()> {
        Self::check_irq(id)?;
        if priority > MAX_PRIORITY {
            return Err(SimulationError::InvalidPriority(priority));
        }
        self.faults.roll(&mut self.rng)?;

        self.lines[id as usize].priority = priority;
        tracing::info!("IRQ {} priority set to {}", id, priority);
        Ok(())
    }

    /// Out-of-range ids report the lowest urgency.
    pub fn priority(&self, id: u16) -> u8 {
        if id >= IRQ_LINE_COUNT {
            return MAX_PRIORITY;
        }
        self.lines[id as usize].priority
    }

    pub fn set_handler(
        &mut self,
        id: u16,
        handler: IrqHandler,
        name: Option<&str>,
    ) -> SimResult<()> {
        Self::check_irq(id)?;

        let line = &mut self.lines[id as usize];
        line.handler = Some(handler);
        if let Some(name) = name {
            line.name = name.to_string();
        }
        tracing::info!("handler registered for IRQ {} ({})", id, line.name);
        Ok(())
    }

    pub fn set_pending(&mut self, id: u16) -> SimResult<()> {
        Self::check_irq(id)?;
        self.faults.roll(&mut self.rng)?;

        let line = &mut self.lines[id as usize];
        line.pending = true;
        tracing::info!("IRQ {} ({}) set pending", id, line.name);
        Ok(())
    }

    pub fn clear_pending(&mut self, id: u16) -> SimResult<()> {
        Self::check_irq(id)?;

        let line = &mut self.lines[id as usize];
        line.pending = false;
        tracing::info!("IRQ {} ({}) pending cleared", id, line.name);
        Ok(())
    }

    pub fn is_pending(&self, id: u16) -> bool {
        id < IRQ_LINE_COUNT && self.lines[id as usize].pending
    }

    pub fn enable_global(&mut self) {
        self.global_enabled = true;
        tracing::info!("global interrupts enabled");
    }

    pub fn disable_global(&mut self) {
        self.global_enabled = false;
        tracing::info!("global interrupts disabled");
    }

    pub fn global_enabled(&self) -> bool {
        self.global_enabled
    }

    /// Lowest priority value wins; ties go to the lowest id because the
    /// scan keeps the first line seen at that priority.
    fn next_eligible(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (id, line) in self.lines.iter().enumerate() {
            if !(line.enabled && line.pending && !line.active) {
                continue;
            }
            match best {
                Some(b) if self.lines[b].priority <= line.priority => {}
                _ => best = Some(id),
            }
        }
        best
    }

    /// Dispatch the most urgent eligible line, if any, and return its
    /// id. The line is pending until selection, active for exactly the
    /// duration of its handler, and never re-entered: dispatch from
    /// inside a handler is refused, which keeps "at most one active
    /// line" true even for handlers that call back into the controller.
    pub fn process_one(&mut self) -> Option<u16> {
        if !self.global_enabled {
            return None;
        }
        if self.lines.iter().any(|line| line.active) {
            tracing::warn!("dispatch already in progress, handlers are not nested");
            return None;
        }

        let id = self.next_eligible()?;
        {
            let line = &mut self.lines[id];
            line.pending = false;
            line.active = true;
            tracing::info!(
                "dispatching IRQ {} ({}) priority {}",
                id,
                line.name,
                line.priority
            );
        }

        // The handler is taken out of the line for the call so it can
        // receive `&mut self`; it goes back unless it installed a
        // replacement in the meantime.
        let mut handler = self.lines[id].handler.take();
        match handler.as_mut() {
            Some(handler) => handler(self),
            None => tracing::warn!("no handler for IRQ {}", id),
        }
        if let Some(handler) = handler {
            if self.lines[id].handler.is_none() {
                self.lines[id].handler = Some(handler);
            }
        }

        self.lines[id].active = false;
        tracing::debug!("IRQ {} completed", id);
        Some(id as u16)
    }

    /// Drain eligible lines in priority order; returns how many
    /// dispatched. Stops at the safety cap so a handler that keeps
    /// re-pending its own line cannot hang the caller.
    pub fn process_all(&mut self) -> usize {
        let mut processed = 0;
        while processed < PROCESS_ALL_CAP {
            if self.process_one().is_none() {
                break;
            }
            processed += 1;
        }
        if processed == PROCESS_ALL_CAP {
            tracing::warn!(
                "interrupt backlog not drained after {} dispatches, stopping",
                PROCESS_ALL_CAP
            );
        } else if processed > 0 {
            tracing::info!("processed {} interrupts", processed);
        }
        processed
    }
}

impl Default for VirtualNvic {
    fn default() -> Self {
        Self::new()
    }
}
