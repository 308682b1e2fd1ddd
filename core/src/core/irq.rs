//! CPU interrupt and control inputs.
//!
//! Every CPU on a board gets one [`CpuLines`]. Board logic drives the lines
//! (`set_line`, `set_reset`, `set_halt`); the CPU core observes them through
//! [`Bus::check_interrupts`](super::Bus::check_interrupts) and reports taken
//! interrupts back through `acknowledge_interrupt`.

use serde::{Deserialize, Serialize};

use super::bus::InterruptState;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputLine {
    Irq,
    Firq,
    Nmi,
}

/// How a line is driven.
///
/// | State    | Behaviour                                             |
/// |----------|-------------------------------------------------------|
/// | `Clear`  | level low; also cancels a held or pulsed request      |
/// | `Assert` | level high until explicitly cleared                   |
/// | `Hold`   | high until the CPU acknowledges the interrupt         |
/// | `Pulse`  | single edge; seen once, consumed by the acknowledge   |
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineState {
    Clear,
    Assert,
    Hold,
    Pulse,
}

/// Why a CPU is (not) executing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SuspendState {
    Running,
    Reset,
    Halted,
}

impl SuspendState {
    pub fn is_suspended(self) -> bool {
        self != SuspendState::Running
    }
}

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct LineLatch {
    level: bool,
    held: bool,
    pulsed: bool,
}

impl LineLatch {
    fn active(&self) -> bool {
        self.level || self.held || self.pulsed
    }

    fn drive(&mut self, state: LineState) {
        match state {
            LineState::Clear => *self = LineLatch::default(),
            LineState::Assert => self.level = true,
            LineState::Hold => self.held = true,
            LineState::Pulse => self.pulsed = true,
        }
    }

    fn acknowledge(&mut self) {
        self.held = false;
        self.pulsed = false;
    }
}

/// Latched interrupt and control inputs of one CPU.
#[derive(Default, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuLines {
    irq: LineLatch,
    firq: LineLatch,
    nmi: LineLatch,
    vector: u8,
    reset: bool,
    halt: bool,
    reset_released: bool,
}

impl CpuLines {
    pub fn new() -> Self {
        Self::default()
    }

    fn latch(&mut self, line: InputLine) -> &mut LineLatch {
        match line {
            InputLine::Irq => &mut self.irq,
            InputLine::Firq => &mut self.firq,
            InputLine::Nmi => &mut self.nmi,
        }
    }

    pub fn set_line(&mut self, line: InputLine, state: LineState) {
        self.latch(line).drive(state);
    }

    pub fn set_line_and_vector(&mut self, line: InputLine, state: LineState, vector: u8) {
        self.vector = vector;
        self.set_line(line, state);
    }

    pub fn is_active(&self, line: InputLine) -> bool {
        match line {
            InputLine::Irq => self.irq.active(),
            InputLine::Firq => self.firq.active(),
            InputLine::Nmi => self.nmi.active(),
        }
    }

    pub fn vector(&self) -> u8 {
        self.vector
    }

    /// The CPU took an interrupt on `line`.
    pub fn acknowledge(&mut self, line: InputLine) {
        self.latch(line).acknowledge();
    }

    /// Drive the RESET input.
    ///
    /// Asserting reset stops execution and drops held or pulsed requests,
    /// which live inside the CPU. Levels asserted by other devices stay up
    /// and are seen again once reset is released.
    pub fn set_reset(&mut self, asserted: bool) {
        if self.reset && !asserted {
            self.reset_released = true;
        }
        if asserted {
            self.irq.acknowledge();
            self.firq.acknowledge();
            self.nmi.acknowledge();
        }
        self.reset = asserted;
    }

    pub fn set_halt(&mut self, asserted: bool) {
        self.halt = asserted;
    }

    /// True once after RESET goes from asserted to released; the run loop
    /// uses it to restart the CPU core.
    pub fn take_reset_release(&mut self) -> bool {
        std::mem::take(&mut self.reset_released)
    }

    pub fn suspend_state(&self) -> SuspendState {
        if self.reset {
            SuspendState::Reset
        } else if self.halt {
            SuspendState::Halted
        } else {
            SuspendState::Running
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.suspend_state().is_suspended()
    }

    pub fn interrupt_state(&self) -> InterruptState {
        InterruptState {
            nmi: self.nmi.active(),
            irq: self.irq.active(),
            firq: self.firq.active(),
            irq_vector: self.vector,
        }
    }
}

/// Something that can raise and drop one interrupt request.
///
/// Latches signal their reader through this, so the same latch can feed a
/// plain CPU line or a shared vector arbiter.
pub trait InterruptRequest {
    fn assert(&mut self);
    fn clear(&mut self);
}

/// Drives one line of one CPU directly.
pub struct LineRequest<'a> {
    lines: &'a mut CpuLines,
    line: InputLine,
    assert_state: LineState,
}

impl<'a> LineRequest<'a> {
    pub fn new(lines: &'a mut CpuLines, line: InputLine, assert_state: LineState) -> Self {
        Self {
            lines,
            line,
            assert_state,
        }
    }
}

impl InterruptRequest for LineRequest<'_> {
    fn assert(&mut self) {
        self.lines.set_line(self.line, self.assert_state);
    }

    fn clear(&mut self) {
        self.lines.set_line(self.line, LineState::Clear);
    }
}
