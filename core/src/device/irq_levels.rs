//! Interrupt priority encoder for 68000 boards.
//!
//! Each of the seven levels is an independent request. The CPU sees the
//! highest pending level on its IRQ input, with the level number as the
//! vector. Requests are dropped by the board's acknowledge registers, not by
//! the CPU taking the interrupt.

use serde::{Deserialize, Serialize};

use crate::core::irq::{CpuLines, InputLine, LineState};

#[derive(Default, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrqLevels {
    pending: u8, // bit n: level n requested
}

impl IrqLevels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise or drop `level` (1-7) and re-drive the CPU's IRQ input.
    pub fn set(&mut self, level: u8, asserted: bool, lines: &mut CpuLines) {
        if !(1..=7).contains(&level) {
            log::error!("interrupt level {level} out of range");
            debug_assert!(false, "interrupt level {level} out of range");
            return;
        }
        if asserted {
            self.pending |= 1 << level;
        } else {
            self.pending &= !(1 << level);
        }
        self.drive(lines);
    }

    pub fn is_pending(&self, level: u8) -> bool {
        level < 8 && self.pending & (1 << level) != 0
    }

    pub fn highest(&self) -> Option<u8> {
        (1..=7).rev().find(|&level| self.is_pending(level))
    }

    /// Present the current state on `lines` (also after a state load).
    pub fn drive(&self, lines: &mut CpuLines) {
        match self.highest() {
            Some(level) => lines.set_line_and_vector(InputLine::Irq, LineState::Assert, level),
            None => lines.set_line(InputLine::Irq, LineState::Clear),
        }
    }

    pub fn reset(&mut self, lines: &mut CpuLines) {
        self.pending = 0;
        self.drive(lines);
    }
}
