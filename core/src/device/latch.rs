//! Cross-CPU communication: command latches, MCU mailboxes and shared RAM.

use serde::{Deserialize, Serialize};

use crate::core::irq::{InterruptRequest, SuspendState};
use crate::core::save::{Layout, SaveStateError, check_len};

/// Value seen on a gated bus when the other side owns it.
pub const BUS_FLOAT: u8 = 0xFF;

/// One-way byte latch with an interrupt to the reading CPU.
///
/// The value is only meaningful to the reader once the interrupt has been
/// observed; reading through [`read_and_acknowledge`](Self::read_and_acknowledge)
/// drops the request.
#[derive(Default, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoundLatch {
    value: u8,
    pending: bool,
}

impl SoundLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, value: u8, irq: &mut dyn InterruptRequest) {
        self.value = value;
        self.pending = true;
        irq.assert();
    }

    pub fn read_and_acknowledge(&mut self, irq: &mut dyn InterruptRequest) -> u8 {
        self.pending = false;
        irq.clear();
        self.value
    }

    /// Read without side effects (boards whose acknowledge is a separate port).
    pub fn peek(&self) -> u8 {
        self.value
    }

    /// Separate acknowledge port: drop the request, keep the value.
    pub fn acknowledge(&mut self, irq: &mut dyn InterruptRequest) {
        self.pending = false;
        irq.clear();
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Pair of latches between a host CPU and a protection MCU, one register
/// per direction, each with its own "sent" flag.
#[derive(Default, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct McuMailbox {
    to_mcu: u8,
    to_main: u8,
    main_sent: bool,
    mcu_sent: bool,
}

impl McuMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn main_write(&mut self, value: u8) {
        self.to_mcu = value;
        self.main_sent = true;
    }

    pub fn main_read(&mut self) -> u8 {
        self.mcu_sent = false;
        self.to_main
    }

    pub fn mcu_write(&mut self, value: u8) {
        self.to_main = value;
        self.mcu_sent = true;
    }

    pub fn mcu_read(&mut self) -> u8 {
        self.main_sent = false;
        self.to_mcu
    }

    /// Last value the MCU sent, without consuming it.
    pub fn peek_to_main(&self) -> u8 {
        self.to_main
    }

    pub fn peek_to_mcu(&self) -> u8 {
        self.to_mcu
    }

    pub fn main_sent(&self) -> bool {
        self.main_sent
    }

    pub fn mcu_sent(&self) -> bool {
        self.mcu_sent
    }

    /// Bit 0: main has written a byte the MCU has not read.
    /// Bit 1: MCU has written a byte main has not read.
    pub fn status(&self) -> u8 {
        u8::from(self.main_sent) | (u8::from(self.mcu_sent) << 1)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// RAM window shared between a main CPU and a companion CPU where the main
/// side only owns the bus while the companion is held in reset or halt.
///
/// The gate is evaluated on every access from the companion's current
/// [`SuspendState`]; while the companion runs, main-side reads float to
/// 0xFF and writes are dropped. The companion's own accesses are ungated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatedSharedRam {
    data: Vec<u8>,
}

impl GatedSharedRam {
    /// Offsets wrap to model mirroring, so the window is a power of two.
    /// Other sizes are rounded up, and zero becomes a single byte.
    pub fn new(size: usize) -> Self {
        let len = size.max(1).next_power_of_two();
        if len != size {
            log::warn!("shared RAM size {size:#x} rounded up to {len:#x}");
        }
        Self { data: vec![0; len] }
    }

    fn index(&self, offset: usize) -> usize {
        offset & (self.data.len() - 1)
    }

    pub fn read(&self, offset: usize, companion: SuspendState) -> u8 {
        if !companion.is_suspended() {
            return BUS_FLOAT;
        }
        self.data[self.index(offset)]
    }

    pub fn write(&mut self, offset: usize, value: u8, companion: SuspendState) {
        if !companion.is_suspended() {
            log::trace!("shared RAM write {offset:#06x} dropped, companion running");
            return;
        }
        let i = self.index(offset);
        self.data[i] = value;
    }

    pub fn read_local(&self, offset: usize) -> u8 {
        self.data[self.index(offset)]
    }

    pub fn write_local(&mut self, offset: usize, value: u8) {
        let i = self.index(offset);
        self.data[i] = value;
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn clear(&mut self) {
        self.data.fill(0);
    }
}

impl Layout for GatedSharedRam {
    fn check_layout(&self, saved: &Self, field: &'static str) -> Result<(), SaveStateError> {
        check_len(field, self.data.len(), saved.data.len())
    }
}
