//! CPU-side ports of sound chips synthesized outside this crate.
//!
//! Boards only need the register interface: what the sound CPU writes is
//! kept (and queued for the host), status reads come from host-driven
//! flags, and the chip's interrupt output is fed back in by the host.

use serde::{Deserialize, Serialize};

use crate::core::save::{Layout, SaveStateError, check_len};

/// YM2151 address/data port pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ym2151Port {
    address: u8,
    regs: Vec<u8>, // 256 registers, last written values
    status: u8,    // bit 0/1: timer A/B overflow, set by the host
    writes: Vec<(u8, u8)>,
}

impl Default for Ym2151Port {
    fn default() -> Self {
        Self::new()
    }
}

impl Ym2151Port {
    pub fn new() -> Self {
        Self {
            address: 0,
            regs: vec![0; 0x100],
            status: 0,
            writes: Vec::new(),
        }
    }

    /// Offset 0 selects a register, offset 1 writes it.
    pub fn write(&mut self, offset: u8, data: u8) {
        if offset & 1 == 0 {
            self.address = data;
        } else {
            self.regs[self.address as usize] = data;
            self.writes.push((self.address, data));
        }
    }

    /// Both offsets read the status register.
    pub fn read(&self, _offset: u8) -> u8 {
        self.status
    }

    pub fn set_status(&mut self, status: u8) {
        self.status = status;
    }

    pub fn register(&self, reg: u8) -> u8 {
        self.regs[reg as usize]
    }

    /// Register writes since the last call, in order.
    pub fn take_writes(&mut self) -> Vec<(u8, u8)> {
        std::mem::take(&mut self.writes)
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

/// YM3526 (Renegade). Same address/data pair and status read.
pub type Ym3526Port = Ym2151Port;

/// OKI MSM6295 command port.
#[derive(Default, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Okim6295Port {
    status: u8, // bit n: voice n playing, maintained by the host
    commands: Vec<u8>,
}

impl Okim6295Port {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, data: u8) {
        self.commands.push(data);
    }

    /// Upper nibble reads back as set, as on the real part.
    pub fn read(&self) -> u8 {
        0xF0 | (self.status & 0x0F)
    }

    pub fn set_status(&mut self, playing: u8) {
        self.status = playing & 0x0F;
    }

    pub fn take_commands(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.commands)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl Layout for Ym2151Port {
    fn check_layout(&self, saved: &Self, field: &'static str) -> Result<(), SaveStateError> {
        check_len(field, self.regs.len(), saved.regs.len())
    }
}
