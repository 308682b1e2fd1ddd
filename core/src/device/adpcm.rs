//! ADPCM sample streaming from ROM.
//!
//! An MSM5205-style decoder asks for a new 4-bit code on every VCK edge.
//! The board answers from sample ROM: each byte carries two codes, high
//! nibble first, so a channel alternates between "fetch a byte and send its
//! high nibble" and "send the low nibble kept from the last fetch".
//!
//! The decoder itself (step tables, filtering) is outside this crate; it is
//! reached through [`AdpcmDecoder`].

use serde::{Deserialize, Serialize};

use super::dac::Dac8;

/// Host-side port of an external ADPCM decoder chip.
pub trait AdpcmDecoder {
    /// Latch the next 4-bit code.
    fn data_w(&mut self, nibble: u8);
    /// Drive the chip's RESET pin (true stops output).
    fn reset_w(&mut self, asserted: bool);
}

/// Decoder port that records what the board sends it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Msm5205Port {
    nibbles: Vec<u8>,
    reset: bool,
}

impl Default for Msm5205Port {
    fn default() -> Self {
        Self::new()
    }
}

impl Msm5205Port {
    pub fn new() -> Self {
        Self {
            nibbles: Vec::new(),
            reset: true,
        }
    }

    pub fn in_reset(&self) -> bool {
        self.reset
    }

    pub fn nibbles(&self) -> &[u8] {
        &self.nibbles
    }

    /// Hand the recorded codes to the host and start a new batch.
    pub fn take_nibbles(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.nibbles)
    }
}

impl AdpcmDecoder for Msm5205Port {
    fn data_w(&mut self, nibble: u8) {
        self.nibbles.push(nibble & 0x0F);
    }

    fn reset_w(&mut self, asserted: bool) {
        self.reset = asserted;
    }
}

/// Playback state of one ADPCM channel.
///
/// Positions are byte offsets inside the channel's ROM window starting at
/// `base`. Playback never wraps: reaching `end`, the window size or the end
/// of the ROM forces the channel idle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdpcmChannel {
    base: usize,
    window: usize,
    pos: usize,
    end: usize,
    idle: bool,
    pending: Option<u8>,
}

impl AdpcmChannel {
    pub fn new(base: usize, window: usize) -> Self {
        Self {
            base,
            window,
            pos: 0,
            end: 0,
            idle: true,
            pending: None,
        }
    }

    pub fn set_start(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn set_end(&mut self, end: usize) {
        self.end = end;
    }

    pub fn arm(&mut self, decoder: &mut dyn AdpcmDecoder) {
        self.idle = false;
        decoder.reset_w(false);
    }

    pub fn stop(&mut self, decoder: &mut dyn AdpcmDecoder) {
        self.idle = true;
        decoder.reset_w(true);
    }

    pub fn is_idle(&self) -> bool {
        self.idle
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn has_pending_nibble(&self) -> bool {
        self.pending.is_some()
    }

    fn exhausted(&self, rom_len: usize) -> bool {
        self.pos >= self.end || self.pos >= self.window || self.base + self.pos >= rom_len
    }

    /// One sample request from the decoder.
    ///
    /// The range check comes first, so a low nibble still pending when the
    /// channel runs out is never sent. It stays latched across stop and
    /// re-arm and goes out on the first request after the next arm.
    pub fn tick(&mut self, rom: &[u8], decoder: &mut dyn AdpcmDecoder) {
        if self.idle {
            return;
        }

        if self.exhausted(rom.len()) {
            self.stop(decoder);
            return;
        }

        if let Some(low) = self.pending.take() {
            decoder.data_w(low);
            return;
        }

        let byte = rom[self.base + self.pos];
        self.pos += 1;
        self.pending = Some(byte & 0x0F);
        decoder.data_w(byte >> 4);
    }

    /// Power-on state: idle, nothing pending.
    pub fn reset(&mut self) {
        self.pos = 0;
        self.end = 0;
        self.idle = true;
        self.pending = None;
    }
}

/// Double Dragon's two-channel ADPCM register block.
///
/// | Offset | Channel | Effect                               |
/// |--------|---------|--------------------------------------|
/// | 0 / 1  | 0 / 1   | start playback                       |
/// | 2 / 3  | 0 / 1   | end address = `(data & 0x7F) * 0x200` |
/// | 4 / 5  | 0 / 1   | start address = `(data & 0x7F) * 0x200` |
/// | 6 / 7  | 0 / 1   | stop playback                        |
///
/// Each channel plays from its own 64 KiB half of the sample ROM.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DualAdpcm {
    channels: [AdpcmChannel; 2],
}

/// Bytes of sample ROM owned by each channel.
pub const DUAL_ADPCM_BANK: usize = 0x10000;

impl Default for DualAdpcm {
    fn default() -> Self {
        Self::new()
    }
}

impl DualAdpcm {
    pub fn new() -> Self {
        Self {
            channels: [
                AdpcmChannel::new(0, DUAL_ADPCM_BANK),
                AdpcmChannel::new(DUAL_ADPCM_BANK, DUAL_ADPCM_BANK),
            ],
        }
    }

    pub fn write<D: AdpcmDecoder>(&mut self, offset: u8, data: u8, decoders: &mut [D; 2]) {
        if offset > 7 {
            log::debug!("ADPCM register write {offset:#x} ignored");
            return;
        }
        let chip = (offset & 1) as usize;
        let channel = &mut self.channels[chip];
        let decoder = &mut decoders[chip];
        match offset / 2 {
            3 => channel.stop(decoder),
            2 => channel.set_start((data & 0x7F) as usize * 0x200),
            1 => channel.set_end((data & 0x7F) as usize * 0x200),
            _ => channel.arm(decoder),
        }
    }

    /// Bit n set: channel n idle.
    pub fn status(&self) -> u8 {
        u8::from(self.channels[0].is_idle()) | (u8::from(self.channels[1].is_idle()) << 1)
    }

    pub fn tick<D: AdpcmDecoder>(&mut self, chip: usize, rom: &[u8], decoders: &mut [D; 2]) {
        if let (Some(channel), Some(decoder)) = (self.channels.get_mut(chip), decoders.get_mut(chip)) {
            channel.tick(rom, decoder);
        }
    }

    pub fn channel(&self, chip: usize) -> &AdpcmChannel {
        &self.channels[chip & 1]
    }

    pub fn reset(&mut self) {
        for channel in &mut self.channels {
            channel.reset();
        }
    }
}

/// How the sound CPU's address-port writes build the sample address.
///
/// The written byte always lands in the low (offset 0) or high (offset 1)
/// byte of a 16-bit value that is then scaled by a board-specific shift.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressMode {
    /// Vigilante: the 16-bit value is the address.
    Direct,
    /// Shisensho II: in units of 4 bytes.
    Shift2,
    /// R-Type II, Major Title: in units of 32 bytes.
    Shift5,
    /// Pound for Pound: units of 16 bytes; offsets 2 and 3 carry an end
    /// address which playback does not use (a 0x00 sample ends it).
    Shift4WithEnd,
}

impl AddressMode {
    fn shift(self) -> u32 {
        match self {
            AddressMode::Direct => 0,
            AddressMode::Shift2 => 2,
            AddressMode::Shift5 => 5,
            AddressMode::Shift4WithEnd => 4,
        }
    }
}

/// Irem sample playback: the sound CPU reads sample bytes one at a time
/// (usually from an NMI at the sample rate) and writes them to a DAC, which
/// advances the address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleStreamer {
    addr: u32,
    mode: AddressMode,
}

impl SampleStreamer {
    pub fn new(mode: AddressMode) -> Self {
        Self { addr: 0, mode }
    }

    pub fn address(&self) -> u32 {
        self.addr
    }

    /// Start address set by a protection MCU or main-CPU glue.
    pub fn set_start(&mut self, addr: u32) {
        self.addr = addr;
    }

    pub fn set_address_byte(&mut self, offset: u8, data: u8) {
        if self.mode == AddressMode::Shift4WithEnd && offset > 1 {
            return;
        }
        let shift = self.mode.shift();
        let mut value = self.addr >> shift;
        if offset == 1 {
            value = (value & 0x00FF) | ((data as u32) << 8);
        } else {
            value = (value & 0xFF00) | data as u32;
        }
        self.addr = value << shift;
    }

    /// Sample byte at the current address; 0 past the end of the ROM.
    pub fn read(&self, rom: &[u8]) -> u8 {
        rom.get(self.addr as usize).copied().unwrap_or(0)
    }

    /// Output one sample and step to the next byte, wrapping within the
    /// (power-of-two) ROM.
    pub fn write_dac(&mut self, data: u8, dac: &mut Dac8, rom_len: usize) {
        dac.write(data);
        if rom_len == 0 {
            return;
        }
        self.addr = (self.addr.wrapping_add(1)) & (rom_len as u32).wrapping_sub(1);
    }

    pub fn reset(&mut self) {
        self.addr = 0;
    }
}
