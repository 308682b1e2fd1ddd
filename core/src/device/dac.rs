use serde::{Deserialize, Serialize};

/// 8-bit DAC fed by a CPU port write, as used for sample playback.
///
/// The byte is offset binary (0x80 = silence). Writes are also counted so
/// a host can pace its resampler against the sound CPU.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dac8 {
    /// Most recent value written by the CPU (0-255 unsigned).
    value: u8,
    writes: u64,
}

impl Default for Dac8 {
    fn default() -> Self {
        Self {
            value: 0x80,
            writes: 0,
        }
    }
}

impl Dac8 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, data: u8) {
        self.value = data;
        self.writes += 1;
    }

    pub fn value(&self) -> u8 {
        self.value
    }

    pub fn writes(&self) -> u64 {
        self.writes
    }

    /// Return current output as a signed 16-bit PCM sample.
    /// Maps 0x00 → -32768, 0x80 → 0, 0xFF → +32512.
    pub fn sample_i16(&self) -> i16 {
        ((self.value as i16) - 128) * 256
    }
}
