//! Palette RAM decoding.
//!
//! | Format                | Boards                          |
//! |-----------------------|---------------------------------|
//! | `xxxxBBBBGGGGRRRR`    | Double Dragon, Renegade, WWF    |
//! | `xBBBBBGGGGGRRRRR`    | Shadow Force                    |
//! | R/G/B planes, 5 bits  | Irem M72                        |
//!
//! The 68000 boards keep one entry per word in [`WordPaletteRam`].
//! The Technos 8-bit boards split each 16-bit entry across two RAM
//! windows (low byte `GGGGRRRR`, high byte `xxxxBBBB`); [`SplitPaletteRam`]
//! keeps both halves and rebuilds the entry on every write.

use serde::{Deserialize, Serialize};

use crate::core::save::{Layout, SaveStateError, check_len};

/// Pen outside any palette; always renders black.
pub const BLACK_PEN: u16 = 0xFFFF;

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

pub fn pal4bit(bits: u8) -> u8 {
    let bits = bits & 0x0F;
    (bits << 4) | bits
}

pub fn pal5bit(bits: u8) -> u8 {
    let bits = bits & 0x1F;
    (bits << 3) | (bits >> 2)
}

pub fn xxxx_bbbb_gggg_rrrr(word: u16) -> Rgb {
    Rgb::new(
        pal4bit(word as u8),
        pal4bit((word >> 4) as u8),
        pal4bit((word >> 8) as u8),
    )
}

pub fn x_bbbbb_ggggg_rrrrr(word: u16) -> Rgb {
    Rgb::new(
        pal5bit(word as u8),
        pal5bit((word >> 5) as u8),
        pal5bit((word >> 10) as u8),
    )
}

/// Decoded colors plus a global brightness (255 = full).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Palette {
    entries: Vec<Rgb>,
    brightness: u8,
}

impl Palette {
    pub fn new(len: usize) -> Self {
        Self {
            entries: vec![Rgb::BLACK; len],
            brightness: 0xFF,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes past the end are dropped.
    pub fn set(&mut self, pen: usize, color: Rgb) {
        match self.entries.get_mut(pen) {
            Some(entry) => *entry = color,
            None => log::trace!("palette write to pen {pen:#x} out of range"),
        }
    }

    pub fn get(&self, pen: usize) -> Rgb {
        self.entries.get(pen).copied().unwrap_or(Rgb::BLACK)
    }

    pub fn set_brightness(&mut self, brightness: u8) {
        self.brightness = brightness;
    }

    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    /// Final output color of a bitmap pen.
    pub fn rgb(&self, pen: u16) -> Rgb {
        if pen == BLACK_PEN {
            return Rgb::BLACK;
        }
        let c = self.get(pen as usize);
        if self.brightness == 0xFF {
            return c;
        }
        let scale = |v: u8| ((v as u32 * self.brightness as u32) / 0xFF) as u8;
        Rgb::new(scale(c.r), scale(c.g), scale(c.b))
    }
}

/// Technos split palette: low and high bytes of each entry in separate
/// windows of `len` bytes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitPaletteRam {
    lo: Vec<u8>,
    hi: Vec<u8>,
}

impl SplitPaletteRam {
    pub fn new(len: usize) -> Self {
        Self {
            lo: vec![0; len],
            hi: vec![0; len],
        }
    }

    fn update(&self, index: usize, palette: &mut Palette) {
        let word = u16::from_le_bytes([self.lo[index], self.hi[index]]);
        palette.set(index, xxxx_bbbb_gggg_rrrr(word));
    }

    pub fn write_lo(&mut self, offset: usize, data: u8, palette: &mut Palette) {
        if let Some(slot) = self.lo.get_mut(offset) {
            *slot = data;
            self.update(offset, palette);
        }
    }

    pub fn write_hi(&mut self, offset: usize, data: u8, palette: &mut Palette) {
        if let Some(slot) = self.hi.get_mut(offset) {
            *slot = data;
            self.update(offset, palette);
        }
    }

    pub fn read_lo(&self, offset: usize) -> u8 {
        self.lo.get(offset).copied().unwrap_or(0)
    }

    pub fn read_hi(&self, offset: usize) -> u8 {
        self.hi.get(offset).copied().unwrap_or(0)
    }

    /// Rebuild every entry (after a state load).
    pub fn refresh(&self, palette: &mut Palette) {
        for index in 0..self.lo.len() {
            self.update(index, palette);
        }
    }
}

/// Words per M72 palette bank: three planes of 0x200 words.
pub const PLANAR_PALETTE_WORDS: usize = 0x600;

/// Irem M72 palette bank: 256 colors stored as separate R, G and B planes
/// of 5-bit values 0x200 words apart. Address bit A9 (word bit 8) is not
/// decoded, so each plane is mirrored; unused bits read back as 1.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanarPaletteRam {
    words: Vec<u16>,
    pen_base: usize,
}

impl PlanarPaletteRam {
    pub fn new(pen_base: usize) -> Self {
        Self {
            words: vec![0; PLANAR_PALETTE_WORDS],
            pen_base,
        }
    }

    fn index(offset: usize) -> usize {
        (offset % PLANAR_PALETTE_WORDS) & !0x100
    }

    pub fn read(&self, offset: usize) -> u16 {
        self.words[Self::index(offset)] | 0xFFE0
    }

    pub fn write(&mut self, offset: usize, data: u16, palette: &mut Palette) {
        let offset = Self::index(offset);
        self.words[offset] = data;
        self.update(offset & 0xFF, palette);
    }

    fn update(&self, color: usize, palette: &mut Palette) {
        palette.set(
            self.pen_base + color,
            Rgb::new(
                pal5bit(self.words[color] as u8),
                pal5bit(self.words[color + 0x200] as u8),
                pal5bit(self.words[color + 0x400] as u8),
            ),
        );
    }

    pub fn refresh(&self, palette: &mut Palette) {
        for color in 0..0x100 {
            self.update(color, palette);
        }
    }
}

/// Bit layout of a one-word palette entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WordFormat {
    Xbgr444,
    Xbgr555,
}

impl WordFormat {
    pub fn decode(self, word: u16) -> Rgb {
        match self {
            WordFormat::Xbgr444 => xxxx_bbbb_gggg_rrrr(word),
            WordFormat::Xbgr555 => x_bbbbb_ggggg_rrrrr(word),
        }
    }
}

/// 16-bit palette RAM holding one entry per word (68000 boards).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordPaletteRam {
    words: Vec<u16>,
    format: WordFormat,
}

impl WordPaletteRam {
    pub fn new(len: usize, format: WordFormat) -> Self {
        Self {
            words: vec![0; len],
            format,
        }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn read(&self, offset: usize) -> u16 {
        self.words.get(offset).copied().unwrap_or(0)
    }

    /// Writes past the end are dropped.
    pub fn write(&mut self, offset: usize, data: u16, palette: &mut Palette) {
        match self.words.get_mut(offset) {
            Some(slot) => {
                *slot = data;
                palette.set(offset, self.format.decode(data));
            }
            None => log::trace!("palette RAM write {offset:#x} out of range"),
        }
    }

    pub fn refresh(&self, palette: &mut Palette) {
        for (pen, &word) in self.words.iter().enumerate() {
            palette.set(pen, self.format.decode(word));
        }
    }
}

impl Layout for SplitPaletteRam {
    fn check_layout(&self, saved: &Self, field: &'static str) -> Result<(), SaveStateError> {
        check_len(field, self.lo.len(), saved.lo.len())?;
        check_len(field, self.hi.len(), saved.hi.len())
    }
}

impl Layout for PlanarPaletteRam {
    fn check_layout(&self, saved: &Self, field: &'static str) -> Result<(), SaveStateError> {
        check_len(field, self.words.len(), saved.words.len())
    }
}

impl Layout for WordPaletteRam {
    fn check_layout(&self, saved: &Self, field: &'static str) -> Result<(), SaveStateError> {
        check_len(field, self.words.len(), saved.words.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_bit_expansion_fills_low_bits() {
        assert_eq!(pal5bit(0x1F), 0xFF);
        assert_eq!(pal5bit(0x10), 0x84);
        assert_eq!(pal4bit(0x0A), 0xAA);
    }

    #[test]
    fn split_ram_combines_both_halves() {
        let mut palette = Palette::new(0x200);
        let mut ram = SplitPaletteRam::new(0x200);
        ram.write_lo(5, 0x21, &mut palette);
        ram.write_hi(5, 0x03, &mut palette);
        assert_eq!(palette.get(5), Rgb::new(0x11, 0x22, 0x33));
    }

    #[test]
    fn planar_ram_mirrors_a9_and_reads_high_bits_set() {
        let mut palette = Palette::new(0x200);
        let mut ram = PlanarPaletteRam::new(0x100);
        ram.write(0x103, 0x1F, &mut palette);
        ram.write(0x203, 0x00, &mut palette);
        ram.write(0x403, 0x10, &mut palette);
        assert_eq!(ram.read(0x003), 0xFFFF);
        assert_eq!(palette.get(0x103), Rgb::new(0xFF, 0x00, 0x84));
    }

    #[test]
    fn word_ram_decodes_per_format() {
        let mut palette = Palette::new(4);
        let mut ram = WordPaletteRam::new(4, WordFormat::Xbgr555);
        ram.write(2, 0x7C1F, &mut palette);
        ram.write(9, 0xFFFF, &mut palette);
        assert_eq!(palette.get(2), Rgb::new(0xFF, 0x00, 0xFF));
        assert_eq!(ram.read(9), 0);
    }

    #[test]
    fn brightness_scales_output() {
        let mut palette = Palette::new(1);
        palette.set(0, Rgb::new(0xFF, 0x80, 0));
        palette.set_brightness(0);
        assert_eq!(palette.rgb(0), Rgb::BLACK);
        assert_eq!(palette.rgb(BLACK_PEN), Rgb::BLACK);
    }
}
