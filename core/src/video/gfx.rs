//! Planar graphics decoding and tile blitting.
//!
//! GFX ROMs store tiles as bitplanes. A [`GfxLayout`] describes where each
//! bit of each pixel lives (bit offsets count MSB-first within a byte, and
//! plane 0 is the most significant bit of the pixel value), and decoding
//! turns a ROM into a [`GfxSet`] of one pen byte per pixel.

use super::bitmap::{Bitmap, Rect};

/// Bit offset of a plane: absolute, or a fraction of the ROM size plus bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaneOffset {
    Bits(u32),
    /// `rom_bits * num / den + bits`
    Frac { num: u32, den: u32, bits: u32 },
}

/// Number of elements in a set: fixed, or a fraction of the ROM size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementCount {
    Fixed(usize),
    Frac { num: u32, den: u32 },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GfxLayout {
    pub width: usize,
    pub height: usize,
    pub count: ElementCount,
    pub planes: Vec<PlaneOffset>,
    pub x_offsets: Vec<u32>,
    pub y_offsets: Vec<u32>,
    /// Bits between consecutive elements.
    pub char_increment: u32,
}

fn rom_bit(rom: &[u8], bit: u64) -> u8 {
    let byte = (bit / 8) as usize;
    match rom.get(byte) {
        Some(b) => (b >> (7 - (bit % 8))) & 1,
        None => 0,
    }
}

impl GfxLayout {
    fn element_count(&self, rom_len: usize) -> usize {
        match self.count {
            ElementCount::Fixed(n) => n,
            ElementCount::Frac { num, den } => {
                let bits = rom_len as u64 * 8 * num as u64 / den.max(1) as u64;
                (bits / self.char_increment.max(1) as u64) as usize
            }
        }
    }

    fn plane_base(&self, plane: &PlaneOffset, rom_len: usize) -> u64 {
        match *plane {
            PlaneOffset::Bits(bits) => bits as u64,
            PlaneOffset::Frac { num, den, bits } => {
                rom_len as u64 * 8 * num as u64 / den.max(1) as u64 + bits as u64
            }
        }
    }

    /// Decode every element of `rom`. Bits past the end of the ROM read 0.
    pub fn decode(&self, rom: &[u8]) -> Vec<u8> {
        let count = self.element_count(rom.len());
        let planes: Vec<u64> = self.planes.iter().map(|p| self.plane_base(p, rom.len())).collect();
        let mut pens = vec![0u8; count * self.width * self.height];
        let mut out = 0;
        for element in 0..count {
            let base = element as u64 * self.char_increment as u64;
            for &yo in self.y_offsets.iter().take(self.height) {
                for &xo in self.x_offsets.iter().take(self.width) {
                    let mut pen = 0u8;
                    for (i, &plane) in planes.iter().enumerate() {
                        let bit = rom_bit(rom, base + plane + yo as u64 + xo as u64);
                        pen |= bit << (planes.len() - 1 - i);
                    }
                    pens[out] = pen;
                    out += 1;
                }
            }
        }
        pens
    }
}

/// Decoded graphics elements plus their palette mapping.
#[derive(Clone, Debug, Default)]
pub struct GfxSet {
    width: usize,
    height: usize,
    count: usize,
    pens: Vec<u8>,
    color_base: u32,
    granularity: u32,
}

/// One element placed on screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Blit {
    pub code: u32,
    pub color: u32,
    pub flip_x: bool,
    pub flip_y: bool,
    pub x: i32,
    pub y: i32,
}

/// Priority value written by priority-aware blits.
pub const PRIORITY_DRAWN: u8 = 0x1F;

impl GfxSet {
    /// `pens` holds `width * height` bytes per element.
    pub fn from_pens(width: usize, height: usize, pens: Vec<u8>, color_base: u32, granularity: u32) -> Self {
        let count = if width * height == 0 { 0 } else { pens.len() / (width * height) };
        Self {
            width,
            height,
            count,
            pens,
            color_base,
            granularity,
        }
    }

    pub fn decode(layout: &GfxLayout, rom: &[u8], color_base: u32, granularity: u32) -> Self {
        Self::from_pens(layout.width, layout.height, layout.decode(rom), color_base, granularity)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn granularity(&self) -> u32 {
        self.granularity
    }

    /// Raw pen of an element pixel. Codes wrap modulo the element count.
    pub fn pixel(&self, code: u32, x: usize, y: usize) -> u8 {
        if self.count == 0 {
            return 0;
        }
        let element = code as usize % self.count;
        self.pens[(element * self.height + y) * self.width + x]
    }

    /// Final palette index for a raw pen in `color`.
    pub fn pen(&self, color: u32, pixel: u8) -> u16 {
        (self.color_base + color * self.granularity + pixel as u32) as u16
    }

    fn visit(&self, clip: &Rect, blit: &Blit, mut plot: impl FnMut(usize, usize, u8)) {
        if self.count == 0 {
            return;
        }
        for sy in 0..self.height {
            let y = blit.y + sy as i32;
            if y < clip.min_y || y > clip.max_y {
                continue;
            }
            let src_y = if blit.flip_y { self.height - 1 - sy } else { sy };
            for sx in 0..self.width {
                let x = blit.x + sx as i32;
                if x < clip.min_x || x > clip.max_x {
                    continue;
                }
                let src_x = if blit.flip_x { self.width - 1 - sx } else { sx };
                plot(x as usize, y as usize, self.pixel(blit.code, src_x, src_y));
            }
        }
    }

    /// Draw one element; pixels equal to `transparent_pen` are skipped.
    pub fn draw(&self, target: &mut Bitmap, clip: &Rect, blit: &Blit, transparent_pen: Option<u8>) {
        let clip = clip.intersect(&target.bounds());
        self.visit(&clip, blit, |x, y, pixel| {
            if Some(pixel) != transparent_pen {
                target.set_pixel(x, y, self.pen(blit.color, pixel));
            }
        });
    }

    /// Draw one element behind anything whose priority bit is in
    /// `priority_mask`: a pixel is skipped when `(1 << priority) & mask != 0`.
    /// Drawn pixels take priority [`PRIORITY_DRAWN`].
    pub fn draw_masked(
        &self,
        target: &mut Bitmap,
        clip: &Rect,
        blit: &Blit,
        transparent_pen: Option<u8>,
        priority_mask: u32,
    ) {
        let clip = clip.intersect(&target.bounds());
        self.visit(&clip, blit, |x, y, pixel| {
            if Some(pixel) == transparent_pen {
                return;
            }
            let pri = target.priority(x, y) & 0x1F;
            if (1u32 << pri) & priority_mask == 0 {
                target.set_pixel(x, y, self.pen(blit.color, pixel));
            }
            target.set_priority(x, y, PRIORITY_DRAWN);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planar_decode_puts_plane_zero_in_msb() {
        // 8x1 element, 2 planes: plane 0 at byte 0, plane 1 at byte 1.
        let layout = GfxLayout {
            width: 8,
            height: 1,
            count: ElementCount::Fixed(1),
            planes: vec![PlaneOffset::Bits(0), PlaneOffset::Bits(8)],
            x_offsets: (0..8).collect(),
            y_offsets: vec![0],
            char_increment: 16,
        };
        let pens = layout.decode(&[0b1100_0000, 0b1010_0000]);
        assert_eq!(&pens[..4], &[3, 2, 1, 0]);
    }

    #[test]
    fn fractional_planes_split_the_rom() {
        let layout = GfxLayout {
            width: 8,
            height: 1,
            count: ElementCount::Frac { num: 1, den: 2 },
            planes: vec![
                PlaneOffset::Frac { num: 1, den: 2, bits: 0 },
                PlaneOffset::Bits(0),
            ],
            x_offsets: (0..8).collect(),
            y_offsets: vec![0],
            char_increment: 8,
        };
        let pens = layout.decode(&[0x80, 0x00, 0x00, 0x80]);
        // two elements; element 0 pixel 0 has plane1 set only, element 1 pixel 0 plane0 only
        assert_eq!(pens.len(), 16);
        assert_eq!(pens[0], 1);
        assert_eq!(pens[8], 2);
    }
}
