//! Scanline-driven video timing.
//!
//! The Technos boards (Double Dragon, WWF WrestleFest) count vertical
//! position with a counter that does not run linearly from 0:
//!
//! ```text
//! 08 09 0A .. FE FF E8 E9 .. FE FF 08 09 ..
//! \_____248 lines_/ \_24 lines_/
//! ```
//!
//! The second pass (E8..FF) is reported with bit 8 set so the mapping stays
//! one-to-one over the 272-line frame. VBLANK starts when the counter hits
//! F8 and lasts through the wrap back to 08; the 1 ms timer fires on every
//! rising edge of counter bit 3.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VcountMap {
    /// Counter equals the scanline.
    Linear,
    /// 08..FF then (1)E8..(1)FF.
    Technos,
}

impl VcountMap {
    pub fn vcount(self, scanline: u16) -> u16 {
        match self {
            VcountMap::Linear => scanline,
            VcountMap::Technos => {
                let v = scanline + 8;
                if v < 0x100 { v } else { (v - 0x18) | 0x100 }
            }
        }
    }
}

/// When the periodic timing interrupt fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerRule {
    None,
    /// Counter bit(s) in the mask go from 0 to 1.
    RisingEdge(u16),
    /// Every `n` scanlines, starting at line 0.
    Every(u16),
}

/// What happens at the start of one scanline.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScanlineEvents {
    pub scanline: u16,
    pub vcount: u16,
    /// Render rows up to and including this line before touching state.
    pub partial_update: Option<u16>,
    pub vblank: bool,
    pub timer: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanlineTiming {
    pub total_lines: u16,
    pub map: VcountMap,
    /// Counter value at which VBLANK starts.
    pub vblank_vcount: u16,
    pub timer: TimerRule,
}

impl ScanlineTiming {
    pub const TECHNOS: ScanlineTiming = ScanlineTiming {
        total_lines: 272,
        map: VcountMap::Technos,
        vblank_vcount: 0xF8,
        timer: TimerRule::RisingEdge(0x08),
    };

    pub fn vcount(&self, scanline: u16) -> u16 {
        self.map.vcount(scanline)
    }

    /// Level of the VBLANK signal during `scanline`.
    pub fn in_vblank(&self, scanline: u16) -> bool {
        self.vcount(scanline) >= self.vblank_vcount
    }

    pub fn events(&self, scanline: u16) -> ScanlineEvents {
        let previous = if scanline == 0 { self.total_lines.saturating_sub(1) } else { scanline - 1 };
        let vcount_old = self.vcount(previous);
        let vcount = self.vcount(scanline);
        let timer = match self.timer {
            TimerRule::None => false,
            TimerRule::RisingEdge(mask) => vcount_old & mask == 0 && vcount & mask != 0,
            TimerRule::Every(n) => n != 0 && scanline % n == 0,
        };
        ScanlineEvents {
            scanline,
            vcount,
            partial_update: scanline.checked_sub(1),
            vblank: vcount == self.vblank_vcount,
            timer,
        }
    }
}

/// Interrupt chosen by the M72 raster comparator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RasterIrq {
    Raster,
    Vblank,
}

impl RasterIrq {
    /// V30 vector: the interrupt controller maps VBLANK to IR0 and the
    /// raster match to IR2.
    pub fn vector(self, irq_base: u8) -> u8 {
        match self {
            RasterIrq::Raster => irq_base.wrapping_add(2),
            RasterIrq::Vblank => irq_base,
        }
    }
}

/// Irem programmable raster interrupt.
///
/// The CPU writes a line number biased by 128; a match inside the visible
/// 256 lines raises the raster IRQ, and line 256 raises VBLANK.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RasterCompare {
    position: u16,
}

/// First scanline after the visible area on M72 boards.
pub const M72_VBLANK_LINE: u16 = 256;

impl RasterCompare {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> u16 {
        self.position
    }

    pub fn write(&mut self, value: u16) {
        self.position = value;
    }

    pub fn check(&self, scanline: u16) -> Option<RasterIrq> {
        if scanline < M72_VBLANK_LINE && scanline as i32 == self.position as i32 - 128 {
            Some(RasterIrq::Raster)
        } else if scanline == M72_VBLANK_LINE {
            Some(RasterIrq::Vblank)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn technos_counter_wraps_to_e8() {
        let map = VcountMap::Technos;
        assert_eq!(map.vcount(0), 0x08);
        assert_eq!(map.vcount(247), 0xFF);
        assert_eq!(map.vcount(248), 0x1E8);
        assert_eq!(map.vcount(271), 0x1FF);
    }

    #[test]
    fn raster_match_is_biased_by_128() {
        let mut cmp = RasterCompare::new();
        cmp.write(128 + 100);
        assert_eq!(cmp.check(100), Some(RasterIrq::Raster));
        assert_eq!(cmp.check(101), None);
        assert_eq!(cmp.check(256), Some(RasterIrq::Vblank));
        assert_eq!(RasterIrq::Raster.vector(0x20), 0x22);
    }
}
