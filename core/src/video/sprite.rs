//! Sprite RAM buffering and multi-tile sprite expansion.

use serde::{Deserialize, Serialize};

use crate::core::save::{Layout, SaveStateError, check_len};

use super::bitmap::{Bitmap, Rect};
use super::gfx::{Blit, GfxSet};

/// Live sprite RAM plus the snapshot the video hardware actually draws.
///
/// The CPU writes `live` at any time; [`commit`](Self::commit) copies it to
/// the buffer in one step (the board's DMA trigger or end-of-frame copy), so
/// a frame never shows a half-written sprite list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpriteRam<T> {
    live: Vec<T>,
    buffered: Vec<T>,
}

impl<T: Copy + Default> SpriteRam<T> {
    pub fn new(len: usize) -> Self {
        Self {
            live: vec![T::default(); len],
            buffered: vec![T::default(); len],
        }
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn read(&self, offset: usize) -> T {
        self.live.get(offset).copied().unwrap_or_default()
    }

    pub fn write(&mut self, offset: usize, value: T) {
        if let Some(slot) = self.live.get_mut(offset) {
            *slot = value;
        }
    }

    pub fn commit(&mut self) {
        self.buffered.copy_from_slice(&self.live);
    }

    pub fn live(&self) -> &[T] {
        &self.live
    }

    pub fn buffered(&self) -> &[T] {
        &self.buffered
    }

    pub fn clear(&mut self) {
        self.live.fill(T::default());
        self.buffered.fill(T::default());
    }
}

/// How a multi-tile sprite picks sub-tile codes.
///
/// The sub-tile at column `c`, row `r` (from the top-left) uses
/// `code + col_step * c + row_step * r`. With `mirror` set, a flipped
/// sprite also mirrors the arrangement, so the whole sprite flips rather
/// than each sub-tile in place.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpriteGeometry {
    pub col_step: i32,
    pub row_step: i32,
    pub mirror: bool,
}

impl SpriteGeometry {
    /// Irem layout: columns 8 codes apart, rows consecutive.
    pub const IREM: SpriteGeometry = SpriteGeometry {
        col_step: 8,
        row_step: 1,
        mirror: true,
    };
}

/// One decoded sprite, already adjusted for screen flip.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpriteRecord {
    /// Top-left corner of the whole sprite.
    pub x: i32,
    pub y: i32,
    pub code: u32,
    pub color: u32,
    pub flip_x: bool,
    pub flip_y: bool,
    /// Size in tiles.
    pub width: u32,
    pub height: u32,
    /// Draw behind priority-plane values whose bit is set in this mask.
    pub priority_mask: Option<u32>,
}

pub fn draw_sprite(
    target: &mut Bitmap,
    clip: &Rect,
    gfx: &GfxSet,
    sprite: &SpriteRecord,
    geometry: SpriteGeometry,
    transparent_pen: Option<u8>,
) {
    let (tile_w, tile_h) = (gfx.width() as i32, gfx.height() as i32);
    let (w, h) = (sprite.width as i32, sprite.height as i32);
    for col in 0..w {
        for row in 0..h {
            let src_col = if geometry.mirror && sprite.flip_x { w - 1 - col } else { col };
            let src_row = if geometry.mirror && sprite.flip_y { h - 1 - row } else { row };
            let code = (sprite.code as i64
                + geometry.col_step as i64 * src_col as i64
                + geometry.row_step as i64 * src_row as i64) as u32;
            let blit = Blit {
                code,
                color: sprite.color,
                flip_x: sprite.flip_x,
                flip_y: sprite.flip_y,
                x: sprite.x + col * tile_w,
                y: sprite.y + row * tile_h,
            };
            match sprite.priority_mask {
                Some(mask) => gfx.draw_masked(target, clip, &blit, transparent_pen, mask),
                None => gfx.draw(target, clip, &blit, transparent_pen),
            }
        }
    }
}

impl<T> Layout for SpriteRam<T> {
    fn check_layout(&self, saved: &Self, field: &'static str) -> Result<(), SaveStateError> {
        check_len(field, self.live.len(), saved.live.len())?;
        check_len(field, self.live.len(), saved.buffered.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_snapshots_live_ram() {
        let mut ram: SpriteRam<u16> = SpriteRam::new(4);
        ram.write(1, 0x1234);
        ram.commit();
        ram.write(1, 0xFFFF);
        ram.write(9, 0xFFFF);
        assert_eq!(ram.buffered()[1], 0x1234);
        assert_eq!(ram.read(1), 0xFFFF);
    }
}
