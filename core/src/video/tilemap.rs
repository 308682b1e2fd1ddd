//! Scrollable tile layers with per-tile priority groups.
//!
//! A [`Tilemap`] caches one [`TileInfo`] per tile, indexed by the tile's
//! position in video RAM. CPU writes only mark tiles dirty; the board's
//! tile decoder runs lazily, for dirty tiles only, right before a draw.
//!
//! Each tile belongs to one of three transparency groups. A group carries
//! two pen masks: pens set in the front mask are transparent when drawing
//! the front category ([`DrawFlags::LAYER0`]), pens set in the back mask
//! are transparent when drawing the back category ([`DrawFlags::LAYER1`]).
//! Drawing a layer's back category, then sprites, then its front category
//! puts sprites between the two halves of the same tile.
//!
//! Scrolling follows the usual arcade convention: the pixel shown at
//! screen `x` comes from tilemap column `x - (dx - scroll)`, wrapped to the
//! tilemap width. With the layer flipped the whole tilemap is mirrored and
//! the flipped delta is used instead.

use bitflags::bitflags;

use super::bitmap::{Bitmap, Rect};
use super::gfx::GfxSet;

/// Number of transparency groups per tilemap.
pub const TILE_GROUPS: usize = 3;

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileInfo {
    pub code: u32,
    pub color: u32,
    pub flip_x: bool,
    pub flip_y: bool,
    /// Transparency group, 0..=2.
    pub group: u8,
}

impl TileInfo {
    pub fn new(code: u32, color: u32) -> Self {
        Self {
            code,
            color,
            ..Self::default()
        }
    }

    /// Packed flip bits: bit 0 flips X, bit 1 flips Y.
    pub fn with_flip_yx(mut self, bits: u32) -> Self {
        self.flip_x = bits & 1 != 0;
        self.flip_y = bits & 2 != 0;
        self
    }

    pub fn with_group(mut self, group: u8) -> Self {
        self.group = group;
        self
    }
}

/// Maps a logical (column, row) to the tile's index in video RAM.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TileScan {
    /// `row * cols + col`
    Rows,
    Custom(fn(col: usize, row: usize) -> usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TilemapDesc {
    pub tile_w: usize,
    pub tile_h: usize,
    pub cols: usize,
    pub rows: usize,
    pub scan: TileScan,
}

impl TilemapDesc {
    pub const fn rows(tile_w: usize, tile_h: usize, cols: usize, rows: usize) -> Self {
        Self {
            tile_w,
            tile_h,
            cols,
            rows,
            scan: TileScan::Rows,
        }
    }

    pub const fn with_scan(mut self, scan: fn(usize, usize) -> usize) -> Self {
        self.scan = TileScan::Custom(scan);
        self
    }

    fn index(&self, col: usize, row: usize) -> usize {
        match self.scan {
            TileScan::Rows => row * self.cols + col,
            TileScan::Custom(f) => f(col, row),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct DrawFlags: u8 {
        /// Front category ("above sprites").
        const LAYER0 = 0x01;
        /// Back category.
        const LAYER1 = 0x02;
        /// Every pixel, ignoring transparency.
        const OPAQUE = 0x04;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Transparency {
    Opaque,
    Pen(u8),
    /// Per group: (front mask, back mask).
    Masks([(u16, u16); TILE_GROUPS]),
}

#[derive(Clone, Debug)]
pub struct Tilemap {
    desc: TilemapDesc,
    tiles: Vec<TileInfo>,
    dirty: Vec<bool>,
    any_dirty: bool,
    row_scroll: Vec<i32>,
    scroll_y: i32,
    dx: (i32, i32),
    dy: (i32, i32),
    flip_x: bool,
    flip_y: bool,
    transparency: Transparency,
}

impl Tilemap {
    pub fn new(desc: TilemapDesc) -> Self {
        // Custom scans may leave holes; size the cache by the highest index.
        let count = (0..desc.rows)
            .flat_map(|row| (0..desc.cols).map(move |col| desc.index(col, row) + 1))
            .max()
            .unwrap_or(0);
        Self {
            desc,
            tiles: vec![TileInfo::default(); count],
            dirty: vec![true; count],
            any_dirty: true,
            row_scroll: vec![0],
            scroll_y: 0,
            dx: (0, 0),
            dy: (0, 0),
            flip_x: false,
            flip_y: false,
            transparency: Transparency::Opaque,
        }
    }

    pub fn desc(&self) -> &TilemapDesc {
        &self.desc
    }

    pub fn pixel_width(&self) -> usize {
        self.desc.cols * self.desc.tile_w
    }

    pub fn pixel_height(&self) -> usize {
        self.desc.rows * self.desc.tile_h
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Out-of-range indices are ignored.
    pub fn mark_dirty(&mut self, index: usize) {
        match self.dirty.get_mut(index) {
            Some(flag) => {
                *flag = true;
                self.any_dirty = true;
            }
            None => log::trace!("tilemap mark_dirty({index:#x}) out of range"),
        }
    }

    pub fn mark_all_dirty(&mut self) {
        self.dirty.fill(true);
        self.any_dirty = true;
    }

    pub fn is_dirty(&self, index: usize) -> bool {
        self.dirty.get(index).copied().unwrap_or(false)
    }

    /// Cached info of a tile (as of the last resolve).
    pub fn tile(&self, index: usize) -> Option<&TileInfo> {
        self.tiles.get(index)
    }

    /// Scroll the whole layer. On X this sets the first scroll row.
    pub fn set_scroll(&mut self, axis: Axis, value: i32) {
        match axis {
            Axis::X => self.row_scroll[0] = value,
            Axis::Y => self.scroll_y = value,
        }
    }

    /// Split the layer into `rows` horizontally scrolled bands (at least 1).
    pub fn set_scroll_rows(&mut self, rows: usize) {
        self.row_scroll.resize(rows.max(1), 0);
    }

    pub fn scroll_rows(&self) -> usize {
        self.row_scroll.len()
    }

    pub fn set_row_scroll(&mut self, row: usize, value: i32) {
        if let Some(slot) = self.row_scroll.get_mut(row) {
            *slot = value;
        }
    }

    pub fn scroll_x(&self, row: usize) -> i32 {
        self.row_scroll.get(row).copied().unwrap_or(0)
    }

    pub fn scroll_y(&self) -> i32 {
        self.scroll_y
    }

    /// Fixed scroll offsets for the normal and flipped orientations.
    pub fn set_scroll_delta(&mut self, axis: Axis, normal: i32, flipped: i32) {
        match axis {
            Axis::X => self.dx = (normal, flipped),
            Axis::Y => self.dy = (normal, flipped),
        }
    }

    pub fn set_flip(&mut self, flip_x: bool, flip_y: bool) {
        self.flip_x = flip_x;
        self.flip_y = flip_y;
    }

    pub fn set_transparent_pen(&mut self, pen: u8) {
        self.transparency = Transparency::Pen(pen);
    }

    pub fn set_opaque(&mut self) {
        self.transparency = Transparency::Opaque;
    }

    /// Switches the layer to group masks; groups not set yet are fully opaque.
    pub fn set_transmask(&mut self, group: usize, front: u16, back: u16) {
        if group >= TILE_GROUPS {
            log::warn!("transmask group {group} out of range");
            return;
        }
        let mut masks = match self.transparency {
            Transparency::Masks(masks) => masks,
            _ => [(0, 0); TILE_GROUPS],
        };
        masks[group] = (front, back);
        self.transparency = Transparency::Masks(masks);
    }

    /// Re-run the tile decoder for every dirty tile.
    pub fn resolve_dirty<F: FnMut(usize) -> TileInfo>(&mut self, mut tile_info: F) {
        if !self.any_dirty {
            return;
        }
        for (index, dirty) in self.dirty.iter_mut().enumerate() {
            if !*dirty {
                continue;
            }
            let mut info = tile_info(index);
            if info.group as usize >= TILE_GROUPS {
                log::trace!("tile {index:#x} group {} clamped", info.group);
                info.group = (TILE_GROUPS - 1) as u8;
            }
            self.tiles[index] = info;
            *dirty = false;
        }
        self.any_dirty = false;
    }

    fn wrap(value: i32, size: usize) -> usize {
        value.rem_euclid(size as i32) as usize
    }

    fn effective_row_scroll(&self, band: usize, screen_width: usize) -> usize {
        let band = if self.flip_y { self.row_scroll.len() - 1 - band } else { band };
        let scroll = self.row_scroll[band];
        let value = if self.flip_x {
            screen_width as i32 - self.pixel_width() as i32 - (self.dx.1 - scroll)
        } else {
            self.dx.0 - scroll
        };
        Self::wrap(value, self.pixel_width())
    }

    fn effective_col_scroll(&self, screen_height: usize) -> usize {
        let value = if self.flip_y {
            screen_height as i32 - self.pixel_height() as i32 - (self.dy.1 - self.scroll_y)
        } else {
            self.dy.0 - self.scroll_y
        };
        Self::wrap(value, self.pixel_height())
    }

    fn visible(&self, flags: DrawFlags, group: u8, pixel: u8) -> bool {
        if flags.contains(DrawFlags::OPAQUE) {
            return true;
        }
        let front = flags.contains(DrawFlags::LAYER0) || !flags.contains(DrawFlags::LAYER1);
        let back = flags.contains(DrawFlags::LAYER1);
        match self.transparency {
            Transparency::Opaque => front,
            Transparency::Pen(pen) => front && pixel != pen,
            Transparency::Masks(masks) => {
                let (front_mask, back_mask) = masks[group as usize];
                let bit = 1u16 << (pixel & 0x0F);
                (front && front_mask & bit == 0) || (back && back_mask & bit == 0)
            }
        }
    }

    /// Draw the layer into `clip`. Drawn pixels OR `priority` into the
    /// target's priority plane.
    pub fn draw<F: FnMut(usize) -> TileInfo>(
        &mut self,
        target: &mut Bitmap,
        clip: &Rect,
        gfx: &GfxSet,
        flags: DrawFlags,
        priority: u8,
        tile_info: F,
    ) {
        self.resolve_dirty(tile_info);

        let clip = clip.intersect(&target.bounds());
        if clip.is_empty() {
            return;
        }
        let (width, height) = (self.pixel_width(), self.pixel_height());
        if width == 0 || height == 0 {
            return;
        }
        let (tile_w, tile_h) = (self.desc.tile_w, self.desc.tile_h);
        let band_height = (height / self.row_scroll.len()).max(1);
        let origin_y = self.effective_col_scroll(target.height());

        for y in clip.min_y..=clip.max_y {
            let py = Self::wrap(y - origin_y as i32, height);
            let ly = if self.flip_y { height - 1 - py } else { py };
            let band = (py / band_height).min(self.row_scroll.len() - 1);
            let origin_x = self.effective_row_scroll(band, target.width());

            for x in clip.min_x..=clip.max_x {
                let px = Self::wrap(x - origin_x as i32, width);
                let lx = if self.flip_x { width - 1 - px } else { px };
                let index = self.desc.index(lx / tile_w, ly / tile_h);
                let Some(tile) = self.tiles.get(index) else {
                    continue;
                };
                let mut tx = lx % tile_w;
                let mut ty = ly % tile_h;
                if tile.flip_x {
                    tx = tile_w - 1 - tx;
                }
                if tile.flip_y {
                    ty = tile_h - 1 - ty;
                }
                let pixel = gfx.pixel(tile.code, tx, ty);
                if self.visible(flags, tile.group, pixel) {
                    target.set_pixel(x as usize, y as usize, gfx.pen(tile.color, pixel));
                    target.or_priority(x as usize, y as usize, priority);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dirty_tiles_resolve_once() {
        let mut map = Tilemap::new(TilemapDesc::rows(8, 8, 4, 4));
        let mut calls = 0;
        map.resolve_dirty(|_| {
            calls += 1;
            TileInfo::default()
        });
        assert_eq!(calls, 16);
        map.mark_dirty(5);
        map.mark_dirty(500);
        let mut seen = Vec::new();
        map.resolve_dirty(|i| {
            seen.push(i);
            TileInfo::new(7, 0)
        });
        assert_eq!(seen, vec![5]);
        assert_eq!(map.tile(5).map(|t| t.code), Some(7));
    }

    #[test]
    fn out_of_range_group_is_clamped() {
        let mut map = Tilemap::new(TilemapDesc::rows(8, 8, 1, 1));
        map.resolve_dirty(|_| TileInfo::new(0, 0).with_group(9));
        assert_eq!(map.tile(0).map(|t| t.group), Some(2));
    }

    #[test]
    fn custom_scan_maps_columns() {
        let desc = TilemapDesc::rows(8, 8, 128, 64).with_scan(|col, row| (row << 8) + col);
        assert_eq!(desc.index(3, 1), 259);
    }
}
