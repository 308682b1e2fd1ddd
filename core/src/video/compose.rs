//! Frame composition.
//!
//! Boards describe their layer order as data: a [`DrawPlan`] is a list of
//! [`DrawStep`]s run top to bottom for each band of scanlines, and a
//! [`PriorityTable`] picks a plan from a live priority register for boards
//! that switch orders at run time.
//!
//! [`VideoState`] owns everything the renderer needs (tilemaps, decoded
//! graphics, palette, the frame bitmap). Board video memory stays with the
//! board and is reached through [`VideoSource`], which keeps the two
//! borrowable at the same time.

use super::bitmap::{Bitmap, Rect};
use super::gfx::GfxSet;
use super::palette::{BLACK_PEN, Palette};
use super::tilemap::{DrawFlags, TileInfo, Tilemap, TilemapDesc};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawStep {
    Tilemap { layer: usize, flags: DrawFlags, priority: u8 },
    Sprites { list: usize },
    ClearPriority,
}

impl DrawStep {
    pub const fn layer(layer: usize, flags: DrawFlags) -> DrawStep {
        DrawStep::Tilemap {
            layer,
            flags,
            priority: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawPlan(pub &'static [DrawStep]);

/// Register value to draw order.
#[derive(Clone, Copy, Debug)]
pub struct PriorityTable {
    pub entries: &'static [(u16, DrawPlan)],
    pub default: DrawPlan,
}

impl PriorityTable {
    pub fn plan(&self, value: u16) -> DrawPlan {
        match self.entries.iter().find(|(v, _)| *v == value) {
            Some((_, plan)) => *plan,
            None => {
                log::debug!("priority mode {value:#x} has no draw order, using default");
                self.default
            }
        }
    }
}

/// Board video memory as seen by the renderer.
pub trait VideoSource {
    /// Decode tile `index` of tilemap `layer` from video RAM.
    fn tile_info(&self, layer: usize, index: usize) -> TileInfo;

    /// Draw sprite list `list` (most boards only have list 0).
    fn draw_sprites(&self, list: usize, target: &mut Bitmap, clip: &Rect, gfx: &[GfxSet], flip: bool);
}

/// One tilemap and the graphics set its tiles come from.
#[derive(Clone, Copy, Debug)]
pub struct LayerDesc {
    pub tilemap: TilemapDesc,
    pub gfx: usize,
}

/// Screen geometry and layers of one board.
#[derive(Clone, Copy, Debug)]
pub struct VideoDesc {
    /// Full raster size including blanking.
    pub width: usize,
    pub height: usize,
    pub visible: Rect,
    pub palette_len: usize,
    pub layers: &'static [LayerDesc],
}

pub struct VideoState {
    bitmap: Bitmap,
    palette: Palette,
    layers: Vec<Tilemap>,
    layer_gfx: Vec<usize>,
    gfx: Vec<GfxSet>,
    visible: Rect,
    next_line: i32,
    flip: bool,
    video_off: bool,
}

impl VideoState {
    pub fn new(desc: &VideoDesc) -> Self {
        let gfx_slots = desc.layers.iter().map(|l| l.gfx + 1).max().unwrap_or(0);
        Self {
            bitmap: Bitmap::new(desc.width, desc.height),
            palette: Palette::new(desc.palette_len),
            layers: desc.layers.iter().map(|l| Tilemap::new(l.tilemap)).collect(),
            layer_gfx: desc.layers.iter().map(|l| l.gfx).collect(),
            gfx: vec![GfxSet::default(); gfx_slots],
            visible: desc.visible,
            next_line: 0,
            flip: false,
            video_off: false,
        }
    }

    pub fn set_gfx(&mut self, index: usize, set: GfxSet) {
        if index >= self.gfx.len() {
            self.gfx.resize(index + 1, GfxSet::default());
        }
        self.gfx[index] = set;
    }

    pub fn gfx(&self) -> &[GfxSet] {
        &self.gfx
    }

    pub fn layer(&self, index: usize) -> &Tilemap {
        &self.layers[index]
    }

    pub fn layer_mut(&mut self, index: usize) -> &mut Tilemap {
        &mut self.layers[index]
    }

    /// Mark a tile dirty; unknown layers are ignored.
    pub fn mark_dirty(&mut self, layer: usize, index: usize) {
        if let Some(map) = self.layers.get_mut(layer) {
            map.mark_dirty(index);
        }
    }

    pub fn mark_all_dirty(&mut self) {
        for map in &mut self.layers {
            map.mark_all_dirty();
        }
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn palette_mut(&mut self) -> &mut Palette {
        &mut self.palette
    }

    pub fn bitmap(&self) -> &Bitmap {
        &self.bitmap
    }

    pub fn visible(&self) -> Rect {
        self.visible
    }

    /// Flip every layer (and report the flip to the sprite pass).
    pub fn set_flip(&mut self, flip: bool) {
        self.flip = flip;
        for map in &mut self.layers {
            map.set_flip(flip, flip);
        }
    }

    pub fn flip(&self) -> bool {
        self.flip
    }

    pub fn set_video_off(&mut self, off: bool) {
        self.video_off = off;
    }

    pub fn video_off(&self) -> bool {
        self.video_off
    }

    /// First line not yet rendered this frame.
    pub fn next_line(&self) -> i32 {
        self.next_line
    }

    /// Run `plan` over `clip`.
    pub fn render(&mut self, source: &dyn VideoSource, plan: DrawPlan, clip: &Rect) {
        let clip = clip.intersect(&self.visible);
        if clip.is_empty() {
            return;
        }
        if self.video_off {
            self.bitmap.fill(&clip, BLACK_PEN);
            return;
        }
        for step in plan.0 {
            match *step {
                DrawStep::Tilemap {
                    layer,
                    flags,
                    priority,
                } => {
                    let (Some(map), Some(&gfx_index)) = (self.layers.get_mut(layer), self.layer_gfx.get(layer)) else {
                        log::warn!("draw plan names unknown layer {layer}");
                        continue;
                    };
                    let Some(gfx) = self.gfx.get(gfx_index) else {
                        continue;
                    };
                    map.draw(&mut self.bitmap, &clip, gfx, flags, priority, |index| {
                        source.tile_info(layer, index)
                    });
                }
                DrawStep::Sprites { list } => {
                    source.draw_sprites(list, &mut self.bitmap, &clip, &self.gfx, self.flip);
                }
                DrawStep::ClearPriority => self.bitmap.fill_priority(&clip, 0),
            }
        }
    }

    /// Render rows not drawn yet, up to and including `last_line`.
    pub fn update_partial(&mut self, source: &dyn VideoSource, plan: DrawPlan, last_line: u16) {
        let last = last_line as i32;
        if last < self.next_line {
            return;
        }
        let clip = self.bitmap.bounds().rows(self.next_line, last);
        self.render(source, plan, &clip);
        self.next_line = last + 1;
    }

    /// Render whatever is left of the frame and start the next one.
    pub fn finish_frame(&mut self, source: &dyn VideoSource, plan: DrawPlan) {
        let last = self.bitmap.height() as i32 - 1;
        if self.next_line <= last {
            let clip = self.bitmap.bounds().rows(self.next_line, last);
            self.render(source, plan, &clip);
        }
        self.next_line = 0;
    }

    /// Copy the visible area out as RGB24.
    pub fn to_rgb24(&self, buffer: &mut [u8]) {
        let v = self.visible;
        if v.is_empty() {
            return;
        }
        let mut out = buffer.chunks_exact_mut(3);
        for y in v.min_y..=v.max_y {
            for x in v.min_x..=v.max_x {
                let Some(px) = out.next() else {
                    return;
                };
                let rgb = self.palette.rgb(self.bitmap.pixel(x as usize, y as usize));
                px.copy_from_slice(&[rgb.r, rgb.g, rgb.b]);
            }
        }
    }
}
