use serde::{Deserialize, Serialize};

use kinescope_core::core::bus::InterruptState;
use kinescope_core::core::irq::{CpuLines, InputLine, LineState};
use kinescope_core::core::machine::InputButton;
use kinescope_core::core::save::{self, Layout, SaveHeader, SaveState, SaveStateError};
use kinescope_core::core::scheduler::Scheduler;
use kinescope_core::core::{Bus, BusMaster};
use kinescope_core::device::{
    AddressMode, Dac8, IrqVectorArbiter, SampleStreamer, SoundLatch, SourceRequest, VectorAction,
    VectorSource, Ym2151Port,
};
use kinescope_core::video::{
    Axis, Bitmap, DrawFlags, DrawPlan, DrawStep, ElementCount, GfxLayout, GfxSet, LayerDesc,
    PlaneOffset, PlanarPaletteRam, RasterCompare, RasterIrq, Rect, SpriteGeometry, SpriteRam,
    SpriteRecord, TileInfo, TilemapDesc, VideoDesc, VideoSource, VideoState, draw_sprite,
};

use crate::cabinet::{Board, Cabinet};
use crate::config::MachineConfig;
use crate::region::{self, mirrored};
use crate::registry::BoardEntry;

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------
// Pixel clock:   8 MHz (32 MHz / 4)
// HTOTAL:        512 pixels, visible 64..447 (384)
// VTOTAL:        284 lines, visible 0..255
// Line rate:     15.625 kHz, frame rate 55.017 Hz
// Main CPU:      V30 @ 8 MHz       = 512 cycles per line
// Sound CPU:     Z80 @ 3.579545 MHz ~ 229 cycles per line
// Sample NMI:    128 * 55 Hz on boards with a sample DAC

const PIXEL_CLOCK_HZ: u64 = 8_000_000;
const HTOTAL: usize = 512;
const VTOTAL: usize = 284;
const MAIN_CYCLES_PER_LINE: u64 = 512;
const SOUND_CYCLES_PER_LINE: u64 = 229;
const SAMPLE_NMI_HZ: u64 = 128 * 55;

const VISIBLE: Rect = Rect::new(64, 447, 0, 255);

/// Cabinet flip DIP: DSW bit 8 (bank 1 bit 0), active low.
const DSW1_FLIP: u8 = 0x01;

/// Interrupt vector base programmed into the 8259-compatible controller
/// by every M72 game at boot.
const DEFAULT_IRQ_BASE: u8 = 0x20;

// ---------------------------------------------------------------------------
// Input button IDs (active-low ports: 0xFF = all released)
// ---------------------------------------------------------------------------
pub const INPUT_P1_RIGHT: u8 = 0;
pub const INPUT_P1_LEFT: u8 = 1;
pub const INPUT_P1_DOWN: u8 = 2;
pub const INPUT_P1_UP: u8 = 3;
pub const INPUT_P1_BUTTON2: u8 = 6;
pub const INPUT_P1_BUTTON1: u8 = 7;
pub const INPUT_P2_RIGHT: u8 = 8;
pub const INPUT_P2_LEFT: u8 = 9;
pub const INPUT_P2_DOWN: u8 = 10;
pub const INPUT_P2_UP: u8 = 11;
pub const INPUT_P2_BUTTON2: u8 = 14;
pub const INPUT_P2_BUTTON1: u8 = 15;
pub const INPUT_P1_START: u8 = 16;
pub const INPUT_P2_START: u8 = 17;
pub const INPUT_COIN1: u8 = 18;
pub const INPUT_COIN2: u8 = 19;
pub const INPUT_SERVICE: u8 = 20;

const M72_INPUT_MAP: &[InputButton] = &[
    InputButton { id: INPUT_P1_RIGHT, name: "P1 Right" },
    InputButton { id: INPUT_P1_LEFT, name: "P1 Left" },
    InputButton { id: INPUT_P1_DOWN, name: "P1 Down" },
    InputButton { id: INPUT_P1_UP, name: "P1 Up" },
    InputButton { id: INPUT_P1_BUTTON1, name: "P1 Button 1" },
    InputButton { id: INPUT_P1_BUTTON2, name: "P1 Button 2" },
    InputButton { id: INPUT_P2_RIGHT, name: "P2 Right" },
    InputButton { id: INPUT_P2_LEFT, name: "P2 Left" },
    InputButton { id: INPUT_P2_DOWN, name: "P2 Down" },
    InputButton { id: INPUT_P2_UP, name: "P2 Up" },
    InputButton { id: INPUT_P2_BUTTON1, name: "P2 Button 1" },
    InputButton { id: INPUT_P2_BUTTON2, name: "P2 Button 2" },
    InputButton { id: INPUT_P1_START, name: "P1 Start" },
    InputButton { id: INPUT_P2_START, name: "P2 Start" },
    InputButton { id: INPUT_COIN1, name: "Coin 1" },
    InputButton { id: INPUT_COIN2, name: "Coin 2" },
    InputButton { id: INPUT_SERVICE, name: "Service" },
];

// ---------------------------------------------------------------------------
// Board descriptors
// ---------------------------------------------------------------------------

/// How a tile's two VRAM words are packed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TileFormat {
    /// Code split over the low byte and attribute bits, priority in color.
    M72,
    /// Full 16-bit code in the first word.
    Rtype2,
}

/// Main CPU memory map. All addresses are byte addresses; the `Option`
/// registers are port-mapped when absent.
#[derive(Clone, Copy, Debug)]
pub struct MemoryLayout {
    pub rom_mask: u32,
    pub ram: (u32, u32),
    pub sprites: (u32, u32),
    pub sprites2: Option<(u32, u32)>,
    pub palette: [u32; 2],
    pub vram: [(u32, u32); 2],
    pub rowscroll: Option<(u32, u32)>,
    /// Main-CPU window onto the sound CPU's RAM (boards without sound ROM).
    pub sound_ram: Option<(u32, u32)>,
    pub irq_line: Option<u32>,
    pub dma_on: Option<u32>,
    pub gfx_ctrl: Option<u32>,
}

const M72_LAYOUT: MemoryLayout = MemoryLayout {
    rom_mask: 0x3FFFF,
    ram: (0x40000, 0x43FFF),
    sprites: (0xC0000, 0xC03FF),
    sprites2: None,
    palette: [0xC8000, 0xCC000],
    vram: [(0xD8000, 0xDBFFF), (0xD0000, 0xD3FFF)],
    rowscroll: None,
    sound_ram: Some((0xE0000, 0xEFFFF)),
    irq_line: None,
    dma_on: None,
    gfx_ctrl: None,
};

const RTYPE2_LAYOUT: MemoryLayout = MemoryLayout {
    rom_mask: 0x7FFFF,
    ram: (0xE0000, 0xE3FFF),
    sprites: (0xC0000, 0xC03FF),
    sprites2: None,
    palette: [0xC8000, 0xD8000],
    vram: [(0xD4000, 0xD7FFF), (0xD0000, 0xD3FFF)],
    rowscroll: None,
    sound_ram: None,
    irq_line: Some(0xB0000),
    dma_on: Some(0xBC000),
    gfx_ctrl: None,
};

const MAJTITLE_LAYOUT: MemoryLayout = MemoryLayout {
    rom_mask: 0x7FFFF,
    ram: (0xD0000, 0xD3FFF),
    sprites: (0xC0000, 0xC07FF),
    sprites2: Some((0xC8000, 0xC83FF)),
    palette: [0xCC000, 0xA4000],
    vram: [(0xB0000, 0xBFFFF), (0xAC000, 0xAFFFF)],
    rowscroll: Some((0xA0000, 0xA03FF)),
    sound_ram: None,
    irq_line: Some(0xE0000),
    dma_on: Some(0xEC000),
    gfx_ctrl: Some(0xE4000),
};

const HHARRY_LAYOUT: MemoryLayout = MemoryLayout {
    rom_mask: 0x7FFFF,
    ram: (0xA0000, 0xA3FFF),
    sprites: (0xC0000, 0xC03FF),
    sprites2: None,
    palette: [0xC8000, 0xCC000],
    vram: [(0xD8000, 0xDBFFF), (0xD0000, 0xD3FFF)],
    rowscroll: None,
    sound_ram: None,
    irq_line: None,
    dma_on: None,
    gfx_ctrl: None,
};

/// Graphics slots.
const GFX_SPRITES: usize = 0;
const GFX_FG: usize = 1;
const GFX_BG: usize = 2;
const GFX_SPRITES2: usize = 3;

/// Tilemap layers.
const LAYER_BG: usize = 0;
const LAYER_FG: usize = 1;

const FG_64X64: TilemapDesc = TilemapDesc::rows(8, 8, 64, 64);

fn majtitle_scan(col: usize, row: usize) -> usize {
    (row << 8) + col
}

static M72_LAYERS: [LayerDesc; 2] = [
    LayerDesc { tilemap: FG_64X64, gfx: GFX_BG },
    LayerDesc { tilemap: FG_64X64, gfx: GFX_FG },
];

static SHARED_GFX_LAYERS: [LayerDesc; 2] = [
    LayerDesc { tilemap: FG_64X64, gfx: GFX_FG },
    LayerDesc { tilemap: FG_64X64, gfx: GFX_FG },
];

static MAJTITLE_LAYERS: [LayerDesc; 2] = [
    LayerDesc {
        tilemap: TilemapDesc::rows(8, 8, 128, 64).with_scan(majtitle_scan),
        gfx: GFX_FG,
    },
    LayerDesc { tilemap: FG_64X64, gfx: GFX_FG },
];

/// Back halves, sprites (second list first), front halves.
static DRAW_ORDER: DrawPlan = DrawPlan(&[
    DrawStep::layer(LAYER_BG, DrawFlags::LAYER1),
    DrawStep::layer(LAYER_FG, DrawFlags::LAYER1),
    DrawStep::Sprites { list: 1 },
    DrawStep::Sprites { list: 0 },
    DrawStep::layer(LAYER_BG, DrawFlags::LAYER0),
    DrawStep::layer(LAYER_FG, DrawFlags::LAYER0),
]);

/// Everything that distinguishes one M72-family board from another.
#[derive(Clone, Copy, Debug)]
pub struct M72Descriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub layout: &'static MemoryLayout,
    pub layers: &'static [LayerDesc],
    pub tile_format: TileFormat,
    /// Background transmask for priority group 2.
    pub bg_group2: (u16, u16),
    pub fg_dx: i32,
    pub bg_dx: i32,
    /// Port 0x02 bit 4 drives the sound CPU's RESET (active low).
    pub sound_reset_port: bool,
    pub samples: Option<AddressMode>,
    /// Background scroll X gets +256 and can switch to row scroll.
    pub wide_bg: bool,
}

pub const M72: M72Descriptor = M72Descriptor {
    name: "m72",
    description: "R-Type (Irem M72)",
    layout: &M72_LAYOUT,
    layers: &M72_LAYERS,
    tile_format: TileFormat::M72,
    bg_group2: (0x0007, 0xFFF8),
    fg_dx: 0,
    bg_dx: 0,
    sound_reset_port: true,
    samples: None,
    wide_bg: false,
};

pub const RTYPE2: M72Descriptor = M72Descriptor {
    name: "rtype2",
    description: "R-Type II (Irem M82)",
    layout: &RTYPE2_LAYOUT,
    layers: &SHARED_GFX_LAYERS,
    tile_format: TileFormat::Rtype2,
    bg_group2: (0x0001, 0xFFFE),
    fg_dx: 4,
    bg_dx: 4,
    sound_reset_port: false,
    samples: Some(AddressMode::Shift5),
    wide_bg: false,
};

pub const MAJTITLE: M72Descriptor = M72Descriptor {
    name: "majtitle",
    description: "Major Title (Irem M84)",
    layout: &MAJTITLE_LAYOUT,
    layers: &MAJTITLE_LAYERS,
    tile_format: TileFormat::Rtype2,
    bg_group2: (0x0001, 0xFFFE),
    fg_dx: 4,
    bg_dx: 4,
    sound_reset_port: false,
    samples: Some(AddressMode::Shift5),
    wide_bg: true,
};

pub const HHARRY: M72Descriptor = M72Descriptor {
    name: "hharry",
    description: "Hammerin' Harry (Irem M84)",
    layout: &HHARRY_LAYOUT,
    layers: &SHARED_GFX_LAYERS,
    tile_format: TileFormat::M72,
    bg_group2: (0x0001, 0xFFFE),
    fg_dx: 4,
    bg_dx: 6,
    sound_reset_port: false,
    samples: Some(AddressMode::Direct),
    wide_bg: false,
};

pub const POUNDFOR: M72Descriptor = M72Descriptor {
    name: "poundfor",
    description: "Pound for Pound (Irem M85)",
    layout: &RTYPE2_LAYOUT,
    layers: &SHARED_GFX_LAYERS,
    tile_format: TileFormat::Rtype2,
    bg_group2: (0x0001, 0xFFFE),
    fg_dx: 6,
    bg_dx: 6,
    sound_reset_port: false,
    samples: Some(AddressMode::Shift4WithEnd),
    wide_bg: false,
};

fn video_desc(desc: &M72Descriptor) -> VideoDesc {
    VideoDesc {
        width: HTOTAL,
        height: VTOTAL,
        visible: VISIBLE,
        palette_len: 512,
        layers: desc.layers,
    }
}

/// 8x8 tiles, four planes in the four quarters of the ROM.
fn tile_layout() -> GfxLayout {
    GfxLayout {
        width: 8,
        height: 8,
        count: ElementCount::Frac { num: 1, den: 4 },
        planes: (0..4)
            .rev()
            .map(|q| PlaneOffset::Frac { num: q, den: 4, bits: 0 })
            .collect(),
        x_offsets: (0..8).collect(),
        y_offsets: (0..8).map(|y| y * 8).collect(),
        char_increment: 64,
    }
}

/// 16x16 sprites, planes as for tiles, right half 16 bytes on.
fn sprite_layout() -> GfxLayout {
    GfxLayout {
        width: 16,
        height: 16,
        count: ElementCount::Frac { num: 1, den: 4 },
        planes: (0..4)
            .rev()
            .map(|q| PlaneOffset::Frac { num: q, den: 4, bits: 0 })
            .collect(),
        x_offsets: (0..8).chain(128..136).collect(),
        y_offsets: (0..16).map(|y| y * 8).collect(),
        char_increment: 256,
    }
}

/// ROM regions accepted by [`M72Board::load_region`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum M72Region {
    MainCpu,
    SoundCpu,
    Sprites,
    FgTiles,
    BgTiles,
    Sprites2,
    Samples,
}

// ---------------------------------------------------------------------------
// Video memory
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
struct M72VideoRam {
    vram: [Vec<u16>; 2],
    sprites: SpriteRam<u16>,
    sprites2: Vec<u16>,
    #[serde(skip, default = "default_format")]
    format: TileFormat,
}

fn default_format() -> TileFormat {
    TileFormat::M72
}

impl M72VideoRam {
    fn draw_list(&self, list: &[u16], target: &mut Bitmap, clip: &Rect, gfx: &GfxSet, flip: bool, single_column: bool) {
        let word = |i: usize| list.get(i).copied().unwrap_or(0);
        let flip_height = if single_column { 256 } else { 284 };
        let mut offs = 0;
        while offs < list.len() {
            let attr = word(offs + 2);
            let w = if single_column { 1 } else { 1 << ((attr & 0xC000) >> 14) };
            let h = 1 << ((attr & 0x3000) >> 12);
            let mut sprite = SpriteRecord {
                x: -256 + (word(offs + 3) & 0x3FF) as i32,
                y: 384 - (word(offs) & 0x1FF) as i32 - 16 * h,
                code: word(offs + 1) as u32,
                color: (attr & 0x0F) as u32,
                flip_x: attr & 0x0800 != 0,
                flip_y: attr & 0x0400 != 0,
                width: w as u32,
                height: h as u32,
                priority_mask: None,
            };
            if flip {
                sprite.x = 512 - 16 * w - sprite.x;
                sprite.y = flip_height - 16 * h - sprite.y;
                sprite.flip_x = !sprite.flip_x;
                sprite.flip_y = !sprite.flip_y;
            }
            draw_sprite(target, clip, gfx, &sprite, SpriteGeometry::IREM, Some(0));
            offs += if single_column { 4 } else { (w as usize) << 2 };
        }
    }
}

impl VideoSource for M72VideoRam {
    fn tile_info(&self, layer: usize, index: usize) -> TileInfo {
        let vram = &self.vram[layer];
        let w0 = vram.get(index * 2).copied().unwrap_or(0);
        let w1 = vram.get(index * 2 + 1).copied().unwrap_or(0);
        match self.format {
            TileFormat::M72 => {
                let attr = w0 >> 8;
                let color = w1 & 0xFF;
                let group = if color & 0x80 != 0 {
                    2
                } else if color & 0x40 != 0 {
                    1
                } else {
                    0
                };
                TileInfo::new((w0 & 0xFF) as u32 + (((attr & 0x3F) as u32) << 8), (color & 0x0F) as u32)
                    .with_flip_yx(((attr & 0xC0) >> 6) as u32)
                    .with_group(group)
            }
            TileFormat::Rtype2 => {
                let attr = w1 >> 8;
                let color = w1 & 0xFF;
                let group = if attr & 0x01 != 0 {
                    2
                } else if color & 0x80 != 0 {
                    1
                } else {
                    0
                };
                TileInfo::new(w0 as u32, (color & 0x0F) as u32)
                    .with_flip_yx(((color & 0x60) >> 5) as u32)
                    .with_group(group)
            }
        }
    }

    fn draw_sprites(&self, list: usize, target: &mut Bitmap, clip: &Rect, gfx: &[GfxSet], flip: bool) {
        match list {
            0 => {
                if let Some(set) = gfx.get(GFX_SPRITES) {
                    self.draw_list(self.sprites.buffered(), target, clip, set, flip, false);
                }
            }
            _ => {
                if let Some(set) = gfx.get(GFX_SPRITES2) {
                    self.draw_list(&self.sprites2, target, clip, set, flip, true);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Board
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
enum SoundTimer {
    SampleNmi,
}

/// 8259-style controller init: ICW1 on port 0x40, ICW2 (vector base) on 0x42.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
struct PicInit {
    expect_icw2: bool,
}

#[derive(Serialize, Deserialize)]
struct M72Snapshot {
    ram: Vec<u16>,
    video_ram: M72VideoRam,
    rowscroll: Vec<u16>,
    palette: [PlanarPaletteRam; 2],
    sound_ram: Vec<u8>,
    lines: [CpuLines; 2],
    arbiter: IrqVectorArbiter,
    sound_latch: SoundLatch,
    raster: RasterCompare,
    irq_base: u8,
    pic: PicInit,
    scroll: [u16; 4],
    port02: u8,
    rowscroll_enabled: bool,
    streamer: SampleStreamer,
    dac: Dac8,
    ym: Ym2151Port,
    scheduler: Scheduler<SoundTimer>,
}

const SAVE_VERSION: u32 = 1;

/// Irem M72 family (Irem, 1987-1990)
///
/// Hardware: V30 @ 8 MHz (main), Z80 @ 3.579545 MHz (sound).
/// Video: two 64x64 8x8 tilemaps with three priority groups each, buffered
/// 16x16 sprites, planar 5-bit palette.
/// Audio: YM2151 + 8-bit sample DAC, sound CPU IRQ shared through a vector
/// arbiter.
pub struct M72Board {
    desc: M72Descriptor,

    // Main CPU memory
    rom: Vec<u16>,
    ram: Vec<u16>,
    video_ram: M72VideoRam,
    rowscroll: Vec<u16>,
    palette: [PlanarPaletteRam; 2],

    // Sound CPU memory (ROM boards: 0x0000-0xEFFF ROM, 0xF000- RAM)
    sound_rom: Vec<u8>,
    sound_ram: Vec<u8>,
    samples: Vec<u8>,

    video: VideoState,

    // CPU control lines: 0 = V30, 1 = Z80
    lines: [CpuLines; 2],

    // Sound CPU interface
    arbiter: IrqVectorArbiter,
    sound_latch: SoundLatch,
    streamer: SampleStreamer,
    dac: Dac8,
    ym: Ym2151Port,
    scheduler: Scheduler<SoundTimer>,

    // Video registers
    raster: RasterCompare,
    irq_base: u8,
    pic: PicInit,
    scroll: [u16; 4], // scrolly1, scrollx1, scrolly2, scrollx2
    port02: u8,
    rowscroll_enabled: bool,

    // I/O (active low)
    in0: u16,
    in1: u8,
    dsw: [u8; 2],

    fired: Vec<SoundTimer>,
}

impl M72Board {
    pub fn new(desc: M72Descriptor) -> Self {
        let layout = desc.layout;
        let words = |(start, end): (u32, u32)| ((end - start + 1) / 2) as usize;
        let mut video = VideoState::new(&video_desc(&desc));
        for (layer, (dx, group2)) in [(desc.bg_dx, desc.bg_group2), (desc.fg_dx, (0x0001, 0xFFFF))]
            .into_iter()
            .enumerate()
        {
            let map = video.layer_mut(layer);
            map.set_scroll_delta(Axis::X, dx, 0);
            map.set_scroll_delta(Axis::Y, -128, 16);
            if layer == LAYER_BG {
                map.set_transmask(0, 0xFFFF, 0x0000);
                map.set_transmask(1, 0x00FF, 0xFF00);
            } else {
                map.set_transmask(0, 0xFFFF, 0x0001);
                map.set_transmask(1, 0x00FF, 0xFF01);
            }
            map.set_transmask(2, group2.0, group2.1);
        }

        let mut scheduler = Scheduler::new();
        if desc.samples.is_some() {
            scheduler.add_periodic(PIXEL_CLOCK_HZ / SAMPLE_NMI_HZ, SoundTimer::SampleNmi);
        }

        Self {
            desc,
            rom: Vec::new(),
            ram: vec![0; words(layout.ram)],
            video_ram: M72VideoRam {
                vram: [vec![0; words(layout.vram[0])], vec![0; words(layout.vram[1])]],
                sprites: SpriteRam::new(words(layout.sprites)),
                sprites2: layout.sprites2.map(words).map(|n| vec![0; n]).unwrap_or_default(),
                format: desc.tile_format,
            },
            rowscroll: layout.rowscroll.map(words).map(|n| vec![0; n]).unwrap_or_default(),
            palette: [PlanarPaletteRam::new(0), PlanarPaletteRam::new(256)],
            sound_rom: Vec::new(),
            sound_ram: vec![0; if layout.sound_ram.is_some() { 0x10000 } else { 0x1000 }],
            samples: Vec::new(),
            video,
            lines: [CpuLines::new(), CpuLines::new()],
            arbiter: IrqVectorArbiter::new(),
            sound_latch: SoundLatch::new(),
            streamer: SampleStreamer::new(desc.samples.unwrap_or(AddressMode::Direct)),
            dac: Dac8::new(),
            ym: Ym2151Port::new(),
            scheduler,
            raster: RasterCompare::new(),
            irq_base: DEFAULT_IRQ_BASE,
            pic: PicInit::default(),
            scroll: [0; 4],
            port02: 0,
            rowscroll_enabled: false,
            in0: 0xFFFF,
            in1: 0xFF,
            dsw: [0xFF; 2],
            fired: Vec::new(),
        }
    }

    pub fn from_config(desc: M72Descriptor, config: &MachineConfig) -> Self {
        let mut board = Self::new(desc);
        board.dsw = [config.dip.dsw0, config.dip.dsw1];
        if config.flip_screen_dip {
            board.dsw[1] &= !DSW1_FLIP;
        }
        board
    }

    pub fn descriptor(&self) -> &M72Descriptor {
        &self.desc
    }

    pub fn load_region(&mut self, region: M72Region, data: &[u8]) {
        match region {
            M72Region::MainCpu => self.rom = region::words_le(data),
            M72Region::SoundCpu => {
                if self.desc.layout.sound_ram.is_some() {
                    region::copy_into("sound", &mut self.sound_ram, 0, data);
                } else {
                    self.sound_rom = data.to_vec();
                }
            }
            M72Region::Sprites => {
                self.video.set_gfx(GFX_SPRITES, GfxSet::decode(&sprite_layout(), data, 0, 16));
            }
            M72Region::FgTiles => {
                self.video.set_gfx(GFX_FG, GfxSet::decode(&tile_layout(), data, 256, 16));
            }
            M72Region::BgTiles => {
                self.video.set_gfx(GFX_BG, GfxSet::decode(&tile_layout(), data, 256, 16));
            }
            M72Region::Sprites2 => {
                self.video.set_gfx(GFX_SPRITES2, GfxSet::decode(&sprite_layout(), data, 0, 16));
            }
            M72Region::Samples => self.samples = data.to_vec(),
        }
    }

    pub fn main_lines(&self) -> &CpuLines {
        &self.lines[0]
    }

    pub fn sound_lines(&self) -> &CpuLines {
        &self.lines[1]
    }

    pub fn arbiter(&self) -> &IrqVectorArbiter {
        &self.arbiter
    }

    pub fn video(&self) -> &VideoState {
        &self.video
    }

    pub fn irq_base(&self) -> u8 {
        self.irq_base
    }

    pub fn dac(&self) -> &Dac8 {
        &self.dac
    }

    pub fn ym2151_mut(&mut self) -> &mut Ym2151Port {
        &mut self.ym
    }

    /// YM2151 IRQ output, driven by the host's chip model.
    pub fn set_ym2151_irq(&mut self, asserted: bool) {
        let action = if asserted { VectorAction::Assert } else { VectorAction::Clear };
        self.arbiter.request(VectorSource::YM2151, action);
    }

    fn flip_dip(&self) -> bool {
        self.dsw[1] & DSW1_FLIP == 0
    }

    fn apply_scroll(&mut self) {
        let [scrolly1, scrollx1, scrolly2, scrollx2] = self.scroll.map(|v| v as i32);
        let fg = self.video.layer_mut(LAYER_FG);
        fg.set_scroll(Axis::X, scrollx1);
        fg.set_scroll(Axis::Y, scrolly1);

        let rowscroll_enabled = self.desc.wide_bg && self.rowscroll_enabled;
        let bg = self.video.layer_mut(LAYER_BG);
        if rowscroll_enabled {
            let rows = self.rowscroll.len();
            bg.set_scroll_rows(rows);
            for (i, &value) in self.rowscroll.iter().enumerate() {
                bg.set_row_scroll((i + scrolly2 as usize) & (rows - 1), 256 + value as i32);
            }
        } else {
            bg.set_scroll_rows(1);
            let bias = if self.desc.wide_bg { 256 } else { 0 };
            bg.set_scroll(Axis::X, bias + scrollx2);
        }
        bg.set_scroll(Axis::Y, scrolly2);
    }

    fn update_to(&mut self, line: u16) {
        self.apply_scroll();
        self.video.update_partial(&self.video_ram, DRAW_ORDER, line);
    }

    // -----------------------------------------------------------------------
    // Main CPU registers
    // -----------------------------------------------------------------------

    fn write_port02(&mut self, data: u8) {
        self.port02 = data;
        // bits 0/1: coin counters
        let flip = (data & 0x04 != 0) ^ self.flip_dip();
        self.video.set_flip(flip);
        self.video.set_video_off(data & 0x08 != 0);
        // The arbiter keeps its pending sources across a sound CPU reset.
        if self.desc.sound_reset_port {
            self.lines[1].set_reset(data & 0x10 == 0);
        }
    }

    fn write_sound_command(&mut self, data: u8) {
        let mut irq = SourceRequest::new(&mut self.arbiter, VectorSource::SOUND_LATCH);
        self.sound_latch.write(data, &mut irq);
    }

    fn write_pic(&mut self, port: u32, data: u8) {
        match port {
            0x40 if data & 0x10 != 0 => self.pic.expect_icw2 = true,
            0x42 if self.pic.expect_icw2 => {
                self.irq_base = data & 0xF8;
                self.pic.expect_icw2 = false;
            }
            _ => log::trace!("interrupt controller write {port:#x} = {data:#04x}"),
        }
    }

    fn main_read(&mut self, addr: u32) -> u16 {
        let l = self.desc.layout;
        let within = |(start, end): (u32, u32)| (start..=end).contains(&addr).then(|| ((addr - start) >> 1) as usize);

        if let Some(i) = within(l.ram) {
            return self.ram[i];
        }
        if let Some(i) = within(l.sprites) {
            return self.video_ram.sprites.read(i);
        }
        if let Some(i) = l.sprites2.and_then(within) {
            return self.video_ram.sprites2[i];
        }
        for (bank, base) in l.palette.into_iter().enumerate() {
            if let Some(i) = within((base, base + 0xBFF)) {
                return self.palette[bank].read(i);
            }
        }
        for layer in 0..2 {
            if let Some(i) = within(l.vram[layer]) {
                return self.video_ram.vram[layer][i];
            }
        }
        if let Some(i) = l.rowscroll.and_then(within) {
            return self.rowscroll[i];
        }
        if let Some((start, end)) = l.sound_ram
            && (start..=end).contains(&addr)
        {
            let i = (addr - start) as usize & !1;
            return u16::from_le_bytes([self.sound_ram[i], self.sound_ram[i + 1]]);
        }
        if addr <= l.rom_mask || addr >= 0xFFFF0 {
            return mirrored(&self.rom, ((addr & l.rom_mask) >> 1) as usize);
        }
        log::trace!("m72 unmapped read {addr:#07x}");
        0xFFFF
    }

    fn main_write(&mut self, addr: u32, data: u16) {
        let l = self.desc.layout;
        let within = |(start, end): (u32, u32)| (start..=end).contains(&addr).then(|| ((addr - start) >> 1) as usize);

        if let Some(i) = within(l.ram) {
            self.ram[i] = data;
            return;
        }
        if let Some(i) = within(l.sprites) {
            self.video_ram.sprites.write(i, data);
            return;
        }
        if let Some(i) = l.sprites2.and_then(within) {
            self.video_ram.sprites2[i] = data;
            return;
        }
        for (bank, base) in l.palette.into_iter().enumerate() {
            if let Some(i) = within((base, base + 0xBFF)) {
                self.palette[bank].write(i, data, self.video.palette_mut());
                return;
            }
        }
        for layer in 0..2 {
            if let Some(i) = within(l.vram[layer]) {
                self.video_ram.vram[layer][i] = data;
                self.video.mark_dirty(layer, i / 2);
                return;
            }
        }
        if let Some(i) = l.rowscroll.and_then(within) {
            self.rowscroll[i] = data;
            return;
        }
        if let Some((start, end)) = l.sound_ram
            && (start..=end).contains(&addr)
        {
            let i = (addr - start) as usize & !1;
            self.sound_ram[i..i + 2].copy_from_slice(&data.to_le_bytes());
            return;
        }
        if l.irq_line == Some(addr) {
            self.raster.write(data);
        } else if l.dma_on == Some(addr) {
            self.video_ram.sprites.commit();
        } else if l.gfx_ctrl == Some(addr) {
            self.rowscroll_enabled = data & 0xFF00 != 0;
        } else {
            log::trace!("m72 unmapped write {addr:#07x} = {data:#06x}");
        }
    }

    fn main_io_read(&mut self, port: u32) -> u16 {
        match port & 0xFE {
            0x00 => self.in0,
            0x02 => self.in1 as u16 | 0xFF00,
            0x04 => u16::from_le_bytes(self.dsw),
            _ => {
                log::trace!("m72 unmapped port read {port:#04x}");
                0xFFFF
            }
        }
    }

    fn main_io_write(&mut self, port: u32, data: u16) {
        let l = self.desc.layout;
        match port & 0xFE {
            0x00 => self.write_sound_command(data as u8),
            0x02 => self.write_port02(data as u8),
            0x04 if l.dma_on.is_none() => self.video_ram.sprites.commit(),
            0x06 if l.irq_line.is_none() => self.raster.write(data),
            0x40 | 0x42 => self.write_pic(port & 0xFE, data as u8),
            0x80 => self.scroll[0] = data,
            0x82 => self.scroll[1] = data,
            0x84 => self.scroll[2] = data,
            0x86 => self.scroll[3] = data,
            _ => log::trace!("m72 unmapped port write {port:#04x} = {data:#06x}"),
        }
    }

    // -----------------------------------------------------------------------
    // Sound CPU
    // -----------------------------------------------------------------------

    fn sound_read(&self, addr: u16) -> u8 {
        if self.desc.layout.sound_ram.is_some() {
            return self.sound_ram[addr as usize];
        }
        match addr {
            0x0000..=0xEFFF => self.sound_rom.get(addr as usize).copied().unwrap_or(0xFF),
            _ => self.sound_ram[(addr & 0x0FFF) as usize],
        }
    }

    fn sound_write(&mut self, addr: u16, data: u8) {
        if self.desc.layout.sound_ram.is_some() {
            self.sound_ram[addr as usize] = data;
        } else if addr >= 0xF000 {
            self.sound_ram[(addr & 0x0FFF) as usize] = data;
        }
    }

    fn sample_address_port(&self, port: u8) -> Option<u8> {
        match self.desc.samples? {
            AddressMode::Shift4WithEnd => (0x10..=0x13).contains(&port).then(|| port - 0x10),
            _ => (0x80..=0x81).contains(&port).then(|| port - 0x80),
        }
    }

    fn sound_io_read(&mut self, port: u8) -> u8 {
        match port {
            0x00 | 0x01 => self.ym.read(port),
            0x02 => self.sound_latch.peek(),
            0x84 if self.desc.samples.is_some() => self.streamer.read(&self.samples),
            _ => {
                log::trace!("m72 sound unmapped port read {port:#04x}");
                0xFF
            }
        }
    }

    fn sound_io_write(&mut self, port: u8, data: u8) {
        if let Some(offset) = self.sample_address_port(port) {
            self.streamer.set_address_byte(offset, data);
            return;
        }
        match port {
            0x00 | 0x01 => self.ym.write(port, data),
            0x06 => {
                let mut irq = SourceRequest::new(&mut self.arbiter, VectorSource::SOUND_LATCH);
                self.sound_latch.acknowledge(&mut irq);
            }
            0x82 if self.desc.samples.is_some() => {
                self.streamer.write_dac(data, &mut self.dac, self.samples.len());
            }
            _ => log::trace!("m72 sound unmapped port write {port:#04x} = {data:#04x}"),
        }
    }

    fn snapshot(&self) -> M72Snapshot {
        M72Snapshot {
            ram: self.ram.clone(),
            video_ram: self.video_ram.clone(),
            rowscroll: self.rowscroll.clone(),
            palette: self.palette.clone(),
            sound_ram: self.sound_ram.clone(),
            lines: self.lines.clone(),
            arbiter: self.arbiter.clone(),
            sound_latch: self.sound_latch.clone(),
            raster: self.raster,
            irq_base: self.irq_base,
            pic: self.pic,
            scroll: self.scroll,
            port02: self.port02,
            rowscroll_enabled: self.rowscroll_enabled,
            streamer: self.streamer.clone(),
            dac: self.dac.clone(),
            ym: self.ym.clone(),
            scheduler: self.scheduler.clone(),
        }
    }
}

impl Bus for M72Board {
    type Address = u32;
    type Data = u16;

    fn read(&mut self, master: BusMaster, addr: u32) -> u16 {
        match master {
            BusMaster::Cpu(0) => self.main_read(addr & 0xFFFFF),
            BusMaster::Cpu(1) => self.sound_read(addr as u16) as u16,
            _ => 0xFFFF,
        }
    }

    fn write(&mut self, master: BusMaster, addr: u32, data: u16) {
        match master {
            BusMaster::Cpu(0) => self.main_write(addr & 0xFFFFF, data),
            BusMaster::Cpu(1) => self.sound_write(addr as u16, data as u8),
            _ => {}
        }
    }

    fn io_read(&mut self, master: BusMaster, addr: u32) -> u16 {
        match master {
            BusMaster::Cpu(0) => self.main_io_read(addr & 0xFF),
            BusMaster::Cpu(1) => self.sound_io_read(addr as u8) as u16,
            _ => 0xFFFF,
        }
    }

    fn io_write(&mut self, master: BusMaster, addr: u32, data: u16) {
        match master {
            BusMaster::Cpu(0) => self.main_io_write(addr & 0xFF, data),
            BusMaster::Cpu(1) => self.sound_io_write(addr as u8, data as u8),
            _ => {}
        }
    }

    fn is_halted_for(&self, master: BusMaster) -> bool {
        match master {
            BusMaster::Cpu(n) => self.lines.get(n).is_some_and(|l| l.is_suspended()),
            BusMaster::Dma => false,
        }
    }

    fn check_interrupts(&self, target: BusMaster) -> InterruptState {
        match target {
            BusMaster::Cpu(n) => self.lines.get(n).map(|l| l.interrupt_state()).unwrap_or_default(),
            BusMaster::Dma => InterruptState::default(),
        }
    }

    fn acknowledge_interrupt(&mut self, target: BusMaster, line: InputLine) {
        if let BusMaster::Cpu(n) = target
            && let Some(lines) = self.lines.get_mut(n)
        {
            lines.acknowledge(line);
        }
    }
}

impl SaveState for M72Board {
    fn save_state(&self) -> Result<Vec<u8>, SaveStateError> {
        save::encode(&SaveHeader::new(self.desc.name, SAVE_VERSION), &self.snapshot())
    }

    fn load_state(&mut self, data: &[u8]) -> Result<(), SaveStateError> {
        let s: M72Snapshot = save::decode(&SaveHeader::new(self.desc.name, SAVE_VERSION), data)?;
        self.ram.check_layout(&s.ram, "ram")?;
        self.rowscroll.check_layout(&s.rowscroll, "rowscroll")?;
        self.palette.check_layout(&s.palette, "palette")?;
        self.sound_ram.check_layout(&s.sound_ram, "sound_ram")?;
        self.ym.check_layout(&s.ym, "ym")?;
        self.scheduler.check_layout(&s.scheduler, "scheduler")?;
        self.video_ram.vram.check_layout(&s.video_ram.vram, "vram")?;
        self.video_ram.sprites.check_layout(&s.video_ram.sprites, "sprites")?;
        self.video_ram.sprites2.check_layout(&s.video_ram.sprites2, "sprites2")?;

        self.ram = s.ram;
        self.video_ram = M72VideoRam {
            format: self.desc.tile_format,
            ..s.video_ram
        };
        self.rowscroll = s.rowscroll;
        self.palette = s.palette;
        self.sound_ram = s.sound_ram;
        self.lines = s.lines;
        self.arbiter = s.arbiter;
        self.sound_latch = s.sound_latch;
        self.raster = s.raster;
        self.irq_base = s.irq_base;
        self.pic = s.pic;
        self.scroll = s.scroll;
        self.rowscroll_enabled = s.rowscroll_enabled;
        self.streamer = s.streamer;
        self.dac = s.dac;
        self.ym = s.ym;
        self.scheduler = s.scheduler;

        let [pal1, pal2] = &self.palette;
        pal1.refresh(self.video.palette_mut());
        pal2.refresh(self.video.palette_mut());
        self.port02 = s.port02;
        self.video.set_flip((s.port02 & 0x04 != 0) ^ self.flip_dip());
        self.video.set_video_off(s.port02 & 0x08 != 0);
        self.video.mark_all_dirty();
        Ok(())
    }
}

impl Board for M72Board {
    fn cpu_count(&self) -> usize {
        2
    }

    fn cycles_per_line(&self, cpu: usize) -> u64 {
        if cpu == 0 { MAIN_CYCLES_PER_LINE } else { SOUND_CYCLES_PER_LINE }
    }

    fn ticks_per_line(&self) -> u64 {
        HTOTAL as u64
    }

    fn total_lines(&self) -> u16 {
        VTOTAL as u16
    }

    fn begin_scanline(&mut self, line: u16) {
        let Some(irq) = self.raster.check(line) else {
            return;
        };
        self.update_to(line);
        let vector = irq.vector(self.irq_base);
        if irq == RasterIrq::Raster {
            log::trace!("m72 raster IRQ at line {line}");
        }
        self.lines[0].set_line_and_vector(InputLine::Irq, LineState::Hold, vector);
    }

    fn synchronize(&mut self) {
        self.arbiter.synchronize(&mut self.lines[1]);
    }

    fn advance_time(&mut self, ticks: u64) {
        self.scheduler.advance(ticks, &mut self.fired);
        for event in self.fired.drain(..) {
            match event {
                SoundTimer::SampleNmi => {
                    if !self.lines[1].is_suspended() {
                        self.lines[1].set_line(InputLine::Nmi, LineState::Pulse);
                    }
                }
            }
        }
    }

    fn end_frame(&mut self) {
        self.apply_scroll();
        self.video.finish_frame(&self.video_ram, DRAW_ORDER);
    }

    fn is_suspended(&self, cpu: usize) -> bool {
        self.lines.get(cpu).is_some_and(|l| l.is_suspended())
    }

    fn take_reset_release(&mut self, cpu: usize) -> bool {
        self.lines.get_mut(cpu).is_some_and(|l| l.take_reset_release())
    }

    fn display_size(&self) -> (u32, u32) {
        (VISIBLE.width(), VISIBLE.height())
    }

    fn render_rgb24(&self, buffer: &mut [u8]) {
        self.video.to_rgb24(buffer);
    }

    fn set_input(&mut self, button: u8, pressed: bool) {
        match button {
            0..=15 => {
                let mask = 1u16 << button;
                if pressed { self.in0 &= !mask } else { self.in0 |= mask }
            }
            INPUT_P1_START..=INPUT_SERVICE => {
                let mask = 1u8 << (button - INPUT_P1_START);
                if pressed { self.in1 &= !mask } else { self.in1 |= mask }
            }
            _ => {}
        }
    }

    fn input_map(&self) -> &[InputButton] {
        M72_INPUT_MAP
    }

    fn reset(&mut self) {
        for lines in &mut self.lines {
            *lines = CpuLines::new();
        }
        self.arbiter.reset(&mut self.lines[1]);
        self.sound_latch.reset();
        self.streamer.reset();
        self.ym.reset();
        self.scheduler.reset();
        self.raster = RasterCompare::new();
        self.irq_base = DEFAULT_IRQ_BASE;
        self.pic = PicInit::default();
        self.scroll = [0; 4];
        self.rowscroll_enabled = false;
        self.write_port02(if self.desc.sound_reset_port { 0x10 } else { 0 });
        self.video_ram.sprites.clear();
        self.video.mark_all_dirty();
    }

    fn frame_rate_hz(&self) -> f64 {
        PIXEL_CLOCK_HZ as f64 / (HTOTAL * VTOTAL) as f64
    }
}

fn create(desc: M72Descriptor, config: &MachineConfig) -> Box<dyn kinescope_core::core::machine::Machine> {
    Box::new(Cabinet::from_config(M72Board::from_config(desc, config), config))
}

inventory::submit! { BoardEntry::new(M72.name, M72.description, |c| create(M72, c)) }
inventory::submit! { BoardEntry::new(RTYPE2.name, RTYPE2.description, |c| create(RTYPE2, c)) }
inventory::submit! { BoardEntry::new(MAJTITLE.name, MAJTITLE.description, |c| create(MAJTITLE, c)) }
inventory::submit! { BoardEntry::new(HHARRY.name, HHARRY.description, |c| create(HHARRY, c)) }
inventory::submit! { BoardEntry::new(POUNDFOR.name, POUNDFOR.description, |c| create(POUNDFOR, c)) }
