use serde::{Deserialize, Serialize};

use kinescope_core::core::bus::InterruptState;
use kinescope_core::core::irq::{CpuLines, InputLine, LineRequest, LineState};
use kinescope_core::core::machine::{InputButton, Machine};
use kinescope_core::core::save::{self, Layout, SaveHeader, SaveState, SaveStateError};
use kinescope_core::core::scheduler::Scheduler;
use kinescope_core::core::{Bus, BusMaster};
use kinescope_core::device::{IrqLevels, Okim6295Port, SoundLatch, Ym2151Port};
use kinescope_core::video::{
    Axis, Bitmap, Blit, DrawFlags, DrawPlan, DrawStep, ElementCount, GfxLayout, GfxSet, LayerDesc, PlaneOffset,
    PriorityTable, Rect, SpriteRam, TileInfo, TilemapDesc, VideoDesc, VideoSource, VideoState, WordFormat,
    WordPaletteRam,
};

use crate::cabinet::{Board, Cabinet};
use crate::config::MachineConfig;
use crate::region::{self, mirrored};
use crate::registry::BoardEntry;

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------
// Pixel clock:  6 MHz (24 MHz / 4)
// HTOTAL:       384 pixels (320 visible), 64 us per line
// VTOTAL:       272 lines, visible 8..247, 57.44 Hz
// Main CPU:     68000 @ 12 MHz          -> 768 cycles per line
// Sound CPU:    Z80 @ 3.579545 MHz      -> 229 cycles per line

const PIXEL_CLOCK_HZ: f64 = 6_000_000.0;
const HTOTAL: usize = 384;
const VTOTAL: u16 = 272;
const MAIN_CYCLES_PER_LINE: u64 = 768;
const SOUND_CYCLES_PER_LINE: u64 = 229;
const VBLANK_LINE: u16 = 248;

const VISIBLE: Rect = Rect::new(0, 319, 8, 247);

const CPU_MAIN: usize = 0;
const CPU_SOUND: usize = 1;

const IRQ_TIMER: u8 = 2;
const IRQ_VBLANK: u8 = 3;

// ---------------------------------------------------------------------------
// Input button IDs
// ---------------------------------------------------------------------------
// Player n (0-3) uses IDs n*8 .. n*8+7: Right, Left, Up, Down, Punch, Kick,
// Start, Coin. 32 is Service.
pub const INPUT_RIGHT: u8 = 0;
pub const INPUT_LEFT: u8 = 1;
pub const INPUT_UP: u8 = 2;
pub const INPUT_DOWN: u8 = 3;
pub const INPUT_BUTTON1: u8 = 4;
pub const INPUT_BUTTON2: u8 = 5;
pub const INPUT_START: u8 = 6;
pub const INPUT_COIN: u8 = 7;
pub const INPUT_SERVICE: u8 = 32;

pub const fn player_input(player: u8, button: u8) -> u8 {
    player * 8 + button
}

/// System port bit reporting vertical blank (active high).
const SYSTEM_VBLANK: u8 = 0x08;

macro_rules! wwf_input_map {
    ($(($p:literal, $name:literal)),*) => {
        &[
            $(
                InputButton { id: player_input($p, INPUT_RIGHT), name: concat!($name, " Right") },
                InputButton { id: player_input($p, INPUT_LEFT), name: concat!($name, " Left") },
                InputButton { id: player_input($p, INPUT_UP), name: concat!($name, " Up") },
                InputButton { id: player_input($p, INPUT_DOWN), name: concat!($name, " Down") },
                InputButton { id: player_input($p, INPUT_BUTTON1), name: concat!($name, " Punch") },
                InputButton { id: player_input($p, INPUT_BUTTON2), name: concat!($name, " Kick") },
                InputButton { id: player_input($p, INPUT_START), name: concat!($name, " Start") },
                InputButton { id: player_input($p, INPUT_COIN), name: concat!($name, " Coin") },
            )*
            InputButton { id: INPUT_SERVICE, name: "Service" },
        ]
    };
}

const WWF_INPUT_MAP: &[InputButton] = wwf_input_map!((0, "P1"), (1, "P2"), (2, "P3"), (3, "P4"));

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug)]
pub struct WwfDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub sprite_xoff: i32,
    pub bg0_dx: i32,
    /// bg1 X offset in the normal and the swapped scroll routing.
    pub bg1_dx: [i32; 2],
}

pub const WWFWFEST: WwfDescriptor = WwfDescriptor {
    name: "wwfwfest",
    description: "WWF WrestleFest (Technos, 1991)",
    sprite_xoff: 0,
    bg0_dx: 0,
    bg1_dx: [0, 0],
};

pub const WWFWFSTB: WwfDescriptor = WwfDescriptor {
    name: "wwfwfstb",
    description: "WWF WrestleFest (bootleg)",
    sprite_xoff: 2,
    bg0_dx: -4,
    bg1_dx: [-4, -2],
};

// ---------------------------------------------------------------------------
// Video layout
// ---------------------------------------------------------------------------

const LAYER_FG0: usize = 0;
const LAYER_BG0: usize = 1;
const LAYER_BG1: usize = 2;

const GFX_CHARS: usize = 0;
const GFX_SPRITES: usize = 1;
const GFX_BG0: usize = 2;
const GFX_BG1: usize = 3;

static WWF_LAYERS: [LayerDesc; 3] = [
    LayerDesc { tilemap: TilemapDesc::rows(8, 8, 64, 32), gfx: GFX_CHARS },
    LayerDesc { tilemap: TilemapDesc::rows(16, 16, 32, 32), gfx: GFX_BG0 },
    LayerDesc { tilemap: TilemapDesc::rows(16, 16, 32, 32), gfx: GFX_BG1 },
];

const VIDEO: VideoDesc = VideoDesc {
    width: HTOTAL,
    height: VTOTAL as usize,
    visible: VISIBLE,
    palette_len: 0x2000,
    layers: &WWF_LAYERS,
};

/// Priority register value that keeps the scroll registers on their own
/// layers; every other value swaps them.
const NORMAL_PRIORITY: u16 = 0x78;

const PLAN_78: DrawPlan = DrawPlan(&[
    DrawStep::layer(LAYER_BG1, DrawFlags::OPAQUE),
    DrawStep::layer(LAYER_BG0, DrawFlags::empty()),
    DrawStep::Sprites { list: 0 },
    DrawStep::layer(LAYER_FG0, DrawFlags::empty()),
]);

const PLAN_7B: DrawPlan = DrawPlan(&[
    DrawStep::layer(LAYER_BG0, DrawFlags::OPAQUE),
    DrawStep::layer(LAYER_BG1, DrawFlags::empty()),
    DrawStep::Sprites { list: 0 },
    DrawStep::layer(LAYER_FG0, DrawFlags::empty()),
]);

const PLAN_7C: DrawPlan = DrawPlan(&[
    DrawStep::layer(LAYER_BG0, DrawFlags::OPAQUE),
    DrawStep::Sprites { list: 0 },
    DrawStep::layer(LAYER_BG1, DrawFlags::empty()),
    DrawStep::layer(LAYER_FG0, DrawFlags::empty()),
]);

/// Unlisted values draw nothing; the previous frame stays on screen.
pub static PRIORITY: PriorityTable = PriorityTable {
    entries: &[(0x78, PLAN_78), (0x7B, PLAN_7B), (0x7C, PLAN_7C)],
    default: DrawPlan(&[]),
};

fn char_layout() -> GfxLayout {
    GfxLayout {
        width: 8,
        height: 8,
        count: ElementCount::Frac { num: 1, den: 1 },
        planes: (0..4).map(PlaneOffset::Bits).collect(),
        x_offsets: (0..8).map(|x| x * 4).collect(),
        y_offsets: (0..8).map(|y| y * 32).collect(),
        char_increment: 256,
    }
}

/// Sprites: 16x16, one bitplane per quarter of the ROM.
fn sprite_layout() -> GfxLayout {
    GfxLayout {
        width: 16,
        height: 16,
        count: ElementCount::Frac { num: 1, den: 4 },
        planes: (0..4).map(|p| PlaneOffset::Frac { num: p, den: 4, bits: 0 }).collect(),
        x_offsets: (0..16).collect(),
        y_offsets: (0..16).map(|y| y * 16).collect(),
        char_increment: 256,
    }
}

/// Background tiles: two plane pairs in the two halves of the ROM.
fn tile_layout() -> GfxLayout {
    GfxLayout {
        width: 16,
        height: 16,
        count: ElementCount::Frac { num: 1, den: 2 },
        planes: vec![
            PlaneOffset::Frac { num: 1, den: 2, bits: 0 },
            PlaneOffset::Frac { num: 1, den: 2, bits: 4 },
            PlaneOffset::Bits(0),
            PlaneOffset::Bits(4),
        ],
        x_offsets: [0u32, 128]
            .into_iter()
            .flat_map(|base| [3, 2, 1, 0, 11, 10, 9, 8].map(|bit| base + bit))
            .collect(),
        y_offsets: (0..16).map(|y| y * 16).collect(),
        char_increment: 512,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WwfRegion {
    /// Big-endian program words.
    MainCpu,
    SoundCpu,
    Chars,
    Sprites,
    /// Shared by both backgrounds.
    Tiles,
}

// ---------------------------------------------------------------------------
// Video memory
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
struct WwfVideoRam {
    fg0: Vec<u16>,
    bg0: Vec<u16>,
    bg1: Vec<u16>,
    sprites: SpriteRam<u16>,
    sprite_xoff: i32,
}

impl VideoSource for WwfVideoRam {
    fn tile_info(&self, layer: usize, index: usize) -> TileInfo {
        let word = |vram: &[u16], i: usize| vram.get(i).copied().unwrap_or(0) as u32;
        match layer {
            LAYER_FG0 => {
                // ---- ----  tttt tttt  ---- ----  cccc TTTT
                let (w0, w1) = (word(&self.fg0, index * 2), word(&self.fg0, index * 2 + 1));
                TileInfo::new((w0 & 0xFF) | ((w1 & 0x0F) << 8), (w1 & 0xF0) >> 4)
            }
            LAYER_BG0 => {
                // ---- ----  fF-- CCCC  ---- TTTT tttt tttt
                let (w0, w1) = (word(&self.bg0, index * 2), word(&self.bg0, index * 2 + 1));
                TileInfo::new(w1 & 0x0FFF, w0 & 0x0F).with_flip_yx((w0 & 0xC0) >> 6)
            }
            _ => {
                // CCCC TTTT tttt tttt
                let w = word(&self.bg1, index);
                TileInfo::new(w & 0x0FFF, (w & 0xF000) >> 12)
            }
        }
    }

    fn draw_sprites(&self, _list: usize, target: &mut Bitmap, clip: &Rect, gfx: &[GfxSet], flip: bool) {
        let Some(gfx) = gfx.get(GFX_SPRITES) else {
            return;
        };
        for s in self.sprites.buffered().chunks_exact(8) {
            // yyyy yyyy | lllF fXYE | nnnn nnnn | NNNN NNNN | ---- CCCC | xxxx xxxx
            if s[1] & 0x0001 == 0 {
                continue;
            }
            let mut xpos = ((s[5] & 0x00FF) | (s[1] & 0x0004) << 6) as i32;
            if xpos > 512 - 16 {
                xpos -= 512;
            }
            xpos += self.sprite_xoff;
            let ypos = ((s[0] & 0x00FF) | (s[1] & 0x0002) << 7) as i32;
            let mut ypos = ((256 - ypos) & 0x1FF) - 16;
            let mut flip_x = s[1] & 0x0010 != 0;
            let mut flip_y = s[1] & 0x0008 != 0;
            if flip {
                flip_x = !flip_x;
                flip_y = !flip_y;
                ypos = 240 - ypos - self.sprite_xoff;
                xpos = 304 - xpos;
            }

            let chain = ((s[1] & 0x00E0) >> 5) as i32 + 1;
            let number = ((s[2] & 0x00FF) | (s[3] & 0x00FF) << 8) as u32;
            // Chained tiles stack upward from the anchor (downward on a
            // flipped screen); Y flip reverses the stack.
            let top = if flip { ypos } else { ypos - 16 * (chain - 1) };
            for count in 0..chain {
                let slot = if flip_y { count } else { chain - 1 - count };
                let blit = Blit {
                    code: number + count as u32,
                    color: (s[4] & 0x000F) as u32,
                    flip_x,
                    flip_y,
                    x: xpos,
                    y: top + 16 * slot,
                };
                gfx.draw(target, clip, &blit, Some(0));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Board
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
enum WwfEvent {
    SoundCommand(u8),
}

#[derive(Serialize, Deserialize)]
struct WwfSnapshot {
    ram: Vec<u16>,
    video_ram: WwfVideoRam,
    palette: WordPaletteRam,
    sound_ram: Vec<u8>,
    lines: [CpuLines; 2],
    irq: IrqLevels,
    sound_latch: SoundLatch,
    ym: Ym2151Port,
    oki: Okim6295Port,
    oki_bank: u8,
    scheduler: Scheduler<WwfEvent>,
    scroll: [u16; 4],
    priority: u16,
    flip: bool,
}

const SAVE_VERSION: u32 = 1;

/// WWF WrestleFest (Technos, 1991)
///
/// Hardware: 68000 (main), Z80 (sound).
/// Video: 8x8 text, two 16x16 backgrounds, chained sprites; the priority
/// register picks the layer order and which scroll registers drive which
/// background.
/// Audio: YM2151 and OKI M6295.
pub struct WwfBoard {
    desc: WwfDescriptor,

    main_rom: Vec<u16>,
    ram: Vec<u16>,
    video_ram: WwfVideoRam,
    palette: WordPaletteRam,

    sound_rom: Vec<u8>,
    sound_ram: Vec<u8>,

    video: VideoState,
    lines: [CpuLines; 2],
    irq: IrqLevels,

    sound_latch: SoundLatch,
    ym: Ym2151Port,
    oki: Okim6295Port,
    oki_bank: u8,

    scheduler: Scheduler<WwfEvent>,

    scroll: [u16; 4], // bg0 x, bg0 y, bg1 x, bg1 y
    priority: u16,
    flip: bool,
    line: u16,

    // I/O (active low)
    players: [u8; 4],
    system: u8,
    dsw: [u8; 2],
}

/// Palette RAM decodes 16 of every 64 words.
fn palette_index(word: usize) -> usize {
    (word & 0x000F) | ((word & 0x7FC0) >> 2)
}

impl WwfBoard {
    pub fn new(desc: WwfDescriptor) -> Self {
        let mut video = VideoState::new(&VIDEO);
        for layer in [LAYER_FG0, LAYER_BG0, LAYER_BG1] {
            video.layer_mut(layer).set_transparent_pen(0);
        }

        Self {
            desc,
            main_rom: Vec::new(),
            ram: vec![0; 0x2000],
            video_ram: WwfVideoRam {
                fg0: vec![0; 0x1000],
                bg0: vec![0; 0x800],
                bg1: vec![0; 0x400],
                sprites: SpriteRam::new(0x1000),
                sprite_xoff: desc.sprite_xoff,
            },
            palette: WordPaletteRam::new(0x2000, WordFormat::Xbgr444),
            sound_rom: Vec::new(),
            sound_ram: vec![0; 0x800],
            video,
            lines: Default::default(),
            irq: IrqLevels::new(),
            sound_latch: SoundLatch::new(),
            ym: Ym2151Port::new(),
            oki: Okim6295Port::new(),
            oki_bank: 0,
            scheduler: Scheduler::new(),
            scroll: [0; 4],
            priority: NORMAL_PRIORITY,
            flip: false,
            line: 0,
            players: [0xFF; 4],
            system: 0xFF,
            dsw: [0xFF; 2],
        }
    }

    pub fn from_config(desc: WwfDescriptor, config: &MachineConfig) -> Self {
        let mut board = Self::new(desc);
        board.dsw = [config.dip.dsw0, config.dip.dsw1];
        board
    }

    pub fn descriptor(&self) -> &WwfDescriptor {
        &self.desc
    }

    pub fn load_region(&mut self, region: WwfRegion, data: &[u8]) {
        match region {
            WwfRegion::MainCpu => self.main_rom = region::words_be(data),
            WwfRegion::SoundCpu => self.sound_rom = data.to_vec(),
            WwfRegion::Chars => self.video.set_gfx(GFX_CHARS, GfxSet::decode(&char_layout(), data, 0, 16)),
            WwfRegion::Sprites => self.video.set_gfx(GFX_SPRITES, GfxSet::decode(&sprite_layout(), data, 0x400, 16)),
            WwfRegion::Tiles => {
                let layout = tile_layout();
                self.video.set_gfx(GFX_BG0, GfxSet::decode(&layout, data, 0x1000, 16));
                self.video.set_gfx(GFX_BG1, GfxSet::decode(&layout, data, 0x0C00, 16));
            }
        }
    }

    pub fn lines(&self, cpu: usize) -> &CpuLines {
        &self.lines[cpu]
    }

    pub fn irq_levels(&self) -> &IrqLevels {
        &self.irq
    }

    pub fn video(&self) -> &VideoState {
        &self.video
    }

    pub fn priority(&self) -> u16 {
        self.priority
    }

    pub fn ym2151_mut(&mut self) -> &mut Ym2151Port {
        &mut self.ym
    }

    pub fn oki_mut(&mut self) -> &mut Okim6295Port {
        &mut self.oki
    }

    pub fn oki_bank(&self) -> u8 {
        self.oki_bank
    }

    pub fn sound_latch(&self) -> &SoundLatch {
        &self.sound_latch
    }

    pub fn set_ym2151_irq(&mut self, asserted: bool) {
        let state = if asserted { LineState::Assert } else { LineState::Clear };
        self.lines[CPU_SOUND].set_line(InputLine::Irq, state);
    }

    /// Scroll values as (x, y) for bg0 and bg1 under the current priority.
    pub fn layer_scroll(&self) -> [(i32, i32); 2] {
        let [x0, y0, x1, y1] = self.scroll.map(|v| v as i32);
        if self.priority == NORMAL_PRIORITY {
            [(x0 + self.desc.bg0_dx, y0), (x1 + self.desc.bg1_dx[0], y1)]
        } else {
            [(x1 + self.desc.bg0_dx, y1), (x0 + self.desc.bg1_dx[1], y0)]
        }
    }

    fn apply_scroll(&mut self) {
        let scroll = self.layer_scroll();
        for (layer, (x, y)) in [LAYER_BG0, LAYER_BG1].into_iter().zip(scroll) {
            let map = self.video.layer_mut(layer);
            map.set_scroll(Axis::X, x);
            map.set_scroll(Axis::Y, y);
        }
    }

    fn update_to(&mut self, line: u16) {
        self.apply_scroll();
        self.video.update_partial(&self.video_ram, PRIORITY.plan(self.priority), line);
    }

    /// Render what is already on screen before a register changes it.
    fn settle(&mut self) {
        if let Some(last) = self.line.checked_sub(1) {
            self.update_to(last);
        }
    }

    fn system_port(&self) -> u16 {
        let mut value = self.system & !SYSTEM_VBLANK;
        if self.line >= VBLANK_LINE {
            value |= SYSTEM_VBLANK;
        }
        0xFF00 | value as u16
    }

    fn main_read(&mut self, addr: u32) -> u16 {
        let word = (addr >> 1) as usize;
        match addr {
            0x000000..=0x07FFFF => mirrored(&self.main_rom, word),
            0x0C0000..=0x0C1FFF => self.video_ram.fg0[word & 0xFFF],
            0x0C2000..=0x0C3FFF => self.video_ram.sprites.read(word & 0xFFF),
            0x0C4000..=0x0C47FF => self.video_ram.bg1[word & 0x3FF],
            0x0C6000..=0x0C6FFF => self.video_ram.bg0[word & 0x7FF],
            0x140020..=0x140027 => 0xFF00 | self.players[(word & 3) as usize] as u16,
            0x140028 => self.system_port(),
            0x14002A => u16::from_le_bytes([self.dsw[0], self.dsw[1]]),
            0x180000..=0x18FFFF => self.palette.read(palette_index(word & 0x7FFF)),
            0x1C0000..=0x1C3FFF => self.ram[word & 0x1FFF],
            _ => {
                log::trace!("wwfwfest main unmapped read {addr:#08x}");
                0xFFFF
            }
        }
    }

    fn main_write(&mut self, addr: u32, data: u16) {
        let word = (addr >> 1) as usize;
        match addr {
            0x0C0000..=0x0C1FFF => {
                // 8-bit RAM: both byte lanes land in the low byte.
                self.video_ram.fg0[word & 0xFFF] = data & 0xFF;
                self.video.mark_dirty(LAYER_FG0, (word & 0xFFF) / 2);
            }
            0x0C2000..=0x0C3FFF => self.video_ram.sprites.write(word & 0xFFF, data),
            0x0C4000..=0x0C47FF => {
                self.video_ram.bg1[word & 0x3FF] = data;
                self.video.mark_dirty(LAYER_BG1, word & 0x3FF);
            }
            0x0C6000..=0x0C6FFF => {
                self.video_ram.bg0[word & 0x7FF] = data;
                self.video.mark_dirty(LAYER_BG0, (word & 0x7FF) / 2);
            }
            0x100000..=0x100007 => {
                self.settle();
                self.scroll[word & 3] = data;
            }
            0x100008 => {
                self.settle();
                self.priority = data;
            }
            0x14000C => {
                self.settle();
                self.flip = data & 0x01 != 0;
                self.video.set_flip(self.flip);
            }
            0x140000 => self.irq.set(IRQ_VBLANK, false, &mut self.lines[CPU_MAIN]),
            0x140002 => self.irq.set(IRQ_TIMER, false, &mut self.lines[CPU_MAIN]),
            0x140010 => self.scheduler.defer(WwfEvent::SoundCommand(data as u8)),
            0x180000..=0x18FFFF => {
                self.palette.write(palette_index(word & 0x7FFF), data, self.video.palette_mut());
            }
            0x1C0000..=0x1C3FFF => self.ram[word & 0x1FFF] = data,
            _ => log::trace!("wwfwfest main unmapped write {addr:#08x} = {data:#06x}"),
        }
    }

    fn sound_read(&mut self, addr: u16) -> u8 {
        match addr {
            0x0000..=0xBFFF => self.sound_rom.get(addr as usize).copied().unwrap_or(0xFF),
            0xC000..=0xC7FF => self.sound_ram[(addr & 0x7FF) as usize],
            0xC800..=0xC801 => self.ym.read((addr & 1) as u8),
            0xD800 => self.oki.read(),
            0xE800 => {
                let mut irq = LineRequest::new(&mut self.lines[CPU_SOUND], InputLine::Nmi, LineState::Pulse);
                self.sound_latch.read_and_acknowledge(&mut irq)
            }
            _ => {
                log::trace!("wwfwfest sound unmapped read {addr:#06x}");
                0xFF
            }
        }
    }

    fn sound_write(&mut self, addr: u16, data: u8) {
        match addr {
            0xC000..=0xC7FF => self.sound_ram[(addr & 0x7FF) as usize] = data,
            0xC800..=0xC801 => self.ym.write((addr & 1) as u8, data),
            0xD800 => self.oki.write(data),
            0xE000 => self.oki_bank = data & 0x01,
            _ => log::trace!("wwfwfest sound unmapped write {addr:#06x} = {data:#04x}"),
        }
    }

    fn snapshot(&self) -> WwfSnapshot {
        WwfSnapshot {
            ram: self.ram.clone(),
            video_ram: self.video_ram.clone(),
            palette: self.palette.clone(),
            sound_ram: self.sound_ram.clone(),
            lines: self.lines.clone(),
            irq: self.irq.clone(),
            sound_latch: self.sound_latch.clone(),
            ym: self.ym.clone(),
            oki: self.oki.clone(),
            oki_bank: self.oki_bank,
            scheduler: self.scheduler.clone(),
            scroll: self.scroll,
            priority: self.priority,
            flip: self.flip,
        }
    }
}

impl Bus for WwfBoard {
    type Address = u32;
    type Data = u16;

    fn read(&mut self, master: BusMaster, addr: u32) -> u16 {
        match master {
            BusMaster::Cpu(CPU_MAIN) => self.main_read(addr & 0xFFFFFE),
            BusMaster::Cpu(CPU_SOUND) => self.sound_read(addr as u16) as u16,
            _ => 0xFFFF,
        }
    }

    fn write(&mut self, master: BusMaster, addr: u32, data: u16) {
        match master {
            BusMaster::Cpu(CPU_MAIN) => self.main_write(addr & 0xFFFFFE, data),
            BusMaster::Cpu(CPU_SOUND) => self.sound_write(addr as u16, data as u8),
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

impl SaveState for WwfBoard {
    fn save_state(&self) -> Result<Vec<u8>, SaveStateError> {
        save::encode(&SaveHeader::new(self.desc.name, SAVE_VERSION), &self.snapshot())
    }

    fn load_state(&mut self, data: &[u8]) -> Result<(), SaveStateError> {
        let s: WwfSnapshot = save::decode(&SaveHeader::new(self.desc.name, SAVE_VERSION), data)?;
        self.ram.check_layout(&s.ram, "ram")?;
        self.palette.check_layout(&s.palette, "palette")?;
        self.sound_ram.check_layout(&s.sound_ram, "sound_ram")?;
        self.ym.check_layout(&s.ym, "ym")?;
        self.scheduler.check_layout(&s.scheduler, "scheduler")?;
        self.video_ram.fg0.check_layout(&s.video_ram.fg0, "fg0")?;
        self.video_ram.bg0.check_layout(&s.video_ram.bg0, "bg0")?;
        self.video_ram.bg1.check_layout(&s.video_ram.bg1, "bg1")?;
        self.video_ram.sprites.check_layout(&s.video_ram.sprites, "sprites")?;

        self.ram = s.ram;
        self.video_ram = s.video_ram;
        self.palette = s.palette;
        self.sound_ram = s.sound_ram;
        self.lines = s.lines;
        self.irq = s.irq;
        self.sound_latch = s.sound_latch;
        self.ym = s.ym;
        self.oki = s.oki;
        self.oki_bank = s.oki_bank;
        self.scheduler = s.scheduler;
        self.scroll = s.scroll;
        self.priority = s.priority;
        self.flip = s.flip;

        self.palette.refresh(self.video.palette_mut());
        self.video.set_flip(self.flip);
        self.video.mark_all_dirty();
        Ok(())
    }
}

impl Board for WwfBoard {
    fn cpu_count(&self) -> usize {
        2
    }

    fn cycles_per_line(&self, cpu: usize) -> u64 {
        if cpu == CPU_MAIN { MAIN_CYCLES_PER_LINE } else { SOUND_CYCLES_PER_LINE }
    }

    fn ticks_per_line(&self) -> u64 {
        HTOTAL as u64
    }

    fn total_lines(&self) -> u16 {
        VTOTAL
    }

    fn begin_scanline(&mut self, line: u16) {
        self.line = line;
        if line % 16 == 0 {
            if line > 0 {
                self.update_to(line - 1);
            }
            self.irq.set(IRQ_TIMER, true, &mut self.lines[CPU_MAIN]);
        }
        if line == VBLANK_LINE {
            self.update_to(line - 1);
            self.irq.set(IRQ_VBLANK, true, &mut self.lines[CPU_MAIN]);
        }
    }

    fn synchronize(&mut self) {
        let pending: Vec<WwfEvent> = self.scheduler.synchronize().collect();
        for event in pending {
            match event {
                WwfEvent::SoundCommand(data) => {
                    let mut irq = LineRequest::new(&mut self.lines[CPU_SOUND], InputLine::Nmi, LineState::Pulse);
                    self.sound_latch.write(data, &mut irq);
                }
            }
        }
    }

    fn advance_time(&mut self, ticks: u64) {
        // No periodic timers; keeps the scheduler clock in step.
        self.scheduler.advance(ticks, &mut Vec::new());
    }

    fn end_frame(&mut self) {
        self.apply_scroll();
        self.video.finish_frame(&self.video_ram, PRIORITY.plan(self.priority));
        self.video_ram.sprites.commit();
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
        let (port, bit) = match button {
            0..=31 => (&mut self.players[(button / 8) as usize], button % 8),
            INPUT_SERVICE => (&mut self.system, 0),
            _ => return,
        };
        if pressed {
            *port &= !(1 << bit);
        } else {
            *port |= 1 << bit;
        }
    }

    fn input_map(&self) -> &[InputButton] {
        WWF_INPUT_MAP
    }

    fn reset(&mut self) {
        self.lines = Default::default();
        self.irq.reset(&mut self.lines[CPU_MAIN]);
        self.sound_latch.reset();
        self.ym.reset();
        self.oki.reset();
        self.oki_bank = 0;
        self.scheduler.reset();
        self.scroll = [0; 4];
        self.priority = NORMAL_PRIORITY;
        self.flip = false;
        self.video.set_flip(false);
        self.video.mark_all_dirty();
    }

    fn frame_rate_hz(&self) -> f64 {
        PIXEL_CLOCK_HZ / (HTOTAL as f64 * VTOTAL as f64)
    }
}

fn create(desc: WwfDescriptor, config: &MachineConfig) -> Box<dyn Machine> {
    Box::new(Cabinet::from_config(WwfBoard::from_config(desc, config), config))
}

inventory::submit! { BoardEntry::new(WWFWFEST.name, WWFWFEST.description, |c| create(WWFWFEST, c)) }
inventory::submit! { BoardEntry::new(WWFWFSTB.name, WWFWFSTB.description, |c| create(WWFWFSTB, c)) }
