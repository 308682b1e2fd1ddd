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
    Rect, SpriteRam, TileInfo, TilemapDesc, VideoDesc, VideoSource, VideoState, WordFormat, WordPaletteRam,
};

use crate::cabinet::{Board, Cabinet};
use crate::config::MachineConfig;
use crate::region::{self, mirrored};
use crate::registry::BoardEntry;

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------
// Pixel clock:  7 MHz (28 MHz / 4)
// HTOTAL:       448 pixels (320 visible), 64 us per line
// VTOTAL:       272 lines, visible 8..247, 57.44 Hz
// Main CPU:     68000 @ 14 MHz          -> 896 cycles per line
// Sound CPU:    Z80 @ 3.579545 MHz      -> 229 cycles per line

const PIXEL_CLOCK_HZ: f64 = 7_000_000.0;
const HTOTAL: usize = 448;
const VTOTAL: u16 = 272;
const MAIN_CYCLES_PER_LINE: u64 = 896;
const SOUND_CYCLES_PER_LINE: u64 = 229;
const VBLANK_LINE: u16 = 248;
/// Raster compare wraps inside the visible field.
const RASTER_LINES: u16 = 240;

const VISIBLE: Rect = Rect::new(0, 319, 8, 247);

const CPU_MAIN: usize = 0;
const CPU_SOUND: usize = 1;

const IRQ_RASTER: u8 = 1;
const IRQ_TIMER: u8 = 2;
const IRQ_VBLANK: u8 = 3;

const SPRITE_WORDS: usize = 0x1000;

// ---------------------------------------------------------------------------
// Input button IDs
// ---------------------------------------------------------------------------
// 0-7: P1 port, 8-15: P2 port, 16-19: system port.
pub const INPUT_P1_RIGHT: u8 = 0;
pub const INPUT_P1_LEFT: u8 = 1;
pub const INPUT_P1_UP: u8 = 2;
pub const INPUT_P1_DOWN: u8 = 3;
pub const INPUT_P1_BUTTON1: u8 = 4;
pub const INPUT_P1_BUTTON2: u8 = 5;
pub const INPUT_P1_BUTTON3: u8 = 6;
pub const INPUT_P1_START: u8 = 7;
pub const INPUT_P2_RIGHT: u8 = 8;
pub const INPUT_P2_LEFT: u8 = 9;
pub const INPUT_P2_UP: u8 = 10;
pub const INPUT_P2_DOWN: u8 = 11;
pub const INPUT_P2_BUTTON1: u8 = 12;
pub const INPUT_P2_BUTTON2: u8 = 13;
pub const INPUT_P2_BUTTON3: u8 = 14;
pub const INPUT_P2_START: u8 = 15;
pub const INPUT_COIN1: u8 = 16;
pub const INPUT_COIN2: u8 = 17;
pub const INPUT_SERVICE: u8 = 19;

/// System port bit reporting vertical blank (active high).
const SYSTEM_VBLANK: u8 = 0x04;

const SHADFRCE_INPUT_MAP: &[InputButton] = &[
    InputButton { id: INPUT_P1_RIGHT, name: "P1 Right" },
    InputButton { id: INPUT_P1_LEFT, name: "P1 Left" },
    InputButton { id: INPUT_P1_UP, name: "P1 Up" },
    InputButton { id: INPUT_P1_DOWN, name: "P1 Down" },
    InputButton { id: INPUT_P1_BUTTON1, name: "P1 Punch" },
    InputButton { id: INPUT_P1_BUTTON2, name: "P1 Kick" },
    InputButton { id: INPUT_P1_BUTTON3, name: "P1 Jump" },
    InputButton { id: INPUT_P2_RIGHT, name: "P2 Right" },
    InputButton { id: INPUT_P2_LEFT, name: "P2 Left" },
    InputButton { id: INPUT_P2_UP, name: "P2 Up" },
    InputButton { id: INPUT_P2_DOWN, name: "P2 Down" },
    InputButton { id: INPUT_P2_BUTTON1, name: "P2 Punch" },
    InputButton { id: INPUT_P2_BUTTON2, name: "P2 Kick" },
    InputButton { id: INPUT_P2_BUTTON3, name: "P2 Jump" },
    InputButton { id: INPUT_P1_START, name: "P1 Start" },
    InputButton { id: INPUT_P2_START, name: "P2 Start" },
    InputButton { id: INPUT_COIN1, name: "Coin 1" },
    InputButton { id: INPUT_COIN2, name: "Coin 2" },
    InputButton { id: INPUT_SERVICE, name: "Service" },
];

// ---------------------------------------------------------------------------
// Video layout
// ---------------------------------------------------------------------------

const LAYER_BG1: usize = 0;
const LAYER_BG0: usize = 1;
const LAYER_FG: usize = 2;

const GFX_CHARS: usize = 0;
const GFX_SPRITES: usize = 1;
const GFX_TILES: usize = 2;

static SHADFRCE_LAYERS: [LayerDesc; 3] = [
    LayerDesc { tilemap: TilemapDesc::rows(16, 16, 32, 32), gfx: GFX_TILES },
    LayerDesc { tilemap: TilemapDesc::rows(16, 16, 32, 32), gfx: GFX_TILES },
    LayerDesc { tilemap: TilemapDesc::rows(8, 8, 64, 32), gfx: GFX_CHARS },
];

const VIDEO: VideoDesc = VideoDesc {
    width: HTOTAL,
    height: VTOTAL as usize,
    visible: VISIBLE,
    palette_len: 0x2000,
    layers: &SHADFRCE_LAYERS,
};

/// bg0 marks its pixels with priority 1; sprites with attribute bit 6 set
/// hide behind them.
static DRAW_ORDER: DrawPlan = DrawPlan(&[
    DrawStep::ClearPriority,
    DrawStep::layer(LAYER_BG1, DrawFlags::OPAQUE),
    DrawStep::Tilemap { layer: LAYER_BG0, flags: DrawFlags::empty(), priority: 1 },
    DrawStep::Sprites { list: 0 },
    DrawStep::layer(LAYER_FG, DrawFlags::empty()),
]);

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

/// 16x16, five bitplanes each in its own fifth of the ROM.
fn five_plane_layout() -> GfxLayout {
    GfxLayout {
        width: 16,
        height: 16,
        count: ElementCount::Frac { num: 1, den: 5 },
        planes: (0..5).map(|p| PlaneOffset::Frac { num: p, den: 5, bits: 0 }).collect(),
        x_offsets: (0..16).collect(),
        y_offsets: (0..16).map(|y| y * 16).collect(),
        char_increment: 256,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShadfrceRegion {
    /// Big-endian program words.
    MainCpu,
    SoundCpu,
    Chars,
    Sprites,
    Tiles,
}

// ---------------------------------------------------------------------------
// Video memory
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
struct ShadfrceVideoRam {
    fg: Vec<u16>,
    bg0: Vec<u16>,
    bg1: Vec<u16>,
    sprites: SpriteRam<u16>,
}

/// Color codes with the `hole` bit set jump past a gap in palette RAM.
fn skip_hole(color: u32, hole: u32) -> u32 {
    if color & hole != 0 { color ^ (hole | hole << 1) } else { color }
}

impl VideoSource for ShadfrceVideoRam {
    fn tile_info(&self, layer: usize, index: usize) -> TileInfo {
        let word = |vram: &[u16], i: usize| vram.get(i).copied().unwrap_or(0) as u32;
        match layer {
            LAYER_FG => {
                // ---- ----  tttt tttt  ---- ----  pppp TTTT
                let (w0, w1) = (word(&self.fg, index * 2), word(&self.fg, index * 2 + 1));
                let code = (w0 & 0xFF) | ((w1 & 0x0F) << 8);
                TileInfo::new(code, ((w1 & 0xF0) >> 4) << 2)
            }
            LAYER_BG0 => {
                // ---- ----  ff-c cccc  --TT TTTT TTTT TTTT
                let (w0, w1) = (word(&self.bg0, index * 2), word(&self.bg0, index * 2 + 1));
                TileInfo::new(w1 & 0x3FFF, skip_hole(w0 & 0x1F, 0x10)).with_flip_yx((w0 & 0xC0) >> 6)
            }
            _ => {
                let w = word(&self.bg1, index);
                TileInfo::new(w & 0x0FFF, ((w & 0xF000) >> 12) + 64)
            }
        }
    }

    /// Walks the copy taken at the end of the previous frame, last record
    /// first, drawing every sub-tile at four positions so sprites wrap
    /// around the 512x512 sprite space.
    fn draw_sprites(&self, _list: usize, target: &mut Bitmap, clip: &Rect, gfx: &[GfxSet], _flip: bool) {
        let Some(gfx) = gfx.get(GFX_SPRITES) else {
            return;
        };
        for s in self.sprites.buffered().chunks_exact(8).rev() {
            // hhhf Fe-Y | yyyy yyyy | TTTT TTTT | tttt tttt | -pCc cccX | xxxx xxxx
            if s[0] & 0x0004 == 0 {
                continue;
            }
            let ypos = 0x100 - ((((s[0] & 0x0003) << 8) | (s[1] & 0x00FF)) as i32);
            let xpos = ((((s[4] & 0x0001) << 8) | (s[5] & 0x00FF)) as i32) + 1;
            let tile = (((s[2] & 0x00FF) << 8) | (s[3] & 0x00FF)) as u32;
            let height = ((s[0] & 0x00E0) >> 5) as i32 + 1;
            let priority_mask = if s[4] & 0x0040 != 0 { 0x02 } else { 0x00 };
            let color = skip_hole((s[4] & 0x003E) as u32, 0x20);

            for h in 0..height {
                let sy = ypos - (h + 1) * 16;
                for (x, y) in [(xpos, sy), (xpos - 0x200, sy), (xpos, sy + 0x200), (xpos - 0x200, sy + 0x200)] {
                    let blit = Blit {
                        code: tile + h as u32,
                        color,
                        flip_x: s[0] & 0x0010 != 0,
                        flip_y: s[0] & 0x0008 != 0,
                        x,
                        y,
                    };
                    gfx.draw_masked(target, clip, &blit, Some(0), priority_mask);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Board
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
enum ShadfrceEvent {
    SoundCommand(u8),
}

#[derive(Serialize, Deserialize)]
struct ShadfrceSnapshot {
    ram: Vec<u16>,
    video_ram: ShadfrceVideoRam,
    palette: WordPaletteRam,
    sound_ram: Vec<u8>,
    lines: [CpuLines; 2],
    irq: IrqLevels,
    sound_latch: SoundLatch,
    ym: Ym2151Port,
    oki: Okim6295Port,
    oki_bank: u8,
    scheduler: Scheduler<ShadfrceEvent>,
    scroll: [u16; 4],
    irq_control: u8,
    raster_enable: bool,
    raster_line: u16,
}

const SAVE_VERSION: u32 = 1;

/// Shadow Force (Technos, 1993)
///
/// Hardware: 68000 (main), Z80 (sound).
/// Video: 8x8 text, two 16x16 backgrounds, chained 16x16 sprites drawn
/// through the priority plane, xBGR555 palette.
/// Audio: YM2151 and OKI M6295.
///
/// Three interrupt levels, all gated by the IRQ control register: raster
/// compare (1), every 16 lines (2) and vertical blank (3).
pub struct ShadfrceBoard {
    main_rom: Vec<u16>,
    ram: Vec<u16>,
    video_ram: ShadfrceVideoRam,
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

    scheduler: Scheduler<ShadfrceEvent>,

    scroll: [u16; 4], // bg0 x, bg0 y, bg1 x, bg1 y
    irq_control: u8,
    raster_enable: bool,
    raster_line: u16,
    line: u16,

    // I/O (active low)
    p1: u8,
    p2: u8,
    system: u8,
    dsw: [u8; 2],
}

impl Default for ShadfrceBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl ShadfrceBoard {
    pub fn new() -> Self {
        let mut video = VideoState::new(&VIDEO);
        video.layer_mut(LAYER_BG0).set_transparent_pen(0);
        video.layer_mut(LAYER_FG).set_transparent_pen(0);

        Self {
            main_rom: Vec::new(),
            ram: vec![0; 0x8000],
            video_ram: ShadfrceVideoRam {
                fg: vec![0; 0x1000],
                bg0: vec![0; 0x800],
                bg1: vec![0; 0x400],
                sprites: SpriteRam::new(SPRITE_WORDS),
            },
            palette: WordPaletteRam::new(0x2000, WordFormat::Xbgr555),
            sound_rom: Vec::new(),
            sound_ram: vec![0; 0x1800],
            video,
            lines: Default::default(),
            irq: IrqLevels::new(),
            sound_latch: SoundLatch::new(),
            ym: Ym2151Port::new(),
            oki: Okim6295Port::new(),
            oki_bank: 0,
            scheduler: Scheduler::new(),
            scroll: [0; 4],
            irq_control: 0,
            raster_enable: false,
            raster_line: 0,
            line: 0,
            p1: 0xFF,
            p2: 0xFF,
            system: 0xFF,
            dsw: [0xFF; 2],
        }
    }

    pub fn from_config(config: &MachineConfig) -> Self {
        let mut board = Self::new();
        board.dsw = [config.dip.dsw0, config.dip.dsw1];
        board
    }

    pub fn load_region(&mut self, region: ShadfrceRegion, data: &[u8]) {
        match region {
            ShadfrceRegion::MainCpu => self.main_rom = region::words_be(data),
            ShadfrceRegion::SoundCpu => self.sound_rom = data.to_vec(),
            ShadfrceRegion::Chars => self.video.set_gfx(GFX_CHARS, GfxSet::decode(&char_layout(), data, 0, 16)),
            ShadfrceRegion::Sprites => {
                self.video.set_gfx(GFX_SPRITES, GfxSet::decode(&five_plane_layout(), data, 0x800, 32));
            }
            ShadfrceRegion::Tiles => {
                self.video.set_gfx(GFX_TILES, GfxSet::decode(&five_plane_layout(), data, 0x1000, 32));
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

    pub fn raster_line(&self) -> u16 {
        self.raster_line
    }

    pub fn raster_enabled(&self) -> bool {
        self.raster_enable
    }

    pub fn set_ym2151_irq(&mut self, asserted: bool) {
        let state = if asserted { LineState::Assert } else { LineState::Clear };
        self.lines[CPU_SOUND].set_line(InputLine::Irq, state);
    }

    fn irqs_enabled(&self) -> bool {
        self.irq_control & 0x01 != 0
    }

    fn raise(&mut self, level: u8) {
        if self.irqs_enabled() {
            self.irq.set(level, true, &mut self.lines[CPU_MAIN]);
        }
    }

    fn update_to(&mut self, line: u16) {
        for (layer, [x, y]) in [(LAYER_BG0, [self.scroll[0], self.scroll[1]]), (LAYER_BG1, [self.scroll[2], self.scroll[3]])] {
            let map = self.video.layer_mut(layer);
            map.set_scroll(Axis::X, x as i32);
            map.set_scroll(Axis::Y, y as i32);
        }
        self.video.update_partial(&self.video_ram, DRAW_ORDER, line);
    }

    /// ```text
    /// bit 0  interrupts enabled
    /// bit 2  raster interrupt: enabled on a rising edge, disabled on a falling edge
    /// bit 3  video enabled
    /// ```
    fn write_irq_control(&mut self, data: u8) {
        let previous = self.irq_control;
        self.irq_control = data;
        if previous & 0x04 == 0 && data & 0x04 != 0 {
            self.raster_enable = true;
        } else if previous & 0x04 != 0 && data & 0x04 == 0 {
            self.raster_enable = false;
        }
        self.video.set_video_off(data & 0x08 == 0);
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
            0x000000..=0x0FFFFF => mirrored(&self.main_rom, word),
            0x100000..=0x101FFF => self.video_ram.fg[word & 0xFFF],
            0x102000..=0x102FFF => self.video_ram.bg0[word & 0x7FF],
            0x103000..=0x1037FF => self.video_ram.bg1[word & 0x3FF],
            0x140000..=0x141FFF => self.video_ram.sprites.read(word & 0xFFF),
            0x1C0000..=0x1C3FFF => self.palette.read(word & 0x1FFF),
            0x1D0020 => 0xFF00 | self.p1 as u16,
            0x1D0022 => 0xFF00 | self.p2 as u16,
            0x1D0024 => self.system_port(),
            0x1D0026 => u16::from_le_bytes([self.dsw[0], self.dsw[1]]),
            0x1F0000..=0x1FFFFF => self.ram[word & 0x7FFF],
            _ => {
                log::trace!("shadfrce main unmapped read {addr:#08x}");
                0xFFFF
            }
        }
    }

    fn main_write(&mut self, addr: u32, data: u16) {
        let word = (addr >> 1) as usize;
        match addr {
            0x100000..=0x101FFF => {
                self.video_ram.fg[word & 0xFFF] = data;
                self.video.mark_dirty(LAYER_FG, (word & 0xFFF) / 2);
            }
            0x102000..=0x102FFF => {
                self.video_ram.bg0[word & 0x7FF] = data;
                self.video.mark_dirty(LAYER_BG0, (word & 0x7FF) / 2);
            }
            0x103000..=0x1037FF => {
                self.video_ram.bg1[word & 0x3FF] = data;
                self.video.mark_dirty(LAYER_BG1, word & 0x3FF);
            }
            0x140000..=0x141FFF => self.video_ram.sprites.write(word & 0xFFF, data),
            0x1C0000..=0x1C3FFF => self.palette.write(word & 0x1FFF, data, self.video.palette_mut()),
            // Acknowledge IRQ 3, 2, 1.
            0x1D0000 | 0x1D0002 | 0x1D0004 => {
                let level = 3 - ((addr - 0x1D0000) >> 1) as u8;
                self.irq.set(level, false, &mut self.lines[CPU_MAIN]);
            }
            0x1D0006 => self.write_irq_control(data as u8),
            0x1D0008 => self.raster_line = data & 0x1FF,
            0x1D000C => self.scheduler.defer(ShadfrceEvent::SoundCommand(data as u8)),
            0x1D0010..=0x1D0017 => {
                if let Some(last) = self.line.checked_sub(1) {
                    self.update_to(last);
                }
                self.scroll[((addr - 0x1D0010) >> 1) as usize] = data & 0x1FF;
            }
            0x1F0000..=0x1FFFFF => self.ram[word & 0x7FFF] = data,
            _ => log::trace!("shadfrce main unmapped write {addr:#08x} = {data:#06x}"),
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
            0xF000..=0xFFFF => self.sound_ram[0x800 + (addr & 0xFFF) as usize],
            _ => {
                log::trace!("shadfrce sound unmapped read {addr:#06x}");
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
            0xF000..=0xFFFF => self.sound_ram[0x800 + (addr & 0xFFF) as usize] = data,
            _ => log::trace!("shadfrce sound unmapped write {addr:#06x} = {data:#04x}"),
        }
    }

    fn snapshot(&self) -> ShadfrceSnapshot {
        ShadfrceSnapshot {
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
            irq_control: self.irq_control,
            raster_enable: self.raster_enable,
            raster_line: self.raster_line,
        }
    }
}

impl Bus for ShadfrceBoard {
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

impl SaveState for ShadfrceBoard {
    fn save_state(&self) -> Result<Vec<u8>, SaveStateError> {
        save::encode(&SaveHeader::new("shadfrce", SAVE_VERSION), &self.snapshot())
    }

    fn load_state(&mut self, data: &[u8]) -> Result<(), SaveStateError> {
        let s: ShadfrceSnapshot = save::decode(&SaveHeader::new("shadfrce", SAVE_VERSION), data)?;
        self.ram.check_layout(&s.ram, "ram")?;
        self.palette.check_layout(&s.palette, "palette")?;
        self.sound_ram.check_layout(&s.sound_ram, "sound_ram")?;
        self.ym.check_layout(&s.ym, "ym")?;
        self.scheduler.check_layout(&s.scheduler, "scheduler")?;
        self.video_ram.fg.check_layout(&s.video_ram.fg, "fg")?;
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
        self.irq_control = s.irq_control;
        self.raster_enable = s.raster_enable;
        self.raster_line = s.raster_line;

        self.palette.refresh(self.video.palette_mut());
        self.video.set_video_off(self.irq_control & 0x08 == 0);
        self.video.mark_all_dirty();
        Ok(())
    }
}

impl Board for ShadfrceBoard {
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
        if self.raster_enable && line == self.raster_line {
            self.raster_line = (self.raster_line + 1) % RASTER_LINES;
            if self.raster_line > 0 {
                self.update_to(self.raster_line - 1);
            }
            self.raise(IRQ_RASTER);
        }
        if line % 16 == 0 {
            if line > 0 {
                self.update_to(line - 1);
            }
            self.raise(IRQ_TIMER);
        }
        if line == VBLANK_LINE {
            self.update_to(line - 1);
            self.raise(IRQ_VBLANK);
        }
    }

    fn synchronize(&mut self) {
        let pending: Vec<ShadfrceEvent> = self.scheduler.synchronize().collect();
        for event in pending {
            match event {
                ShadfrceEvent::SoundCommand(data) => {
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
        self.update_to(VTOTAL - 1);
        self.video.finish_frame(&self.video_ram, DRAW_ORDER);
        // Sprites are drawn from last frame's copy.
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
            0..=7 => (&mut self.p1, button),
            8..=15 => (&mut self.p2, button - 8),
            16..=19 => (&mut self.system, button - 16),
            _ => return,
        };
        if pressed {
            *port &= !(1 << bit);
        } else {
            *port |= 1 << bit;
        }
    }

    fn input_map(&self) -> &[InputButton] {
        SHADFRCE_INPUT_MAP
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
        self.irq_control = 0;
        self.raster_enable = false;
        self.raster_line = 0;
        self.video.set_video_off(true);
        self.video.mark_all_dirty();
    }

    fn frame_rate_hz(&self) -> f64 {
        PIXEL_CLOCK_HZ / (HTOTAL as f64 * VTOTAL as f64)
    }
}

fn create(config: &MachineConfig) -> Box<dyn Machine> {
    let mut board = ShadfrceBoard::from_config(config);
    board.reset();
    Box::new(Cabinet::from_config(board, config))
}

inventory::submit! { BoardEntry::new("shadfrce", "Shadow Force (Technos, 1993)", create) }
