use serde::{Deserialize, Serialize};

use kinescope_core::core::bus::InterruptState;
use kinescope_core::core::irq::{CpuLines, InputLine, LineRequest, LineState};
use kinescope_core::core::machine::{InputButton, Machine};
use kinescope_core::core::save::{self, Layout, SaveHeader, SaveState, SaveStateError};
use kinescope_core::core::scheduler::Scheduler;
use kinescope_core::core::{Bus, BusMaster};
use kinescope_core::device::{DualAdpcm, GatedSharedRam, McuMailbox, Msm5205Port, Okim6295Port, SoundLatch, Ym2151Port};
use kinescope_core::video::{
    Axis, Bitmap, DrawFlags, DrawPlan, DrawStep, ElementCount, GfxLayout, GfxSet, LayerDesc, PlaneOffset, Rect,
    ScanlineTiming, SplitPaletteRam, SpriteGeometry, SpriteRecord, TileInfo, TilemapDesc, VideoDesc, VideoSource,
    VideoState, draw_sprite,
};

use crate::cabinet::{Board, Cabinet};
use crate::config::MachineConfig;
use crate::region;
use crate::registry::BoardEntry;

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------
// Master clock: 12 MHz, pixel clock 6 MHz
// HTOTAL:       384 pixels (256 visible), 768 master ticks per line
// VTOTAL:       272 lines (240 visible), 57.44 Hz
// Main CPU:     HD6309 @ 12 MHz / 4 = 3 MHz     -> 192 cycles per line
// Sub CPU:      HD63701 @ 6 MHz / 4 = 1.5 MHz  -> 96 cycles per line
//               (Double Dragon II: Z80 @ 4 MHz -> 256)
// Sound CPU:    M6809 @ 1.5 MHz                -> 96 cycles per line
//               (Double Dragon II: Z80 @ 3.579545 MHz -> 229)
// ADPCM:        MSM5205 @ 375 kHz, S48 -> 7812.5 Hz = every 1536 ticks

const MASTER_CLOCK_HZ: u64 = 12_000_000;
const TICKS_PER_LINE: u64 = 768;
const HTOTAL: usize = 384;
const ADPCM_PERIOD: u64 = 1536;

const TIMING: ScanlineTiming = ScanlineTiming::TECHNOS;
const VISIBLE: Rect = Rect::new(0, 255, 0, 239);

const CPU_MAIN: usize = 0;
const CPU_SUB: usize = 1;
const CPU_SOUND: usize = 2;

/// Main CPU comram offset the end-of-game jump table reads its index from.
const COMRAM_JUMP_INDEX: usize = 0x49;

// ---------------------------------------------------------------------------
// Input button IDs
// ---------------------------------------------------------------------------
// 0-7:   P1 port bits, 8-15: P2 port bits, 16-18: EXTRA port bits 0-2.
pub const INPUT_P1_RIGHT: u8 = 0;
pub const INPUT_P1_LEFT: u8 = 1;
pub const INPUT_P1_UP: u8 = 2;
pub const INPUT_P1_DOWN: u8 = 3;
pub const INPUT_P1_BUTTON1: u8 = 4;
pub const INPUT_P1_BUTTON2: u8 = 5;
pub const INPUT_P1_START: u8 = 6;
pub const INPUT_P2_START: u8 = 7;
pub const INPUT_P2_RIGHT: u8 = 8;
pub const INPUT_P2_LEFT: u8 = 9;
pub const INPUT_P2_UP: u8 = 10;
pub const INPUT_P2_DOWN: u8 = 11;
pub const INPUT_P2_BUTTON1: u8 = 12;
pub const INPUT_P2_BUTTON2: u8 = 13;
pub const INPUT_COIN1: u8 = 14;
pub const INPUT_COIN2: u8 = 15;
pub const INPUT_SERVICE: u8 = 16;
pub const INPUT_P1_BUTTON3: u8 = 17;
pub const INPUT_P2_BUTTON3: u8 = 18;

const DDRAGON_INPUT_MAP: &[InputButton] = &[
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
// Board descriptors
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubCpu {
    /// HD63701 with internal registers at 0x0000 and port 6 handshake.
    Hd63701,
    /// Z80 with memory-mapped IRQ acknowledge/raise registers.
    Z80,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SoundHw {
    /// M6809 with YM2151 and two MSM5205s.
    DualAdpcm,
    /// Z80 with YM2151 and an OKI M6295.
    Oki,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpriteFormat {
    /// 12-bit code, 3-bit color.
    Ddragon,
    /// 13-bit code, color in the top 3 bits.
    Ddragon2,
}

#[derive(Clone, Copy, Debug)]
pub struct DdDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub main_ram_end: u16,
    pub palette_base: u16,
    pub sub_cpu: SubCpu,
    pub sound: SoundHw,
    pub sprite_format: SpriteFormat,
    /// Sound command interrupt: line and how it is driven.
    pub sound_irq: (InputLine, LineState),
    /// YM2151 IRQ line on the sound CPU.
    pub ym_irq: InputLine,
    /// Sprite CPU interrupt raised from the main CPU.
    pub sprite_irq: InputLine,
    /// Bank register bit 2 drives screen flip.
    pub flip_in_bank_register: bool,
    /// ROM bank 4 is replaced by the MCU mailbox.
    pub mcu_bank: bool,
}

pub const DDRAGON: DdDescriptor = DdDescriptor {
    name: "ddragon",
    description: "Double Dragon (Technos, 1987)",
    main_ram_end: 0x0FFF,
    palette_base: 0x1000,
    sub_cpu: SubCpu::Hd63701,
    sound: SoundHw::DualAdpcm,
    sprite_format: SpriteFormat::Ddragon,
    sound_irq: (InputLine::Irq, LineState::Hold),
    ym_irq: InputLine::Firq,
    sprite_irq: InputLine::Nmi,
    flip_in_bank_register: true,
    mcu_bank: false,
};

pub const DDRAGON2: DdDescriptor = DdDescriptor {
    name: "ddragon2",
    description: "Double Dragon II - The Revenge (Technos, 1988)",
    main_ram_end: 0x17FF,
    palette_base: 0x3C00,
    sub_cpu: SubCpu::Z80,
    sound: SoundHw::Oki,
    sprite_format: SpriteFormat::Ddragon2,
    sound_irq: (InputLine::Nmi, LineState::Pulse),
    ym_irq: InputLine::Irq,
    sprite_irq: InputLine::Nmi,
    flip_in_bank_register: true,
    mcu_bank: false,
};

pub const DARKTOWR: DdDescriptor = DdDescriptor {
    name: "darktowr",
    description: "Dark Tower (Game Room, 1992)",
    flip_in_bank_register: false,
    mcu_bank: true,
    ..DDRAGON
};

const LAYER_BG: usize = 0;
const LAYER_FG: usize = 1;

const GFX_CHARS: usize = 0;
const GFX_SPRITES: usize = 1;
const GFX_TILES: usize = 2;

/// 32x32 background in four 16x16 quadrants.
fn background_scan(col: usize, row: usize) -> usize {
    (col & 0x0F) + ((row & 0x0F) << 4) + ((col & 0x10) << 4) + ((row & 0x10) << 5)
}

static DD_LAYERS: [LayerDesc; 2] = [
    LayerDesc {
        tilemap: TilemapDesc::rows(16, 16, 32, 32).with_scan(background_scan),
        gfx: GFX_TILES,
    },
    LayerDesc { tilemap: TilemapDesc::rows(8, 8, 32, 32), gfx: GFX_CHARS },
];

const VIDEO: VideoDesc = VideoDesc {
    width: HTOTAL,
    height: 272,
    visible: VISIBLE,
    palette_len: 384,
    layers: &DD_LAYERS,
};

static DRAW_ORDER: DrawPlan = DrawPlan(&[
    DrawStep::layer(LAYER_BG, DrawFlags::OPAQUE),
    DrawStep::Sprites { list: 0 },
    DrawStep::layer(LAYER_FG, DrawFlags::empty()),
]);

fn char_layout() -> GfxLayout {
    GfxLayout {
        width: 8,
        height: 8,
        count: ElementCount::Frac { num: 1, den: 1 },
        planes: (0..4).map(|p| PlaneOffset::Bits(p * 2)).collect(),
        x_offsets: vec![1, 0, 65, 64, 129, 128, 193, 192],
        y_offsets: (0..8).map(|y| y * 8).collect(),
        char_increment: 256,
    }
}

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
        x_offsets: [0u32, 128, 256, 384]
            .into_iter()
            .flat_map(|base| [3, 2, 1, 0].map(|bit| base + bit))
            .collect(),
        y_offsets: (0..16).map(|y| y * 8).collect(),
        char_increment: 512,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DdRegion {
    /// 0x0000-0xFFFF image plus banks from 0x10000.
    MainCpu,
    /// 64K image of the sub CPU's address space.
    SubCpu,
    /// 64K image of the sound CPU's address space.
    SoundCpu,
    Chars,
    Sprites,
    Tiles,
    /// Two 64K halves, one per MSM5205.
    Adpcm,
}

// ---------------------------------------------------------------------------
// Video memory
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
struct DdVideoRam {
    bg: Vec<u8>,
    fg: Vec<u8>,
    sprites: Vec<u8>,
    #[serde(skip, default = "default_sprite_format")]
    sprite_format: SpriteFormat,
}

fn default_sprite_format() -> SpriteFormat {
    SpriteFormat::Ddragon
}

impl VideoSource for DdVideoRam {
    fn tile_info(&self, layer: usize, index: usize) -> TileInfo {
        let vram = if layer == LAYER_BG { &self.bg } else { &self.fg };
        let attr = vram.get(index * 2).copied().unwrap_or(0) as u32;
        let code = vram.get(index * 2 + 1).copied().unwrap_or(0) as u32 + ((attr & 0x07) << 8);
        if layer == LAYER_BG {
            TileInfo::new(code, (attr >> 3) & 0x07).with_flip_yx((attr & 0xC0) >> 6)
        } else {
            TileInfo::new(code, attr >> 5)
        }
    }

    fn draw_sprites(&self, _list: usize, target: &mut Bitmap, clip: &Rect, gfx: &[GfxSet], flip: bool) {
        let Some(gfx) = gfx.get(GFX_SPRITES) else {
            return;
        };
        for s in self.sprites.chunks_exact(5).take(64) {
            let attr = s[1] as i32;
            if attr & 0x80 == 0 {
                continue;
            }
            let mut sx = 240 - s[4] as i32 + ((attr & 2) << 7);
            let mut sy = 232 - s[0] as i32 + ((attr & 1) << 8);
            let size = ((attr & 0x30) >> 4) as u32;
            let (color, which) = match self.sprite_format {
                SpriteFormat::Ddragon2 => ((s[2] >> 5) as u32, s[3] as u32 + (((s[2] & 0x1F) as u32) << 8)),
                SpriteFormat::Ddragon => (((s[2] >> 4) & 0x07) as u32, s[3] as u32 + (((s[2] & 0x0F) as u32) << 8)),
            };
            let which = which & !size;
            let (w, h) = (1 + (size >> 1), 1 + (size & 1));

            // Sub-tiles run column-major from the sprite's anchor tile: up and
            // left of it normally, down and right of it on a flipped screen.
            let mut sprite = SpriteRecord {
                x: sx,
                y: sy,
                code: which,
                color,
                flip_x: attr & 0x08 != 0,
                flip_y: attr & 0x04 != 0,
                width: w,
                height: h,
                priority_mask: None,
            };
            let geometry = if flip {
                sx = 240 - sx;
                sy = 256 - sy;
                sprite.x = sx;
                sprite.y = sy;
                sprite.flip_x = !sprite.flip_x;
                sprite.flip_y = !sprite.flip_y;
                sprite.code = which + 2 * (w - 1) + (h - 1);
                SpriteGeometry { col_step: -2, row_step: -1, mirror: false }
            } else {
                sprite.x = sx - 16 * (w as i32 - 1);
                sprite.y = sy - 16 * (h as i32 - 1);
                SpriteGeometry { col_step: 2, row_step: 1, mirror: false }
            };
            draw_sprite(target, clip, gfx, &sprite, geometry, Some(0));
        }
    }
}

// ---------------------------------------------------------------------------
// Board
// ---------------------------------------------------------------------------

/// Work crossing from one CPU to another, applied at the next
/// synchronization point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
enum DdEvent {
    SoundCommand(u8),
    SubIrq,
    MainIrq,
    AdpcmTick(usize),
}

#[derive(Serialize, Deserialize)]
struct DdSnapshot {
    ram: Vec<u8>,
    video_ram: DdVideoRam,
    palette: SplitPaletteRam,
    comram: GatedSharedRam,
    sub_ram: Vec<u8>,
    sound_ram: Vec<u8>,
    lines: [CpuLines; 3],
    sound_latch: SoundLatch,
    adpcm: DualAdpcm,
    decoders: [Msm5205Port; 2],
    ym: Ym2151Port,
    oki: Okim6295Port,
    mcu: McuMailbox,
    scheduler: Scheduler<DdEvent>,
    scroll: [u16; 2],
    bank_register: u8,
    sub_port: u8,
}

const SAVE_VERSION: u32 = 1;

/// Double Dragon family (Technos, 1987-1992)
///
/// Hardware: HD6309 (main), HD63701 or Z80 (sprite/sub), M6809 or Z80 (sound).
/// Video: 16x16 background, 8x8 text layer, 5-byte sprites, split palette.
/// Audio: YM2151 with two MSM5205 ADPCM channels or an OKI M6295.
///
/// The main CPU only reaches the sub CPU's RAM while the sub CPU is held in
/// reset or halt; the bank register drives both.
pub struct DdBoard {
    desc: DdDescriptor,

    // Main CPU memory
    main_rom: Vec<u8>,
    ram: Vec<u8>,
    video_ram: DdVideoRam,
    palette: SplitPaletteRam,
    comram: GatedSharedRam,

    // Sub / sound CPU memory
    sub_rom: Vec<u8>,
    sub_ram: Vec<u8>,
    sound_rom: Vec<u8>,
    sound_ram: Vec<u8>,
    adpcm_rom: Vec<u8>,

    video: VideoState,
    lines: [CpuLines; 3],

    // Sound
    sound_latch: SoundLatch,
    adpcm: DualAdpcm,
    decoders: [Msm5205Port; 2],
    ym: Ym2151Port,
    oki: Okim6295Port,
    mcu: McuMailbox,

    scheduler: Scheduler<DdEvent>,
    fired: Vec<DdEvent>,

    // Registers
    scroll: [u16; 2], // x, y (9 bits each)
    bank_register: u8,
    sub_port: u8,
    line: u16,

    // I/O (active low)
    p1: u8,
    p2: u8,
    extra: u8,
    dsw: [u8; 2],
}

impl DdBoard {
    pub fn new(desc: DdDescriptor) -> Self {
        let mut video = VideoState::new(&VIDEO);
        for layer in [LAYER_BG, LAYER_FG] {
            let map = video.layer_mut(layer);
            map.set_scroll_delta(Axis::X, 0, 384 - 256);
            map.set_scroll_delta(Axis::Y, -8, -8);
        }
        video.layer_mut(LAYER_FG).set_transparent_pen(0);

        let mut scheduler = Scheduler::new();
        if desc.sound == SoundHw::DualAdpcm {
            scheduler.add_periodic(ADPCM_PERIOD, DdEvent::AdpcmTick(0));
            scheduler.add_periodic(ADPCM_PERIOD, DdEvent::AdpcmTick(1));
        }

        let sound_ram_len = match desc.sound {
            SoundHw::DualAdpcm => 0x1000,
            SoundHw::Oki => 0x800,
        };

        Self {
            desc,
            main_rom: Vec::new(),
            ram: vec![0; desc.main_ram_end as usize + 1],
            video_ram: DdVideoRam {
                bg: vec![0; 0x800],
                fg: vec![0; 0x800],
                sprites: vec![0; 0x800],
                sprite_format: desc.sprite_format,
            },
            palette: SplitPaletteRam::new(0x200),
            comram: GatedSharedRam::new(0x1000),
            sub_rom: Vec::new(),
            sub_ram: vec![0; 0x1000],
            sound_rom: Vec::new(),
            sound_ram: vec![0; sound_ram_len],
            adpcm_rom: Vec::new(),
            video,
            lines: Default::default(),
            sound_latch: SoundLatch::new(),
            adpcm: DualAdpcm::new(),
            decoders: Default::default(),
            ym: Ym2151Port::new(),
            oki: Okim6295Port::new(),
            mcu: McuMailbox::new(),
            scheduler,
            fired: Vec::new(),
            scroll: [0; 2],
            bank_register: 0,
            sub_port: 0,
            line: 0,
            p1: 0xFF,
            p2: 0xFF,
            extra: 0xFF,
            dsw: [0xFF; 2],
        }
    }

    pub fn from_config(desc: DdDescriptor, config: &MachineConfig) -> Self {
        let mut board = Self::new(desc);
        board.dsw = [config.dip.dsw0, config.dip.dsw1];
        board.reset_registers();
        board
    }

    pub fn descriptor(&self) -> &DdDescriptor {
        &self.desc
    }

    pub fn load_region(&mut self, region: DdRegion, data: &[u8]) {
        match region {
            DdRegion::MainCpu => self.main_rom = data.to_vec(),
            DdRegion::SubCpu => self.sub_rom = data.to_vec(),
            DdRegion::SoundCpu => self.sound_rom = data.to_vec(),
            DdRegion::Chars => self.video.set_gfx(GFX_CHARS, GfxSet::decode(&char_layout(), data, 0, 16)),
            DdRegion::Sprites => self.video.set_gfx(GFX_SPRITES, GfxSet::decode(&tile_layout(), data, 128, 16)),
            DdRegion::Tiles => self.video.set_gfx(GFX_TILES, GfxSet::decode(&tile_layout(), data, 256, 16)),
            DdRegion::Adpcm => {
                self.adpcm_rom = vec![0; 2 * kinescope_core::device::adpcm::DUAL_ADPCM_BANK];
                region::copy_into("adpcm", &mut self.adpcm_rom, 0, data);
            }
        }
    }

    pub fn lines(&self, cpu: usize) -> &CpuLines {
        &self.lines[cpu]
    }

    pub fn video(&self) -> &VideoState {
        &self.video
    }

    pub fn adpcm(&self) -> &DualAdpcm {
        &self.adpcm
    }

    pub fn decoders_mut(&mut self) -> &mut [Msm5205Port; 2] {
        &mut self.decoders
    }

    pub fn ym2151_mut(&mut self) -> &mut Ym2151Port {
        &mut self.ym
    }

    pub fn oki_mut(&mut self) -> &mut Okim6295Port {
        &mut self.oki
    }

    /// MCU side of the Dark Tower protection mailbox.
    pub fn mcu_mut(&mut self) -> &mut McuMailbox {
        &mut self.mcu
    }

    pub fn sound_latch(&self) -> &SoundLatch {
        &self.sound_latch
    }

    pub fn comram(&self) -> &GatedSharedRam {
        &self.comram
    }

    pub fn rom_bank(&self) -> usize {
        ((self.bank_register & 0xE0) >> 5) as usize
    }

    /// YM2151 IRQ output, driven by the host's chip model.
    pub fn set_ym2151_irq(&mut self, asserted: bool) {
        let state = if asserted { LineState::Assert } else { LineState::Clear };
        self.lines[CPU_SOUND].set_line(self.desc.ym_irq, state);
    }

    fn reset_registers(&mut self) {
        self.scroll = [0; 2];
        self.sub_port = 0;
        // Power-on: sub CPU held in reset until the main CPU releases it.
        self.write_bank_register(0x00);
    }

    fn extra_port(&self) -> u8 {
        let mut value = (self.extra | 0xE0) & !0x18;
        if TIMING.in_vblank(self.line) {
            value |= 0x08;
        }
        // Bus available: sub CPU suspended.
        if !self.lines[CPU_SUB].is_suspended() {
            value |= 0x10;
        }
        value
    }

    fn apply_scroll(&mut self) {
        let [x, y] = self.scroll;
        let bg = self.video.layer_mut(LAYER_BG);
        bg.set_scroll(Axis::X, x as i32);
        bg.set_scroll(Axis::Y, y as i32);
    }

    fn update_to(&mut self, line: u16) {
        self.apply_scroll();
        self.video.update_partial(&self.video_ram, DRAW_ORDER, line);
    }

    // -----------------------------------------------------------------------
    // Main CPU registers
    // -----------------------------------------------------------------------

    /// ```text
    /// 7 6 5 4 3 2 1 0
    /// . . . . . . . x  X scroll bit 8
    /// . . . . . . x .  Y scroll bit 8
    /// . . . . . x . .  screen flip (active low)
    /// . . . . x . . .  sub CPU RESET (active low)
    /// . . . x . . . .  sub CPU HALT
    /// x x x . . . . .  ROM bank
    /// ```
    fn write_bank_register(&mut self, data: u8) {
        self.bank_register = data;
        self.scroll[0] = (self.scroll[0] & 0xFF) | ((data as u16 & 0x01) << 8);
        self.scroll[1] = (self.scroll[1] & 0xFF) | ((data as u16 & 0x02) << 7);
        if self.desc.flip_in_bank_register {
            self.video.set_flip(data & 0x04 == 0);
        }
        self.lines[CPU_SUB].set_reset(data & 0x08 == 0);
        self.lines[CPU_SUB].set_halt(data & 0x10 != 0);
    }

    fn interrupt_ack(&mut self, offset: u16, data: u8) {
        match offset {
            0 => self.lines[CPU_MAIN].set_line(InputLine::Nmi, LineState::Clear),
            1 => self.lines[CPU_MAIN].set_line(InputLine::Firq, LineState::Clear),
            2 => self.lines[CPU_MAIN].set_line(InputLine::Irq, LineState::Clear),
            3 => self.scheduler.defer(DdEvent::SoundCommand(data)),
            _ => self.scheduler.defer(DdEvent::SubIrq),
        }
    }

    fn mcu_bank_read(&mut self, offset: u16) -> u8 {
        if offset == 0x1401 || offset == 0x01 {
            return self.mcu.main_read();
        }
        log::trace!("unmapped MCU bank read {offset:#06x}");
        0xFF
    }

    fn mcu_bank_write(&mut self, offset: u16, data: u8) {
        if offset == 0x1400 || offset == 0x00 {
            self.mcu.main_write(data.reverse_bits());
        } else {
            log::trace!("unmapped MCU bank write {offset:#06x} = {data:#04x}");
        }
    }

    fn main_read(&mut self, addr: u16) -> u8 {
        let pal = self.desc.palette_base;
        match addr {
            a if a <= self.desc.main_ram_end => self.ram[a as usize],
            a if (pal..pal + 0x200).contains(&a) => self.palette.read_lo((a - pal) as usize),
            a if (pal + 0x200..pal + 0x400).contains(&a) => self.palette.read_hi((a - pal - 0x200) as usize),
            0x1800..=0x1FFF => self.video_ram.fg[(addr & 0x7FF) as usize],
            0x2000..=0x27FF => {
                let offset = (addr & 0x1FF) as usize;
                let value = self.comram.read(offset, self.lines[CPU_SUB].suspend_state());
                if offset == COMRAM_JUMP_INDEX && value == 0x1F {
                    return 0x01;
                }
                value
            }
            0x2800..=0x2FFF => self.video_ram.sprites[(addr & 0x7FF) as usize],
            0x3000..=0x37FF => self.video_ram.bg[(addr & 0x7FF) as usize],
            0x3800 => self.p1,
            0x3801 => self.p2,
            0x3802 => self.extra_port(),
            0x3803 => self.dsw[0],
            0x3804 => self.dsw[1],
            0x380B..=0x380F => {
                self.interrupt_ack(addr - 0x380B, 0xFF);
                0xFF
            }
            0x4000..=0x7FFF if self.desc.mcu_bank && self.rom_bank() == 4 => self.mcu_bank_read(addr - 0x4000),
            0x4000..=0x7FFF => {
                let offset = 0x10000 + self.rom_bank() * 0x4000 + (addr - 0x4000) as usize;
                self.main_rom.get(offset).copied().unwrap_or(0xFF)
            }
            0x8000..=0xFFFF => self.main_rom.get(addr as usize).copied().unwrap_or(0xFF),
            _ => {
                log::trace!("ddragon main unmapped read {addr:#06x}");
                0xFF
            }
        }
    }

    fn main_write(&mut self, addr: u16, data: u8) {
        let pal = self.desc.palette_base;
        match addr {
            a if a <= self.desc.main_ram_end => self.ram[a as usize] = data,
            a if (pal..pal + 0x200).contains(&a) => {
                self.palette.write_lo((a - pal) as usize, data, self.video.palette_mut());
            }
            a if (pal + 0x200..pal + 0x400).contains(&a) => {
                self.palette.write_hi((a - pal - 0x200) as usize, data, self.video.palette_mut());
            }
            0x1800..=0x1FFF => {
                let offset = (addr & 0x7FF) as usize;
                self.video_ram.fg[offset] = data;
                self.video.mark_dirty(LAYER_FG, offset / 2);
            }
            0x2000..=0x27FF => {
                self.comram.write((addr & 0x1FF) as usize, data, self.lines[CPU_SUB].suspend_state());
            }
            0x2800..=0x2FFF => self.video_ram.sprites[(addr & 0x7FF) as usize] = data,
            0x3000..=0x37FF => {
                let offset = (addr & 0x7FF) as usize;
                self.video_ram.bg[offset] = data;
                self.video.mark_dirty(LAYER_BG, offset / 2);
            }
            0x3808 => self.write_bank_register(data),
            0x3809 => self.scroll[0] = (self.scroll[0] & 0x100) | data as u16,
            0x380A => self.scroll[1] = (self.scroll[1] & 0x100) | data as u16,
            0x380B..=0x380F => self.interrupt_ack(addr - 0x380B, data),
            0x4000..=0x7FFF if self.desc.mcu_bank && self.rom_bank() == 4 => self.mcu_bank_write(addr - 0x4000, data),
            _ => log::trace!("ddragon main unmapped write {addr:#06x} = {data:#04x}"),
        }
    }

    // -----------------------------------------------------------------------
    // Sub CPU
    // -----------------------------------------------------------------------

    /// HD63701 port 6: bit 0 acknowledges the sprite IRQ, a rising edge on
    /// bit 1 interrupts the main CPU.
    fn write_sub_port(&mut self, data: u8) {
        if data & 0x01 != 0 {
            self.lines[CPU_SUB].set_line(self.desc.sprite_irq, LineState::Clear);
        }
        if self.sub_port & 0x02 == 0 && data & 0x02 != 0 {
            self.scheduler.defer(DdEvent::MainIrq);
        }
        self.sub_port = data;
    }

    fn sub_read(&mut self, addr: u16) -> u8 {
        match (self.desc.sub_cpu, addr) {
            (SubCpu::Hd63701, 0x0000..=0x001F) => {
                log::trace!("HD63701 internal register read {addr:#04x}");
                0
            }
            (SubCpu::Hd63701, 0x0020..=0x0FFF) => self.sub_ram[addr as usize],
            (SubCpu::Hd63701, 0x8000..=0x8FFF) => self.comram.read_local((addr & 0x0FFF) as usize),
            (SubCpu::Hd63701, 0xC000..=0xFFFF) => self.sub_rom.get(addr as usize).copied().unwrap_or(0xFF),
            (SubCpu::Z80, 0x0000..=0xBFFF) => self.sub_rom.get(addr as usize).copied().unwrap_or(0xFF),
            (SubCpu::Z80, 0xC000..=0xC3FF) => self.comram.read_local((addr & 0x03FF) as usize),
            _ => {
                log::trace!("ddragon sub unmapped read {addr:#06x}");
                0xFF
            }
        }
    }

    fn sub_write(&mut self, addr: u16, data: u8) {
        match (self.desc.sub_cpu, addr) {
            (SubCpu::Hd63701, 0x0017) => self.write_sub_port(data),
            (SubCpu::Hd63701, 0x0000..=0x001F) => {}
            (SubCpu::Hd63701, 0x0020..=0x0FFF) => self.sub_ram[addr as usize] = data,
            (SubCpu::Hd63701, 0x8000..=0x8FFF) => self.comram.write_local((addr & 0x0FFF) as usize, data),
            (SubCpu::Z80, 0xC000..=0xC3FF) => self.comram.write_local((addr & 0x03FF) as usize, data),
            (SubCpu::Z80, 0xD000) => self.lines[CPU_SUB].set_line(self.desc.sprite_irq, LineState::Clear),
            (SubCpu::Z80, 0xE000) => self.scheduler.defer(DdEvent::MainIrq),
            _ => log::trace!("ddragon sub unmapped write {addr:#06x} = {data:#04x}"),
        }
    }

    // -----------------------------------------------------------------------
    // Sound CPU
    // -----------------------------------------------------------------------

    fn read_sound_latch(&mut self) -> u8 {
        let (line, state) = self.desc.sound_irq;
        let mut irq = LineRequest::new(&mut self.lines[CPU_SOUND], line, state);
        self.sound_latch.read_and_acknowledge(&mut irq)
    }

    fn sound_read(&mut self, addr: u16) -> u8 {
        match (self.desc.sound, addr) {
            (SoundHw::DualAdpcm, 0x0000..=0x0FFF) => self.sound_ram[addr as usize],
            (SoundHw::DualAdpcm, 0x1000) => self.read_sound_latch(),
            (SoundHw::DualAdpcm, 0x1800) => self.adpcm.status(),
            (SoundHw::DualAdpcm, 0x2800..=0x2801) => self.ym.read((addr & 1) as u8),
            (SoundHw::DualAdpcm, 0x8000..=0xFFFF) => self.sound_rom.get(addr as usize).copied().unwrap_or(0xFF),
            (SoundHw::Oki, 0x0000..=0x7FFF) => self.sound_rom.get(addr as usize).copied().unwrap_or(0xFF),
            (SoundHw::Oki, 0x8000..=0x87FF) => self.sound_ram[(addr & 0x7FF) as usize],
            (SoundHw::Oki, 0x8800..=0x8801) => self.ym.read((addr & 1) as u8),
            (SoundHw::Oki, 0x9800) => self.oki.read(),
            (SoundHw::Oki, 0xA000) => self.read_sound_latch(),
            _ => {
                log::trace!("ddragon sound unmapped read {addr:#06x}");
                0xFF
            }
        }
    }

    fn sound_write(&mut self, addr: u16, data: u8) {
        match (self.desc.sound, addr) {
            (SoundHw::DualAdpcm, 0x0000..=0x0FFF) => self.sound_ram[addr as usize] = data,
            (SoundHw::DualAdpcm, 0x2800..=0x2801) => self.ym.write((addr & 1) as u8, data),
            (SoundHw::DualAdpcm, 0x3800..=0x3807) => self.adpcm.write((addr & 7) as u8, data, &mut self.decoders),
            (SoundHw::Oki, 0x8000..=0x87FF) => self.sound_ram[(addr & 0x7FF) as usize] = data,
            (SoundHw::Oki, 0x8800..=0x8801) => self.ym.write((addr & 1) as u8, data),
            (SoundHw::Oki, 0x9800) => self.oki.write(data),
            _ => log::trace!("ddragon sound unmapped write {addr:#06x} = {data:#04x}"),
        }
    }

    fn apply(&mut self, event: DdEvent) {
        match event {
            DdEvent::SoundCommand(data) => {
                let (line, state) = self.desc.sound_irq;
                let mut irq = LineRequest::new(&mut self.lines[CPU_SOUND], line, state);
                self.sound_latch.write(data, &mut irq);
            }
            DdEvent::SubIrq => self.lines[CPU_SUB].set_line(self.desc.sprite_irq, LineState::Assert),
            DdEvent::MainIrq => self.lines[CPU_MAIN].set_line(InputLine::Irq, LineState::Assert),
            DdEvent::AdpcmTick(chip) => self.adpcm.tick(chip, &self.adpcm_rom, &mut self.decoders),
        }
    }

    fn snapshot(&self) -> DdSnapshot {
        DdSnapshot {
            ram: self.ram.clone(),
            video_ram: self.video_ram.clone(),
            palette: self.palette.clone(),
            comram: self.comram.clone(),
            sub_ram: self.sub_ram.clone(),
            sound_ram: self.sound_ram.clone(),
            lines: self.lines.clone(),
            sound_latch: self.sound_latch.clone(),
            adpcm: self.adpcm.clone(),
            decoders: self.decoders.clone(),
            ym: self.ym.clone(),
            oki: self.oki.clone(),
            mcu: self.mcu.clone(),
            scheduler: self.scheduler.clone(),
            scroll: self.scroll,
            bank_register: self.bank_register,
            sub_port: self.sub_port,
        }
    }
}

impl Bus for DdBoard {
    type Address = u16;
    type Data = u8;

    fn read(&mut self, master: BusMaster, addr: u16) -> u8 {
        match master {
            BusMaster::Cpu(CPU_MAIN) => self.main_read(addr),
            BusMaster::Cpu(CPU_SUB) => self.sub_read(addr),
            BusMaster::Cpu(CPU_SOUND) => self.sound_read(addr),
            _ => 0xFF,
        }
    }

    fn write(&mut self, master: BusMaster, addr: u16, data: u8) {
        match master {
            BusMaster::Cpu(CPU_MAIN) => self.main_write(addr, data),
            BusMaster::Cpu(CPU_SUB) => self.sub_write(addr, data),
            BusMaster::Cpu(CPU_SOUND) => self.sound_write(addr, data),
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

impl SaveState for DdBoard {
    fn save_state(&self) -> Result<Vec<u8>, SaveStateError> {
        save::encode(&SaveHeader::new(self.desc.name, SAVE_VERSION), &self.snapshot())
    }

    fn load_state(&mut self, data: &[u8]) -> Result<(), SaveStateError> {
        let s: DdSnapshot = save::decode(&SaveHeader::new(self.desc.name, SAVE_VERSION), data)?;
        self.ram.check_layout(&s.ram, "ram")?;
        self.palette.check_layout(&s.palette, "palette")?;
        self.comram.check_layout(&s.comram, "comram")?;
        self.sub_ram.check_layout(&s.sub_ram, "sub_ram")?;
        self.sound_ram.check_layout(&s.sound_ram, "sound_ram")?;
        self.ym.check_layout(&s.ym, "ym")?;
        self.scheduler.check_layout(&s.scheduler, "scheduler")?;
        self.video_ram.bg.check_layout(&s.video_ram.bg, "bg")?;
        self.video_ram.fg.check_layout(&s.video_ram.fg, "fg")?;
        self.video_ram.sprites.check_layout(&s.video_ram.sprites, "sprites")?;

        self.ram = s.ram;
        self.video_ram = DdVideoRam {
            sprite_format: self.desc.sprite_format,
            ..s.video_ram
        };
        self.palette = s.palette;
        self.comram = s.comram;
        self.sub_ram = s.sub_ram;
        self.sound_ram = s.sound_ram;
        self.lines = s.lines;
        self.sound_latch = s.sound_latch;
        self.adpcm = s.adpcm;
        self.decoders = s.decoders;
        self.ym = s.ym;
        self.oki = s.oki;
        self.mcu = s.mcu;
        self.scheduler = s.scheduler;
        self.scroll = s.scroll;
        self.bank_register = s.bank_register;
        self.sub_port = s.sub_port;

        self.palette.refresh(self.video.palette_mut());
        if self.desc.flip_in_bank_register {
            self.video.set_flip(self.bank_register & 0x04 == 0);
        }
        self.video.mark_all_dirty();
        Ok(())
    }
}

impl Board for DdBoard {
    fn cpu_count(&self) -> usize {
        3
    }

    fn cycles_per_line(&self, cpu: usize) -> u64 {
        match (cpu, self.desc.sub_cpu, self.desc.sound) {
            (CPU_MAIN, _, _) => 192,
            (CPU_SUB, SubCpu::Hd63701, _) => 96,
            (CPU_SUB, SubCpu::Z80, _) => 256,
            (_, _, SoundHw::DualAdpcm) => 96,
            (_, _, SoundHw::Oki) => 229,
        }
    }

    fn ticks_per_line(&self) -> u64 {
        TICKS_PER_LINE
    }

    fn total_lines(&self) -> u16 {
        TIMING.total_lines
    }

    fn begin_scanline(&mut self, line: u16) {
        self.line = line;
        let events = TIMING.events(line);
        if let Some(last) = events.partial_update {
            self.update_to(last);
        }
        if events.vblank {
            self.lines[CPU_MAIN].set_line(InputLine::Nmi, LineState::Assert);
        }
        if events.timer {
            self.lines[CPU_MAIN].set_line(InputLine::Firq, LineState::Assert);
        }
    }

    fn synchronize(&mut self) {
        let pending: Vec<DdEvent> = self.scheduler.synchronize().collect();
        for event in pending {
            self.apply(event);
        }
    }

    fn advance_time(&mut self, ticks: u64) {
        self.scheduler.advance(ticks, &mut self.fired);
        let fired = std::mem::take(&mut self.fired);
        for &event in &fired {
            self.apply(event);
        }
        self.fired = fired;
        self.fired.clear();
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
        let (port, bit) = match button {
            0..=7 => (&mut self.p1, button),
            8..=15 => (&mut self.p2, button - 8),
            16..=18 => (&mut self.extra, button - 16),
            _ => return,
        };
        if pressed {
            *port &= !(1 << bit);
        } else {
            *port |= 1 << bit;
        }
    }

    fn input_map(&self) -> &[InputButton] {
        DDRAGON_INPUT_MAP
    }

    fn reset(&mut self) {
        self.lines = Default::default();
        self.sound_latch.reset();
        self.adpcm.reset();
        self.decoders = Default::default();
        self.ym.reset();
        self.oki.reset();
        self.mcu.reset();
        self.scheduler.reset();
        self.reset_registers();
        self.video.mark_all_dirty();
    }

    fn frame_rate_hz(&self) -> f64 {
        (MASTER_CLOCK_HZ / 2) as f64 / (HTOTAL * TIMING.total_lines as usize) as f64
    }
}

fn create(desc: DdDescriptor, config: &MachineConfig) -> Box<dyn Machine> {
    Box::new(Cabinet::from_config(DdBoard::from_config(desc, config), config))
}

inventory::submit! { BoardEntry::new(DDRAGON.name, DDRAGON.description, |c| create(DDRAGON, c)) }
inventory::submit! { BoardEntry::new(DDRAGON2.name, DDRAGON2.description, |c| create(DDRAGON2, c)) }
inventory::submit! { BoardEntry::new(DARKTOWR.name, DARKTOWR.description, |c| create(DARKTOWR, c)) }
