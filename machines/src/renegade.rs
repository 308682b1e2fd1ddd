use serde::{Deserialize, Serialize};

use kinescope_core::core::bus::InterruptState;
use kinescope_core::core::irq::{CpuLines, InputLine, LineRequest, LineState};
use kinescope_core::core::machine::{InputButton, Machine};
use kinescope_core::core::save::{self, Layout, SaveHeader, SaveState, SaveStateError};
use kinescope_core::core::scheduler::Scheduler;
use kinescope_core::core::{Bus, BusMaster};
use kinescope_core::device::{AdpcmChannel, McuMailbox, Msm5205Port, SoundLatch, Ym3526Port};
use kinescope_core::video::{
    Axis, Bitmap, Blit, DrawFlags, DrawPlan, DrawStep, ElementCount, GfxLayout, GfxSet, LayerDesc, PlaneOffset,
    Rect, SplitPaletteRam, TileInfo, TilemapDesc, VideoDesc, VideoSource, VideoState,
};

use crate::cabinet::{Board, Cabinet};
use crate::config::MachineConfig;
use crate::registry::BoardEntry;

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------
// Master clock: 12 MHz
// Main CPU:     M6502 @ 1.5 MHz, two interrupts per frame (IRQ, NMI)
// Sound CPU:    M6809 @ 1.5 MHz
// Screen:       256 lines at 60 Hz, 240 visible
// ADPCM:        MSM5205 @ 375 kHz, S48 -> every 1536 master ticks

const TOTAL_LINES: u16 = 256;
const VBLANK_START: u16 = 240;
const IRQ_LINE: u16 = 112;
const FRAME_RATE_HZ: f64 = 60.0;
const TICKS_PER_LINE: u64 = 781;
const CPU_CYCLES_PER_LINE: u64 = 98;
const ADPCM_PERIOD: u64 = 1536;

const VISIBLE: Rect = Rect::new(0, 255, 0, 239);

const CPU_MAIN: usize = 0;
const CPU_SOUND: usize = 1;

/// Sprite list: 96 four-byte records.
const SPRITE_BYTES: usize = 0x180;

// ---------------------------------------------------------------------------
// Input button IDs
// ---------------------------------------------------------------------------
pub const INPUT_P1_RIGHT: u8 = 0;
pub const INPUT_P1_LEFT: u8 = 1;
pub const INPUT_P1_UP: u8 = 2;
pub const INPUT_P1_DOWN: u8 = 3;
pub const INPUT_P1_BUTTON1: u8 = 4;
pub const INPUT_P1_BUTTON2: u8 = 5;
pub const INPUT_COIN1: u8 = 6;
pub const INPUT_P1_START: u8 = 7;
pub const INPUT_P2_RIGHT: u8 = 8;
pub const INPUT_P2_LEFT: u8 = 9;
pub const INPUT_P2_UP: u8 = 10;
pub const INPUT_P2_DOWN: u8 = 11;
pub const INPUT_P2_BUTTON1: u8 = 12;
pub const INPUT_P2_BUTTON2: u8 = 13;
pub const INPUT_COIN2: u8 = 14;
pub const INPUT_P2_START: u8 = 15;
pub const INPUT_P1_BUTTON3: u8 = 16;
pub const INPUT_P2_BUTTON3: u8 = 17;

const RENEGADE_INPUT_MAP: &[InputButton] = &[
    InputButton { id: INPUT_P1_RIGHT, name: "P1 Right" },
    InputButton { id: INPUT_P1_LEFT, name: "P1 Left" },
    InputButton { id: INPUT_P1_UP, name: "P1 Up" },
    InputButton { id: INPUT_P1_DOWN, name: "P1 Down" },
    InputButton { id: INPUT_P1_BUTTON1, name: "P1 Attack Left" },
    InputButton { id: INPUT_P1_BUTTON2, name: "P1 Attack Right" },
    InputButton { id: INPUT_P1_BUTTON3, name: "P1 Jump" },
    InputButton { id: INPUT_P2_RIGHT, name: "P2 Right" },
    InputButton { id: INPUT_P2_LEFT, name: "P2 Left" },
    InputButton { id: INPUT_P2_UP, name: "P2 Up" },
    InputButton { id: INPUT_P2_DOWN, name: "P2 Down" },
    InputButton { id: INPUT_P2_BUTTON1, name: "P2 Attack Left" },
    InputButton { id: INPUT_P2_BUTTON2, name: "P2 Attack Right" },
    InputButton { id: INPUT_P2_BUTTON3, name: "P2 Jump" },
    InputButton { id: INPUT_P1_START, name: "P1 Start" },
    InputButton { id: INPUT_P2_START, name: "P2 Start" },
    InputButton { id: INPUT_COIN1, name: "Coin 1" },
    InputButton { id: INPUT_COIN2, name: "Coin 2" },
];

// ---------------------------------------------------------------------------
// Video layout
// ---------------------------------------------------------------------------

const LAYER_BG: usize = 0;
const LAYER_FG: usize = 1;

const GFX_CHARS: usize = 0;
const GFX_TILES: usize = 1;
const GFX_SPRITES: usize = 2;

/// Tile and sprite ROMs are split into banks of 256 16x16 tiles, each bank
/// holding its three bitplanes back to back.
const TILE_BANK_BYTES: usize = 0x6000;
const TILE_BANKS: usize = 8;
const SPRITE_BANKS: usize = 16;

static RENEGADE_LAYERS: [LayerDesc; 2] = [
    LayerDesc { tilemap: TilemapDesc::rows(16, 16, 64, 16), gfx: GFX_TILES },
    LayerDesc { tilemap: TilemapDesc::rows(8, 8, 32, 32), gfx: GFX_CHARS },
];

const VIDEO: VideoDesc = VideoDesc {
    width: 256,
    height: 256,
    visible: VISIBLE,
    palette_len: 256,
    layers: &RENEGADE_LAYERS,
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
        planes: vec![PlaneOffset::Bits(2), PlaneOffset::Bits(4), PlaneOffset::Bits(6)],
        x_offsets: vec![1, 0, 65, 64, 129, 128, 193, 192],
        y_offsets: (0..8).map(|y| y * 8).collect(),
        char_increment: 256,
    }
}

fn bank_layout() -> GfxLayout {
    GfxLayout {
        width: 16,
        height: 16,
        count: ElementCount::Frac { num: 1, den: 3 },
        planes: vec![
            PlaneOffset::Bits(0),
            PlaneOffset::Frac { num: 1, den: 3, bits: 0 },
            PlaneOffset::Frac { num: 2, den: 3, bits: 0 },
        ],
        x_offsets: (0..8).chain(128..136).collect(),
        y_offsets: (0..16).map(|y| y * 8).collect(),
        char_increment: 256,
    }
}

/// Decode `banks` tile banks into one set; bank `b` tile `n` is code `b * 256 + n`.
fn decode_banks(data: &[u8], banks: usize, color_base: u32) -> GfxSet {
    let layout = bank_layout();
    let mut pens = Vec::with_capacity(banks * 256 * 16 * 16);
    for bank in 0..banks {
        let mut chunk = vec![0u8; TILE_BANK_BYTES];
        if let Some(src) = data.get(bank * TILE_BANK_BYTES..) {
            let len = src.len().min(TILE_BANK_BYTES);
            chunk[..len].copy_from_slice(&src[..len]);
        }
        pens.extend(layout.decode(&chunk));
    }
    GfxSet::from_pens(16, 16, pens, color_base, 8)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenegadeRegion {
    /// 0x0000-0xFFFF image plus two 16K banks from 0x10000.
    MainCpu,
    SoundCpu,
    Chars,
    Tiles,
    Sprites,
    Adpcm,
}

// ---------------------------------------------------------------------------
// Video memory
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
struct RenegadeVideoRam {
    bg: Vec<u8>,
    fg: Vec<u8>,
    sprites: Vec<u8>,
}

impl VideoSource for RenegadeVideoRam {
    fn tile_info(&self, layer: usize, index: usize) -> TileInfo {
        let vram = if layer == LAYER_BG { &self.bg } else { &self.fg };
        let code = vram.get(index).copied().unwrap_or(0) as u32;
        let attr = vram.get(index + 0x400).copied().unwrap_or(0) as u32;
        if layer == LAYER_BG {
            // CCC??BBB
            TileInfo::new(((attr & 0x07) << 8) | code, attr >> 5)
        } else {
            TileInfo::new(((attr & 0x03) << 8) | code, attr >> 6)
        }
    }

    fn draw_sprites(&self, _list: usize, target: &mut Bitmap, clip: &Rect, gfx: &[GfxSet], flip: bool) {
        let Some(gfx) = gfx.get(GFX_SPRITES) else {
            return;
        };
        for s in self.sprites[..SPRITE_BYTES].chunks_exact(4) {
            let mut sy = 240 - s[0] as i32;
            if sy < 16 {
                continue;
            }
            // SFCCBBBB
            let attr = s[1];
            let mut sx = s[3] as i32;
            if sx > 248 {
                sx -= 256;
            }
            let mut flip_x = attr & 0x40 != 0;
            if flip {
                sx = 240 - sx;
                sy = 240 - sy;
                flip_x = !flip_x;
            }
            let big = attr & 0x80 != 0;
            let mut code = ((attr & 0x0F) as u32) << 8 | s[2] as u32;
            if big {
                code &= !1;
            }
            let mut blit = Blit {
                code,
                color: ((attr >> 4) & 0x03) as u32,
                flip_x,
                flip_y: flip,
                x: sx,
                y: sy,
            };
            let step = if flip { -16 } else { 16 };
            if big {
                let lower = Blit { code: code + 1, y: sy + step, ..blit };
                gfx.draw(target, clip, &lower, Some(0));
            } else {
                blit.y += step;
            }
            gfx.draw(target, clip, &blit, Some(0));
        }
    }
}

// ---------------------------------------------------------------------------
// Board
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
enum RenegadeEvent {
    SoundCommand(u8),
    AdpcmTick,
}

#[derive(Serialize, Deserialize)]
struct RenegadeSnapshot {
    ram: Vec<u8>,
    video_ram: RenegadeVideoRam,
    palette: SplitPaletteRam,
    sound_ram: Vec<u8>,
    lines: [CpuLines; 2],
    sound_latch: SoundLatch,
    adpcm: AdpcmChannel,
    decoder: Msm5205Port,
    ym: Ym3526Port,
    mcu: McuMailbox,
    scheduler: Scheduler<RenegadeEvent>,
    scroll_x: u16,
    flip: bool,
    bank: u8,
}

const SAVE_VERSION: u32 = 1;

/// Renegade (Technos, 1986)
///
/// Hardware: M6502 (main), M6809 (sound), 68705 protection MCU.
/// Video: 64x16 16x16 background, 32x32 text layer, 4-byte sprites.
/// Audio: YM3526 and one MSM5205 fed from ROM.
///
/// The MCU itself is not emulated; its mailbox is exposed so a host-side
/// model can answer the main CPU.
pub struct RenegadeBoard {
    main_rom: Vec<u8>,
    ram: Vec<u8>,
    video_ram: RenegadeVideoRam,
    palette: SplitPaletteRam,

    sound_rom: Vec<u8>,
    sound_ram: Vec<u8>,
    adpcm_rom: Vec<u8>,

    video: VideoState,
    lines: [CpuLines; 2],

    sound_latch: SoundLatch,
    adpcm: AdpcmChannel,
    decoder: Msm5205Port,
    ym: Ym3526Port,
    mcu: McuMailbox,

    scheduler: Scheduler<RenegadeEvent>,
    fired: Vec<RenegadeEvent>,

    scroll_x: u16,
    flip: bool,
    bank: u8,
    line: u16,

    // I/O (active low)
    p1: u8,
    p2: u8,
    buttons: u8,
    dsw: [u8; 2],
}

impl Default for RenegadeBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl RenegadeBoard {
    pub fn new() -> Self {
        let mut video = VideoState::new(&VIDEO);
        video.layer_mut(LAYER_BG).set_scroll_delta(Axis::X, 256, 0);
        video.layer_mut(LAYER_FG).set_transparent_pen(0);

        let mut scheduler = Scheduler::new();
        scheduler.add_periodic(ADPCM_PERIOD, RenegadeEvent::AdpcmTick);

        Self {
            main_rom: Vec::new(),
            ram: vec![0; 0x1800],
            video_ram: RenegadeVideoRam {
                bg: vec![0; 0x800],
                fg: vec![0; 0x800],
                sprites: vec![0; 0x800],
            },
            palette: SplitPaletteRam::new(0x100),
            sound_rom: Vec::new(),
            sound_ram: vec![0; 0x1000],
            adpcm_rom: Vec::new(),
            video,
            lines: Default::default(),
            sound_latch: SoundLatch::new(),
            adpcm: AdpcmChannel::new(0, 3 * 0x8000),
            decoder: Msm5205Port::new(),
            ym: Ym3526Port::new(),
            mcu: McuMailbox::new(),
            scheduler,
            fired: Vec::new(),
            scroll_x: 0,
            flip: false,
            bank: 0,
            line: 0,
            p1: 0xFF,
            p2: 0xFF,
            buttons: 0xFF,
            dsw: [0xFF; 2],
        }
    }

    pub fn from_config(config: &MachineConfig) -> Self {
        let mut board = Self::new();
        board.dsw = [config.dip.dsw0, config.dip.dsw1];
        board
    }

    pub fn load_region(&mut self, region: RenegadeRegion, data: &[u8]) {
        match region {
            RenegadeRegion::MainCpu => self.main_rom = data.to_vec(),
            RenegadeRegion::SoundCpu => self.sound_rom = data.to_vec(),
            RenegadeRegion::Chars => self.video.set_gfx(GFX_CHARS, GfxSet::decode(&char_layout(), data, 0, 8)),
            RenegadeRegion::Tiles => self.video.set_gfx(GFX_TILES, decode_banks(data, TILE_BANKS, 192)),
            RenegadeRegion::Sprites => self.video.set_gfx(GFX_SPRITES, decode_banks(data, SPRITE_BANKS, 128)),
            RenegadeRegion::Adpcm => self.adpcm_rom = data.to_vec(),
        }
    }

    pub fn lines(&self, cpu: usize) -> &CpuLines {
        &self.lines[cpu]
    }

    pub fn video(&self) -> &VideoState {
        &self.video
    }

    pub fn adpcm(&self) -> &AdpcmChannel {
        &self.adpcm
    }

    pub fn decoder_mut(&mut self) -> &mut Msm5205Port {
        &mut self.decoder
    }

    pub fn ym3526_mut(&mut self) -> &mut Ym3526Port {
        &mut self.ym
    }

    pub fn mcu_mut(&mut self) -> &mut McuMailbox {
        &mut self.mcu
    }

    pub fn sound_latch(&self) -> &SoundLatch {
        &self.sound_latch
    }

    pub fn scroll_x(&self) -> u16 {
        self.scroll_x
    }

    /// YM3526 IRQ output, wired to the sound CPU's FIRQ.
    pub fn set_ym3526_irq(&mut self, asserted: bool) {
        let state = if asserted { LineState::Assert } else { LineState::Clear };
        self.lines[CPU_SOUND].set_line(InputLine::Firq, state);
    }

    /// ```text
    /// 7 6 5 4 3 2 1 0
    /// . . . . . . . x  P1 jump (active low)
    /// . . . . . . x .  P2 jump (active low)
    /// . . x x x x . .  DSW1 bits 2-5
    /// . x . . . . . .  VBLANK
    /// x . . . . . . .  MCU has a byte for the main CPU
    /// ```
    fn status_port(&self) -> u8 {
        let mut value = (self.buttons & 0x03) | (self.dsw[1] & 0x3C);
        if self.line >= VBLANK_START {
            value |= 0x40;
        }
        if self.mcu.mcu_sent() {
            value |= 0x80;
        }
        value
    }

    fn main_read(&mut self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x17FF => self.ram[addr as usize],
            0x1800..=0x1FFF => self.video_ram.fg[(addr & 0x7FF) as usize],
            0x2000..=0x27FF => self.video_ram.sprites[(addr & 0x7FF) as usize],
            0x2800..=0x2FFF => self.video_ram.bg[(addr & 0x7FF) as usize],
            0x3000..=0x30FF => self.palette.read_lo((addr & 0xFF) as usize),
            0x3100..=0x31FF => self.palette.read_hi((addr & 0xFF) as usize),
            0x3800 => self.p1,
            0x3801 => self.p2,
            0x3802 => self.status_port(),
            0x3803 => self.dsw[0],
            0x3804 => self.mcu.main_read(),
            0x3805 => {
                log::debug!("MCU reset");
                self.mcu.reset();
                0
            }
            0x4000..=0x7FFF => {
                let offset = 0x10000 + self.bank as usize * 0x4000 + (addr - 0x4000) as usize;
                self.main_rom.get(offset).copied().unwrap_or(0xFF)
            }
            0x8000..=0xFFFF => self.main_rom.get(addr as usize).copied().unwrap_or(0xFF),
            _ => {
                log::trace!("renegade main unmapped read {addr:#06x}");
                0xFF
            }
        }
    }

    fn main_write(&mut self, addr: u16, data: u8) {
        match addr {
            0x0000..=0x17FF => self.ram[addr as usize] = data,
            0x1800..=0x1FFF => {
                let offset = (addr & 0x7FF) as usize;
                self.video_ram.fg[offset] = data;
                self.video.mark_dirty(LAYER_FG, offset & 0x3FF);
            }
            0x2000..=0x27FF => self.video_ram.sprites[(addr & 0x7FF) as usize] = data,
            0x2800..=0x2FFF => {
                let offset = (addr & 0x7FF) as usize;
                self.video_ram.bg[offset] = data;
                self.video.mark_dirty(LAYER_BG, offset & 0x3FF);
            }
            0x3000..=0x30FF => self.palette.write_lo((addr & 0xFF) as usize, data, self.video.palette_mut()),
            0x3100..=0x31FF => self.palette.write_hi((addr & 0xFF) as usize, data, self.video.palette_mut()),
            0x3800 => self.scroll_x = (self.scroll_x & 0xFF00) | data as u16,
            0x3801 => self.scroll_x = (self.scroll_x & 0x00FF) | (data as u16) << 8,
            0x3802 => self.scheduler.defer(RenegadeEvent::SoundCommand(data)),
            0x3803 => {
                self.flip = data & 0x01 == 0;
                self.video.set_flip(self.flip);
            }
            0x3804 => self.mcu.main_write(data),
            0x3805 => self.bank = data & 0x01,
            0x3806 => {} // watchdog
            0x3807 => log::trace!("coin counters {data:#04x}"),
            _ => log::trace!("renegade main unmapped write {addr:#06x} = {data:#04x}"),
        }
    }

    /// ADPCM address register: bits 2-4 pick the ROM, bits 0-1 the 8K sample
    /// slot inside it.
    fn write_adpcm_address(&mut self, data: u8) {
        let rom_base = match data & 0x1C {
            0x18 => 0x00000,
            0x14 => 0x08000,
            0x0C => 0x10000,
            _ => {
                log::debug!("unknown ADPCM ROM select {data:#04x}");
                return;
            }
        };
        let start = rom_base + (data & 0x03) as usize * 0x2000;
        self.adpcm.set_start(start);
        self.adpcm.set_end(start + 0x2000);
    }

    fn sound_read(&mut self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x0FFF => self.sound_ram[addr as usize],
            0x1000 => {
                let mut irq = LineRequest::new(&mut self.lines[CPU_SOUND], InputLine::Irq, LineState::Hold);
                self.sound_latch.read_and_acknowledge(&mut irq)
            }
            0x2800..=0x2801 => self.ym.read((addr & 1) as u8),
            0x8000..=0xFFFF => self.sound_rom.get(addr as usize).copied().unwrap_or(0xFF),
            _ => {
                log::trace!("renegade sound unmapped read {addr:#06x}");
                0xFF
            }
        }
    }

    fn sound_write(&mut self, addr: u16, data: u8) {
        match addr {
            0x0000..=0x0FFF => self.sound_ram[addr as usize] = data,
            0x1800 => self.adpcm.arm(&mut self.decoder),
            0x2000 => self.write_adpcm_address(data),
            0x2800..=0x2801 => self.ym.write((addr & 1) as u8, data),
            0x3000 => self.adpcm.stop(&mut self.decoder),
            _ => log::trace!("renegade sound unmapped write {addr:#06x} = {data:#04x}"),
        }
    }

    fn apply(&mut self, event: RenegadeEvent) {
        match event {
            RenegadeEvent::SoundCommand(data) => {
                let mut irq = LineRequest::new(&mut self.lines[CPU_SOUND], InputLine::Irq, LineState::Hold);
                self.sound_latch.write(data, &mut irq);
            }
            RenegadeEvent::AdpcmTick => self.adpcm.tick(&self.adpcm_rom, &mut self.decoder),
        }
    }

    fn snapshot(&self) -> RenegadeSnapshot {
        RenegadeSnapshot {
            ram: self.ram.clone(),
            video_ram: self.video_ram.clone(),
            palette: self.palette.clone(),
            sound_ram: self.sound_ram.clone(),
            lines: self.lines.clone(),
            sound_latch: self.sound_latch.clone(),
            adpcm: self.adpcm.clone(),
            decoder: self.decoder.clone(),
            ym: self.ym.clone(),
            mcu: self.mcu.clone(),
            scheduler: self.scheduler.clone(),
            scroll_x: self.scroll_x,
            flip: self.flip,
            bank: self.bank,
        }
    }
}

impl Bus for RenegadeBoard {
    type Address = u16;
    type Data = u8;

    fn read(&mut self, master: BusMaster, addr: u16) -> u8 {
        match master {
            BusMaster::Cpu(CPU_MAIN) => self.main_read(addr),
            BusMaster::Cpu(CPU_SOUND) => self.sound_read(addr),
            _ => 0xFF,
        }
    }

    fn write(&mut self, master: BusMaster, addr: u16, data: u8) {
        match master {
            BusMaster::Cpu(CPU_MAIN) => self.main_write(addr, data),
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

impl SaveState for RenegadeBoard {
    fn save_state(&self) -> Result<Vec<u8>, SaveStateError> {
        save::encode(&SaveHeader::new("renegade", SAVE_VERSION), &self.snapshot())
    }

    fn load_state(&mut self, data: &[u8]) -> Result<(), SaveStateError> {
        let s: RenegadeSnapshot = save::decode(&SaveHeader::new("renegade", SAVE_VERSION), data)?;
        self.ram.check_layout(&s.ram, "ram")?;
        self.palette.check_layout(&s.palette, "palette")?;
        self.sound_ram.check_layout(&s.sound_ram, "sound_ram")?;
        self.ym.check_layout(&s.ym, "ym")?;
        self.scheduler.check_layout(&s.scheduler, "scheduler")?;
        self.video_ram.bg.check_layout(&s.video_ram.bg, "bg")?;
        self.video_ram.fg.check_layout(&s.video_ram.fg, "fg")?;
        self.video_ram.sprites.check_layout(&s.video_ram.sprites, "sprites")?;

        self.ram = s.ram;
        self.video_ram = s.video_ram;
        self.palette = s.palette;
        self.sound_ram = s.sound_ram;
        self.lines = s.lines;
        self.sound_latch = s.sound_latch;
        self.adpcm = s.adpcm;
        self.decoder = s.decoder;
        self.ym = s.ym;
        self.mcu = s.mcu;
        self.scheduler = s.scheduler;
        self.scroll_x = s.scroll_x;
        self.flip = s.flip;
        self.bank = s.bank;

        self.palette.refresh(self.video.palette_mut());
        self.video.set_flip(self.flip);
        self.video.mark_all_dirty();
        Ok(())
    }
}

impl Board for RenegadeBoard {
    fn cpu_count(&self) -> usize {
        2
    }

    fn cycles_per_line(&self, _cpu: usize) -> u64 {
        CPU_CYCLES_PER_LINE
    }

    fn ticks_per_line(&self) -> u64 {
        TICKS_PER_LINE
    }

    fn total_lines(&self) -> u16 {
        TOTAL_LINES
    }

    fn begin_scanline(&mut self, line: u16) {
        self.line = line;
        match line {
            IRQ_LINE => self.lines[CPU_MAIN].set_line(InputLine::Irq, LineState::Hold),
            VBLANK_START => self.lines[CPU_MAIN].set_line(InputLine::Nmi, LineState::Pulse),
            _ => {}
        }
    }

    fn synchronize(&mut self) {
        let pending: Vec<RenegadeEvent> = self.scheduler.synchronize().collect();
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
        self.video.layer_mut(LAYER_BG).set_scroll(Axis::X, self.scroll_x as i32);
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
            16..=17 => (&mut self.buttons, button - 16),
            _ => return,
        };
        if pressed {
            *port &= !(1 << bit);
        } else {
            *port |= 1 << bit;
        }
    }

    fn input_map(&self) -> &[InputButton] {
        RENEGADE_INPUT_MAP
    }

    fn reset(&mut self) {
        self.lines = Default::default();
        self.sound_latch.reset();
        self.adpcm.reset();
        self.decoder = Msm5205Port::new();
        self.ym.reset();
        self.mcu.reset();
        self.scheduler.reset();
        self.scroll_x = 0;
        self.bank = 0;
        self.flip = false;
        self.video.set_flip(false);
        self.video.mark_all_dirty();
    }

    fn frame_rate_hz(&self) -> f64 {
        FRAME_RATE_HZ
    }
}

fn create(config: &MachineConfig) -> Box<dyn Machine> {
    Box::new(Cabinet::from_config(RenegadeBoard::from_config(config), config))
}

inventory::submit! { BoardEntry::new("renegade", "Renegade (Technos, 1986)", create) }
