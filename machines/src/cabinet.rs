//! Scanline-interleaved run loop shared by every board.
//!
//! A frame is `total_lines` scanlines. Each scanline starts with the
//! board's raster work (`begin_scanline`), then every CPU runs its share of
//! the line in `interleave` slices. After each slice the board reaches a
//! synchronization point where deferred cross-CPU work is applied and the
//! board's timers advance, so no CPU ever observes another CPU's state more
//! than one slice stale.

use kinescope_core::core::machine::{CpuCore, IdleCore, InputButton, Machine};
use kinescope_core::core::save::{SaveState, SaveStateError};
use kinescope_core::core::{Bus, BusMaster};

use crate::config::MachineConfig;

/// Board-specific half of the run loop.
pub trait Board: Bus + SaveState {
    fn cpu_count(&self) -> usize;

    /// CPU `cpu`'s clock cycles per scanline.
    fn cycles_per_line(&self, cpu: usize) -> u64;

    /// Board timer ticks per scanline.
    fn ticks_per_line(&self) -> u64;

    fn total_lines(&self) -> u16;

    /// Raster events due at the start of `line`.
    fn begin_scanline(&mut self, line: u16);

    /// Apply deferred cross-CPU work.
    fn synchronize(&mut self);

    /// Advance board timers.
    fn advance_time(&mut self, ticks: u64);

    /// Finish rendering and run end-of-frame copies.
    fn end_frame(&mut self);

    /// CPU held in reset or halted.
    fn is_suspended(&self, cpu: usize) -> bool;

    /// True once after the CPU's RESET input was released.
    fn take_reset_release(&mut self, cpu: usize) -> bool;

    fn display_size(&self) -> (u32, u32);
    fn render_rgb24(&self, buffer: &mut [u8]);
    fn set_input(&mut self, button: u8, pressed: bool);
    fn input_map(&self) -> &[InputButton];
    fn reset(&mut self);
    fn frame_rate_hz(&self) -> f64;
}

type Core<B> = Box<dyn CpuCore<<B as Bus>::Address, <B as Bus>::Data>>;

/// Share `k` of `n` of `total`, distributing remainders so the shares sum
/// to `total` exactly.
fn slice(total: u64, k: u64, n: u64) -> u64 {
    total * (k + 1) / n - total * k / n
}

pub struct Cabinet<B: Board> {
    board: B,
    cores: Vec<Core<B>>,
    // Cycles each CPU ran past its last budget.
    overshoot: Vec<u64>,
    interleave: u32,
    frames: u64,
}

impl<B: Board + 'static> Cabinet<B> {
    /// `cores` must hold one core per board CPU, in bus master order.
    pub fn new(board: B, cores: Vec<Core<B>>, interleave: u32) -> Self {
        debug_assert_eq!(cores.len(), board.cpu_count());
        let count = cores.len();
        Self {
            board,
            cores,
            overshoot: vec![0; count],
            interleave: interleave.max(1),
            frames: 0,
        }
    }

    /// Every CPU replaced by an [`IdleCore`].
    pub fn with_idle_cores(board: B, interleave: u32) -> Self {
        let cores = (0..board.cpu_count())
            .map(|_| Box::new(IdleCore::new()) as Core<B>)
            .collect();
        Self::new(board, cores, interleave)
    }

    pub fn from_config(board: B, config: &MachineConfig) -> Self {
        Self::with_idle_cores(board, config.interleave)
    }

    pub fn board(&self) -> &B {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut B {
        &mut self.board
    }

    pub fn interleave(&self) -> u32 {
        self.interleave
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    fn run_slice(&mut self, k: u64) {
        let n = self.interleave as u64;
        for cpu in 0..self.cores.len() {
            if self.board.take_reset_release(cpu) {
                self.cores[cpu].reset();
                self.overshoot[cpu] = 0;
            }
            let budget = slice(self.board.cycles_per_line(cpu), k, n);
            if self.board.is_suspended(cpu) {
                self.overshoot[cpu] = 0;
                continue;
            }
            let owed = self.overshoot[cpu].min(budget);
            self.overshoot[cpu] -= owed;
            let budget = budget - owed;
            if budget == 0 {
                continue;
            }
            let used = self.cores[cpu].execute(&mut self.board, BusMaster::Cpu(cpu), budget);
            self.overshoot[cpu] += used.saturating_sub(budget);
        }
        self.board.synchronize();
        let ticks = slice(self.board.ticks_per_line(), k, n);
        self.board.advance_time(ticks);
    }
}

impl<B: Board + 'static> Machine for Cabinet<B> {
    fn display_size(&self) -> (u32, u32) {
        self.board.display_size()
    }

    fn run_frame(&mut self) {
        for line in 0..self.board.total_lines() {
            self.board.begin_scanline(line);
            for k in 0..self.interleave as u64 {
                self.run_slice(k);
            }
        }
        self.board.end_frame();
        self.frames += 1;
    }

    fn render_frame(&self, buffer: &mut [u8]) {
        self.board.render_rgb24(buffer);
    }

    fn set_input(&mut self, button: u8, pressed: bool) {
        self.board.set_input(button, pressed);
    }

    fn input_map(&self) -> &[InputButton] {
        self.board.input_map()
    }

    fn reset(&mut self) {
        self.board.reset();
        for core in &mut self.cores {
            core.reset();
        }
        self.overshoot.fill(0);
    }

    fn frame_rate_hz(&self) -> f64 {
        self.board.frame_rate_hz()
    }

    fn save_state(&self) -> Result<Vec<u8>, SaveStateError> {
        self.board.save_state()
    }

    fn load_state(&mut self, data: &[u8]) -> Result<(), SaveStateError> {
        self.board.load_state(data)
    }
}
