use super::bus::{Bus, BusMaster};
use super::save::SaveStateError;

/// Describes a single input button that a machine accepts.
pub struct InputButton {
    /// Machine-defined button identifier, passed to `set_input()`.
    pub id: u8,
    /// Human-readable name for display/configuration (e.g., "P1 Left", "Coin").
    pub name: &'static str,
}

/// Machine-agnostic interface for emulated systems.
///
/// Each machine (Double Dragon, R-Type, etc.) implements this trait to provide
/// a uniform interface to whatever hosts it. The host does not know about
/// specific hardware (tilemaps, sound latches, palette formats, etc.).
pub trait Machine {
    /// Native display resolution as (width, height) in pixels.
    fn display_size(&self) -> (u32, u32);

    /// Run one frame of emulation (advance the clock by one frame's worth of cycles).
    fn run_frame(&mut self);

    /// Render the current video state into an RGB24 pixel buffer.
    ///
    /// The buffer must be at least `width * height * 3` bytes (from `display_size()`).
    /// Pixels are stored left-to-right, top-to-bottom, 3 bytes per pixel (R, G, B).
    fn render_frame(&self, buffer: &mut [u8]);

    /// Handle an input event. `button` is a machine-defined ID from `input_map()`.
    /// `pressed` is true for key-down, false for key-up.
    fn set_input(&mut self, button: u8, pressed: bool);

    /// Get the list of input buttons this machine accepts.
    fn input_map(&self) -> &[InputButton];

    /// Reset the machine to its initial power-on state.
    fn reset(&mut self);

    fn frame_rate_hz(&self) -> f64;

    /// Snapshot every piece of board state that affects emulation.
    fn save_state(&self) -> Result<Vec<u8>, SaveStateError>;

    /// Restore a snapshot produced by `save_state()` on the same board.
    fn load_state(&mut self, data: &[u8]) -> Result<(), SaveStateError>;
}

/// A CPU execution engine attached to one bus master slot of a board.
///
/// Instruction emulation lives outside this crate; boards only need
/// something that consumes cycles and talks to the bus.
pub trait CpuCore<A, D> {
    /// Run for up to `cycles` cycles and return how many were consumed.
    /// May overshoot by the length of the last instruction.
    fn execute(
        &mut self,
        bus: &mut dyn Bus<Address = A, Data = D>,
        master: BusMaster,
        cycles: u64,
    ) -> u64;

    fn reset(&mut self);
}

/// CPU stand-in that burns its time slice without touching the bus.
#[derive(Default, Debug, Clone, Copy)]
pub struct IdleCore {
    pub cycles: u64,
    pub resets: u32,
}

impl IdleCore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<A, D> CpuCore<A, D> for IdleCore {
    fn execute(
        &mut self,
        _bus: &mut dyn Bus<Address = A, Data = D>,
        _master: BusMaster,
        cycles: u64,
    ) -> u64 {
        self.cycles += cycles;
        cycles
    }

    fn reset(&mut self) {
        self.resets += 1;
    }
}
