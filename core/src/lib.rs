pub mod core;
pub mod device;
pub mod video;

pub mod prelude {
    pub use crate::core::irq::{CpuLines, InputLine, LineState, SuspendState};
    pub use crate::core::machine::{CpuCore, InputButton, Machine};
    pub use crate::core::save::{SaveState, SaveStateError};
    pub use crate::core::{Bus, BusMaster, bus::InterruptState};
}
