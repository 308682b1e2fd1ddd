pub mod bus;
pub mod irq;
pub mod machine;
pub mod save;
pub mod scheduler;

pub use bus::{Bus, BusMaster, InterruptState};
pub use irq::{CpuLines, InputLine, LineState, SuspendState};
pub use machine::{CpuCore, IdleCore, InputButton, Machine};
pub use scheduler::{DeferredQueue, Scheduler, TimerId};
