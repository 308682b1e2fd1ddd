pub mod adpcm;
pub mod chip_port;
pub mod dac;
pub mod irq_levels;
pub mod latch;
pub mod vector_arbiter;

pub use adpcm::{AdpcmChannel, AdpcmDecoder, AddressMode, DualAdpcm, Msm5205Port, SampleStreamer};
pub use chip_port::{Okim6295Port, Ym2151Port, Ym3526Port};
pub use dac::Dac8;
pub use irq_levels::IrqLevels;
pub use latch::{GatedSharedRam, McuMailbox, SoundLatch};
pub use vector_arbiter::{IrqVectorArbiter, SourceRequest, VectorAction, VectorSource};
