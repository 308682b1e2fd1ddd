//! Shared interrupt-vector arbitration for a mode-0 sound CPU.
//!
//! The Irem M72 sound Z80 has one IRQ input shared by the YM2151 timer and
//! the main CPU's sound command. The vector byte placed on the data bus
//! during the acknowledge cycle tells the program which source fired: each
//! source owns one bit, and a **cleared** bit means "pending".
//!
//! | Vector bit | Source            | Assert       | Clear        |
//! |------------|-------------------|--------------|--------------|
//! | 4          | YM2151 timer      | `&= 0xEF`    | `\|= 0x10`   |
//! | 5          | sound command     | `&= 0xDF`    | `\|= 0x20`   |
//!
//! 0xFF means nothing is pending and the IRQ line is dropped; any other
//! value holds the line asserted with that vector.
//!
//! The requests come from three unsynchronized contexts (the chip's timer
//! callback, the main CPU writing the command latch, the sound CPU writing
//! the acknowledge port). None of them touch the vector directly: each one
//! queues a request, and the queue is applied in order at the next
//! synchronization point.

use serde::{Deserialize, Serialize};

use crate::core::irq::{CpuLines, InputLine, InterruptRequest, LineState};
use crate::core::scheduler::DeferredQueue;

/// Vector value with no source pending.
pub const VECTOR_IDLE: u8 = 0xFF;

/// One bit of the shared vector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VectorSource(u8);

impl VectorSource {
    pub const YM2151: VectorSource = VectorSource(4);
    pub const SOUND_LATCH: VectorSource = VectorSource(5);

    /// Any bit of the vector may be wired to a source.
    pub const fn bit(bit: u8) -> Option<VectorSource> {
        if bit < 8 { Some(VectorSource(bit)) } else { None }
    }

    pub const fn mask(self) -> u8 {
        1 << self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VectorAction {
    Assert,
    Clear,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VectorRequest {
    Init,
    Change(VectorSource, VectorAction),
}

impl VectorRequest {
    /// Decode the numeric request codes used by the sound hardware glue:
    /// 0 init, 1/2 YM2151 assert/clear, 3/4 sound command assert/clear.
    pub fn from_code(code: u8) -> Option<VectorRequest> {
        use VectorAction::*;
        match code {
            0 => Some(VectorRequest::Init),
            1 => Some(VectorRequest::Change(VectorSource::YM2151, Assert)),
            2 => Some(VectorRequest::Change(VectorSource::YM2151, Clear)),
            3 => Some(VectorRequest::Change(VectorSource::SOUND_LATCH, Assert)),
            4 => Some(VectorRequest::Change(VectorSource::SOUND_LATCH, Clear)),
            _ => None,
        }
    }
}

/// Owner of the shared vector byte of one sound CPU.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IrqVectorArbiter {
    vector: u8,
    queue: DeferredQueue<VectorRequest>,
}

impl Default for IrqVectorArbiter {
    fn default() -> Self {
        Self::new()
    }
}

impl IrqVectorArbiter {
    pub fn new() -> Self {
        Self {
            vector: VECTOR_IDLE,
            queue: DeferredQueue::new(),
        }
    }

    pub fn vector(&self) -> u8 {
        self.vector
    }

    pub fn pending_requests(&self) -> usize {
        self.queue.len()
    }

    /// Queue a change; nothing happens until [`synchronize`](Self::synchronize).
    pub fn request(&mut self, source: VectorSource, action: VectorAction) {
        self.queue.push(VectorRequest::Change(source, action));
    }

    /// Queue a request by numeric code. Unknown codes are a wiring bug.
    pub fn request_code(&mut self, code: u8) {
        match VectorRequest::from_code(code) {
            Some(req) => self.queue.push(req),
            None => {
                log::error!("unknown interrupt vector request {code}");
                debug_assert!(false, "unknown interrupt vector request {code}");
            }
        }
    }

    /// Apply every queued request in order, driving `target`'s IRQ line
    /// after each step.
    pub fn synchronize(&mut self, target: &mut CpuLines) {
        let pending: Vec<VectorRequest> = self.queue.drain().collect();
        for req in pending {
            self.apply(req, target);
        }
    }

    /// Machine reset: back to idle immediately, pending requests dropped.
    pub fn reset(&mut self, target: &mut CpuLines) {
        self.queue.clear();
        self.apply(VectorRequest::Init, target);
    }

    fn apply(&mut self, req: VectorRequest, target: &mut CpuLines) {
        match req {
            VectorRequest::Init => self.vector = VECTOR_IDLE,
            VectorRequest::Change(source, VectorAction::Assert) => self.vector &= !source.mask(),
            VectorRequest::Change(source, VectorAction::Clear) => self.vector |= source.mask(),
        }

        if self.vector == 0 {
            log::warn!("sound IRQ vector reached 0x00; every source bit pending");
        }

        if self.vector == VECTOR_IDLE {
            target.set_line_and_vector(InputLine::Irq, LineState::Clear, self.vector);
        } else {
            target.set_line_and_vector(InputLine::Irq, LineState::Assert, self.vector);
        }
    }
}

/// Routes a latch's interrupt request to one arbiter source.
pub struct SourceRequest<'a> {
    arbiter: &'a mut IrqVectorArbiter,
    source: VectorSource,
}

impl<'a> SourceRequest<'a> {
    pub fn new(arbiter: &'a mut IrqVectorArbiter, source: VectorSource) -> Self {
        Self { arbiter, source }
    }
}

impl InterruptRequest for SourceRequest<'_> {
    fn assert(&mut self) {
        self.arbiter.request(self.source, VectorAction::Assert);
    }

    fn clear(&mut self) {
        self.arbiter.request(self.source, VectorAction::Clear);
    }
}
