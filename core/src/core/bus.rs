use super::irq::InputLine;

/// Identifies who is accessing the bus (for multi-CPU/DMA arbitration)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BusMaster {
    Cpu(usize), // CPU 0, CPU 1, etc.
    Dma,        // sprite-buffer copies and other non-CPU transfers
}

/// Generic bus interface supporting halt/arbitration (RESET, HALT, BUSREQ, etc.)
///
/// A board implements this once and dispatches on [`BusMaster`]. Boards that
/// mix 16-bit and 8-bit CPUs expose a wide bus; the 8-bit CPUs use the low
/// byte of `Data`.
pub trait Bus {
    type Address: Copy + Into<u64>; // u16 for 8-bit, u32 for 16-bit boards
    type Data; // u8 or u16

    fn read(&mut self, master: BusMaster, addr: Self::Address) -> Self::Data;
    fn write(&mut self, master: BusMaster, addr: Self::Address, data: Self::Data);

    /// Read from I/O port address space (separate from memory on Z80/V30).
    /// Default maps to memory read; override for CPUs with separate I/O.
    fn io_read(&mut self, master: BusMaster, addr: Self::Address) -> Self::Data {
        self.read(master, addr)
    }

    /// Write to I/O port address space (separate from memory on Z80/V30).
    /// Default maps to memory write; override for CPUs with separate I/O.
    fn io_write(&mut self, master: BusMaster, addr: Self::Address, data: Self::Data) {
        self.write(master, addr, data)
    }

    /// Check if the bus is halted for this master (RESET/HALT held).
    /// Returns true if the master must pause before the next bus cycle.
    fn is_halted_for(&self, master: BusMaster) -> bool;

    /// Generic interrupt query. CPUs pick what they need.
    fn check_interrupts(&self, target: BusMaster) -> InterruptState;

    /// Called by a CPU core when it takes an interrupt. Lines driven with
    /// `LineState::Hold` or `LineState::Pulse` drop here.
    fn acknowledge_interrupt(&mut self, _target: BusMaster, _line: InputLine) {}
}

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct InterruptState {
    pub nmi: bool,
    pub irq: bool,
    pub firq: bool, // 6809-specific; ignored by other CPUs
    /// Vector (Z80 mode 0/2, V30) or level (68000) supplied with `irq`.
    pub irq_vector: u8,
}
