//! Capture hardware interface
//!
//! # Design
//! Each recorder is controlled through a small block of consecutive registers in the GPIO
//! register file, starting at the recorder's register base. The recorders write into one
//! contiguous acquisition memory arena, each owning a fixed region of it. The core never touches
//! capture internals beyond these registers and its own buffer region.
use num_enum::IntoPrimitive;

mod csr;
pub mod design_parameters;

pub use csr::Csr;

/// Register offsets relative to a recorder's register base.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, IntoPrimitive)]
pub enum Register {
    Csr = 0,
    PretriggerCount = 1,
    AcquisitionCount = 2,
    AddressPointer = 3,
    TimestampSeconds = 4,
    TimestampTicks = 5,
}

/// Access to the capture engines and their memory.
///
/// Implemented by the board support package on top of the memory-mapped register file.
pub trait CaptureHardware {
    /// Read the register at an absolute register file index.
    fn read(&self, index: usize) -> u32;

    /// Write the register at an absolute register file index.
    fn write(&mut self, index: usize, value: u32);

    /// The acquisition memory arena holding every recorder buffer.
    fn memory(&self) -> &[u8];

    /// Bus address of the first byte of [CaptureHardware::memory] as seen by the capture engines.
    fn memory_base(&self) -> u32;

    /// Make data written by the capture engines visible to the processor.
    fn flush_cache(&mut self) {}
}
