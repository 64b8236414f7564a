use arbitrary_int::{u2, u3};
use bitbybit::bitfield;

/// Recorder control and status register.
///
/// Bit 0 and the mode bits are read/write. The acquisition state, fault and full flags are
/// driven by the capture engine. Writing the register with the full flag clear acknowledges a
/// completed acquisition.
#[bitfield(u32, default = 0)]
#[derive(Debug, PartialEq, Eq)]
pub struct Csr {
    #[bit(0, rw)]
    pub arm: bool,
    #[bits(1..=3, r)]
    pub acquisition_state: u3,
    #[bit(4, r)]
    pub fifo_overrun: bool,
    #[bits(5..=6, r)]
    pub bresp: u2,
    #[bit(7, r)]
    pub full: bool,
    #[bit(8, rw)]
    pub diagnostic_mode: bool,
    #[bit(9, rw)]
    pub test_acquisition_mode: bool,
    #[bit(10, rw)]
    pub reset_bar_mode: bool,
    /// Event trigger enables, soft trigger in bit 24.
    #[bits(24..=31, rw)]
    pub trigger_mask: u8,
}
