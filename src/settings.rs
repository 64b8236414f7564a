//! Start-up configuration
//!
//! # Design
//! Settings are read once at boot, typically from a JSON document kept in flash by the board
//! support package. Every field has a default reproducing the reference instrument, so a partial
//! or missing document still yields a working configuration. Run-time changes arrive through the
//! command server and are not written back.
use bitbybit::bitfield;
use heapless::Vec;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::hardware::design_parameters::{
    RETRY_LIMIT, SYSTEM_CLOCK_HZ, TIMEOUT_TICKS,
};
use crate::protocol::{COMMAND_UDP_PORT, PUBLISHER_UDP_PORT};
use crate::recorder::{RecorderKind, Timing, MAX_RECORDERS};

/// Debug flag word, read and written through the general I/O debug command.
#[bitfield(u32, default = 0)]
#[derive(Debug, PartialEq, Eq)]
pub struct DebugFlags {
    /// Log every datagram on the publisher port.
    #[bit(2, rw)]
    pub publisher: bool,
    /// Log every command received by the command server.
    #[bit(3, rw)]
    pub server: bool,
    /// Arm recorders in diagnostic mode and check their buffers once full.
    #[bit(11, rw)]
    pub recorder_diagnostic: bool,
}

/// Initial pretrigger and acquisition sample counts of one recorder.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecorderDefaults {
    pub pretrigger_count: u32,
    pub acquisition_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Per-recorder counts, in recorder order. Missing entries use the recorder kind defaults.
    pub recorders: Vec<RecorderDefaults, MAX_RECORDERS>,
    /// Interval without an acknowledgement before a waveform packet is resent.
    pub timeout_ms: u32,
    /// Number of timeouts after which a waveform transfer is abandoned.
    pub retry_limit: u32,
    /// Initial debug flag word.
    pub debug_flags: u32,
    pub command_port: u16,
    pub publisher_port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            recorders: RecorderKind::iter().map(|kind| kind.defaults()).collect(),
            timeout_ms: TIMEOUT_TICKS / (SYSTEM_CLOCK_HZ / 1000),
            retry_limit: RETRY_LIMIT,
            debug_flags: 0,
            command_port: COMMAND_UDP_PORT,
            publisher_port: PUBLISHER_UDP_PORT,
        }
    }
}

impl Settings {
    /// Parse settings from a JSON document.
    pub fn from_json(json: &[u8]) -> Result<Self, serde_json_core::de::Error> {
        let (settings, _) = serde_json_core::from_slice(json)?;
        Ok(settings)
    }

    /// Protocol timing in processor clock ticks.
    pub fn timing(&self) -> Timing {
        Timing {
            timeout_ticks: self.timeout_ms.saturating_mul(SYSTEM_CLOCK_HZ / 1000),
            retry_limit: self.retry_limit,
        }
    }

    pub fn debug_flags(&self) -> DebugFlags {
        DebugFlags::new_with_raw_value(self.debug_flags)
    }
}
