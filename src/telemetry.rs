use heapless::Vec;
use serde::Serialize;

use crate::hardware::CaptureHardware;
use crate::recorder::{Phase, RecorderState, Recorders, MAX_RECORDERS};

/// Status of one recorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecorderTelemetry {
    /// The recorder kind name.
    pub kind: &'static str,
    pub armed: bool,
    pub phase: Phase,
    pub waveform_number: u32,
    pub pretrigger_count: u32,
    pub acquisition_count: u32,
    /// Bytes still to be acknowledged by the subscriber, 0 when idle.
    pub bytes_left: u32,
    pub retries: u32,
}

impl RecorderTelemetry {
    fn new<H: CaptureHardware>(recorder: &RecorderState, hardware: &H) -> Self {
        let transfer = recorder.transfer();
        Self {
            kind: recorder.config().kind.into(),
            armed: recorder.is_armed(hardware),
            phase: recorder.phase(),
            waveform_number: recorder.waveform_number(),
            pretrigger_count: recorder.pretrigger_count(),
            acquisition_count: recorder.acquisition_count(),
            bytes_left: transfer.map(|t| t.bytes_left()).unwrap_or(0),
            retries: transfer.map(|t| t.retries()).unwrap_or(0),
        }
    }
}

/// A status snapshot of the waveform recorders.
///
/// # Note
/// The snapshot is generated on demand. Reporting it is up to the board support package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Telemetry {
    /// Armed state of every recorder, recorder 0 in bit 0.
    pub armed: u32,
    pub debug_flags: u32,
    pub recorders: Vec<RecorderTelemetry, MAX_RECORDERS>,
}

impl Telemetry {
    pub fn new<H: CaptureHardware>(recorders: &Recorders<H>) -> Self {
        let hardware = recorders.hardware();
        Self {
            armed: recorders.armed_status(),
            debug_flags: recorders.debug_flags().raw_value(),
            recorders: recorders
                .registry()
                .iter()
                .map(|recorder| RecorderTelemetry::new(recorder, hardware))
                .collect(),
        }
    }

    /// Render the snapshot as JSON.
    ///
    /// # Returns
    /// The number of bytes written to `buffer`.
    pub fn to_json(&self, buffer: &mut [u8]) -> Result<usize, serde_json_core::ser::Error> {
        serde_json_core::to_slice(self, buffer)
    }
}
