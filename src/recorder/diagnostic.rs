//! Buffer consistency checks for recorders armed in diagnostic mode.
//!
//! # Design
//! In diagnostic mode the capture engines record synthetic counters instead of live data. Once such
//! a recorder fills, its buffer is scanned for gaps in the counters and the spacing of the samples
//! is histogrammed. The results are only logged; the waveform is streamed as usual afterwards.
use super::{Geometry, RecorderState};
use crate::hardware::{CaptureHardware, Register};

/// Histogram bins. The last bin collects every value beyond it.
pub const HISTOGRAM_SIZE: usize = 120;

const MAX_REPORTED_ERRORS: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticReport {
    /// Samples inspected.
    pub samples: u32,
    /// Samples breaking the expected counter sequence.
    pub errors: u32,
    pub histogram: [u32; HISTOGRAM_SIZE],
}

impl Default for DiagnosticReport {
    fn default() -> Self {
        Self {
            samples: 0,
            errors: 0,
            histogram: [0; HISTOGRAM_SIZE],
        }
    }
}

impl DiagnosticReport {
    fn bin(&mut self, value: u32) {
        let bin = (value as usize).min(HISTOGRAM_SIZE - 1);
        self.histogram[bin] += 1;
    }

    fn error(&mut self, index: u32, words: &[u32]) {
        if self.errors < MAX_REPORTED_ERRORS {
            log::warn!("{:7}: {:08X?}", index, words);
        } else if self.errors == MAX_REPORTED_ERRORS {
            log::warn!("Too many errors, reporting inhibited");
        }
        self.errors += 1;
    }

    /// Total words moved by the capture engine, derived from a burst length histogram.
    ///
    /// Bin `i` counts the samples that were followed by at least `i + 1` words in their burst.
    pub fn words_transferred(&self) -> u32 {
        let mut seen = 0u32;
        let mut words = 0u32;
        for (i, count) in self.histogram.iter().enumerate().rev() {
            let bursts = count.saturating_sub(seen);
            seen += bursts;
            words += (i as u32 + 1) * bursts;
        }
        words
    }
}

fn word(buffer: &[u8], offset: usize) -> u32 {
    buffer
        .get(offset..offset + 4)
        .and_then(|bytes| bytes.try_into().ok())
        .map(u32::from_le_bytes)
        .unwrap_or(0)
}

/// Check a linear buffer of 16-byte records: a timestamp followed by three consecutive counters.
///
/// Successive timestamps must increase by less than [HISTOGRAM_SIZE] and the first counter must
/// advance by one per record.
pub fn linear_check(buffer: &[u8], records: u32) -> DiagnosticReport {
    let records = records.min((buffer.len() / 16) as u32);
    let mut report = DiagnosticReport {
        samples: records,
        ..Default::default()
    };

    let record = |i: u32| -> [u32; 4] {
        let base = i as usize * 16;
        [0, 4, 8, 12].map(|o| word(buffer, base + o))
    };

    let mut previous = record(0);
    for i in 1..records {
        let current = record(i);
        let diff = current[0].wrapping_sub(previous[0]);
        if diff == 0
            || diff as usize >= HISTOGRAM_SIZE
            || current[1].wrapping_sub(1) != previous[1]
            || current[1].wrapping_add(1) != current[2]
            || current[1].wrapping_add(2) != current[3]
        {
            report.error(i, &current);
        }
        report.bin(diff);
        previous = current;
    }
    report
}

/// Check a ring buffer whose samples start with a sequence counter followed by a burst length.
///
/// # Args
/// * `buffer` - The recorder ring buffer.
/// * `start` - Byte offset of the first sample.
/// * `samples` - Number of samples to inspect.
/// * `bytes_per_sample` - Sample stride, at least 8.
pub fn ring_check(
    buffer: &[u8],
    start: usize,
    samples: u32,
    bytes_per_sample: usize,
) -> DiagnosticReport {
    let mut report = DiagnosticReport {
        samples,
        ..Default::default()
    };
    if buffer.is_empty() || bytes_per_sample < 8 {
        return report;
    }

    let mut offset = start % buffer.len();
    let mut previous = None;
    for i in 0..samples {
        let counter = word(buffer, offset);
        if previous.is_some_and(|p: u32| counter != p.wrapping_add(1)) {
            report.error(i, &[counter, word(buffer, offset + 4)]);
        }
        previous = Some(counter);
        report.bin(word(buffer, offset + 4));
        offset = (offset + bytes_per_sample) % buffer.len();
    }
    report
}

/// Run the check matching the recorder geometry and log the outcome.
pub fn check<H: CaptureHardware>(
    recorder: &RecorderState,
    hardware: &H,
) -> Option<DiagnosticReport> {
    let config = recorder.config();
    let buffer = config.buffer(hardware.memory()).ok()?;
    let count = recorder
        .read(hardware, Register::AcquisitionCount)
        .min(config.sample_capacity);

    let report = match config.geometry {
        Geometry::Linear { .. } => linear_check(buffer, count / 2),
        Geometry::Ring => {
            let capacity = buffer.len() as u64;
            let write_pointer = recorder
                .read(hardware, Register::AddressPointer)
                .wrapping_sub(recorder.bus_address(hardware))
                as u64
                % capacity;
            let length = count as u64 * config.bytes_per_sample as u64 % capacity;
            let start = (write_pointer + capacity - length) % capacity;
            ring_check(
                buffer,
                start as usize,
                count,
                config.bytes_per_sample as usize,
            )
        }
    };

    log::info!(
        "Recorder {} diagnostic: {} samples, {} errors, {} words",
        config.index,
        report.samples,
        report.errors,
        report.words_transferred()
    );
    for (bin, count) in report.histogram.iter().enumerate() {
        if *count != 0 {
            log::debug!("{:5}: {}", bin, count);
        }
    }
    Some(report)
}
