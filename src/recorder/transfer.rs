//! Waveform transfer state machine
//!
//! # Design
//! A filled recorder is streamed as a header followed by data blocks of at most
//! [WAVEFORM_PAYLOAD_CAPACITY] bytes. Exactly one packet is outstanding at any time and the next
//! one is only sent once the subscriber acknowledges it. Lost packets are recovered by resending
//! the outstanding packet after a timeout, a bounded number of times.
//!
//! The header fields are latched when the session starts. Resends reproduce the same header and
//! never re-read the capture registers, which may already describe the next acquisition.
use serde::Serialize;

use super::{ring, Geometry, RecorderState};
use crate::hardware::{design_parameters, CaptureHardware, Register};
use crate::protocol::{Ack, DataBlock, Header, Packet, WAVEFORM_PAYLOAD_CAPACITY};
use crate::Error;

/// Transfer phase of a recorder.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum Phase {
    Idle,
    HeaderSent,
    Transferring,
}

/// Retransmission parameters.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Timing {
    /// Ticks without an acknowledgement before the outstanding packet is resent.
    pub timeout_ticks: u32,
    /// Timeouts after which the session is abandoned.
    pub retry_limit: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            timeout_ticks: design_parameters::TIMEOUT_TICKS,
            retry_limit: design_parameters::RETRY_LIMIT,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Outstanding {
    Header,
    Data,
}

/// An in-flight waveform transfer.
#[derive(Debug, Clone)]
pub struct ActiveTransfer {
    header: Header,
    outstanding: Outstanding,
    start_offset: usize,
    bytes_left: u32,
    block_number: u32,
    bytes_in_previous: u32,
    last_send: u32,
    retries: u32,
}

impl ActiveTransfer {
    /// The header latched at session start.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Byte offset of the first waveform byte within the recorder buffer.
    pub fn start_offset(&self) -> usize {
        self.start_offset
    }

    /// Bytes not yet acknowledged, including those of the outstanding block.
    pub fn bytes_left(&self) -> u32 {
        self.bytes_left
    }

    pub fn block_number(&self) -> u32 {
        self.block_number
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn last_send(&self) -> u32 {
        self.last_send
    }

    fn phase(&self) -> Phase {
        match self.outstanding {
            Outstanding::Header => Phase::HeaderSent,
            Outstanding::Data => Phase::Transferring,
        }
    }
}

impl RecorderState {
    pub fn phase(&self) -> Phase {
        self.transfer
            .as_ref()
            .map(ActiveTransfer::phase)
            .unwrap_or(Phase::Idle)
    }

    /// Byte offset of the first waveform sample within the recorder buffer.
    ///
    /// # Args
    /// * `hardware` - The capture hardware.
    /// * `count` - The number of samples latched for the session. A ring window ends at the
    ///   write pointer and spans exactly these samples.
    fn start_offset<H: CaptureHardware>(&self, hardware: &H, count: u32) -> usize {
        let capacity = self.config.byte_capacity() as u64;
        let bytes_per_sample = self.config.bytes_per_sample as u64;
        let offset = match self.config.geometry {
            Geometry::Linear {
                hardware_pretrigger,
            } => {
                hardware_pretrigger.saturating_sub(self.pretrigger_count) as u64
                    * bytes_per_sample
            }
            Geometry::Ring => {
                let write_pointer = self
                    .read(hardware, Register::AddressPointer)
                    .wrapping_sub(self.bus_address(hardware))
                    as u64
                    % capacity;
                let length = count as u64 * bytes_per_sample % capacity;
                write_pointer + capacity - length
            }
        };
        (offset % capacity) as usize
    }

    /// Latch the completed acquisition and build its header.
    ///
    /// # Args
    /// * `hardware` - The capture hardware. The full flag must have been observed already.
    /// * `now` - The current tick count.
    ///
    /// # Returns
    /// The header packet to send to the subscriber.
    pub(super) fn start_session<H: CaptureHardware>(
        &mut self,
        hardware: &H,
        now: u32,
    ) -> Result<Packet, Error> {
        if self.transfer.is_some() {
            return Err(Error::Busy(self.config.index));
        }

        let count = self
            .read(hardware, Register::AcquisitionCount)
            .min(self.acquisition_count);
        let header = Header {
            waveform_number: self.waveform_number,
            recorder_number: self.config.index as u16,
            seconds: self.read(hardware, Register::TimestampSeconds),
            ticks: self.read(hardware, Register::TimestampTicks),
            byte_count: count.saturating_mul(self.config.bytes_per_sample),
        };
        let packet = header.packet()?;

        let transfer = ActiveTransfer {
            header,
            outstanding: Outstanding::Header,
            start_offset: self.start_offset(hardware, count),
            bytes_left: header.byte_count,
            block_number: 0,
            bytes_in_previous: 0,
            last_send: now,
            retries: 0,
        };
        log::info!(
            "Recorder {} waveform {}: {} bytes from offset {:#x}",
            self.config.index,
            header.waveform_number,
            header.byte_count,
            transfer.start_offset
        );
        self.transfer = Some(transfer);
        Ok(packet)
    }

    /// Build the data packet for the current block.
    fn data_packet<H: CaptureHardware>(
        &self,
        hardware: &H,
        transfer: &ActiveTransfer,
    ) -> Result<Packet, Error> {
        let buffer = self.config.buffer(hardware.memory())?;
        let offset = (transfer.start_offset
            + transfer.block_number as usize * WAVEFORM_PAYLOAD_CAPACITY)
            % buffer.len();
        let len = (transfer.bytes_left as usize).min(WAVEFORM_PAYLOAD_CAPACITY);

        let block = DataBlock {
            waveform_number: transfer.header.waveform_number,
            recorder_number: self.config.index as u32,
            block_number: transfer.block_number,
        };
        log::trace!(
            "Recorder {} block {} size {}",
            self.config.index,
            block.block_number,
            len
        );
        Ok(block.packet(len, |payload| ring::copy_wrapped(buffer, offset, payload))?)
    }

    /// Build the outstanding packet and record the send tick.
    ///
    /// A packet that cannot be built ends the session.
    fn send_outstanding<H: CaptureHardware>(
        &mut self,
        hardware: &H,
        now: u32,
    ) -> Option<Packet> {
        let mut transfer = self.transfer.take()?;
        let packet = match transfer.outstanding {
            Outstanding::Header => transfer.header.packet().map_err(Error::from),
            Outstanding::Data => {
                let packet = self.data_packet(hardware, &transfer);
                if packet.is_ok() {
                    transfer.bytes_in_previous =
                        transfer.bytes_left.min(WAVEFORM_PAYLOAD_CAPACITY as u32);
                }
                packet
            }
        };

        match packet {
            Ok(packet) => {
                transfer.last_send = now;
                self.transfer = Some(transfer);
                Some(packet)
            }
            Err(err) => {
                log::warn!(
                    "Recorder {} waveform {} dropped: {}",
                    self.config.index,
                    transfer.header.waveform_number,
                    err
                );
                None
            }
        }
    }

    /// Handle an acknowledgement from the subscriber.
    ///
    /// # Returns
    /// The next packet to send, or `None` if the acknowledgement is not for the current session
    /// or completes it.
    pub(super) fn on_ack<H: CaptureHardware>(
        &mut self,
        hardware: &H,
        ack: &Ack,
        now: u32,
    ) -> Option<Packet> {
        let index = self.config.index;
        let transfer = self.transfer.as_mut()?;
        if ack.recorder_number as usize != index
            || ack.waveform_number != transfer.header.waveform_number
        {
            log::debug!("Recorder {} stale ack {:?}", index, ack);
            return None;
        }

        if ack.block_number != transfer.block_number {
            if transfer.outstanding == Outstanding::Data
                && transfer.block_number.checked_sub(1) == Some(ack.block_number)
            {
                // The previous block was acknowledged twice: the subscriber missed the current one.
                log::debug!("Recorder {} duplicate ack {}", index, ack.block_number);
                return self.send_outstanding(hardware, now);
            }
            log::debug!(
                "Recorder {} ack {} while block {} is outstanding",
                index,
                ack.block_number,
                transfer.block_number
            );
            return None;
        }

        transfer.retries = 0;
        match transfer.outstanding {
            Outstanding::Header => transfer.outstanding = Outstanding::Data,
            Outstanding::Data => {
                transfer.block_number += 1;
                transfer.bytes_left = transfer
                    .bytes_left
                    .saturating_sub(transfer.bytes_in_previous);
            }
        }

        if transfer.bytes_left == 0 {
            log::info!(
                "Recorder {} waveform {} complete after {} blocks",
                index,
                transfer.header.waveform_number,
                transfer.block_number
            );
            self.transfer = None;
            return None;
        }

        self.send_outstanding(hardware, now)
    }

    /// Resend the outstanding packet if its acknowledgement is overdue.
    ///
    /// # Returns
    /// The packet to resend, or `None` if nothing is due. The session is abandoned once
    /// [Timing::retry_limit] timeouts have accumulated.
    pub(super) fn on_timeout<H: CaptureHardware>(
        &mut self,
        hardware: &H,
        timing: &Timing,
        now: u32,
    ) -> Option<Packet> {
        let index = self.config.index;
        let transfer = self.transfer.as_mut()?;
        if now.wrapping_sub(transfer.last_send) <= timing.timeout_ticks {
            return None;
        }

        transfer.retries += 1;
        if transfer.retries >= timing.retry_limit {
            log::warn!(
                "Recorder {} waveform {} abandoned after {} timeouts",
                index,
                transfer.header.waveform_number,
                transfer.retries
            );
            self.transfer = None;
            return None;
        }

        log::debug!(
            "Recorder {} resend block {} (retry {})",
            index,
            transfer.block_number,
            transfer.retries
        );
        self.send_outstanding(hardware, now)
    }
}
