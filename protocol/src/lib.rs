//! Beam position monitor datagram formats
//!
//! # Design
//! The instrument talks to its IOC over two UDP ports. The command port carries fixed-size
//! request/reply pairs. The publisher port carries unsolicited waveform headers, the data blocks
//! the IOC requests by acknowledging the previous packet, and the acknowledgements themselves.
//!
//! Every message starts with a 32-bit magic word identifying its type. All fields are
//! little-endian, matching the byte order of both ends of the link. Structures keep natural
//! alignment padding, e.g. the 16-bit recorder number in the waveform header is followed by two
//! pad bytes.
//!
//! ## Waveform transfer
//! When a recorder completes acquisition the instrument sends a [Header] unsolicited. The IOC
//! answers with an [Ack] for block 0, after which the instrument sends the first [DataBlock].
//! Each further [Ack] requests the next block. Headers and blocks are retransmitted if no
//! acknowledgement arrives in a reasonable interval.
#![cfg_attr(not(test), no_std)]

use num_enum::{IntoPrimitive, TryFromPrimitive};

mod command;
mod waveform;
pub use command::*;
pub use waveform::*;

/// UDP port of the command server.
pub const COMMAND_UDP_PORT: u16 = 7073;

/// UDP port of the publisher (subscriptions, waveforms and acknowledgements).
pub const PUBLISHER_UDP_PORT: u16 = 7074;

/// Maximum number of waveform bytes in one data block.
pub const WAVEFORM_PAYLOAD_CAPACITY: usize = 1440;

/// Size of the string variant of a command reply.
pub const STRING_CAPACITY: usize = 24;

/// Magic words identifying each message type.
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum Magic {
    Command = 0xCAFE_0001,
    Reply = 0xCAFE_0002,
    SystemMonitor = 0xCAFE_0003,
    SlowAcquisition = 0xCAFE_0004,
    WaveformHeader = 0xCAFE_0005,
    WaveformData = 0xCAFE_0006,
    WaveformAck = 0xCAFE_0007,
    FilterUpdate = 0xCAFE_000A,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("Datagram is {0} bytes, expected {1}")]
    Length(usize, usize),
    #[error("Unexpected magic {0:#010x}")]
    Magic(u32),
    #[error("Packet buffer exhausted")]
    Capacity,
}

/// Check the length and leading magic word of a received datagram.
fn expect(buf: &[u8], size: usize, magic: Magic) -> Result<(), Error> {
    if buf.len() != size {
        return Err(Error::Length(buf.len(), size));
    }
    let word = read_u32(buf, 0);
    if word != u32::from(magic) {
        return Err(Error::Magic(word));
    }
    Ok(())
}

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    let mut word = [0; 4];
    word.copy_from_slice(&buf[offset..offset + 4]);
    u32::from_le_bytes(word)
}

fn read_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

fn write_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn write_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}
