//! Command requests and replies.
use arbitrary_int::{u4, u7};
use bitbybit::bitfield;
use heapless::String;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use super::{
    expect, read_u16, read_u32, write_u16, write_u32, Error, Magic,
    STRING_CAPACITY,
};

/// Command opcode.
///
/// The write bit selects between setting and reading a value. The group selects the subsystem.
/// Within the recorder group the low byte is split into an operation and a recorder index; the
/// general I/O group uses the whole low byte as its command number.
#[bitfield(u16, default = 0)]
#[derive(Debug, PartialEq, Eq)]
pub struct Opcode {
    #[bits(0..=3, rw)]
    pub index: u4,
    #[bits(4..=7, rw)]
    pub operation: u4,
    #[bits(8..=14, rw)]
    pub group: u7,
    #[bit(15, rw)]
    pub write: bool,
}

impl Opcode {
    /// The command number of the general I/O group.
    pub fn io_command(&self) -> u8 {
        (self.raw_value() & 0xFF) as u8
    }
}

/// Command groups, selected by bits 8 to 14 of the opcode.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum Group {
    IoPoint = 0x00,
    Recorder = 0x01,
    PerChannelValue = 0x02,
    EventTriggers = 0x03,
    TriggerDelay = 0x04,
}

/// A request to the command server.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Command {
    /// Sequence number chosen by the client, echoed in the reply.
    pub command_number: u32,
    pub opcode: Opcode,
    pub value: u32,
}

impl Command {
    pub const SIZE: usize = 16;

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0; Self::SIZE];
        write_u32(&mut buf, 0, Magic::Command.into());
        write_u32(&mut buf, 4, self.command_number);
        write_u16(&mut buf, 8, self.opcode.raw_value());
        write_u32(&mut buf, 12, self.value);
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        expect(buf, Self::SIZE, Magic::Command)?;
        Ok(Self {
            command_number: read_u32(buf, 4),
            opcode: Opcode::new_with_raw_value(read_u16(buf, 8)),
            value: read_u32(buf, 12),
        })
    }
}

/// The result carried by a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyPayload {
    Value(u32),
    Text(String<STRING_CAPACITY>),
}

impl ReplyPayload {
    /// Text payload, truncated to the reply string capacity.
    pub fn text(text: &str) -> Self {
        let mut s = String::new();
        for c in text.chars() {
            if s.push(c).is_err() {
                break;
            }
        }
        Self::Text(s)
    }
}

/// The answer to a [Command].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub command_number: u32,
    pub payload: ReplyPayload,
}

impl Reply {
    pub const SIZE: usize = 8 + STRING_CAPACITY;

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0; Self::SIZE];
        write_u32(&mut buf, 0, Magic::Reply.into());
        write_u32(&mut buf, 4, self.command_number);
        match &self.payload {
            ReplyPayload::Value(value) => write_u32(&mut buf, 8, *value),
            ReplyPayload::Text(text) => {
                buf[8..8 + text.len()].copy_from_slice(text.as_bytes())
            }
        }
        buf
    }

    /// Decode a reply.
    ///
    /// # Note
    /// The wire format does not say which payload variant is present. The receiver knows from
    /// the opcode of its request and picks the interpretation from the returned [RawReply].
    pub fn decode(buf: &[u8]) -> Result<RawReply, Error> {
        expect(buf, Self::SIZE, Magic::Reply)?;
        let mut result = [0; STRING_CAPACITY];
        result.copy_from_slice(&buf[8..]);
        Ok(RawReply {
            command_number: read_u32(buf, 4),
            result,
        })
    }
}

/// A received reply whose payload has not been interpreted yet.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RawReply {
    pub command_number: u32,
    pub result: [u8; STRING_CAPACITY],
}

impl RawReply {
    pub fn value(&self) -> u32 {
        read_u32(&self.result, 0)
    }

    /// The text payload up to the first NUL, or `None` if it is not valid UTF-8.
    pub fn text(&self) -> Option<&str> {
        let end = self
            .result
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(STRING_CAPACITY);
        core::str::from_utf8(&self.result[..end]).ok()
    }
}
