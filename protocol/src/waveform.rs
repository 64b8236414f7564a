//! Waveform header, data block, acknowledgement and subscription messages.
use super::{
    expect, read_u16, read_u32, write_u16, write_u32, Error, Magic,
    WAVEFORM_PAYLOAD_CAPACITY,
};

/// Size of the fixed part of a data block, preceding the payload.
pub const DATA_HEADER_SIZE: usize = 16;

/// Size of the largest datagram sent by the publisher.
pub const MAX_PACKET_SIZE: usize = DATA_HEADER_SIZE + WAVEFORM_PAYLOAD_CAPACITY;

/// An outbound publisher datagram.
pub type Packet = heapless::Vec<u8, MAX_PACKET_SIZE>;

/// Announces a filled recorder and the size of the waveform that follows.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Header {
    pub waveform_number: u32,
    pub recorder_number: u16,
    pub seconds: u32,
    pub ticks: u32,
    pub byte_count: u32,
}

impl Header {
    pub const SIZE: usize = 24;

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0; Self::SIZE];
        write_u32(&mut buf, 0, Magic::WaveformHeader.into());
        write_u32(&mut buf, 4, self.waveform_number);
        write_u16(&mut buf, 8, self.recorder_number);
        // 10..12 is alignment padding
        write_u32(&mut buf, 12, self.seconds);
        write_u32(&mut buf, 16, self.ticks);
        write_u32(&mut buf, 20, self.byte_count);
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        expect(buf, Self::SIZE, Magic::WaveformHeader)?;
        Ok(Self {
            waveform_number: read_u32(buf, 4),
            recorder_number: read_u16(buf, 8),
            seconds: read_u32(buf, 12),
            ticks: read_u32(buf, 16),
            byte_count: read_u32(buf, 20),
        })
    }

    /// Serialize the header into an outbound packet.
    pub fn packet(&self) -> Result<Packet, Error> {
        Packet::from_slice(&self.encode()).or(Err(Error::Capacity))
    }
}

/// Identifies one block of waveform payload.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DataBlock {
    pub waveform_number: u32,
    pub recorder_number: u32,
    pub block_number: u32,
}

impl DataBlock {
    /// Build a data packet carrying `len` payload bytes.
    ///
    /// # Args
    /// * `len` - The number of payload bytes. At most [WAVEFORM_PAYLOAD_CAPACITY].
    /// * `fill` - Closure writing the payload into the provided slice of exactly `len` bytes.
    pub fn packet<F>(&self, len: usize, fill: F) -> Result<Packet, Error>
    where
        F: FnOnce(&mut [u8]),
    {
        if len > WAVEFORM_PAYLOAD_CAPACITY {
            return Err(Error::Capacity);
        }

        let mut header = [0; DATA_HEADER_SIZE];
        write_u32(&mut header, 0, Magic::WaveformData.into());
        write_u32(&mut header, 4, self.waveform_number);
        write_u32(&mut header, 8, self.recorder_number);
        write_u32(&mut header, 12, self.block_number);

        let mut packet = Packet::from_slice(&header).or(Err(Error::Capacity))?;
        packet
            .resize(DATA_HEADER_SIZE + len, 0)
            .or(Err(Error::Capacity))?;
        fill(&mut packet[DATA_HEADER_SIZE..]);
        Ok(packet)
    }

    /// Split a received data packet into its block identification and payload.
    pub fn decode(buf: &[u8]) -> Result<(Self, &[u8]), Error> {
        if buf.len() < DATA_HEADER_SIZE || buf.len() > MAX_PACKET_SIZE {
            return Err(Error::Length(buf.len(), DATA_HEADER_SIZE));
        }
        expect(&buf[..DATA_HEADER_SIZE], DATA_HEADER_SIZE, Magic::WaveformData)?;
        let block = Self {
            waveform_number: read_u32(buf, 4),
            recorder_number: read_u32(buf, 8),
            block_number: read_u32(buf, 12),
        };
        Ok((block, &buf[DATA_HEADER_SIZE..]))
    }
}

/// Acknowledgement of a header (block 0) or data block, requesting the next block.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Ack {
    pub waveform_number: u32,
    pub recorder_number: u32,
    pub block_number: u32,
}

impl Ack {
    pub const SIZE: usize = 16;

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0; Self::SIZE];
        write_u32(&mut buf, 0, Magic::WaveformAck.into());
        write_u32(&mut buf, 4, self.waveform_number);
        write_u32(&mut buf, 8, self.recorder_number);
        write_u32(&mut buf, 12, self.block_number);
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        expect(buf, Self::SIZE, Magic::WaveformAck)?;
        Ok(Self {
            waveform_number: read_u32(buf, 4),
            recorder_number: read_u32(buf, 8),
            block_number: read_u32(buf, 12),
        })
    }
}

/// Subscription request sent by the IOC to the publisher port.
///
/// # Note
/// The request carries no magic word. It is recognized by its length alone and also conveys the
/// fast orbit feedback index of the instrument.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub fofb_index: i16,
}

impl Subscription {
    pub const SIZE: usize = 2;

    pub fn encode(&self) -> [u8; Self::SIZE] {
        self.fofb_index.to_le_bytes()
    }

    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() != Self::SIZE {
            return Err(Error::Length(buf.len(), Self::SIZE));
        }
        Ok(Self {
            fofb_index: i16::from_le_bytes([buf[0], buf[1]]),
        })
    }
}
