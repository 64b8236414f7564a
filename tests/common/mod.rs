#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::ops::Range;
use std::rc::Rc;

use bpm::hardware::{design_parameters::SOFT_TRIGGER_REGISTER, CaptureHardware};
use bpm::recorder::RecorderConfig;
use embedded_nal::{nb, UdpClientStack, UdpFullStack};

pub const FULL: u32 = 0x80;

/// Register file and acquisition memory of a board, without capture engines.
pub struct MockHardware {
    pub registers: Vec<u32>,
    pub memory: Vec<u8>,
    pub base: u32,
    pub soft_triggers: usize,
}

impl MockHardware {
    pub fn new(table: &[RecorderConfig]) -> Self {
        let size = table
            .iter()
            .map(|config| config.offset + config.byte_capacity())
            .max()
            .unwrap_or(0);
        Self {
            registers: vec![0; 128],
            memory: vec![0; size],
            base: 0x2000_0000,
            soft_triggers: 0,
        }
    }

    /// Simulate a completed acquisition of `count` samples ending at `end` bytes into the buffer.
    pub fn complete(&mut self, config: &RecorderConfig, count: u32, end: usize) {
        let base = config.register_base;
        self.registers[base] |= FULL;
        self.registers[base + 2] = count;
        self.registers[base + 3] = self.base + (config.offset + end) as u32;
        self.registers[base + 4] = 1_700_000_000;
        self.registers[base + 5] = 42;
    }

    /// Fill part of a recorder buffer with a pattern derived from the buffer offset.
    pub fn fill_pattern(&mut self, config: &RecorderConfig, range: Range<usize>) {
        for i in range {
            self.memory[config.offset + i] = pattern(i);
        }
    }
}

impl CaptureHardware for MockHardware {
    fn read(&self, index: usize) -> u32 {
        self.registers[index]
    }

    fn write(&mut self, index: usize, value: u32) {
        if index == SOFT_TRIGGER_REGISTER {
            self.soft_triggers += 1;
        }
        self.registers[index] = value;
    }

    fn memory(&self) -> &[u8] {
        &self.memory
    }

    fn memory_base(&self) -> u32 {
        self.base
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MockError;

#[derive(Default)]
pub struct Network {
    /// Datagrams waiting to be received, per local port.
    pub inbound: HashMap<u16, VecDeque<(SocketAddr, Vec<u8>)>>,
    /// Datagrams sent: local port, destination and payload.
    pub sent: Vec<(u16, SocketAddr, Vec<u8>)>,
    pub fail_sends: bool,
}

/// A loopback network stack shared by the publisher, the server and the test.
#[derive(Clone, Default)]
pub struct MockStack(pub Rc<RefCell<Network>>);

pub struct MockSocket {
    port: Option<u16>,
}

impl MockStack {
    pub fn deliver(&self, port: u16, from: SocketAddr, data: &[u8]) {
        self.0
            .borrow_mut()
            .inbound
            .entry(port)
            .or_default()
            .push_back((from, data.to_vec()));
    }

    /// Take every datagram sent so far.
    pub fn take_sent(&self) -> Vec<(u16, SocketAddr, Vec<u8>)> {
        std::mem::take(&mut self.0.borrow_mut().sent)
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.0.borrow_mut().fail_sends = fail;
    }
}

impl UdpClientStack for MockStack {
    type UdpSocket = MockSocket;
    type Error = MockError;

    fn socket(&mut self) -> Result<MockSocket, MockError> {
        Ok(MockSocket { port: None })
    }

    fn connect(
        &mut self,
        _socket: &mut MockSocket,
        _remote: SocketAddr,
    ) -> Result<(), MockError> {
        Ok(())
    }

    fn send(&mut self, _socket: &mut MockSocket, _buffer: &[u8]) -> nb::Result<(), MockError> {
        Err(nb::Error::Other(MockError))
    }

    fn receive(
        &mut self,
        socket: &mut MockSocket,
        buffer: &mut [u8],
    ) -> nb::Result<(usize, SocketAddr), MockError> {
        let port = socket.port.ok_or(nb::Error::Other(MockError))?;
        let mut network = self.0.borrow_mut();
        let (from, data) = network
            .inbound
            .get_mut(&port)
            .and_then(|queue| queue.pop_front())
            .ok_or(nb::Error::WouldBlock)?;
        let len = data.len().min(buffer.len());
        buffer[..len].copy_from_slice(&data[..len]);
        Ok((len, from))
    }

    fn close(&mut self, _socket: MockSocket) -> Result<(), MockError> {
        Ok(())
    }
}

impl UdpFullStack for MockStack {
    fn bind(&mut self, socket: &mut MockSocket, local_port: u16) -> Result<(), MockError> {
        socket.port = Some(local_port);
        Ok(())
    }

    fn send_to(
        &mut self,
        socket: &mut MockSocket,
        remote: SocketAddr,
        buffer: &[u8],
    ) -> nb::Result<(), MockError> {
        let mut network = self.0.borrow_mut();
        if network.fail_sends {
            return Err(nb::Error::WouldBlock);
        }
        let port = socket.port.ok_or(nb::Error::Other(MockError))?;
        network.sent.push((port, remote, buffer.to_vec()));
        Ok(())
    }
}

pub fn pattern(offset: usize) -> u8 {
    (offset % 251) as u8
}

pub fn ioc(last: u8) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 168, 1, last)), 50000)
}
