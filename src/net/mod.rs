//! IOC network interface
//!
//! # Design
//! Two UDP ports face the IOC. The command server answers control requests, one reply per
//! request. The publisher carries waveforms: the IOC subscribes to it, after which every header
//! and data block goes to the subscriber and its acknowledgements come back on the same port.
//!
//! Both are polled from the board support package main loop and never block. Sockets are opened
//! lazily on the first poll and reopened after a failure, so the network stack may come up after
//! the firmware core.
use core::net::SocketAddr;
use embedded_nal::{nb, UdpFullStack};

mod publisher;
mod server;

pub use publisher::Publisher;
pub use server::{CommandServer, DuplicateClientMonitor, Identity};

/// Size of the receive buffer. Every datagram the firmware accepts is smaller.
const RECEIVE_BUFFER_SIZE: usize = 64;

/// A socket bound to a local port, opened on first use.
struct BoundSocket<N: UdpFullStack> {
    stack: N,
    socket: Option<N::UdpSocket>,
    port: u16,
}

impl<N> BoundSocket<N>
where
    N: UdpFullStack,
    N::Error: core::fmt::Debug,
{
    fn new(stack: N, port: u16) -> Self {
        Self {
            stack,
            socket: None,
            port,
        }
    }

    fn open(&mut self) -> Result<(), N::Error> {
        if self.socket.is_some() {
            return Ok(());
        }

        let mut socket = self.stack.socket()?;
        if let Err(err) = self.stack.bind(&mut socket, self.port) {
            self.stack.close(socket).ok();
            return Err(err);
        }
        log::info!("Listening on UDP port {}", self.port);
        self.socket.replace(socket);
        Ok(())
    }

    fn close(&mut self) {
        if let Some(socket) = self.socket.take() {
            log::info!("Closing UDP port {}", self.port);
            self.stack.close(socket).ok();
        }
    }

    /// Receive one pending datagram.
    ///
    /// # Returns
    /// The datagram length and its source, `None` if nothing is pending.
    fn receive(&mut self, buffer: &mut [u8]) -> Option<(usize, SocketAddr)> {
        if let Err(err) = self.open() {
            log::debug!("UDP port {} unavailable: {:?}", self.port, err);
            return None;
        }
        let socket = self.socket.as_mut()?;

        match self.stack.receive(socket, buffer) {
            Ok((len, remote)) => Some((len.min(buffer.len()), remote)),
            Err(nb::Error::WouldBlock) => None,
            Err(nb::Error::Other(err)) => {
                log::warn!("UDP port {} receive failed: {:?}", self.port, err);
                self.close();
                None
            }
        }
    }

    fn send_to(
        &mut self,
        remote: SocketAddr,
        data: &[u8],
    ) -> nb::Result<(), N::Error> {
        let Some(socket) = self.socket.as_mut() else {
            return Err(nb::Error::WouldBlock);
        };
        self.stack.send_to(socket, remote, data)
    }
}
