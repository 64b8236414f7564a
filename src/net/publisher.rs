use core::net::SocketAddr;
use embedded_nal::UdpFullStack;

use super::{BoundSocket, RECEIVE_BUFFER_SIZE};
use crate::hardware::CaptureHardware;
use crate::protocol::{Ack, Subscription, PUBLISHER_UDP_PORT};
use crate::recorder::{Outbound, Recorders};

/// Waveform publisher.
///
/// # Note
/// Nothing is sent until an IOC subscribes. Acknowledgements are only honoured once a subscriber
/// is known, but are not required to come from it.
pub struct Publisher<N: UdpFullStack> {
    socket: BoundSocket<N>,
    subscriber: Option<SocketAddr>,
    fofb_index: Option<i16>,
}

impl<N> Publisher<N>
where
    N: UdpFullStack,
    N::Error: core::fmt::Debug,
{
    /// Construct a publisher.
    ///
    /// # Args
    /// * `stack` - The network stack used for the publisher socket.
    /// * `port` - The local UDP port, usually [PUBLISHER_UDP_PORT].
    pub fn new(stack: N, port: u16) -> Self {
        Self {
            socket: BoundSocket::new(stack, port),
            subscriber: None,
            fofb_index: None,
        }
    }

    /// Construct a publisher on the standard port.
    pub fn with_default_port(stack: N) -> Self {
        Self::new(stack, PUBLISHER_UDP_PORT)
    }

    pub fn subscriber(&self) -> Option<SocketAddr> {
        self.subscriber
    }

    /// The fast orbit feedback index announced by the latest subscription.
    pub fn fofb_index(&self) -> Option<i16> {
        self.fofb_index
    }

    /// Handle pending datagrams and send any waveform packet that is due.
    ///
    /// # Args
    /// * `recorders` - The waveform recorders.
    /// * `now` - The current tick count.
    pub fn process<H: CaptureHardware>(&mut self, recorders: &mut Recorders<H>, now: u32) {
        let mut buffer = [0u8; RECEIVE_BUFFER_SIZE];
        while let Some((len, remote)) = self.socket.receive(&mut buffer) {
            if let Some(outbound) = self.handle(&buffer[..len], remote, recorders, now) {
                self.send(outbound, recorders);
            }
        }

        if self.subscriber.is_some() {
            if let Some(outbound) = recorders.check_for_work(now) {
                self.send(outbound, recorders);
            }
        }
    }

    fn handle<H: CaptureHardware>(
        &mut self,
        datagram: &[u8],
        remote: SocketAddr,
        recorders: &mut Recorders<H>,
        now: u32,
    ) -> Option<Outbound> {
        if recorders.debug_flags().publisher() {
            log::info!(
                "Publisher: {} bytes ({:#04x}) from {}",
                datagram.len(),
                datagram.first().copied().unwrap_or(0),
                remote
            );
        }

        match datagram.len() {
            Subscription::SIZE => {
                let subscription = Subscription::decode(datagram).ok()?;
                if self.fofb_index != Some(subscription.fofb_index) {
                    log::info!("FOFB index {}", subscription.fofb_index);
                    self.fofb_index = Some(subscription.fofb_index);
                }
                if self.subscriber != Some(remote) {
                    log::info!("Subscriber {}", remote);
                }
                self.subscriber = Some(remote);
                None
            }
            Ack::SIZE if self.subscriber.is_some() => match Ack::decode(datagram) {
                Ok(ack) => recorders.ack(&ack, now),
                Err(err) => {
                    log::debug!("Publisher dropped datagram from {}: {}", remote, err);
                    None
                }
            },
            len => {
                log::debug!("Publisher dropped {} byte datagram from {}", len, remote);
                None
            }
        }
    }

    /// Send a packet to the subscriber, abandoning its transfer if that fails.
    fn send<H: CaptureHardware>(&mut self, outbound: Outbound, recorders: &mut Recorders<H>) {
        let Some(subscriber) = self.subscriber else {
            return;
        };
        if let Err(err) = self.socket.send_to(subscriber, &outbound.packet) {
            log::warn!(
                "Recorder {} packet to {} failed: {:?}",
                outbound.recorder,
                subscriber,
                err
            );
            recorders.abandon(outbound.recorder);
        }
    }
}
