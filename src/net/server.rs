use core::net::SocketAddr;
use embedded_nal::UdpFullStack;
use num_enum::TryFromPrimitive;

use super::{BoundSocket, RECEIVE_BUFFER_SIZE};
use crate::hardware::CaptureHardware;
use crate::protocol::{Command, Group, Reply, ReplyPayload, COMMAND_UDP_PORT};
use crate::recorder::Recorders;
use crate::settings::DebugFlags;

/// A client change this soon after the previous one indicates two competing IOCs.
const DUPLICATE_CHANGE_SECONDS: u32 = 10;

/// How long the duplicate client condition is reported after it was last detected.
const DUPLICATE_HOLD_SECONDS: u32 = 15;

/// General I/O group commands handled by the firmware core.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, TryFromPrimitive)]
enum IoCommand {
    Debug = 1,
    Id = 2,
}

/// Revision strings reported through the identification command.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Identity {
    pub firmware: &'static str,
    pub software: &'static str,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            firmware: "",
            software: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Detects two IOCs talking to the same instrument.
///
/// Each IOC polls continuously, so competing clients show up as the command source changing back
/// and forth.
#[derive(Debug, Default)]
pub struct DuplicateClientMonitor {
    /// The latest client and when it took over.
    client: Option<(SocketAddr, u32)>,
    /// When a duplicate client was last detected.
    detected: Option<u32>,
}

impl DuplicateClientMonitor {
    /// Record the source of a command.
    pub fn observe(&mut self, client: SocketAddr, seconds: u32) {
        match self.client {
            Some((previous, _)) if previous == client => {}
            Some((previous, changed)) => {
                if seconds.wrapping_sub(changed) < DUPLICATE_CHANGE_SECONDS {
                    log::warn!("Duplicate IOC: {} after {}", client, previous);
                    self.detected = Some(seconds);
                }
                self.client = Some((client, seconds));
            }
            None => self.client = Some((client, seconds)),
        }
    }

    pub fn is_duplicate(&self, seconds: u32) -> bool {
        self.detected
            .is_some_and(|detected| seconds.wrapping_sub(detected) < DUPLICATE_HOLD_SECONDS)
    }
}

/// The latest executed command and its reply, resent if the client repeats the command.
#[derive(Debug)]
struct LastCommand {
    command_number: u32,
    opcode: u16,
    reply: Option<Reply>,
}

/// Command server.
pub struct CommandServer<N: UdpFullStack> {
    socket: BoundSocket<N>,
    identity: Identity,
    monitor: DuplicateClientMonitor,
    last: Option<LastCommand>,
}

impl<N> CommandServer<N>
where
    N: UdpFullStack,
    N::Error: core::fmt::Debug,
{
    /// Construct a command server.
    ///
    /// # Args
    /// * `stack` - The network stack used for the server socket.
    /// * `port` - The local UDP port, usually [COMMAND_UDP_PORT].
    /// * `identity` - Revision strings to report.
    pub fn new(stack: N, port: u16, identity: Identity) -> Self {
        Self {
            socket: BoundSocket::new(stack, port),
            identity,
            monitor: DuplicateClientMonitor::default(),
            last: None,
        }
    }

    /// Construct a command server on the standard port.
    pub fn with_default_port(stack: N, identity: Identity) -> Self {
        Self::new(stack, COMMAND_UDP_PORT, identity)
    }

    pub fn monitor(&self) -> &DuplicateClientMonitor {
        &self.monitor
    }

    /// Answer all pending commands.
    ///
    /// # Args
    /// * `recorders` - The waveform recorders.
    /// * `seconds` - Seconds since boot.
    pub fn process<H: CaptureHardware>(&mut self, recorders: &mut Recorders<H>, seconds: u32) {
        let mut buffer = [0u8; RECEIVE_BUFFER_SIZE];
        while let Some((len, remote)) = self.socket.receive(&mut buffer) {
            let Some(reply) = self.handle(&buffer[..len], remote, recorders, seconds) else {
                continue;
            };
            if let Err(err) = self.socket.send_to(remote, &reply.encode()) {
                log::warn!("Reply to {} failed: {:?}", remote, err);
            }
        }
    }

    fn handle<H: CaptureHardware>(
        &mut self,
        datagram: &[u8],
        remote: SocketAddr,
        recorders: &mut Recorders<H>,
        seconds: u32,
    ) -> Option<Reply> {
        let verbose = recorders.debug_flags().server();
        if verbose {
            log::info!("Server: {} bytes from {}", datagram.len(), remote);
        }
        self.monitor.observe(remote, seconds);

        let command = match Command::decode(datagram) {
            Ok(command) => command,
            Err(err) => {
                log::debug!("Server dropped datagram from {}: {}", remote, err);
                return None;
            }
        };
        if verbose {
            log::info!(
                "Command {} opcode {:#06x} value {}",
                command.command_number,
                command.opcode.raw_value(),
                command.value
            );
        }

        match &self.last {
            Some(last)
                if last.command_number == command.command_number
                    && last.opcode == command.opcode.raw_value() =>
            {
                log::debug!("Repeated command {}", command.command_number);
                return last.reply.clone();
            }
            _ => {}
        }

        let reply = self.execute(&command, recorders).map(|payload| Reply {
            command_number: command.command_number,
            payload,
        });
        self.last = Some(LastCommand {
            command_number: command.command_number,
            opcode: command.opcode.raw_value(),
            reply: reply.clone(),
        });
        reply
    }

    /// Execute a command.
    ///
    /// # Returns
    /// The reply payload, `None` for commands this firmware core does not implement.
    fn execute<H: CaptureHardware>(
        &self,
        command: &Command,
        recorders: &mut Recorders<H>,
    ) -> Option<ReplyPayload> {
        let opcode = command.opcode;
        let write = opcode.write().then_some(command.value);

        match Group::try_from(opcode.group().value()) {
            Ok(Group::Recorder) => recorders
                .command(opcode, command.value)
                .map(ReplyPayload::Value),
            Ok(Group::IoPoint) => match IoCommand::try_from(opcode.io_command()) {
                Ok(IoCommand::Debug) => {
                    if let Some(value) = write {
                        log::info!("Debug flags {:#x}", value);
                        recorders.set_debug_flags(DebugFlags::new_with_raw_value(value));
                    }
                    Some(ReplyPayload::Value(recorders.debug_flags().raw_value()))
                }
                Ok(IoCommand::Id) => Some(self.identify(command.value)),
                Err(_) => {
                    log::debug!("Unsupported I/O command {:#04x}", opcode.io_command());
                    None
                }
            },
            _ => {
                log::debug!("Unsupported opcode {:#06x}", opcode.raw_value());
                None
            }
        }
    }

    fn identify(&self, subaddress: u32) -> ReplyPayload {
        let text = match subaddress {
            0x00 => self.identity.firmware,
            0x01 => self.identity.software,
            _ => "Invalid subaddress",
        };
        ReplyPayload::text(text)
    }
}
