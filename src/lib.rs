//! Beam position monitor firmware core
//!
//! # Design
//! The instrument carries several waveform recorders, each a hardware capture engine writing into
//! its own buffer in acquisition memory. When a recorder fills, its contents are streamed to the
//! subscribed IOC as a header followed by acknowledged data blocks over UDP. The IOC controls the
//! recorders through the command server.
//!
//! Everything here is single-threaded and non-blocking. The board support package owns the poll
//! loop: on every iteration it lets the [net::CommandServer] and [net::Publisher] process their
//! sockets. The publisher in turn runs the recorder scheduler, which emits at most one packet per
//! iteration. Waiting for an acknowledgement is durable state inspected on the next event, never
//! a blocked call.
#![cfg_attr(not(test), no_std)]

pub mod hardware;
pub mod net;
pub mod recorder;
pub mod settings;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testing;

pub use bpm_protocol as protocol;

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("Protocol: {0}")]
    Protocol(#[from] bpm_protocol::Error),
    #[error("Recorder {0} has a transfer in progress")]
    Busy(usize),
    #[error("Recorder {0} buffer lies outside acquisition memory")]
    Region(usize),
    #[error("Recorder table holds more than {0} recorders")]
    TooManyRecorders(usize),
}
