//! Waveform recorders
//!
//! # Design
//! [Recorders] is the single owner of the capture hardware and of every recorder's state. It is
//! driven from the network side: the publisher polls it for work and forwards acknowledgements,
//! the command server forwards recorder control requests. Each call returns at most one packet
//! for the publisher to send.
//!
//! Recorders are serviced round-robin, one per poll. A recorder whose buffer has filled is
//! latched and streamed to the subscriber before it is considered again.
use crate::hardware::{design_parameters::SOFT_TRIGGER_REGISTER, CaptureHardware};
use crate::protocol::{Ack, Opcode, Packet};
use crate::settings::{DebugFlags, Settings};
use crate::Error;

mod control;
pub mod diagnostic;
mod registry;
pub mod ring;
mod scheduler;
mod transfer;

pub use control::Operation;
pub use registry::{
    Geometry, RecorderConfig, RecorderKind, RecorderState, Registry, MAX_RECORDERS,
};
pub use scheduler::Scheduler;
pub use transfer::{ActiveTransfer, Phase, Timing};

/// A packet for the subscriber, produced by one recorder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub recorder: usize,
    pub packet: Packet,
}

pub struct Recorders<H> {
    hardware: H,
    registry: Registry,
    scheduler: Scheduler,
    timing: Timing,
    debug: DebugFlags,
}

impl<H: CaptureHardware> Recorders<H> {
    /// Take ownership of the capture hardware and initialize the recorders.
    ///
    /// # Args
    /// * `hardware` - The capture hardware.
    /// * `table` - The recorder table, usually [RecorderConfig::reference_table].
    /// * `settings` - Start-up counts, timing and debug flags.
    pub fn new(
        mut hardware: H,
        table: &[RecorderConfig],
        settings: &Settings,
    ) -> Result<Self, Error> {
        let registry = Registry::new(&mut hardware, table, &settings.recorders)?;
        Ok(Self {
            hardware,
            registry,
            scheduler: Scheduler::default(),
            timing: settings.timing(),
            debug: settings.debug_flags(),
        })
    }

    pub fn hardware(&self) -> &H {
        &self.hardware
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hardware
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Service the next recorder in turn.
    ///
    /// # Args
    /// * `now` - The current tick count.
    ///
    /// # Returns
    /// A header for a newly filled recorder or a retransmission, if any.
    pub fn check_for_work(&mut self, now: u32) -> Option<Outbound> {
        self.scheduler
            .poll(&mut self.registry, &mut self.hardware, &self.timing, now)
    }

    /// Handle a waveform acknowledgement from the subscriber.
    ///
    /// # Returns
    /// The next packet of the acknowledged transfer, if any.
    pub fn ack(&mut self, ack: &Ack, now: u32) -> Option<Outbound> {
        let index = ack.recorder_number as usize;
        let recorder = self.registry.recorder(index)?;
        let packet = recorder.on_ack(&self.hardware, ack, now)?;
        Some(Outbound {
            recorder: index,
            packet,
        })
    }

    /// Execute a recorder group command.
    ///
    /// # Returns
    /// The value to reply with, or `None` if the operation or recorder index is invalid.
    pub fn command(&mut self, opcode: Opcode, value: u32) -> Option<u32> {
        let operation = Operation::try_from(opcode.operation().value()).ok()?;
        let write = opcode.write().then_some(value);

        if operation == Operation::SoftTrigger {
            if write.is_some() {
                log::debug!("Recorder soft trigger");
                self.hardware.write(SOFT_TRIGGER_REGISTER, 0);
            }
            return Some(0);
        }

        let index = opcode.index().value() as usize;
        let recorder = self.registry.recorder(index)?;
        Some(recorder.control(
            &mut self.hardware,
            operation,
            write,
            self.debug.recorder_diagnostic(),
        ))
    }

    /// Drop the transfer of a recorder whose packet could not be sent.
    pub fn abandon(&mut self, index: usize) {
        self.registry.abandon(index);
    }

    pub fn debug_flags(&self) -> DebugFlags {
        self.debug
    }

    pub fn set_debug_flags(&mut self, flags: DebugFlags) {
        self.debug = flags;
    }

    /// Armed state of every recorder, recorder 0 in bit 0.
    pub fn armed_status(&self) -> u32 {
        self.registry
            .iter()
            .enumerate()
            .filter(|(_, recorder)| recorder.is_armed(&self.hardware))
            .fold(0, |status, (index, _)| status | 1 << index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Group;
    use crate::testing::{small_table, MockHardware};
    use arbitrary_int::{u4, u7};

    fn recorders() -> Recorders<MockHardware> {
        let table = small_table();
        let hw = MockHardware::new(&table);
        Recorders::new(hw, &table, &Settings::default()).unwrap()
    }

    fn opcode(operation: Operation, index: u8, write: bool) -> Opcode {
        Opcode::new_with_raw_value(0)
            .with_group(u7::new(Group::Recorder.into()))
            .with_operation(u4::new(operation.into()))
            .with_index(u4::new(index))
            .with_write(write)
    }

    #[test]
    fn soft_trigger_is_global() {
        let mut recorders = recorders();
        assert_eq!(
            recorders.command(opcode(Operation::SoftTrigger, 15, true), 0),
            Some(0)
        );
        assert_eq!(recorders.hardware().soft_triggers, 1);
        recorders.command(opcode(Operation::SoftTrigger, 0, false), 0);
        assert_eq!(recorders.hardware().soft_triggers, 1);
    }

    #[test]
    fn invalid_commands() {
        let mut recorders = recorders();
        assert_eq!(recorders.command(opcode(Operation::Arm, 5, true), 1), None);
        let unknown = opcode(Operation::Arm, 0, true).with_operation(u4::new(0x7));
        assert_eq!(recorders.command(unknown, 1), None);
    }

    #[test]
    fn armed_status() {
        let mut recorders = recorders();
        recorders.command(opcode(Operation::Arm, 1, true), 1);
        recorders.command(opcode(Operation::Arm, 3, true), 1);
        assert_eq!(recorders.armed_status(), 0b01010);
    }

    #[test]
    fn diagnostic_flag_follows_debug_flags() {
        let mut recorders = recorders();
        recorders.set_debug_flags(DebugFlags::new_with_raw_value(0x800));
        recorders.command(opcode(Operation::Arm, 2, true), 1);
        assert!(recorders.registry().get(2).unwrap().mode().diagnostic_mode());
    }
}
