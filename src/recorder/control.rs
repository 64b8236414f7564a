use num_enum::{IntoPrimitive, TryFromPrimitive};

use super::RecorderState;
use crate::hardware::{CaptureHardware, Csr, Register};

/// Recorder group operations, selected by bits 4 to 7 of the opcode.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum Operation {
    Arm = 0x0,
    TriggerMask = 0x1,
    PretriggerCount = 0x2,
    AcquisitionCount = 0x3,
    AcquisitionMode = 0x4,
    SoftTrigger = 0x9,
}

impl RecorderState {
    /// Execute a recorder control operation.
    ///
    /// # Args
    /// * `hardware` - The capture hardware.
    /// * `operation` - The operation. The global soft trigger is not handled here.
    /// * `write` - The value to write, `None` to only read back.
    /// * `diagnostic` - Arm in diagnostic mode.
    ///
    /// # Returns
    /// The resulting value, after clamping.
    pub(super) fn control<H: CaptureHardware>(
        &mut self,
        hardware: &mut H,
        operation: Operation,
        write: Option<u32>,
        diagnostic: bool,
    ) -> u32 {
        match operation {
            Operation::Arm => {
                if let Some(value) = write {
                    self.arm(hardware, value != 0, diagnostic);
                }
                self.is_armed(hardware) as u32
            }
            Operation::TriggerMask => {
                if let Some(value) = write {
                    self.trigger_mask = value as u8;
                }
                self.trigger_mask as u32
            }
            Operation::PretriggerCount => {
                if let Some(value) = write {
                    self.pretrigger_count = value.min(self.config.max_pretrigger);
                }
                self.pretrigger_count
            }
            Operation::AcquisitionCount => {
                match write {
                    Some(0) => log::debug!(
                        "Recorder {} ignoring zero acquisition count",
                        self.config.index
                    ),
                    Some(value) => {
                        self.acquisition_count = value.min(self.config.sample_capacity)
                    }
                    None => {}
                }
                self.acquisition_count
            }
            Operation::AcquisitionMode => {
                if let Some(value) = write {
                    self.mode = self.mode.with_test_acquisition_mode(value != 0);
                }
                self.mode.test_acquisition_mode() as u32
            }
            Operation::SoftTrigger => 0,
        }
    }

    /// Arm or disarm the capture engine.
    ///
    /// Arming a disarmed recorder latches its counts into the hardware and starts a new waveform.
    /// Arming always cancels a transfer in progress.
    fn arm<H: CaptureHardware>(&mut self, hardware: &mut H, arm: bool, diagnostic: bool) {
        if arm {
            if !self.is_armed(hardware) {
                self.write(hardware, Register::AcquisitionCount, self.acquisition_count);
                self.write(hardware, Register::PretriggerCount, self.pretrigger_count);
                self.waveform_number = self.waveform_number.wrapping_add(1);
            }
            self.cancel();
        }

        self.mode = self.mode.with_diagnostic_mode(diagnostic);
        let csr = Csr::new_with_raw_value(self.mode.raw_value())
            .with_trigger_mask(self.trigger_mask)
            .with_arm(arm);
        self.write(hardware, Register::Csr, csr.raw_value());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::{Phase, Registry};
    use crate::testing::{small_table, MockHardware};

    fn setup() -> (MockHardware, Registry) {
        let table = small_table();
        let mut hw = MockHardware::new(&table);
        let registry = Registry::new(&mut hw, &table, &[]).unwrap();
        (hw, registry)
    }

    #[test]
    fn arm_latches_counts() {
        let (mut hw, mut registry) = setup();
        let base = small_table()[1].register_base;
        let recorder = registry.recorder(1).unwrap();
        recorder.control(&mut hw, Operation::TriggerMask, Some(0x181), false);
        recorder.control(&mut hw, Operation::AcquisitionCount, Some(77), false);
        recorder.control(&mut hw, Operation::PretriggerCount, Some(5), false);

        assert_eq!(recorder.control(&mut hw, Operation::Arm, Some(1), true), 1);
        assert_eq!(hw.registers[base + 2], 77);
        assert_eq!(hw.registers[base + 1], 5);
        assert_eq!(hw.registers[base], 0x8100_0501);
        assert_eq!(recorder.waveform_number(), 2);

        // Re-arming an armed recorder keeps the waveform number.
        recorder.control(&mut hw, Operation::Arm, Some(1), true);
        assert_eq!(recorder.waveform_number(), 2);

        assert_eq!(recorder.control(&mut hw, Operation::Arm, Some(0), false), 0);
        assert_eq!(hw.registers[base], 0x8100_0400);
        assert_eq!(recorder.control(&mut hw, Operation::Arm, None, false), 0);
    }

    #[test]
    fn arm_cancels_transfer() {
        let (mut hw, mut registry) = setup();
        let base = small_table()[2].register_base;
        hw.registers[base + 2] = 10;
        let recorder = registry.recorder(2).unwrap();
        recorder.start_session(&hw, 0).unwrap();
        assert_eq!(recorder.phase(), Phase::HeaderSent);

        recorder.control(&mut hw, Operation::Arm, Some(1), false);
        assert_eq!(recorder.phase(), Phase::Idle);
    }

    #[test]
    fn counts_are_clamped() {
        let (mut hw, mut registry) = setup();
        let config = small_table()[3];
        let recorder = registry.recorder(3).unwrap();

        assert_eq!(
            recorder.control(&mut hw, Operation::AcquisitionCount, Some(u32::MAX), false),
            config.sample_capacity
        );
        assert_eq!(
            recorder.control(&mut hw, Operation::AcquisitionCount, Some(0), false),
            config.sample_capacity
        );
        assert_eq!(
            recorder.control(&mut hw, Operation::PretriggerCount, Some(u32::MAX), false),
            config.max_pretrigger
        );
        assert_eq!(
            recorder.control(&mut hw, Operation::PretriggerCount, Some(0), false),
            0
        );
    }

    #[test]
    fn acquisition_mode() {
        let (mut hw, mut registry) = setup();
        let recorder = registry.recorder(0).unwrap();
        assert_eq!(
            recorder.control(&mut hw, Operation::AcquisitionMode, Some(7), false),
            1
        );
        assert!(recorder.mode().test_acquisition_mode());
        assert!(recorder.mode().reset_bar_mode());
        assert_eq!(
            recorder.control(&mut hw, Operation::AcquisitionMode, Some(0), false),
            0
        );
    }

    #[test]
    fn operation_codes() {
        assert!(matches!(Operation::try_from(0x9), Ok(Operation::SoftTrigger)));
        assert!(Operation::try_from(0x5).is_err());
        assert_eq!(u8::from(Operation::AcquisitionCount), 0x3);
    }
}
