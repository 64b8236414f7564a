use super::{diagnostic, Outbound, Phase, Registry, Timing};
use crate::hardware::{CaptureHardware, Register};

/// Round-robin selection of the recorder to service.
#[derive(Debug, Default)]
pub struct Scheduler {
    next: usize,
}

impl Scheduler {
    /// Service one recorder.
    ///
    /// An idle recorder with a full buffer has its full flag cleared and a session started. An
    /// active recorder has its outstanding packet resent if the acknowledgement is overdue.
    pub fn poll<H: CaptureHardware>(
        &mut self,
        registry: &mut Registry,
        hardware: &mut H,
        timing: &Timing,
        now: u32,
    ) -> Option<Outbound> {
        if registry.is_empty() {
            return None;
        }
        let index = self.next % registry.len();
        self.next = (index + 1) % registry.len();
        let recorder = registry.recorder(index)?;

        let packet = match recorder.phase() {
            Phase::Idle => {
                let csr = recorder.csr(hardware);
                if !csr.full() {
                    return None;
                }
                log::debug!("Recorder {} is full", index);
                recorder.write(hardware, Register::Csr, recorder.mode().raw_value());
                hardware.flush_cache();
                if csr.diagnostic_mode() {
                    diagnostic::check(recorder, hardware);
                }
                recorder
                    .start_session(hardware, now)
                    .map_err(|err| log::warn!("Recorder {} session not started: {}", index, err))
                    .ok()?
            }
            Phase::HeaderSent | Phase::Transferring => {
                recorder.on_timeout(hardware, timing, now)?
            }
        };

        Some(Outbound {
            recorder: index,
            packet,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Header;
    use crate::testing::{small_table, MockHardware};

    const FULL: u32 = 0x80;

    #[test]
    fn round_robin() {
        let table = small_table();
        let mut hw = MockHardware::new(&table);
        let mut registry = Registry::new(&mut hw, &table, &[]).unwrap();
        let mut scheduler = Scheduler::default();
        let timing = Timing::default();

        hw.registers[table[1].register_base] |= FULL;
        hw.registers[table[3].register_base] |= FULL;

        let serviced: Vec<_> = (0..5)
            .filter_map(|_| scheduler.poll(&mut registry, &mut hw, &timing, 0))
            .map(|out| out.recorder)
            .collect();
        assert_eq!(serviced, [1, 3]);

        // The full flag was acknowledged and the header latched.
        assert_eq!(hw.registers[table[1].register_base], 0x400);
        assert_eq!(hw.flushes, 2);
        assert_eq!(registry.get(3).unwrap().phase(), Phase::HeaderSent);
        assert!((0..5)
            .filter_map(|_| scheduler.poll(&mut registry, &mut hw, &timing, 0))
            .next()
            .is_none());
    }

    #[test]
    fn retransmits_overdue_header() {
        let table = small_table();
        let mut hw = MockHardware::new(&table);
        let mut registry = Registry::new(&mut hw, &table, &[]).unwrap();
        let mut scheduler = Scheduler::default();
        let timing = Timing {
            timeout_ticks: 10,
            retry_limit: 2,
        };

        hw.registers[table[0].register_base] |= FULL;
        hw.registers[table[0].register_base + 2] = 4;
        let first = scheduler.poll(&mut registry, &mut hw, &timing, 0).unwrap();
        assert_eq!(Header::decode(&first.packet).unwrap().byte_count, 32);

        for _ in 0..4 {
            assert!(scheduler.poll(&mut registry, &mut hw, &timing, 5).is_none());
        }
        let resent = scheduler.poll(&mut registry, &mut hw, &timing, 11).unwrap();
        assert_eq!(resent, first);

        for _ in 0..4 {
            scheduler.poll(&mut registry, &mut hw, &timing, 11);
        }
        assert!(scheduler.poll(&mut registry, &mut hw, &timing, 22).is_none());
        assert_eq!(registry.get(0).unwrap().phase(), Phase::Idle);
    }

    #[test]
    fn diagnostic_runs_before_header() {
        let table = small_table();
        let mut hw = MockHardware::new(&table);
        let mut registry = Registry::new(&mut hw, &table, &[]).unwrap();
        let mut scheduler = Scheduler::default();

        hw.registers[table[0].register_base] |= FULL | 0x100;
        hw.registers[table[0].register_base + 2] = 8;
        let out = scheduler
            .poll(&mut registry, &mut hw, &Timing::default(), 0)
            .unwrap();
        assert_eq!(out.recorder, 0);
    }
}
