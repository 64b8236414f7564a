//! Test doubles for the capture hardware.
use crate::hardware::{design_parameters::SOFT_TRIGGER_REGISTER, CaptureHardware};
use crate::recorder::{Geometry, RecorderConfig, RecorderKind};

/// A scaled-down version of the reference recorder table.
pub fn small_table() -> [RecorderConfig; 5] {
    let mut offset = 0;
    let mut table = [
        (RecorderKind::Adc, 64, 8, 512, 64),
        (RecorderKind::TurnByTurn, 70, 16, 1024, 1024),
        (RecorderKind::FastAcquisition, 76, 16, 1024, 1024),
        (RecorderKind::PilotToneLow, 82, 16, 256, 256),
        (RecorderKind::PilotToneHigh, 88, 16, 256, 256),
    ]
    .map(
        |(kind, register_base, bytes_per_sample, sample_capacity, max_pretrigger)| {
            RecorderConfig {
                index: 0,
                kind,
                register_base,
                offset: 0,
                bytes_per_sample,
                sample_capacity,
                max_pretrigger,
                geometry: Geometry::Ring,
            }
        },
    );

    for (index, config) in table.iter_mut().enumerate() {
        config.index = index;
        config.offset = offset;
        offset += config.byte_capacity();
    }
    table[0].geometry = Geometry::Linear {
        hardware_pretrigger: 64,
    };
    table
}

pub struct MockHardware {
    pub registers: [u32; 128],
    pub memory: Vec<u8>,
    pub base: u32,
    pub flushes: usize,
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
            registers: [0; 128],
            memory: vec![0; size],
            base: 0x2000_0000,
            flushes: 0,
            soft_triggers: 0,
        }
    }

    /// Fill a recorder buffer with a byte pattern that does not repeat every block.
    pub fn fill_pattern(&mut self, config: &RecorderConfig) {
        let buffer = &mut self.memory[config.offset..config.offset + config.byte_capacity()];
        for (i, byte) in buffer.iter_mut().enumerate() {
            *byte = (i % 251) as u8;
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

    fn flush_cache(&mut self) {
        self.flushes += 1;
    }
}
