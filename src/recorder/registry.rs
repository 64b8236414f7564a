use heapless::Vec;
use strum::{EnumIter, IntoEnumIterator, IntoStaticStr};

use super::ActiveTransfer;
use crate::hardware::{design_parameters::*, CaptureHardware, Csr, Register};
use crate::settings::RecorderDefaults;
use crate::Error;

/// Upper bound of the recorder table, set by the 4-bit recorder index of the command opcode.
pub const MAX_RECORDERS: usize = 16;

/// The capture engines of the reference instrument, in recorder index order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, EnumIter, IntoStaticStr)]
pub enum RecorderKind {
    /// Raw ADC samples: four 16-bit channels per sample.
    Adc,
    /// Turn-by-turn positions: X, Y, Sum, Q as 32-bit values.
    TurnByTurn,
    /// Fast acquisition positions: X, Y, Sum, Q as 32-bit values.
    FastAcquisition,
    /// Low pilot tone magnitudes: four 32-bit values.
    PilotToneLow,
    /// High pilot tone magnitudes: four 32-bit values.
    PilotToneHigh,
}

impl RecorderKind {
    fn register_base(&self) -> usize {
        match self {
            Self::Adc => ADC_RECORDER_BASE,
            Self::TurnByTurn => TBT_RECORDER_BASE,
            Self::FastAcquisition => FA_RECORDER_BASE,
            Self::PilotToneLow => PL_RECORDER_BASE,
            Self::PilotToneHigh => PH_RECORDER_BASE,
        }
    }

    fn bytes_per_sample(&self) -> u32 {
        match self {
            Self::Adc => 8,
            _ => 16,
        }
    }

    fn sample_capacity(&self) -> u32 {
        match self {
            Self::Adc => ADC_SAMPLE_CAPACITY,
            Self::TurnByTurn => TBT_SAMPLE_CAPACITY,
            Self::FastAcquisition => FA_SAMPLE_CAPACITY,
            Self::PilotToneLow | Self::PilotToneHigh => PT_SAMPLE_CAPACITY,
        }
    }

    fn geometry(&self) -> Geometry {
        match self {
            Self::Adc => Geometry::Linear {
                hardware_pretrigger: ADC_HW_PRETRIGGER_COUNT,
            },
            _ => Geometry::Ring,
        }
    }

    /// Start-up pretrigger and acquisition counts.
    pub fn defaults(&self) -> RecorderDefaults {
        match self {
            Self::Adc => RecorderDefaults {
                pretrigger_count: ADC_HW_PRETRIGGER_COUNT,
                acquisition_count: 1024 * 1024,
            },
            Self::TurnByTurn => RecorderDefaults {
                pretrigger_count: 40,
                acquisition_count: 10000,
            },
            _ => RecorderDefaults {
                pretrigger_count: 40,
                acquisition_count: 1000,
            },
        }
    }
}

/// How the capture engine lays a waveform into its buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Geometry {
    /// Capture starts at the buffer base with a fixed number of pretrigger samples.
    Linear { hardware_pretrigger: u32 },
    /// Capture wraps continuously; the write pointer marks the end of the window.
    Ring,
}

/// Immutable description of one recorder.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RecorderConfig {
    pub index: usize,
    pub kind: RecorderKind,
    /// Register file index of the recorder's CSR.
    pub register_base: usize,
    /// Byte offset of the buffer within acquisition memory.
    pub offset: usize,
    pub bytes_per_sample: u32,
    pub sample_capacity: u32,
    pub max_pretrigger: u32,
    pub geometry: Geometry,
}

impl RecorderConfig {
    /// The recorder table of the reference instrument, buffers packed back to back.
    pub fn reference_table() -> Vec<Self, MAX_RECORDERS> {
        let mut offset = 0;
        RecorderKind::iter()
            .enumerate()
            .map(|(index, kind)| {
                let sample_capacity = kind.sample_capacity();
                let config = Self {
                    index,
                    kind,
                    register_base: kind.register_base(),
                    offset,
                    bytes_per_sample: kind.bytes_per_sample(),
                    sample_capacity,
                    max_pretrigger: match kind.geometry() {
                        Geometry::Linear {
                            hardware_pretrigger,
                        } => hardware_pretrigger,
                        Geometry::Ring => sample_capacity,
                    },
                    geometry: kind.geometry(),
                };
                offset += config.byte_capacity();
                config
            })
            .collect()
    }

    pub fn byte_capacity(&self) -> usize {
        self.sample_capacity as usize * self.bytes_per_sample as usize
    }

    /// The recorder's buffer within acquisition memory.
    pub fn buffer<'a>(&self, memory: &'a [u8]) -> Result<&'a [u8], Error> {
        memory
            .get(self.offset..self.offset + self.byte_capacity())
            .ok_or(Error::Region(self.index))
    }
}

/// Configuration and run-time state of one recorder.
#[derive(Debug, Clone)]
pub struct RecorderState {
    pub(super) config: RecorderConfig,
    pub(super) pretrigger_count: u32,
    pub(super) acquisition_count: u32,
    pub(super) trigger_mask: u8,
    /// CSR mode bits, rewritten on every arm and when clearing the full flag.
    pub(super) mode: Csr,
    pub(super) waveform_number: u32,
    pub(super) transfer: Option<ActiveTransfer>,
}

impl RecorderState {
    fn new(config: RecorderConfig, defaults: RecorderDefaults) -> Self {
        Self {
            config,
            pretrigger_count: defaults.pretrigger_count.min(config.max_pretrigger),
            acquisition_count: defaults
                .acquisition_count
                .clamp(1, config.sample_capacity),
            trigger_mask: 0,
            mode: Csr::new_with_raw_value(0).with_reset_bar_mode(true),
            waveform_number: 1,
            transfer: None,
        }
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    pub fn index(&self) -> usize {
        self.config.index
    }

    pub fn pretrigger_count(&self) -> u32 {
        self.pretrigger_count
    }

    pub fn acquisition_count(&self) -> u32 {
        self.acquisition_count
    }

    pub fn trigger_mask(&self) -> u8 {
        self.trigger_mask
    }

    pub fn mode(&self) -> Csr {
        self.mode
    }

    pub fn waveform_number(&self) -> u32 {
        self.waveform_number
    }

    pub fn transfer(&self) -> Option<&ActiveTransfer> {
        self.transfer.as_ref()
    }

    /// Bus address of the recorder's buffer.
    pub fn bus_address<H: CaptureHardware>(&self, hardware: &H) -> u32 {
        hardware.memory_base().wrapping_add(self.config.offset as u32)
    }

    pub fn read<H: CaptureHardware>(&self, hardware: &H, reg: Register) -> u32 {
        hardware.read(self.config.register_base + u8::from(reg) as usize)
    }

    pub fn write<H: CaptureHardware>(
        &self,
        hardware: &mut H,
        reg: Register,
        value: u32,
    ) {
        log::trace!(
            "Recorder {} {:?} <- {:#010x}",
            self.config.index,
            reg,
            value
        );
        hardware.write(self.config.register_base + u8::from(reg) as usize, value);
    }

    pub fn csr<H: CaptureHardware>(&self, hardware: &H) -> Csr {
        Csr::new_with_raw_value(self.read(hardware, Register::Csr))
    }

    pub fn is_armed<H: CaptureHardware>(&self, hardware: &H) -> bool {
        self.csr(hardware).arm()
    }

    /// Drop any transfer in progress without notifying the subscriber.
    pub fn cancel(&mut self) {
        if let Some(transfer) = self.transfer.take() {
            log::info!(
                "Recorder {} waveform {} cancelled with {} bytes left",
                self.config.index,
                transfer.header().waveform_number,
                transfer.bytes_left()
            );
        }
    }
}

/// The recorder table together with each recorder's run-time state.
#[derive(Debug, Clone)]
pub struct Registry {
    recorders: Vec<RecorderState, MAX_RECORDERS>,
}

impl Registry {
    /// Set up the recorders.
    ///
    /// # Args
    /// * `hardware` - The capture hardware. Every recorder's write pointer is reset to the start
    ///   of its buffer and its CSR to the idle mode bits.
    /// * `table` - The recorder configurations, in recorder index order.
    /// * `defaults` - Start-up counts in recorder order. Missing entries use the kind defaults.
    pub fn new<H: CaptureHardware>(
        hardware: &mut H,
        table: &[RecorderConfig],
        defaults: &[RecorderDefaults],
    ) -> Result<Self, Error> {
        if table.len() > MAX_RECORDERS {
            return Err(Error::TooManyRecorders(MAX_RECORDERS));
        }

        let mut recorders = Vec::new();
        for (index, config) in table.iter().enumerate() {
            if config.index != index || config.byte_capacity() == 0 {
                return Err(Error::Region(index));
            }
            config.buffer(hardware.memory())?;

            let defaults = defaults
                .get(index)
                .copied()
                .unwrap_or_else(|| config.kind.defaults());
            let state = RecorderState::new(*config, defaults);
            state.write(
                hardware,
                Register::AddressPointer,
                state.bus_address(hardware),
            );
            state.write(hardware, Register::Csr, state.mode.raw_value());
            recorders
                .push(state)
                .or(Err(Error::TooManyRecorders(MAX_RECORDERS)))?;
        }

        log::info!("{} waveform recorders initialized", recorders.len());
        Ok(Self { recorders })
    }

    /// Look up a recorder, `None` if the index is out of range.
    pub fn recorder(&mut self, index: usize) -> Option<&mut RecorderState> {
        self.recorders.get_mut(index)
    }

    pub fn get(&self, index: usize) -> Option<&RecorderState> {
        self.recorders.get(index)
    }

    pub fn len(&self) -> usize {
        self.recorders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recorders.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RecorderState> {
        self.recorders.iter()
    }

    /// Return a recorder to idle after its packet could not be sent.
    pub fn abandon(&mut self, index: usize) {
        if let Some(recorder) = self.recorder(index) {
            if let Some(transfer) = recorder.transfer.take() {
                log::warn!(
                    "Recorder {} waveform {} abandoned at block {}",
                    index,
                    transfer.header().waveform_number,
                    transfer.block_number()
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{small_table, MockHardware};

    #[test]
    fn reference_table_layout() {
        let table = RecorderConfig::reference_table();
        assert_eq!(table.len(), 5);
        assert_eq!(table[0].byte_capacity(), 128 * 1024 * 1024);
        assert_eq!(table[1].offset, table[0].byte_capacity());
        assert_eq!(table[2].register_base, 76);
        assert_eq!(table[2].bytes_per_sample, 16);
        assert_eq!(table[3].max_pretrigger, 1024 * 1024);
        assert_eq!(
            table[0].geometry,
            Geometry::Linear {
                hardware_pretrigger: 3080
            }
        );
        let name: &'static str = table[4].kind.into();
        assert_eq!(name, "PilotToneHigh");
    }

    #[test]
    fn init_programs_hardware() {
        let table = small_table();
        let mut hw = MockHardware::new(&table);
        let registry = Registry::new(&mut hw, &table, &[]).unwrap();

        for recorder in registry.iter() {
            let cfg = recorder.config();
            assert_eq!(
                hw.registers[cfg.register_base + 3],
                hw.base + cfg.offset as u32
            );
            assert_eq!(hw.registers[cfg.register_base], 0x400);
            assert_eq!(recorder.waveform_number(), 1);
            assert!(recorder.transfer().is_none());
        }
    }

    #[test]
    fn lookup_out_of_range() {
        let table = small_table();
        let mut hw = MockHardware::new(&table);
        let mut registry = Registry::new(&mut hw, &table, &[]).unwrap();
        assert!(registry.recorder(4).is_some());
        assert!(registry.recorder(5).is_none());
        assert!(registry.get(15).is_none());
    }

    #[test]
    fn defaults_are_clamped() {
        let table = small_table();
        let mut hw = MockHardware::new(&table);
        let defaults = [RecorderDefaults {
            pretrigger_count: u32::MAX,
            acquisition_count: 0,
        }];
        let registry = Registry::new(&mut hw, &table, &defaults).unwrap();
        let adc = registry.get(0).unwrap();
        assert_eq!(adc.pretrigger_count(), table[0].max_pretrigger);
        assert_eq!(adc.acquisition_count(), 1);
    }

    #[test]
    fn buffer_outside_memory() {
        let table = small_table();
        let mut hw = MockHardware::new(&table);
        hw.memory.truncate(100);
        assert_eq!(
            Registry::new(&mut hw, &table, &[]).err(),
            Some(Error::Region(0))
        );
    }
}
