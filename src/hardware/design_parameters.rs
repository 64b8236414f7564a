/// Processor clock frequency. The tick counter used for protocol timeouts runs at this rate.
pub const SYSTEM_CLOCK_HZ: u32 = 100_000_000;

/// Interval without an acknowledgement after which a waveform packet is retransmitted.
pub const TIMEOUT_TICKS: u32 = SYSTEM_CLOCK_HZ;

/// Number of timeouts after which a waveform transfer is abandoned.
pub const RETRY_LIMIT: u32 = 10;

/// The ADC recorder captures into a linear buffer with this many samples before the trigger.
pub const ADC_HW_PRETRIGGER_COUNT: u32 = 3080;

// Sample capacities of the recorder buffers.
pub const ADC_SAMPLE_CAPACITY: u32 = 16 * 1024 * 1024;
pub const TBT_SAMPLE_CAPACITY: u32 = 4 * 1024 * 1024;
pub const FA_SAMPLE_CAPACITY: u32 = 4 * 1024 * 1024;
pub const PT_SAMPLE_CAPACITY: u32 = 1024 * 1024;

// Register file indices of the recorder register blocks.
pub const ADC_RECORDER_BASE: usize = 64;
pub const TBT_RECORDER_BASE: usize = 70;
pub const FA_RECORDER_BASE: usize = 76;
pub const PL_RECORDER_BASE: usize = 82;
pub const PH_RECORDER_BASE: usize = 88;

/// Writing any value fires the global software trigger.
pub const SOFT_TRIGGER_REGISTER: usize = 94;
