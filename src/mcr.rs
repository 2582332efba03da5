//! Media Clock Recovery HAL boundary.
//!
//! The actual clock-recovery algorithm lives in platform code; this
//! module only describes the calls the mapping core makes into it.

use crate::config::McrMode;

/// Capability set a clock-recovery backend must provide. `NullMcr`
/// below is the default no-op implementation used when `audio_mcr`
/// selects no recovery mode.
pub trait MediaClockRecovery {
    fn open(&mut self, mode: McrMode, timestamp_interval: u32, recovery_interval: u32);
    fn close(&mut self);
    fn on_timestamp(&mut self, timestamp: u32);
}

/// No-op backend used when clock recovery is disabled.
#[derive(Debug, Default)]
pub struct NullMcr;

impl MediaClockRecovery for NullMcr {
    fn open(&mut self, _mode: McrMode, _timestamp_interval: u32, _recovery_interval: u32) {}
    fn close(&mut self) {}
    fn on_timestamp(&mut self, _timestamp: u32) {}
}
