//! NOL manager configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Regulatory non-occupancy period: 30 minutes
pub const DEFAULT_NOL_TIMEOUT_MS: u64 = 30 * 60 * 1000;

/// Width assumed for radar events (MHz)
pub const DEFAULT_CHANNEL_WIDTH_MHZ: u32 = 20;

/// NOL manager configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NolConfig {
    /// Exclusion period applied to radar events (ms)
    pub nol_timeout_ms: u64,
    /// Channel width applied to radar events (MHz)
    pub channel_width_mhz: u32,
    /// Maximum number of entries the store will hold
    pub max_entries: usize,
    /// Also push the channel list to the notifier after every `add_channel`
    pub notify_on_add: bool,
    /// Capacity of the broadcast event stream
    pub event_capacity: usize,
}

impl Default for NolConfig {
    fn default() -> Self {
        Self {
            nol_timeout_ms: DEFAULT_NOL_TIMEOUT_MS,
            channel_width_mhz: DEFAULT_CHANNEL_WIDTH_MHZ,
            max_entries: 256,
            notify_on_add: false,
            event_capacity: 64,
        }
    }
}

impl NolConfig {
    /// Exclusion period as a `Duration`
    pub fn nol_timeout(&self) -> Duration {
        Duration::from_millis(self.nol_timeout_ms)
    }
}
