//! NOL entries and their exported record form

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::scheduler::{TimerHandle, TimerId};

/// Identity of an excluded channel: center frequency and width (MHz)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelKey {
    /// Center frequency in MHz
    pub frequency: u32,
    /// Channel width in MHz
    pub channel_width: u32,
}

impl ChannelKey {
    /// Create a key
    pub fn new(frequency: u32, channel_width: u32) -> Self {
        Self {
            frequency,
            channel_width,
        }
    }
}

impl std::fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} MHz / {} MHz", self.frequency, self.channel_width)
    }
}

/// Fixed record exchanged with the notifier and used for persistence
///
/// `start_time` is in scheduler ticks (milliseconds), `timeout_ms` is the
/// full exclusion period measured from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NolRecord {
    /// Center frequency in MHz
    pub frequency: u32,
    /// Channel width in MHz
    pub channel_width: u32,
    /// Tick at which the exclusion started or was last refreshed
    pub start_time: u64,
    /// Exclusion period in milliseconds
    pub timeout_ms: u32,
}

impl NolRecord {
    /// Key of the channel this record describes
    pub fn key(&self) -> ChannelKey {
        ChannelKey::new(self.frequency, self.channel_width)
    }

    /// Exclusion period as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.timeout_ms))
    }

    /// Time elapsed since `start_time` as seen at `now_ticks`
    ///
    /// A start time in the future counts as no time elapsed.
    pub fn elapsed(&self, now_ticks: u64) -> Duration {
        Duration::from_millis(now_ticks.saturating_sub(self.start_time))
    }

    /// Exclusion time left at `now_ticks`, `None` once it has run out
    pub fn remaining(&self, now_ticks: u64) -> Option<Duration> {
        self.timeout()
            .checked_sub(self.elapsed(now_ticks))
            .filter(|left| !left.is_zero())
    }
}

/// Clamp a duration into the record's millisecond field
pub(crate) fn timeout_to_ms(timeout: Duration) -> u32 {
    u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX)
}

/// One excluded channel and the timer that will release it
#[derive(Debug)]
pub struct NolEntry {
    key: ChannelKey,
    start_time: u64,
    timeout: Duration,
    timer_id: TimerId,
    timer: TimerHandle,
}

impl NolEntry {
    /// Create an entry that owns an already armed timer
    pub fn new(
        key: ChannelKey,
        start_time: u64,
        timeout: Duration,
        timer_id: TimerId,
        timer: TimerHandle,
    ) -> Self {
        Self {
            key,
            start_time,
            timeout,
            timer_id,
            timer,
        }
    }

    /// Channel this entry excludes
    pub fn key(&self) -> ChannelKey {
        self.key
    }

    /// Center frequency in MHz
    pub fn frequency(&self) -> u32 {
        self.key.frequency
    }

    /// Channel width in MHz
    pub fn channel_width(&self) -> u32 {
        self.key.channel_width
    }

    /// Tick at insertion or last refresh
    pub fn start_time(&self) -> u64 {
        self.start_time
    }

    /// Exclusion period
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Identity of the timer currently armed for this entry
    pub fn timer_id(&self) -> TimerId {
        self.timer_id
    }

    /// Cancel the pending timer
    ///
    /// Must happen before a replacement timer is armed or the entry is dropped.
    pub fn cancel_timer(&mut self) {
        self.timer.cancel();
    }

    /// Restart the exclusion period with a freshly armed timer
    ///
    /// The previous timer is cancelled first.
    pub fn refresh(
        &mut self,
        start_time: u64,
        timeout: Duration,
        timer_id: TimerId,
        timer: TimerHandle,
    ) {
        self.cancel_timer();
        self.start_time = start_time;
        self.timeout = timeout;
        self.timer_id = timer_id;
        self.timer = timer;
    }

    /// Plain copy of this entry's fields
    pub fn to_record(&self) -> NolRecord {
        NolRecord {
            frequency: self.key.frequency,
            channel_width: self.key.channel_width,
            start_time: self.start_time,
            timeout_ms: timeout_to_ms(self.timeout),
        }
    }
}
