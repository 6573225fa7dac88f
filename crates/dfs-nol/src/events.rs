//! Event stream for NOL activity
//!
//! Every change the manager makes is broadcast as a [`NolEvent`]. Observers
//! subscribe with [`NolManager::subscribe`](crate::NolManager::subscribe);
//! events sent while nobody is listening are dropped.

use std::time::Duration;

use crate::entry::ChannelKey;

/// Something that happened to the NOL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NolEvent {
    /// A new channel was excluded
    ChannelAdded {
        /// The excluded channel
        channel: ChannelKey,
        /// Exclusion period
        timeout: Duration,
    },

    /// An already excluded channel had its period restarted
    ChannelRefreshed {
        /// The excluded channel
        channel: ChannelKey,
        /// New exclusion period
        timeout: Duration,
    },

    /// A channel could not be added and is not protected
    ChannelNotProtected {
        /// The channel that was left out
        channel: ChannelKey,
        /// Why the add failed
        reason: String,
    },

    /// A channel's exclusion period ran out
    ChannelExpired {
        /// The released channel
        channel: ChannelKey,
    },

    /// A channel was removed explicitly
    ChannelRemoved {
        /// The released channel
        channel: ChannelKey,
        /// Number of entries that matched
        removed: usize,
    },

    /// The notifier was handed a new channel list
    ChannelListUpdated {
        /// Number of entries in the list
        count: usize,
    },

    /// The NOL was emptied by cleanup
    Cleared {
        /// Number of entries dropped
        dropped: usize,
    },

    /// A replacement channel was found after an expiry
    ReplacementSelected {
        /// Channel the access points were brought up on (MHz)
        channel: u32,
    },

    /// No replacement channel was available after an expiry
    NoReplacement,
}
