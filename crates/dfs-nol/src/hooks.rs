//! Collaborator interfaces into the enclosing driver
//!
//! The manager never reaches into the wireless stack directly. Everything it
//! needs from outside is injected through these traits, and it never holds
//! the NOL lock while calling them.

use std::fmt;
use std::sync::Arc;

use crate::entry::NolRecord;

/// Informed whenever the NOL contents change
///
/// `entries` is `None` exactly when `count` is zero. Implementations may
/// call back into the manager; a list superseded by such a call is not
/// delivered afterwards.
pub trait ChannelListNotifier: Send + Sync {
    /// Recompute per-channel restriction state from the current NOL
    fn update(&self, entries: Option<&[NolRecord]>, count: usize);
}

/// Picks a channel to move to once one has left the NOL
pub trait ChannelSelector: Send + Sync {
    /// A usable channel (MHz) among non-restricted channels and restricted
    /// channels that are allowed again, or `None`
    fn select_replacement(&self) -> Option<u32>;
}

/// Brings access points back up on a new channel
pub trait ApBringup: Send + Sync {
    /// Start access points on `channel` (MHz)
    fn bring_up(&self, channel: u32);
}

/// The set of collaborators a [`NolManager`](crate::NolManager) talks to
#[derive(Clone)]
pub struct DfsHooks {
    /// Channel-list update hook
    pub notifier: Arc<dyn ChannelListNotifier>,
    /// Replacement channel selection
    pub selector: Arc<dyn ChannelSelector>,
    /// Access point bring-up
    pub bringup: Arc<dyn ApBringup>,
}

impl DfsHooks {
    /// Bundle the three collaborators
    pub fn new(
        notifier: Arc<dyn ChannelListNotifier>,
        selector: Arc<dyn ChannelSelector>,
        bringup: Arc<dyn ApBringup>,
    ) -> Self {
        Self {
            notifier,
            selector,
            bringup,
        }
    }

    /// Use one object that implements all three roles
    pub fn from_stack<T>(stack: Arc<T>) -> Self
    where
        T: ChannelListNotifier + ChannelSelector + ApBringup + 'static,
    {
        Self {
            notifier: stack.clone(),
            selector: stack.clone(),
            bringup: stack,
        }
    }

    /// Hooks that ignore updates and never find a replacement
    pub fn detached() -> Self {
        Self::from_stack(Arc::new(Detached))
    }
}

impl fmt::Debug for DfsHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DfsHooks").finish_non_exhaustive()
    }
}

struct Detached;

impl ChannelListNotifier for Detached {
    fn update(&self, _entries: Option<&[NolRecord]>, _count: usize) {}
}

impl ChannelSelector for Detached {
    fn select_replacement(&self) -> Option<u32> {
        None
    }
}

impl ApBringup for Detached {
    fn bring_up(&self, _channel: u32) {}
}
