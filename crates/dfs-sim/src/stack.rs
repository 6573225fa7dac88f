//! Virtual wireless stack
//!
//! `VirtualWifiStack` stands in for the driver around the NOL manager. It
//! keeps a channel table whose NOL flags follow the notifier updates, picks
//! replacement channels from that table, and records every bring-up. Clones
//! share the same state, so one clone can be handed to the manager while
//! the test or console keeps another.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dfs_nol::{ApBringup, ChannelListNotifier, ChannelSelector, NolRecord};
use tracing::{debug, info};

use crate::channel::{default_5ghz_plan, ChannelSpec, SimChannel};

/// One notifier call as received by the stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedUpdate {
    /// The entries, `None` when the list was empty
    pub entries: Option<Vec<NolRecord>>,
    /// Count passed alongside the entries
    pub count: usize,
}

#[derive(Debug, Default)]
struct StackState {
    channels: Vec<SimChannel>,
    current: Option<u32>,
    updates: Vec<ReceivedUpdate>,
    bring_ups: Vec<u32>,
    /// Scripted answers for `select_replacement`, used before the table
    scripted: VecDeque<Option<u32>>,
}

impl StackState {
    fn first_usable(&self, skip: Option<u32>) -> Option<u32> {
        let usable = |c: &&SimChannel| c.is_usable() && Some(c.frequency) != skip;
        self.channels
            .iter()
            .filter(|c| !c.dfs)
            .find(usable)
            .or_else(|| self.channels.iter().filter(|c| c.dfs).find(usable))
            .map(|c| c.frequency)
    }
}

/// Simulated driver implementing every NOL collaborator role
#[derive(Debug, Clone)]
pub struct VirtualWifiStack {
    state: Arc<Mutex<StackState>>,
}

impl VirtualWifiStack {
    /// Create a stack over the given channel plan
    pub fn new(plan: impl IntoIterator<Item = ChannelSpec>) -> Self {
        let state = StackState {
            channels: plan.into_iter().map(SimChannel::from).collect(),
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Create a stack over [`default_5ghz_plan`]
    pub fn with_default_plan() -> Self {
        Self::new(default_5ghz_plan())
    }

    fn lock(&self) -> MutexGuard<'_, StackState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Channel the access points are operating on
    pub fn current_channel(&self) -> Option<u32> {
        self.lock().current
    }

    /// Put the access points on `channel` without going through bring-up
    pub fn set_current_channel(&self, channel: Option<u32>) {
        self.lock().current = channel;
    }

    /// Copy of the channel table
    pub fn channels(&self) -> Vec<SimChannel> {
        self.lock().channels.clone()
    }

    /// Whether `frequency` is flagged as on the NOL
    pub fn is_restricted(&self, frequency: u32) -> bool {
        self.lock()
            .channels
            .iter()
            .any(|c| c.frequency == frequency && c.in_nol)
    }

    /// Every notifier call received so far
    pub fn updates(&self) -> Vec<ReceivedUpdate> {
        self.lock().updates.clone()
    }

    /// Every channel access points were brought up on
    pub fn bring_ups(&self) -> Vec<u32> {
        self.lock().bring_ups.clone()
    }

    /// Queue an answer for the next `select_replacement` call
    pub fn script_selection(&self, answer: Option<u32>) {
        self.lock().scripted.push_back(answer);
    }

    /// Handle radar on the operating channel: pick somewhere else to go
    ///
    /// Returns the new channel, or `None` when every channel is excluded.
    /// The radar channel itself is never picked, even before the NOL update
    /// has reached the table.
    pub fn switch_after_radar(&self, radar_channel: u32) -> Option<u32> {
        let mut state = self.lock();
        if state.current != Some(radar_channel) {
            return state.current;
        }
        let next = state.first_usable(Some(radar_channel));
        match next {
            Some(channel) => {
                info!(from = radar_channel, to = channel, "moving off radar channel")
            }
            None => info!(
                channel = radar_channel,
                "radar on last usable channel, going down"
            ),
        }
        state.current = next;
        next
    }
}

impl ChannelListNotifier for VirtualWifiStack {
    fn update(&self, entries: Option<&[NolRecord]>, count: usize) {
        let mut state = self.lock();
        let listed = entries.unwrap_or_default();
        for channel in &mut state.channels {
            channel.in_nol = listed.iter().any(|r| r.frequency == channel.frequency);
        }
        debug!(count, "channel NOL flags recomputed");
        state.updates.push(ReceivedUpdate {
            entries: entries.map(<[NolRecord]>::to_vec),
            count,
        });
    }
}

impl ChannelSelector for VirtualWifiStack {
    fn select_replacement(&self) -> Option<u32> {
        let mut state = self.lock();
        match state.scripted.pop_front() {
            Some(answer) => answer,
            None => state.first_usable(None),
        }
    }
}

impl ApBringup for VirtualWifiStack {
    fn bring_up(&self, channel: u32) {
        let mut state = self.lock();
        info!(channel, "access points up");
        state.current = Some(channel);
        state.bring_ups.push(channel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(frequency: u32) -> NolRecord {
        NolRecord {
            frequency,
            channel_width: 20,
            start_time: 0,
            timeout_ms: 1_000,
        }
    }

    #[test]
    fn test_update_recomputes_flags() {
        let stack = VirtualWifiStack::with_default_plan();

        stack.update(Some(&[record(5260), record(5500)][..]), 2);
        assert!(stack.is_restricted(5260));
        assert!(stack.is_restricted(5500));
        assert!(!stack.is_restricted(5280));

        stack.update(None, 0);
        assert!(!stack.is_restricted(5260));
        assert_eq!(stack.updates().len(), 2);
        assert_eq!(stack.updates()[1].entries, None);
    }

    #[test]
    fn test_selection_prefers_non_dfs() {
        let stack = VirtualWifiStack::new([
            ChannelSpec::dfs(5260),
            ChannelSpec::non_dfs(5180),
        ]);
        assert_eq!(stack.select_replacement(), Some(5180));

        stack.update(Some(&[record(5180)][..]), 1);
        assert_eq!(stack.select_replacement(), Some(5260));

        stack.update(Some(&[record(5180), record(5260)][..]), 2);
        assert_eq!(stack.select_replacement(), None);
    }

    #[test]
    fn test_scripted_selection_wins() {
        let stack = VirtualWifiStack::with_default_plan();
        stack.script_selection(None);
        stack.script_selection(Some(5700));

        assert_eq!(stack.select_replacement(), None);
        assert_eq!(stack.select_replacement(), Some(5700));
        assert_eq!(stack.select_replacement(), Some(5180));
    }

    #[test]
    fn test_switch_after_radar() {
        let stack = VirtualWifiStack::new([ChannelSpec::dfs(5260), ChannelSpec::dfs(5280)]);
        stack.set_current_channel(Some(5260));

        assert_eq!(stack.switch_after_radar(5260), Some(5280));
        assert_eq!(stack.current_channel(), Some(5280));

        // Radar elsewhere does not move us
        assert_eq!(stack.switch_after_radar(5260), Some(5280));

        stack.update(Some(&[record(5260)][..]), 1);
        assert_eq!(stack.switch_after_radar(5280), None);
        assert_eq!(stack.current_channel(), None);
    }

    #[test]
    fn test_bring_up_records_channel() {
        let stack = VirtualWifiStack::with_default_plan();
        let shared = stack.clone();
        shared.bring_up(5180);
        assert_eq!(stack.bring_ups(), vec![5180]);
        assert_eq!(stack.current_channel(), Some(5180));
    }
}
