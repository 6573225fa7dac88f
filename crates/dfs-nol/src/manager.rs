//! The NOL manager
//!
//! `NolManager` is the synchronized façade over the [`NolStore`]. A single
//! lock guards the store; every operation holds it only for the part that
//! touches the list. Collaborators (notifier, selector, bring-up) are always
//! called with the lock released.
//!
//! # Locking
//!
//! The NOL lock is the only lock the manager takes, and the scheduler's
//! internal lock is the only one taken beneath it (to arm or cancel a
//! timer). No lock is held while a collaborator runs, so collaborators may
//! call back into any manager operation.
//!
//! Each snapshot built for the notifier is stamped with a generation under
//! the NOL lock. A snapshot is only delivered if no newer one has been
//! claimed for delivery already, so the notifier never receives an older
//! channel list after a newer one has started.
//!
//! Replacement-channel recovery claims the "no channel available" flag
//! atomically before asking the selector, so concurrent expiries bring up
//! access points at most once.
//!
//! # Timers
//!
//! Each entry owns the handle of its expiry timer together with a
//! [`TimerId`]. When a timer fires, the entry is only removed if it is still
//! armed with that id, checked under the NOL lock. A timer that lost a race
//! against a refresh or removal therefore does nothing.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::NolConfig;
use crate::entry::{ChannelKey, NolEntry, NolRecord};
use crate::events::NolEvent;
use crate::hooks::DfsHooks;
use crate::scheduler::{ExpiryScheduler, TimerHandle, TimerId};
use crate::snapshot::NolSnapshot;
use crate::store::NolStore;

/// Result of [`NolManager::add_channel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// A new entry was created
    Inserted,
    /// An existing entry had its period restarted
    Refreshed,
    /// The entry could not be stored; the channel is not protected
    NotProtected,
}

impl AddOutcome {
    /// Whether the channel is now in the NOL
    pub fn is_protected(&self) -> bool {
        !matches!(self, Self::NotProtected)
    }
}

/// Result of [`NolManager::restore`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    /// Records re-inserted with their remaining time
    pub restored: usize,
    /// Records whose period had already run out
    pub dropped: usize,
    /// Records that could not be stored
    pub not_protected: usize,
}

/// Shared handle to a Non-Occupancy List
///
/// Clones refer to the same list. Dropping the last clone cancels every
/// pending expiry timer.
#[derive(Clone)]
pub struct NolManager {
    shared: Arc<Shared>,
}

struct Shared {
    config: NolConfig,
    store: Mutex<NolStore>,
    next_generation: AtomicU64,
    delivered_generation: AtomicU64,
    no_channel_available: AtomicBool,
    next_timer: AtomicU64,
    scheduler: Arc<dyn ExpiryScheduler>,
    hooks: DfsHooks,
    events: broadcast::Sender<NolEvent>,
    this: Weak<Shared>,
}

impl NolManager {
    /// Create a manager with an empty NOL
    pub fn new(
        config: NolConfig,
        scheduler: Arc<dyn ExpiryScheduler>,
        hooks: DfsHooks,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let shared = Arc::new_cyclic(|this| Shared {
            config,
            store: Mutex::new(NolStore::new()),
            next_generation: AtomicU64::new(1),
            delivered_generation: AtomicU64::new(0),
            no_channel_available: AtomicBool::new(false),
            next_timer: AtomicU64::new(1),
            scheduler,
            hooks,
            events,
            this: this.clone(),
        });
        Self { shared }
    }

    /// The configuration in use
    pub fn config(&self) -> &NolConfig {
        &self.shared.config
    }

    /// Subscribe to NOL events
    pub fn subscribe(&self) -> broadcast::Receiver<NolEvent> {
        self.shared.events.subscribe()
    }

    /// Whether any entry covers `frequency`, at any width
    pub fn is_channel_in_nol(&self, frequency: u32) -> bool {
        self.shared.lock_store().contains_frequency(frequency)
    }

    /// Exclude a channel for `timeout`
    ///
    /// An existing entry for the same frequency and width is refreshed
    /// instead of duplicated. The notifier is not called unless
    /// `notify_on_add` is configured; callers that need the channel list
    /// pushed follow up with [`update_channel_list`](Self::update_channel_list).
    pub fn add_channel(
        &self,
        frequency: u32,
        channel_width: u32,
        timeout: Duration,
    ) -> AddOutcome {
        let outcome = self
            .shared
            .add(ChannelKey::new(frequency, channel_width), timeout);
        if self.shared.config.notify_on_add && outcome.is_protected() {
            self.shared.update_channel_list();
        }
        outcome
    }

    /// Exclude a channel on which radar was just seen
    ///
    /// Uses the configured width and NOL period, then pushes the channel
    /// list to the notifier once.
    pub fn on_radar_detected(&self, frequency: u32) -> AddOutcome {
        let config = &self.shared.config;
        info!(frequency, "radar detected, adding channel to NOL");
        let key = ChannelKey::new(frequency, config.channel_width_mhz);
        let outcome = self.shared.add(key, config.nol_timeout());
        self.shared.update_channel_list();
        outcome
    }

    /// Remove every entry for this frequency and width, then notify
    ///
    /// Returns the number of entries removed.
    pub fn remove_channel(&self, frequency: u32, channel_width: u32) -> usize {
        let key = ChannelKey::new(frequency, channel_width);
        let (removed, snapshot) = {
            let mut store = self.shared.lock_store();
            let removed = store.remove_matching(key);
            (removed, self.shared.stamp(&store))
        };
        self.shared.deliver(snapshot);
        if removed > 0 {
            info!(channel = %key, removed, "channel removed from NOL");
            self.shared.emit(NolEvent::ChannelRemoved {
                channel: key,
                removed,
            });
        }
        removed
    }

    /// Push the current channel list to the notifier
    pub fn update_channel_list(&self) {
        self.shared.update_channel_list();
    }

    /// Copy of every live entry, in store order
    pub fn snapshot(&self) -> NolSnapshot {
        self.shared.lock_store().snapshot()
    }

    /// Re-insert saved entries with whatever time they have left
    ///
    /// Entries whose period has already run out are dropped. The notifier is
    /// called once after all records are processed.
    pub fn restore(&self, records: &[NolRecord]) -> RestoreSummary {
        let now = self.shared.scheduler.now_ticks();
        let mut summary = RestoreSummary::default();

        for record in records {
            match record.remaining(now) {
                Some(left) => match self.shared.add(record.key(), left) {
                    AddOutcome::NotProtected => summary.not_protected += 1,
                    _ => summary.restored += 1,
                },
                None => {
                    debug!(channel = %record.key(), "saved NOL entry already expired");
                    summary.dropped += 1;
                }
            }
        }

        info!(
            restored = summary.restored,
            dropped = summary.dropped,
            not_protected = summary.not_protected,
            "NOL restored"
        );
        self.shared.update_channel_list();
        summary
    }

    /// Drop every entry, notify with an empty list and clear the
    /// "no channel available" flag
    pub fn cleanup(&self) {
        let (dropped, snapshot) = {
            let mut store = self.shared.lock_store();
            let dropped = store.drain_all();
            (dropped, self.shared.stamp(&store))
        };
        self.shared.deliver(snapshot);
        self.shared
            .no_channel_available
            .store(false, Ordering::Release);
        info!(dropped, "NOL cleaned up");
        self.shared.emit(NolEvent::Cleared { dropped });
    }

    /// Value of the entry counter
    pub fn count(&self) -> usize {
        self.shared.lock_store().count()
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.shared.lock_store().len()
    }

    /// Whether the NOL is empty
    pub fn is_empty(&self) -> bool {
        self.shared.lock_store().is_empty()
    }

    /// Number of counter defects detected so far
    pub fn invariant_violations(&self) -> u64 {
        self.shared.lock_store().invariant_violations()
    }

    /// Exclusion time left for an exact channel
    pub fn time_remaining(&self, frequency: u32, channel_width: u32) -> Option<Duration> {
        let now = self.shared.scheduler.now_ticks();
        self.shared
            .lock_store()
            .find(ChannelKey::new(frequency, channel_width))
            .and_then(|entry| entry.to_record().remaining(now))
    }

    /// Log every entry with its remaining time
    pub fn log_nol(&self) {
        let now = self.shared.scheduler.now_ticks();
        let store = self.shared.lock_store();
        info!(count = store.count(), "NOL");
        for (index, entry) in store.iter().enumerate() {
            let left = entry.to_record().remaining(now).unwrap_or_default();
            info!(
                "nol:{} channel={} MHz width={} MHz time left={} seconds nol starttick={}",
                index,
                entry.frequency(),
                entry.channel_width(),
                left.as_secs(),
                entry.start_time()
            );
        }
    }

    /// Whether the system has run out of usable channels
    pub fn no_channel_available(&self) -> bool {
        self.shared.no_channel_available.load(Ordering::Acquire)
    }

    /// Record that no usable channel is left
    ///
    /// The next expiry (or [`retry_recovery`](Self::retry_recovery)) asks the
    /// selector for a replacement. Only the manager clears the flag.
    pub fn mark_no_channel_available(&self) {
        warn!("no usable channel available, waiting for a NOL entry to expire");
        self.shared
            .no_channel_available
            .store(true, Ordering::Release);
    }

    /// Ask for a replacement channel now if the flag is set
    ///
    /// Returns the channel access points were brought up on.
    pub fn retry_recovery(&self) -> Option<u32> {
        self.shared.recover_if_starved()
    }
}

impl fmt::Debug for NolManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NolManager")
            .field("config", &self.shared.config)
            .field("count", &self.count())
            .field("no_channel_available", &self.no_channel_available())
            .finish()
    }
}

impl Shared {
    fn lock_store(&self) -> MutexGuard<'_, NolStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: NolEvent) {
        // No subscribers is not an error
        let _ = self.events.send(event);
    }

    /// Arm an expiry timer for `key`
    ///
    /// The callback only holds a weak reference, so pending timers never keep
    /// the manager alive.
    fn arm(&self, key: ChannelKey, timeout: Duration) -> (TimerId, TimerHandle) {
        let id = TimerId(self.next_timer.fetch_add(1, Ordering::Relaxed));
        let this = self.this.clone();
        let handle = self.scheduler.schedule(
            timeout,
            Box::new(move || {
                if let Some(shared) = this.upgrade() {
                    shared.expire(key, id);
                }
            }),
        );
        (id, handle)
    }

    fn add(&self, key: ChannelKey, timeout: Duration) -> AddOutcome {
        let now = self.scheduler.now_ticks();
        let result = {
            let mut store = self.lock_store();
            if let Some(entry) = store.find_mut(key) {
                entry.cancel_timer();
                let (id, timer) = self.arm(key, timeout);
                entry.refresh(now, timeout, id, timer);
                Ok(AddOutcome::Refreshed)
            } else {
                match store.reserve_one(self.config.max_entries) {
                    Ok(()) => {
                        let (id, timer) = self.arm(key, timeout);
                        store.insert(NolEntry::new(key, now, timeout, id, timer));
                        Ok(AddOutcome::Inserted)
                    }
                    Err(err) => Err(err),
                }
            }
        };

        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        match result {
            Ok(AddOutcome::Refreshed) => {
                debug!(channel = %key, timeout_ms, "NOL entry refreshed");
                self.emit(NolEvent::ChannelRefreshed {
                    channel: key,
                    timeout,
                });
                AddOutcome::Refreshed
            }
            Ok(outcome) => {
                info!(channel = %key, timeout_ms, "new NOL channel");
                self.emit(NolEvent::ChannelAdded {
                    channel: key,
                    timeout,
                });
                outcome
            }
            Err(err) => {
                warn!(channel = %key, "{}; channel is not protected", err);
                self.emit(NolEvent::ChannelNotProtected {
                    channel: key,
                    reason: err.to_string(),
                });
                AddOutcome::NotProtected
            }
        }
    }

    /// Timer callback: release the channel if `timer` still owns it
    fn expire(&self, key: ChannelKey, timer: TimerId) {
        let snapshot = {
            let mut store = self.lock_store();
            if !store.is_armed_with(key, timer) {
                debug!(channel = %key, "stale NOL timer ignored");
                return;
            }
            store.remove_matching(key);
            self.stamp(&store)
        };
        self.deliver(snapshot);

        info!(channel = %key, "NOL period over, channel usable again");
        self.emit(NolEvent::ChannelExpired { channel: key });
        self.recover_if_starved();
    }

    fn update_channel_list(&self) {
        let snapshot = self.stamp(&self.lock_store());
        self.deliver(snapshot);
    }

    /// Snapshot the store and number it; must be called under the NOL lock
    fn stamp(&self, store: &NolStore) -> (u64, NolSnapshot) {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        (generation, store.snapshot())
    }

    /// Hand a snapshot to the notifier; the NOL lock must not be held
    ///
    /// Skipped when a newer snapshot has already been delivered.
    fn deliver(&self, (generation, snapshot): (u64, NolSnapshot)) {
        let previous = self
            .delivered_generation
            .fetch_max(generation, Ordering::AcqRel);
        if previous > generation {
            debug!(generation, previous, "superseded channel list not delivered");
            return;
        }

        let count = snapshot.len();
        self.hooks.notifier.update(snapshot.as_update(), count);
        self.emit(NolEvent::ChannelListUpdated { count });
    }

    fn recover_if_starved(&self) -> Option<u32> {
        // Claim the flag so only one caller consults the selector
        if self
            .no_channel_available
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }

        match self.hooks.selector.select_replacement() {
            Some(channel) => {
                info!(channel, "replacement channel found, bringing up access points");
                self.hooks.bringup.bring_up(channel);
                self.emit(NolEvent::ReplacementSelected { channel });
                Some(channel)
            }
            None => {
                self.no_channel_available.store(true, Ordering::Release);
                warn!("still no usable channel after NOL expiry");
                self.emit(NolEvent::NoReplacement);
                None
            }
        }
    }
}
