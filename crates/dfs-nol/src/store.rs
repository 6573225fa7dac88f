//! The NOL entry collection
//!
//! `NolStore` is a plain owned container. It does no locking of its own;
//! [`NolManager`](crate::NolManager) wraps it in the NOL lock. The entry
//! counter is kept separately from the vector so that bookkeeping defects
//! are detected and reported instead of silently masked.

use tracing::{debug, error};

use crate::entry::{ChannelKey, NolEntry};
use crate::error::NolError;
use crate::scheduler::TimerId;
use crate::snapshot::NolSnapshot;

/// Ordered collection of NOL entries plus the entry counter
#[derive(Debug, Default)]
pub struct NolStore {
    entries: Vec<NolEntry>,
    count: usize,
    invariant_violations: u64,
}

impl NolStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of the entry counter
    pub fn count(&self) -> usize {
        self.count
    }

    /// Number of entries actually held
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of counter defects detected so far
    pub fn invariant_violations(&self) -> u64 {
        self.invariant_violations
    }

    /// Iterate over entries in store order
    pub fn iter(&self) -> impl Iterator<Item = &NolEntry> {
        self.entries.iter()
    }

    /// Entry with exactly this key
    pub fn find(&self, key: ChannelKey) -> Option<&NolEntry> {
        self.entries.iter().find(|e| e.key() == key)
    }

    /// Mutable entry with exactly this key
    pub fn find_mut(&mut self, key: ChannelKey) -> Option<&mut NolEntry> {
        self.entries.iter_mut().find(|e| e.key() == key)
    }

    /// Whether any entry covers `frequency`, at any width
    pub fn contains_frequency(&self, frequency: u32) -> bool {
        self.entries.iter().any(|e| e.frequency() == frequency)
    }

    /// Whether the entry for `key` is currently driven by `timer`
    pub fn is_armed_with(&self, key: ChannelKey, timer: TimerId) -> bool {
        self.find(key).is_some_and(|e| e.timer_id() == timer)
    }

    /// Make room for one more entry
    ///
    /// Fails without touching the store when `max_entries` is reached or the
    /// allocation cannot be made.
    pub fn reserve_one(&mut self, max_entries: usize) -> Result<(), NolError> {
        if self.entries.len() >= max_entries {
            return Err(NolError::CapacityExhausted { max: max_entries });
        }
        self.entries.try_reserve(1)?;
        Ok(())
    }

    /// Append an entry and bump the counter
    pub fn insert(&mut self, entry: NolEntry) {
        debug!(channel = %entry.key(), "NOL entry inserted");
        self.entries.push(entry);
        self.count += 1;
    }

    /// Remove every entry with this key, cancelling each timer first
    ///
    /// Returns how many entries were removed.
    pub fn remove_matching(&mut self, key: ChannelKey) -> usize {
        let mut removed = 0;
        let mut index = 0;
        while index < self.entries.len() {
            if self.entries[index].key() != key {
                index += 1;
                continue;
            }
            let mut entry = self.entries.remove(index);
            entry.cancel_timer();
            debug!(
                channel = %key,
                start_time = entry.start_time(),
                "removing channel from NOL"
            );
            drop(entry);
            self.decrement("remove");
            removed += 1;
        }
        removed
    }

    /// Cancel every timer, then drop every entry and reset the counter
    ///
    /// Returns how many entries were dropped.
    pub fn drain_all(&mut self) -> usize {
        for entry in &mut self.entries {
            entry.cancel_timer();
        }
        let drained = self.entries.len();
        if self.count != drained {
            self.report(NolError::CountMismatch {
                count: self.count,
                live: drained,
            });
        }
        self.entries.clear();
        self.count = 0;
        drained
    }

    /// Copy every entry into a snapshot, in store order
    pub fn snapshot(&self) -> NolSnapshot {
        let records: Vec<_> = self.entries.iter().map(NolEntry::to_record).collect();
        if records.len() != self.count {
            error!(
                "{}",
                NolError::CountMismatch {
                    count: self.count,
                    live: records.len(),
                }
            );
        }
        NolSnapshot::new(records)
    }

    fn decrement(&mut self, operation: &'static str) {
        match self.count.checked_sub(1) {
            Some(count) => self.count = count,
            None => {
                self.report(NolError::CountUnderflow { operation });
                self.count = 0;
            }
        }
    }

    fn report(&mut self, defect: NolError) {
        self.invariant_violations += 1;
        error!("{}", defect);
    }

    #[cfg(test)]
    pub(crate) fn force_count(&mut self, count: usize) {
        self.count = count;
    }
}
