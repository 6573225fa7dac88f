//! Read-only copies of the NOL
//!
//! A snapshot is what leaves the core: it is handed to the channel-list
//! notifier and used as the persistence format across a subsystem restart.

use serde::{Deserialize, Serialize};

use crate::entry::NolRecord;

/// Copy of the live entries, in store order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NolSnapshot {
    records: Vec<NolRecord>,
}

impl NolSnapshot {
    /// Build a snapshot from records
    pub fn new(records: Vec<NolRecord>) -> Self {
        Self { records }
    }

    /// The records, in store order
    pub fn records(&self) -> &[NolRecord] {
        &self.records
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the NOL was empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Buffer form handed to the notifier: `None` when there are no entries
    pub fn as_update(&self) -> Option<&[NolRecord]> {
        if self.records.is_empty() {
            None
        } else {
            Some(&self.records)
        }
    }

    /// Take the records out
    pub fn into_records(self) -> Vec<NolRecord> {
        self.records
    }

    /// Whether any record covers `frequency`, at any width
    pub fn contains_frequency(&self, frequency: u32) -> bool {
        self.records.iter().any(|r| r.frequency == frequency)
    }
}

impl From<Vec<NolRecord>> for NolSnapshot {
    fn from(records: Vec<NolRecord>) -> Self {
        Self::new(records)
    }
}

impl<'a> IntoIterator for &'a NolSnapshot {
    type Item = &'a NolRecord;
    type IntoIter = std::slice::Iter<'a, NolRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
