//! Persisted NOL state
//!
//! The tick clock restarts with every process, so saved records carry the
//! ticks and wall-clock time of the save. On load each record is rebased:
//! its timeout shrinks by the time it had already served plus however long
//! the console was down, and its start moves to the new clock's `now`.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use dfs_nol::{NolRecord, NolSnapshot};
use serde::{Deserialize, Serialize};

/// Contents of the state file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateFile {
    /// Wall-clock time of the save, ms since the Unix epoch
    pub saved_at_unix_ms: u64,
    /// Scheduler ticks at the save
    pub saved_at_ticks: u64,
    /// Entries live at the save
    pub records: Vec<NolRecord>,
}

/// Milliseconds since the Unix epoch
pub fn unix_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

impl StateFile {
    /// Capture a snapshot taken at `now_ticks`
    pub fn capture(snapshot: NolSnapshot, now_ticks: u64, now_unix_ms: u64) -> Self {
        Self {
            saved_at_unix_ms: now_unix_ms,
            saved_at_ticks: now_ticks,
            records: snapshot.into_records(),
        }
    }

    /// Records expressed against a fresh clock reading `now_ticks`
    ///
    /// Records with no time left come back with a zero timeout, so that
    /// restoring them counts them as dropped.
    pub fn rebase(&self, now_ticks: u64, now_unix_ms: u64) -> Vec<NolRecord> {
        let downtime = now_unix_ms.saturating_sub(self.saved_at_unix_ms);
        self.records
            .iter()
            .map(|record| {
                let served = self.saved_at_ticks.saturating_sub(record.start_time);
                let left = u64::from(record.timeout_ms)
                    .saturating_sub(served)
                    .saturating_sub(downtime);
                NolRecord {
                    start_time: now_ticks,
                    timeout_ms: left as u32,
                    ..*record
                }
            })
            .collect()
    }

    /// Read a state file; a missing file is an empty state
    pub fn load(path: &Path) -> Result<Self, String> {
        let json = match std::fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(format!("Failed to read {}: {}", path.display(), e)),
        };
        serde_json::from_str(&json)
            .map_err(|e| format!("Failed to parse {}: {}", path.display(), e))
    }

    /// Write the state file, creating its directory if needed
    pub fn save(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create state directory: {}", e))?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize NOL state: {}", e))?;

        std::fs::write(path, json).map_err(|e| format!("Failed to write NOL state: {}", e))
    }
}
