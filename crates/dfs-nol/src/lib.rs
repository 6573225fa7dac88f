//! DFS Non-Occupancy List
//!
//! This crate tracks which radio channels are forbidden after radar was seen
//! on them, and releases each one once its regulatory non-occupancy period
//! has run out.
//!
//! # Architecture
//!
//! - [`NolEntry`] / [`NolStore`]: the excluded channels and their count
//! - [`NolManager`]: the locked façade every caller goes through
//! - [`ExpiryScheduler`]: delayed callbacks with cancel-on-drop handles
//!   ([`TokioScheduler`], [`ManualScheduler`])
//! - [`ChannelListNotifier`], [`ChannelSelector`], [`ApBringup`]: the hooks
//!   into the enclosing driver, bundled as [`DfsHooks`]
//!
//! A radar event adds a channel and arms its timer. When the timer fires the
//! entry is removed, the notifier receives the new list, and if the system
//! had run out of channels the selector is asked for a replacement.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use dfs_nol::{DfsHooks, ManualScheduler, NolConfig, NolManager};
//!
//! let scheduler = ManualScheduler::new();
//! let nol = NolManager::new(
//!     NolConfig::default(),
//!     Arc::new(scheduler.clone()),
//!     DfsHooks::detached(),
//! );
//!
//! nol.on_radar_detected(5260);
//! assert!(nol.is_channel_in_nol(5260));
//!
//! scheduler.advance(Duration::from_secs(30 * 60));
//! assert!(!nol.is_channel_in_nol(5260));
//! ```

pub mod config;
pub mod entry;
pub mod error;
pub mod events;
pub mod hooks;
pub mod manager;
pub mod scheduler;
pub mod snapshot;
pub mod store;

pub use config::{NolConfig, DEFAULT_CHANNEL_WIDTH_MHZ, DEFAULT_NOL_TIMEOUT_MS};
pub use entry::{ChannelKey, NolEntry, NolRecord};
pub use error::NolError;
pub use events::NolEvent;
pub use hooks::{ApBringup, ChannelListNotifier, ChannelSelector, DfsHooks};
pub use manager::{AddOutcome, NolManager, RestoreSummary};
pub use scheduler::{
    ExpiryCallback, ExpiryScheduler, ManualScheduler, TimerHandle, TimerId, TokioScheduler,
};
pub use snapshot::NolSnapshot;
pub use store::NolStore;
