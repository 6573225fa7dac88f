//! DFS Simulation Library
//!
//! This crate provides a stand-in for the wireless driver that surrounds the
//! NOL manager, so radar scenarios can be exercised without hardware:
//!
//! - **VirtualWifiStack**: channel table, replacement selection and
//!   access-point bring-up behind the `dfs-nol` collaborator traits
//! - **ChannelSpec**: channel plans, including a default 5 GHz plan
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use dfs_nol::{DfsHooks, ManualScheduler, NolConfig, NolManager};
//! use dfs_sim::VirtualWifiStack;
//!
//! let stack = VirtualWifiStack::with_default_plan();
//! let scheduler = ManualScheduler::new();
//! let nol = NolManager::new(
//!     NolConfig::default(),
//!     Arc::new(scheduler.clone()),
//!     DfsHooks::from_stack(Arc::new(stack.clone())),
//! );
//!
//! nol.on_radar_detected(5260);
//! assert!(stack.is_restricted(5260));
//!
//! scheduler.advance(Duration::from_secs(30 * 60));
//! assert!(!stack.is_restricted(5260));
//! ```

pub mod channel;
pub mod stack;

pub use channel::{default_5ghz_plan, ChannelSpec, SimChannel};
pub use stack::{ReceivedUpdate, VirtualWifiStack};
