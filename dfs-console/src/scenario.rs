//! Radar scenario replay

use std::time::Duration;

use dfs_nol::{NolEvent, NolManager};
use dfs_sim::VirtualWifiStack;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::settings::RadarEvent;

/// What happened during a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Radar events replayed
    pub radar_events: usize,
    /// Times the stack had nowhere left to go
    pub exhausted: usize,
}

/// Handle radar on `frequency` the way a driver would: exclude the channel,
/// move the access points off it, and flag exhaustion if nothing is left
pub fn handle_radar(nol: &NolManager, stack: &VirtualWifiStack, frequency: u32) -> bool {
    nol.on_radar_detected(frequency);
    if stack.switch_after_radar(frequency).is_none() {
        nol.mark_no_channel_available();
        return false;
    }
    true
}

/// Replay `events` against the manager, then wait until `run_for` has passed
///
/// Returns early if `shutdown` completes first.
pub async fn replay(
    nol: &NolManager,
    stack: &VirtualWifiStack,
    events: &[RadarEvent],
    run_for: Duration,
    shutdown: impl std::future::Future<Output = ()>,
) -> RunReport {
    let start = Instant::now();
    let mut report = RunReport::default();
    tokio::pin!(shutdown);

    for event in events {
        tokio::select! {
            _ = tokio::time::sleep_until(start + Duration::from_millis(event.at_ms)) => {}
            _ = &mut shutdown => {
                info!("interrupted during scenario");
                return report;
            }
        }
        report.radar_events += 1;
        if !handle_radar(nol, stack, event.frequency) {
            report.exhausted += 1;
        }
    }

    tokio::select! {
        _ = tokio::time::sleep_until(start + run_for) => {}
        _ = &mut shutdown => info!("interrupted"),
    }
    report
}

/// Log every NOL event until the manager goes away
pub fn spawn_event_logger(mut events: broadcast::Receiver<NolEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(NolEvent::ChannelListUpdated { count }) => {
                    debug!(count, "channel list pushed")
                }
                Ok(event) => info!(?event, "NOL event"),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "event logger fell behind")
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
