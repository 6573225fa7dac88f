//! Radar scenarios run against the virtual wireless stack

use std::sync::Arc;
use std::time::Duration;

use dfs_nol::{DfsHooks, ManualScheduler, NolConfig, NolManager, TokioScheduler};
use dfs_sim::{ChannelSpec, VirtualWifiStack};

mod helpers {
    use super::*;

    pub fn manual_setup(
        plan: Vec<ChannelSpec>,
        config: NolConfig,
    ) -> (NolManager, ManualScheduler, VirtualWifiStack) {
        let stack = VirtualWifiStack::new(plan);
        let scheduler = ManualScheduler::new();
        let nol = NolManager::new(
            config,
            Arc::new(scheduler.clone()),
            DfsHooks::from_stack(Arc::new(stack.clone())),
        );
        (nol, scheduler, stack)
    }

    /// Radar on the operating channel, handled the way a driver would
    pub fn radar_on(nol: &NolManager, stack: &VirtualWifiStack, frequency: u32) {
        nol.on_radar_detected(frequency);
        if stack.switch_after_radar(frequency).is_none() {
            nol.mark_no_channel_available();
        }
    }
}

use helpers::*;

#[test]
fn last_channel_exhausted_then_recovered() {
    let config = NolConfig {
        nol_timeout_ms: 60_000,
        ..Default::default()
    };
    let (nol, scheduler, stack) =
        manual_setup(vec![ChannelSpec::dfs(5200), ChannelSpec::dfs(5220)], config);
    stack.set_current_channel(Some(5200));

    radar_on(&nol, &stack, 5200);
    assert_eq!(stack.current_channel(), Some(5220));
    assert!(!nol.no_channel_available());

    scheduler.advance(Duration::from_secs(10));
    radar_on(&nol, &stack, 5220);
    assert_eq!(stack.current_channel(), None);
    assert!(nol.no_channel_available());

    // 5200 is released first and becomes the replacement
    scheduler.advance(Duration::from_secs(50));
    assert!(!nol.no_channel_available());
    assert_eq!(stack.bring_ups(), vec![5200]);
    assert_eq!(stack.current_channel(), Some(5200));
    assert!(stack.is_restricted(5220));

    scheduler.advance(Duration::from_secs(10));
    assert!(!stack.is_restricted(5220));
    assert_eq!(stack.bring_ups(), vec![5200]);
}

#[test]
fn scripted_replacement_is_brought_up_once() {
    let (nol, scheduler, stack) = manual_setup(
        dfs_sim::default_5ghz_plan(),
        NolConfig::default(),
    );
    stack.script_selection(Some(5180));

    nol.mark_no_channel_available();
    nol.add_channel(5200, 20, Duration::from_secs(5));
    scheduler.advance(Duration::from_secs(5));

    assert!(!nol.no_channel_available());
    assert_eq!(stack.bring_ups(), vec![5180]);
}

#[test]
fn cleanup_clears_every_flag() {
    let (nol, _scheduler, stack) = manual_setup(
        dfs_sim::default_5ghz_plan(),
        NolConfig::default(),
    );
    for frequency in [5260, 5280, 5300] {
        nol.on_radar_detected(frequency);
    }
    assert!(stack.is_restricted(5280));

    nol.cleanup();
    assert!(stack.channels().iter().all(|c| !c.in_nol));
    let last = stack.updates().pop().unwrap();
    assert_eq!(last.entries, None);
    assert_eq!(last.count, 0);
}

#[tokio::test(start_paused = true)]
async fn tokio_driven_scenario() {
    let stack = VirtualWifiStack::new(vec![ChannelSpec::dfs(5500)]);
    stack.set_current_channel(Some(5500));
    let nol = NolManager::new(
        NolConfig {
            nol_timeout_ms: 30_000,
            ..Default::default()
        },
        Arc::new(TokioScheduler::from_current().unwrap()),
        DfsHooks::from_stack(Arc::new(stack.clone())),
    );

    radar_on(&nol, &stack, 5500);
    assert!(nol.no_channel_available());

    tokio::time::sleep(Duration::from_millis(30_001)).await;
    tokio::task::yield_now().await;

    assert!(!nol.is_channel_in_nol(5500));
    assert_eq!(stack.bring_ups(), vec![5500]);
    assert_eq!(stack.current_channel(), Some(5500));
}

mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    fn plan_frequency() -> impl Strategy<Value = u32> {
        prop::sample::select(vec![5260u32, 5280, 5300, 5320, 5500, 5520, 5540])
    }

    proptest! {
        #[test]
        fn stack_flags_follow_nol(
            steps in prop::collection::vec((plan_frequency(), 0u64..40), 1..30)
        ) {
            let config = NolConfig {
                nol_timeout_ms: 60_000,
                ..Default::default()
            };
            let (nol, scheduler, stack) = manual_setup(dfs_sim::default_5ghz_plan(), config);

            for (frequency, wait_secs) in steps {
                nol.on_radar_detected(frequency);
                scheduler.advance(Duration::from_secs(wait_secs));

                for channel in stack.channels() {
                    prop_assert_eq!(channel.in_nol, nol.is_channel_in_nol(channel.frequency));
                }
            }
        }
    }
}
