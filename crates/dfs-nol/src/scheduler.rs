//! Expiry scheduling
//!
//! An [`ExpiryScheduler`] runs a callback once a delay has elapsed and hands
//! back a [`TimerHandle`] that cancels the callback when dropped. Two
//! implementations are provided:
//!
//! - [`TokioScheduler`]: one sleeping task per timer on a tokio runtime
//! - [`ManualScheduler`]: virtual time advanced explicitly by the caller,
//!   for drivers that own their own tick loop and for deterministic tests
//!
//! Both expose a monotonic clock in millisecond ticks through
//! [`ExpiryScheduler::now_ticks`]; entry start times are recorded in it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::trace;

use crate::error::NolError;

/// Whole milliseconds in `d`, saturating at `u64::MAX`
fn duration_to_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Callback run when a timer fires
pub type ExpiryCallback = Box<dyn FnOnce() + Send + 'static>;

/// Identity of one armed timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

/// Source of delayed callbacks and of the monotonic tick clock
pub trait ExpiryScheduler: Send + Sync {
    /// Current monotonic time in milliseconds since the scheduler's epoch
    fn now_ticks(&self) -> u64;

    /// Run `callback` once `delay` has elapsed
    ///
    /// Dropping or cancelling the returned handle stops a callback that has
    /// not been picked up for running yet. A callback already taken off the
    /// queue (or a tokio task already past its sleep) may still run once,
    /// so callbacks must check that their target is still current.
    fn schedule(&self, delay: Duration, callback: ExpiryCallback) -> TimerHandle;
}

/// Owned handle to a scheduled callback
///
/// The callback is cancelled when the handle is dropped.
pub struct TimerHandle {
    cancel: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl TimerHandle {
    /// Wrap the scheduler-specific cancellation action
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A handle with nothing to cancel
    pub fn inert() -> Self {
        Self { cancel: None }
    }

    /// Cancel the callback; later calls do nothing
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    /// Whether `cancel` still has work to do
    pub fn is_armed(&self) -> bool {
        self.cancel.is_some()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle")
            .field("armed", &self.is_armed())
            .finish()
    }
}

/// Scheduler backed by tokio timers
///
/// Each timer is a spawned task sleeping until its deadline. Cancelling
/// aborts the task.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
    epoch: Instant,
}

impl TokioScheduler {
    /// Create a scheduler that spawns onto `handle`
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            epoch: Instant::now(),
        }
    }

    /// Create a scheduler on the runtime the caller is running in
    pub fn from_current() -> Result<Self, NolError> {
        Ok(Self::new(Handle::try_current()?))
    }
}

impl ExpiryScheduler for TokioScheduler {
    fn now_ticks(&self) -> u64 {
        duration_to_ms(self.epoch.elapsed())
    }

    fn schedule(&self, delay: Duration, callback: ExpiryCallback) -> TimerHandle {
        let task = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            callback();
        });
        TimerHandle::new(move || task.abort())
    }
}

/// Pending timers keyed by `(deadline, sequence)` so equal deadlines fire
/// in scheduling order
#[derive(Default)]
struct ManualState {
    now_ms: u64,
    next_seq: u64,
    pending: BTreeMap<(u64, u64), ExpiryCallback>,
}

/// Scheduler driven by explicit calls to [`ManualScheduler::advance`]
///
/// Clones share the same clock and timer queue.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    state: Arc<Mutex<ManualState>>,
}

impl ManualScheduler {
    /// Create a scheduler at tick zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a scheduler whose clock starts at `now_ms`
    pub fn starting_at(now_ms: u64) -> Self {
        let scheduler = Self::new();
        scheduler.lock().now_ms = now_ms;
        scheduler
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of timers waiting to fire
    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    /// Deadline of the earliest pending timer
    pub fn next_deadline(&self) -> Option<u64> {
        self.lock().pending.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Move the clock forward by `by`, firing every timer that falls due
    ///
    /// Returns the number of callbacks run.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.lock().now_ms.saturating_add(duration_to_ms(by));
        self.advance_to(target)
    }

    /// Move the clock to `target_ms`, firing due timers in deadline order
    ///
    /// Callbacks run without the scheduler lock held, so they may schedule
    /// or cancel other timers. A cancel racing in from another thread after
    /// a callback was taken off the queue does not stop it. The clock never
    /// moves backwards.
    pub fn advance_to(&self, target_ms: u64) -> usize {
        let mut fired = 0;
        loop {
            let callback = {
                let mut state = self.lock();
                let due = state
                    .pending
                    .keys()
                    .next()
                    .copied()
                    .filter(|(deadline, _)| *deadline <= target_ms);
                match due {
                    Some(key) => {
                        state.now_ms = state.now_ms.max(key.0);
                        state.pending.remove(&key)
                    }
                    None => {
                        state.now_ms = state.now_ms.max(target_ms);
                        None
                    }
                }
            };
            match callback {
                Some(callback) => {
                    callback();
                    fired += 1;
                }
                None => break,
            }
        }
        fired
    }
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("ManualScheduler")
            .field("now_ms", &state.now_ms)
            .field("pending", &state.pending.len())
            .finish()
    }
}

impl ExpiryScheduler for ManualScheduler {
    fn now_ticks(&self) -> u64 {
        self.lock().now_ms
    }

    fn schedule(&self, delay: Duration, callback: ExpiryCallback) -> TimerHandle {
        let key = {
            let mut state = self.lock();
            let deadline = state.now_ms.saturating_add(duration_to_ms(delay));
            let key = (deadline, state.next_seq);
            state.next_seq += 1;
            state.pending.insert(key, callback);
            key
        };
        trace!(deadline = key.0, "manual timer armed");

        let state: Weak<Mutex<ManualState>> = Arc::downgrade(&self.state);
        TimerHandle::new(move || {
            if let Some(state) = state.upgrade() {
                state
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .pending
                    .remove(&key);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> ExpiryCallback) {
        let hits = Arc::new(AtomicUsize::new(0));
        let make = {
            let hits = hits.clone();
            move || -> ExpiryCallback {
                let hits = hits.clone();
                Box::new(move || {
                    hits.fetch_add(1, Ordering::SeqCst);
                })
            }
        };
        (hits, make)
    }

    #[test]
    fn test_manual_fires_at_deadline() {
        let scheduler = ManualScheduler::new();
        let (hits, make) = counter();

        let _timer = scheduler.schedule(Duration::from_millis(100), make());
        assert_eq!(scheduler.advance(Duration::from_millis(99)), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        assert_eq!(scheduler.advance(Duration::from_millis(1)), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.now_ticks(), 100);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_manual_drop_cancels() {
        let scheduler = ManualScheduler::new();
        let (hits, make) = counter();

        let timer = scheduler.schedule(Duration::from_millis(10), make());
        assert_eq!(scheduler.pending(), 1);
        drop(timer);
        assert_eq!(scheduler.pending(), 0);

        scheduler.advance(Duration::from_secs(1));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_manual_fires_in_deadline_order() {
        let scheduler = ManualScheduler::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut timers = Vec::new();
        for (delay, tag) in [(30u64, 'c'), (10, 'a'), (20, 'b'), (10, 'a')] {
            let order = order.clone();
            timers.push(scheduler.schedule(
                Duration::from_millis(delay),
                Box::new(move || order.lock().unwrap().push(tag)),
            ));
        }

        assert_eq!(scheduler.advance_to(25), 3);
        assert_eq!(*order.lock().unwrap(), vec!['a', 'a', 'b']);
        assert_eq!(scheduler.next_deadline(), Some(30));
        assert_eq!(scheduler.now_ticks(), 25);
    }

    #[test]
    fn test_manual_callback_may_reschedule() {
        let scheduler = ManualScheduler::starting_at(1_000);
        let (hits, make) = counter();
        let slot: Arc<Mutex<Option<TimerHandle>>> = Arc::new(Mutex::new(None));

        let inner = {
            let scheduler = scheduler.clone();
            let slot = slot.clone();
            let callback = make();
            Box::new(move || {
                let timer = scheduler.schedule(Duration::from_millis(5), callback);
                *slot.lock().unwrap() = Some(timer);
            })
        };
        let _outer = scheduler.schedule(Duration::from_millis(5), inner);

        assert_eq!(scheduler.advance(Duration::from_millis(10)), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.now_ticks(), 1_010);
    }

    #[test]
    fn test_manual_huge_delay_saturates() {
        let scheduler = ManualScheduler::starting_at(5);
        let (hits, make) = counter();

        let _timer = scheduler.schedule(Duration::MAX, make());
        assert_eq!(scheduler.next_deadline(), Some(u64::MAX));

        scheduler.advance(Duration::from_secs(u64::MAX / 1_000));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.pending(), 1);
    }

    #[test]
    fn test_duration_to_ms_saturates() {
        assert_eq!(duration_to_ms(Duration::from_millis(1_500)), 1_500);
        assert_eq!(duration_to_ms(Duration::MAX), u64::MAX);
    }

    #[test]
    fn test_timer_handle_cancel_is_idempotent() {
        let (hits, make) = counter();
        let callback = make();
        let mut handle = TimerHandle::new(callback);
        assert!(handle.is_armed());
        handle.cancel();
        handle.cancel();
        drop(handle);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!TimerHandle::inert().is_armed());
    }

    #[test]
    fn test_tokio_scheduler_requires_runtime() {
        assert!(matches!(
            TokioScheduler::from_current(),
            Err(NolError::NoRuntime(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_fires_after_delay() {
        let scheduler = TokioScheduler::from_current().unwrap();
        let (hits, make) = counter();

        let _timer = scheduler.schedule(Duration::from_secs(10), make());

        tokio::time::sleep(Duration::from_millis(9_999)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(2)).await;
        tokio::task::yield_now().await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(scheduler.now_ticks() >= 10_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_cancel_prevents_fire() {
        let scheduler = TokioScheduler::from_current().unwrap();
        let (hits, make) = counter();

        let timer = scheduler.schedule(Duration::from_secs(1), make());
        drop(timer);

        tokio::time::sleep(Duration::from_secs(5)).await;
        tokio::task::yield_now().await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
