//! Clock port.
//!
//! The poller waits on [`Clock::after`] once per loop iteration. In
//! production that is a tokio timer ([`TokioClock`]); tests drive the loop
//! tick by tick with a [`ManualClock`].

use std::fmt::Debug;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{oneshot, Notify};

/// Abstraction over "wait until the next tick".
#[async_trait]
pub trait Clock: Send + Sync + Debug + 'static {
    /// Complete after `duration` has elapsed.
    async fn after(&self, duration: Duration);
}

/// Clock backed by `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn after(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// A clock that only ticks when told to.
///
/// Every call to [`after`](Clock::after) parks until [`advance`](Self::advance)
/// is called, regardless of the requested duration. Clones share state.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use taskwatch_sdk::{Clock, ManualClock};
///
/// # tokio_test::block_on(async {
/// let clock = ManualClock::new();
/// let waiter = tokio::spawn({
///     let clock = clock.clone();
///     async move { clock.after(Duration::from_secs(10)).await }
/// });
///
/// clock.block_until(1).await;
/// clock.advance();
/// waiter.await.unwrap();
/// assert_eq!(clock.calls(), 1);
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    inner: Arc<ManualClockInner>,
}

#[derive(Debug, Default)]
struct ManualClockInner {
    sleepers: Mutex<Vec<oneshot::Sender<()>>>,
    registered: Notify,
    calls: AtomicUsize,
}

impl ManualClock {
    /// Create a clock with no sleepers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wake every current sleeper. Returns how many were woken.
    pub fn advance(&self) -> usize {
        let sleepers = std::mem::take(&mut *self.inner.sleepers.lock());
        sleepers
            .into_iter()
            .filter(|tx| !tx.is_closed())
            .map(|tx| tx.send(()))
            .filter(Result::is_ok)
            .count()
    }

    /// Number of callers currently parked in `after`.
    pub fn sleepers(&self) -> usize {
        let mut sleepers = self.inner.sleepers.lock();
        sleepers.retain(|tx| !tx.is_closed());
        sleepers.len()
    }

    /// Total number of `after` calls ever made.
    pub fn calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }

    /// Wait until at least `count` callers are parked in `after`.
    pub async fn block_until(&self, count: usize) {
        loop {
            let registered = self.inner.registered.notified();
            if self.sleepers() >= count {
                return;
            }
            registered.await;
        }
    }
}

#[async_trait]
impl Clock for ManualClock {
    async fn after(&self, _duration: Duration) {
        let (tx, rx) = oneshot::channel();
        self.inner.sleepers.lock().push(tx);
        self.inner.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.registered.notify_waiters();
        let _ = rx.await;
    }
}
