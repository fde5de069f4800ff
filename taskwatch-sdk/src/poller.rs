//! The background poll loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::clock::{Clock, TokioClock};
use crate::cycle;
use crate::error::PollError;
use crate::source::TaskSource;
use crate::store::MetricsStore;

/// Default time between poll cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Periodically polls a [`TaskSource`] and publishes the result to a
/// [`MetricsStore`].
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use taskwatch_sdk::{Poller, ScriptedSource};
///
/// #[tokio::main]
/// async fn main() {
///     let poller = Poller::builder(ScriptedSource::new())
///         .interval(Duration::from_secs(10))
///         .build();
///
///     let store = poller.store();
///     let handle = poller.start();
///
///     // ... serve `store` over HTTP ...
///
///     handle.stop().await;
///     assert!(store.err().is_none());
/// }
/// ```
#[derive(Debug)]
pub struct Poller {
    source: Arc<dyn TaskSource>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    store: Arc<MetricsStore>,
}

impl Poller {
    /// Create a builder polling `source`.
    pub fn builder(source: impl TaskSource) -> PollerBuilder {
        PollerBuilder::new(source)
    }

    /// Create a poller from already shared parts.
    pub fn new(
        source: Arc<dyn TaskSource>,
        clock: Arc<dyn Clock>,
        interval: Duration,
        store: Arc<MetricsStore>,
    ) -> Self {
        Self {
            source,
            clock,
            interval,
            store,
        }
    }

    /// The store this poller publishes to.
    pub fn store(&self) -> Arc<MetricsStore> {
        Arc::clone(&self.store)
    }

    /// Time between cycles.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run a single cycle now and publish its outcome.
    ///
    /// On failure the error is recorded and the previous snapshot stays
    /// visible; the same error is returned to the caller.
    pub async fn poll_once(&self) -> Result<(), PollError> {
        let result = cycle::collect(self.source.as_ref()).await;

        let outcome = match &result {
            Ok(snapshot) => {
                debug!(
                    jobs = snapshot.jobs().len(),
                    series = snapshot.len(),
                    tasks = snapshot.total(),
                    "poll cycle succeeded"
                );
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, source = self.source.description(), "poll cycle failed");
                Err(err.clone())
            }
        };

        self.store.write(result);
        outcome
    }

    /// Start the poll loop on the current tokio runtime.
    ///
    /// The loop waits one interval before its first cycle. It suspends only
    /// on the clock and on the stop signal; an upstream call in flight is
    /// always allowed to finish.
    pub fn start(self) -> PollerHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);

        info!(
            source = self.source.description(),
            interval_secs = self.interval.as_secs_f64(),
            "starting poller"
        );

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                    _ = self.clock.after(self.interval) => {
                        let _ = self.poll_once().await;
                    }
                }
            }
            info!("poller stopped");
        });

        PollerHandle { stop_tx, task }
    }
}

/// Builder for a [`Poller`].
#[derive(Debug)]
pub struct PollerBuilder {
    source: Arc<dyn TaskSource>,
    clock: Option<Arc<dyn Clock>>,
    interval: Option<Duration>,
    store: Option<Arc<MetricsStore>>,
}

impl PollerBuilder {
    /// Create a builder polling `source`.
    pub fn new(source: impl TaskSource) -> Self {
        Self {
            source: Arc::new(source),
            clock: None,
            interval: None,
            store: None,
        }
    }

    /// Set the clock driving the loop.
    ///
    /// Defaults to [`TokioClock`].
    pub fn clock(mut self, clock: impl Clock) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Set the poll interval.
    ///
    /// Defaults to [`DEFAULT_POLL_INTERVAL`].
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Publish into an existing store instead of a fresh one.
    pub fn store(mut self, store: Arc<MetricsStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Build the poller.
    pub fn build(self) -> Poller {
        Poller {
            source: self.source,
            clock: self.clock.unwrap_or_else(|| Arc::new(TokioClock)),
            interval: self.interval.unwrap_or(DEFAULT_POLL_INTERVAL),
            store: self.store.unwrap_or_default(),
        }
    }
}

/// Handle for stopping a running poller.
///
/// Dropping the handle also ends the loop at its next wait point, but only
/// [`stop`](Self::stop) waits for it to be gone.
#[derive(Debug)]
pub struct PollerHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Signal the loop to exit and wait until it has.
    ///
    /// A cycle already in progress runs to completion and is published;
    /// no write happens after this returns.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(err) = self.task.await {
            if err.is_panic() {
                warn!(error = %err, "poller task panicked");
            }
        }
    }

    /// Check whether the loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
