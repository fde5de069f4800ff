//! The consistent metrics store shared by the poller and the HTTP layer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use parking_lot::{RwLock, RwLockReadGuard};
use taskwatch_types::Snapshot;

use crate::error::PollError;

/// Latest published snapshot plus the last recorded cycle error.
#[derive(Debug, Default)]
struct StoreState {
    snapshot: Option<Arc<Snapshot>>,
    last_error: Option<Arc<PollError>>,
}

/// Concurrency-safe holder of the latest `{snapshot, error}` pair.
///
/// The poller is the only writer. Any number of scrapers may read at once;
/// a write excludes readers only for the pointer swap, so a reader sees
/// either the whole previous snapshot or the whole next one. The lock is
/// task-fair, so a steady stream of readers cannot starve the poller.
///
/// The last error is mirrored outside the lock so [`err`](Self::err) never
/// waits, even while a writer is queued behind a long read.
///
/// # Example
///
/// ```
/// use taskwatch_sdk::MetricsStore;
/// use taskwatch_types::Snapshot;
///
/// let store = MetricsStore::new();
/// store.write(Ok(Snapshot::builder().job("a", |j| j.task("RUNNING", "w1")).build()));
///
/// let read = store.read();
/// assert_eq!(read.snapshot().unwrap().total(), 1);
/// assert!(read.error().is_none());
/// ```
#[derive(Debug, Default)]
pub struct MetricsStore {
    state: RwLock<StoreState>,
    last_error: ArcSwapOption<PollError>,
    generation: AtomicU64,
}

impl MetricsStore {
    /// Create an empty store: no snapshot, no error.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of a poll cycle.
    ///
    /// `Ok` replaces the snapshot and clears any recorded error. `Err`
    /// records the error and keeps the previous snapshot untouched.
    pub fn write(&self, result: Result<Snapshot, PollError>) {
        match result {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                let mut state = self.state.write();
                state.snapshot = Some(snapshot);
                state.last_error = None;
                self.last_error.store(None);
                self.generation.fetch_add(1, Ordering::Release);
            }
            Err(err) => {
                let err = Arc::new(err);
                let mut state = self.state.write();
                state.last_error = Some(Arc::clone(&err));
                self.last_error.store(Some(err));
                self.generation.fetch_add(1, Ordering::Release);
            }
        }
    }

    /// Acquire a consistent read of the current pair.
    ///
    /// Writers are held off until the returned guard is dropped, so keep it
    /// only as long as it takes to encode the snapshot.
    pub fn read(&self) -> StoreRead<'_> {
        StoreRead {
            guard: self.state.read(),
        }
    }

    /// Clone out the current pair without holding the lock.
    pub fn snapshot_and_error(&self) -> (Option<Arc<Snapshot>>, Option<Arc<PollError>>) {
        let state = self.state.read();
        (state.snapshot.clone(), state.last_error.clone())
    }

    /// The current snapshot, if any cycle has succeeded yet.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.state.read().snapshot.clone()
    }

    /// The last recorded cycle error, `None` if the last cycle succeeded.
    ///
    /// Lock-free: it does not wait for readers or a queued writer.
    pub fn err(&self) -> Option<Arc<PollError>> {
        self.last_error.load_full()
    }

    /// Number of writes applied since creation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

/// A read view of the store; writers wait until it is dropped.
#[derive(Debug)]
pub struct StoreRead<'a> {
    guard: RwLockReadGuard<'a, StoreState>,
}

impl StoreRead<'_> {
    /// The published snapshot, `None` before the first successful cycle.
    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.guard.snapshot.as_deref()
    }

    /// The recorded error, `None` if the last cycle succeeded.
    pub fn error(&self) -> Option<&PollError> {
        self.guard.last_error.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UpstreamError;
    use std::sync::atomic::AtomicBool;
    use std::sync::mpsc;
    use std::thread;
    use std::time::{Duration, Instant};

    fn snapshot(job: &str, running: usize) -> Snapshot {
        let mut builder = Snapshot::builder();
        for i in 0..running {
            let worker = format!("w{}", i % 3);
            builder = builder.job(job, |j| j.task("RUNNING", worker));
        }
        builder.build()
    }

    #[test]
    fn new_store_is_empty() {
        let store = MetricsStore::new();
        let read = store.read();
        assert!(read.snapshot().is_none());
        assert!(read.error().is_none());
        drop(read);
        assert_eq!(store.generation(), 0);
    }

    #[test]
    fn failure_retains_prior_snapshot() {
        let store = MetricsStore::new();
        let s1 = snapshot("conn-a", 3);
        store.write(Ok(s1.clone()));

        let err = PollError::List(UpstreamError::Status(503));
        store.write(Err(err.clone()));

        let (snap, last_error) = store.snapshot_and_error();
        assert_eq!(snap.as_deref(), Some(&s1));
        assert_eq!(last_error.as_deref(), Some(&err));
        assert_eq!(store.generation(), 2);
    }

    #[test]
    fn success_clears_previous_error() {
        let store = MetricsStore::new();
        store.write(Err(PollError::EmptyTasks {
            job: "a".to_string(),
        }));
        assert!(store.err().is_some());

        let s2 = snapshot("a", 1);
        store.write(Ok(s2.clone()));

        assert!(store.err().is_none());
        assert_eq!(store.snapshot().as_deref(), Some(&s2));
    }

    #[test]
    fn error_before_first_success_has_no_snapshot() {
        let store = MetricsStore::new();
        store.write(Err(PollError::List(UpstreamError::Transport(
            "refused".to_string(),
        ))));

        let read = store.read();
        assert!(read.snapshot().is_none());
        assert!(matches!(read.error(), Some(PollError::List(_))));
    }

    #[test]
    fn empty_snapshot_is_still_published() {
        let store = MetricsStore::new();
        store.write(Ok(Snapshot::new()));
        assert_eq!(store.snapshot().as_deref(), Some(&Snapshot::new()));
    }

    #[test]
    fn readers_never_observe_a_torn_snapshot() {
        let store = Arc::new(MetricsStore::new());
        let old = snapshot("old", 50);
        let new = Snapshot::builder()
            .job("new", |j| j.task("FAILED", "w9"))
            .job("old", |j| j.task("PAUSED", "w1"))
            .build();
        store.write(Ok(old.clone()));

        let done = Arc::new(AtomicBool::new(false));
        let mut readers = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            let done = Arc::clone(&done);
            let (old, new) = (old.clone(), new.clone());
            readers.push(thread::spawn(move || {
                while !done.load(Ordering::Acquire) {
                    let read = store.read();
                    let seen = read.snapshot().expect("snapshot published before readers");
                    assert!(seen == &old || seen == &new, "torn snapshot: {:?}", seen);
                }
            }));
        }

        for i in 0..2_000 {
            let next = if i % 2 == 0 { new.clone() } else { old.clone() };
            store.write(Ok(next));
        }
        done.store(true, Ordering::Release);

        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(store.generation(), 2_001);
    }

    #[test]
    fn err_does_not_wait_behind_a_queued_writer() {
        let store = Arc::new(MetricsStore::new());
        store.write(Ok(snapshot("conn-a", 1)));

        let (held_tx, held_rx) = mpsc::channel();
        let scrape = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let _read = store.read();
                held_tx.send(()).unwrap();
                thread::sleep(Duration::from_millis(500));
            })
        };
        held_rx.recv().unwrap();

        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                store.write(Err(PollError::List(UpstreamError::Status(503))));
            })
        };
        // Let the writer queue up on the lock.
        thread::sleep(Duration::from_millis(50));

        let started = Instant::now();
        let seen = store.err();
        let waited = started.elapsed();
        assert!(waited < Duration::from_millis(100), "err() waited {:?}", waited);
        assert!(seen.is_none());

        scrape.join().unwrap();
        writer.join().unwrap();
        assert!(matches!(
            store.err().as_deref(),
            Some(PollError::List(UpstreamError::Status(503)))
        ));
        assert_eq!(store.read().error(), store.err().as_deref());
    }
}
