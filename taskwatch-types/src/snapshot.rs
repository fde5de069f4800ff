//! Snapshot - a point-in-time view of task states across all jobs.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use crate::{TaskKey, TaskState};

/// An immutable, point-in-time count of tasks per `(job, state, worker)`.
///
/// A snapshot is produced by one complete poll cycle. Counts are "number of
/// tasks currently in this state on this worker", not rates.
///
/// # Example
///
/// ```rust
/// use taskwatch_types::Snapshot;
///
/// let snapshot = Snapshot::builder()
///     .job("orders-sink", |j| j.task("RUNNING", "10.0.0.1:8083"))
///     .build();
///
/// assert_eq!(snapshot.total(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Snapshot {
    counts: BTreeMap<TaskKey, u64>,
}

impl Snapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder for constructing snapshots.
    pub fn builder() -> SnapshotBuilder {
        SnapshotBuilder::new()
    }

    /// Check if the snapshot has no series.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Number of distinct `(job, state, worker)` series.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Count for one label triple, zero when absent.
    pub fn get(&self, job: &str, state: &str, worker: &str) -> u64 {
        self.counts
            .get(&TaskKey::new(job, state, worker))
            .copied()
            .unwrap_or(0)
    }

    /// Iterate over all series in label order.
    pub fn iter(&self) -> impl Iterator<Item = (&TaskKey, u64)> {
        self.counts.iter().map(|(key, count)| (key, *count))
    }

    /// Distinct job names present in the snapshot, sorted.
    pub fn jobs(&self) -> Vec<&str> {
        let mut jobs: Vec<&str> = self.counts.keys().map(|k| k.job.as_str()).collect();
        jobs.dedup();
        jobs
    }

    /// Total number of tasks across all series.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Total number of tasks for a single job.
    pub fn job_total(&self, job: &str) -> u64 {
        self.counts
            .iter()
            .filter(|(key, _)| key.job == job)
            .map(|(_, count)| *count)
            .sum()
    }
}

/// Builder for constructing `Snapshot` instances.
///
/// Both a fluent closure API (for tests and fixtures) and an in-place
/// [`record`](SnapshotBuilder::record) API (for aggregation loops) are
/// provided.
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    counts: BTreeMap<TaskKey, u64>,
}

impl SnapshotBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the tasks of one job, built with a closure.
    pub fn job<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: FnOnce(JobTasksBuilder) -> JobTasksBuilder,
    {
        let name = name.into();
        for task in f(JobTasksBuilder::new()).tasks {
            self.record(&name, &task);
        }
        self
    }

    /// Count one task under `job`.
    pub fn record(&mut self, job: &str, task: &TaskState) -> &mut Self {
        *self.counts.entry(TaskKey::for_task(job, task)).or_insert(0) += 1;
        self
    }

    /// Number of series recorded so far.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Check if nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Build the snapshot.
    pub fn build(self) -> Snapshot {
        Snapshot {
            counts: self.counts,
        }
    }
}

/// Collects the tasks of a single job for [`SnapshotBuilder::job`].
#[derive(Debug, Default)]
pub struct JobTasksBuilder {
    tasks: Vec<TaskState>,
}

impl JobTasksBuilder {
    /// Create an empty task list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task in `state` on `worker`.
    pub fn task(mut self, state: impl Into<String>, worker: impl Into<String>) -> Self {
        self.tasks.push(TaskState::new(state, worker));
        self
    }
}
