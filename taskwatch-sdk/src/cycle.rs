//! One poll cycle: list jobs, fetch their tasks, aggregate into a snapshot.
//!
//! Aggregation is pure. Given the same listing it always produces the same
//! [`Snapshot`], and any failure discards everything gathered so far, so a
//! half-built snapshot never leaves this module.

use taskwatch_types::{Snapshot, SnapshotBuilder, TaskState};

use crate::error::PollError;
use crate::source::TaskSource;

/// Accumulates the tasks of one cycle into a snapshot.
///
/// Jobs are added one at a time so that the caller can stop at the first
/// failure. The snapshot only exists once [`finish`](Self::finish) is called.
#[derive(Debug, Default)]
pub struct Aggregator {
    builder: SnapshotBuilder,
    jobs: usize,
}

impl Aggregator {
    /// Create an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count every task of `job`.
    ///
    /// A job with no tasks is rejected with [`PollError::EmptyTasks`]: it
    /// cannot be told apart from a broken connector, and reporting zero
    /// counts for it would look healthy.
    pub fn add_job(&mut self, job: &str, tasks: &[TaskState]) -> Result<(), PollError> {
        if tasks.is_empty() {
            return Err(PollError::EmptyTasks {
                job: job.to_string(),
            });
        }
        for task in tasks {
            self.builder.record(job, task);
        }
        self.jobs += 1;
        Ok(())
    }

    /// Number of jobs added so far.
    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// Finish the cycle and produce its snapshot.
    pub fn finish(self) -> Snapshot {
        self.builder.build()
    }
}

/// Build a snapshot from an already fetched listing.
///
/// Fails on the first job without tasks; no partial snapshot is returned.
pub fn build_snapshot<J: AsRef<str>>(
    listing: &[(J, Vec<TaskState>)],
) -> Result<Snapshot, PollError> {
    let mut aggregator = Aggregator::new();
    for (job, tasks) in listing {
        aggregator.add_job(job.as_ref(), tasks)?;
    }
    Ok(aggregator.finish())
}

/// Run one full cycle against `source`.
///
/// Jobs are walked in the order the listing returned them. The first failed
/// call or empty job aborts the cycle.
pub async fn collect<S: TaskSource + ?Sized>(source: &S) -> Result<Snapshot, PollError> {
    let jobs = source.list_jobs().await.map_err(PollError::List)?;

    let mut aggregator = Aggregator::new();
    for job in &jobs {
        let tasks = source
            .task_states(job)
            .await
            .map_err(|err| PollError::Status {
                job: job.clone(),
                source: err,
            })?;
        aggregator.add_job(job, &tasks)?;
    }

    Ok(aggregator.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UpstreamError;
    use crate::source::ScriptedSource;
    use proptest::prelude::*;

    fn tasks(pairs: &[(&str, &str)]) -> Vec<TaskState> {
        pairs
            .iter()
            .map(|(state, worker)| TaskState::new(*state, *worker))
            .collect()
    }

    #[test]
    fn counts_tasks_per_job_state_and_worker() {
        let listing = vec![(
            "conn-a",
            tasks(&[("RUNNING", "w1"), ("RUNNING", "w1"), ("FAILED", "w2")]),
        )];

        let snapshot = build_snapshot(&listing).unwrap();

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get("conn-a", "RUNNING", "w1"), 2);
        assert_eq!(snapshot.get("conn-a", "FAILED", "w2"), 1);
    }

    #[test]
    fn empty_listing_is_an_empty_snapshot() {
        let listing: Vec<(String, Vec<TaskState>)> = Vec::new();
        let snapshot = build_snapshot(&listing).unwrap();
        assert!(snapshot.is_empty());
    }

    #[test]
    fn job_without_tasks_fails_the_whole_build() {
        let listing = vec![
            ("healthy", tasks(&[("RUNNING", "w1")])),
            ("broken", Vec::new()),
            ("later", tasks(&[("RUNNING", "w2")])),
        ];

        let err = build_snapshot(&listing).unwrap_err();
        assert_eq!(
            err,
            PollError::EmptyTasks {
                job: "broken".to_string()
            }
        );
    }

    #[test]
    fn aggregator_counts_jobs() {
        let mut aggregator = Aggregator::new();
        aggregator.add_job("a", &tasks(&[("RUNNING", "w1")])).unwrap();
        aggregator.add_job("b", &tasks(&[("PAUSED", "w1")])).unwrap();
        assert!(aggregator.add_job("c", &[]).is_err());
        assert_eq!(aggregator.jobs(), 2);
    }

    #[tokio::test]
    async fn collect_walks_jobs_in_listing_order() {
        let source = ScriptedSource::new();
        source.set_jobs(["zulu", "alpha", "mike"]);
        for job in ["zulu", "alpha", "mike"] {
            source.set_tasks(job, tasks(&[("RUNNING", "w1")]));
        }

        let snapshot = collect(&source).await.unwrap();

        assert_eq!(
            source.status_calls(),
            vec!["zulu".to_string(), "alpha".to_string(), "mike".to_string()]
        );
        assert_eq!(snapshot.total(), 3);
    }

    #[tokio::test]
    async fn collect_reports_list_failure() {
        let source = ScriptedSource::new();
        source.fail_list(UpstreamError::Transport("connection refused".to_string()));

        let err = collect(&source).await.unwrap_err();
        assert!(matches!(err, PollError::List(UpstreamError::Transport(_))));
        assert!(source.status_calls().is_empty());
    }

    #[tokio::test]
    async fn collect_stops_at_first_failed_status() {
        let source = ScriptedSource::new();
        source.set_jobs(["a", "b", "c"]);
        source.set_tasks("a", tasks(&[("RUNNING", "w1")]));
        source.fail_tasks("b", UpstreamError::Status(500));
        source.set_tasks("c", tasks(&[("RUNNING", "w1")]));

        let err = collect(&source).await.unwrap_err();

        assert_eq!(
            err,
            PollError::Status {
                job: "b".to_string(),
                source: UpstreamError::Status(500),
            }
        );
        assert_eq!(source.status_calls(), vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn collect_stops_at_first_empty_job() {
        let source = ScriptedSource::new();
        source.set_jobs(["a", "b"]);
        source.set_tasks("a", Vec::new());
        source.fail_tasks("b", UpstreamError::Status(500));

        let err = collect(&source).await.unwrap_err();
        assert_eq!(err, PollError::EmptyTasks { job: "a".to_string() });
    }

    fn listing_strategy() -> impl Strategy<Value = Vec<(String, Vec<TaskState>)>> {
        let task = ("(RUNNING|FAILED|PAUSED|UNASSIGNED)", "w[0-3]")
            .prop_map(|(state, worker)| TaskState::new(state, worker));
        prop::collection::vec(
            ("[a-z]{1,6}", prop::collection::vec(task, 1..8)),
            0..6,
        )
    }

    proptest! {
        #[test]
        fn prop_build_is_idempotent(listing in listing_strategy()) {
            let first = build_snapshot(&listing).unwrap();
            let second = build_snapshot(&listing).unwrap();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_total_equals_task_count(listing in listing_strategy()) {
            let expected: u64 = listing.iter().map(|(_, tasks)| tasks.len() as u64).sum();
            let snapshot = build_snapshot(&listing).unwrap();
            prop_assert_eq!(snapshot.total(), expected);
        }

        #[test]
        fn prop_job_order_does_not_matter(listing in listing_strategy()) {
            let mut reversed = listing.clone();
            reversed.reverse();
            prop_assert_eq!(build_snapshot(&listing).unwrap(), build_snapshot(&reversed).unwrap());
        }
    }
}
