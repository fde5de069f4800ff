//! Jobs and the tasks running under them.

use alloc::string::String;
use core::fmt;

/// The current state of one task belonging to a monitored job.
///
/// `state` is a free-form status string as reported upstream (for Kafka
/// Connect: `RUNNING`, `FAILED`, `PAUSED`, `UNASSIGNED`, ...). `worker`
/// identifies the node executing the task.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskState {
    /// Upstream task id, when the source reports one.
    pub id: Option<u32>,
    /// Status label.
    pub state: String,
    /// Identifier of the executing worker.
    pub worker: String,
}

impl TaskState {
    /// Create a task state without an id.
    pub fn new(state: impl Into<String>, worker: impl Into<String>) -> Self {
        Self {
            id: None,
            state: state.into(),
            worker: worker.into(),
        }
    }

    /// Attach the upstream task id.
    pub fn with_id(mut self, id: u32) -> Self {
        self.id = Some(id);
        self
    }
}

/// Label triple that a snapshot counts tasks under.
///
/// Ordering is lexical on `(job, state, worker)`, which gives snapshots a
/// stable iteration order independent of the order jobs were listed in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskKey {
    /// Job (connector) name.
    pub job: String,
    /// Task status label.
    pub state: String,
    /// Worker identifier.
    pub worker: String,
}

impl TaskKey {
    /// Create a key from its three labels.
    pub fn new(
        job: impl Into<String>,
        state: impl Into<String>,
        worker: impl Into<String>,
    ) -> Self {
        Self {
            job: job.into(),
            state: state.into(),
            worker: worker.into(),
        }
    }

    /// Key for `task` running under `job`.
    pub fn for_task(job: &str, task: &TaskState) -> Self {
        Self {
            job: job.into(),
            state: task.state.clone(),
            worker: task.worker.clone(),
        }
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.job, self.state, self.worker)
    }
}
