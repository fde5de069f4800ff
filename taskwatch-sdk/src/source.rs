//! Upstream client port.
//!
//! The poller only talks to the orchestration API through [`TaskSource`].
//! Production code plugs in an HTTP client (see `taskwatch-adapters`);
//! tests plug in a [`ScriptedSource`].

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use taskwatch_types::TaskState;

use crate::error::UpstreamError;

/// Trait for enumerating monitored jobs and fetching their task states.
///
/// Implementations must map transport failures to
/// [`UpstreamError::Transport`] and non-2xx responses to
/// [`UpstreamError::Status`]. Request timeouts belong to the implementation;
/// the poller never cancels a call in flight.
#[async_trait]
pub trait TaskSource: Send + Sync + Debug + 'static {
    /// List the names of all monitored jobs, in upstream order.
    async fn list_jobs(&self) -> Result<Vec<String>, UpstreamError>;

    /// Fetch the current state of every task under `job`.
    async fn task_states(&self, job: &str) -> Result<Vec<TaskState>, UpstreamError>;

    /// Human-readable description of the source, used in logs.
    fn description(&self) -> &str {
        "upstream"
    }
}

#[async_trait]
impl<T: TaskSource + ?Sized> TaskSource for Arc<T> {
    async fn list_jobs(&self) -> Result<Vec<String>, UpstreamError> {
        (**self).list_jobs().await
    }

    async fn task_states(&self, job: &str) -> Result<Vec<TaskState>, UpstreamError> {
        (**self).task_states(job).await
    }

    fn description(&self) -> &str {
        (**self).description()
    }
}

/// An in-memory source whose responses are set by the caller.
///
/// Clones share the same script, so a test can keep one handle and change
/// the upstream's answers while a poller owns the other.
///
/// # Example
///
/// ```
/// use taskwatch_sdk::ScriptedSource;
/// use taskwatch_types::TaskState;
///
/// let source = ScriptedSource::new();
/// source.set_jobs(["conn-a"]);
/// source.set_tasks("conn-a", vec![TaskState::new("RUNNING", "w1")]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    script: Arc<Mutex<Script>>,
}

#[derive(Debug)]
struct Script {
    jobs: Result<Vec<String>, UpstreamError>,
    tasks: HashMap<String, Result<Vec<TaskState>, UpstreamError>>,
    list_calls: usize,
    status_calls: Vec<String>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            jobs: Ok(Vec::new()),
            tasks: HashMap::new(),
            list_calls: 0,
            status_calls: Vec::new(),
        }
    }
}

impl ScriptedSource {
    /// Create a source that lists no jobs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the job listing, in the order it will be returned.
    pub fn set_jobs<I, S>(&self, jobs: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.script.lock().jobs = Ok(jobs.into_iter().map(Into::into).collect());
    }

    /// Make the listing call fail.
    pub fn fail_list(&self, err: UpstreamError) {
        self.script.lock().jobs = Err(err);
    }

    /// Set the tasks reported for `job`.
    pub fn set_tasks(&self, job: impl Into<String>, tasks: Vec<TaskState>) {
        self.script.lock().tasks.insert(job.into(), Ok(tasks));
    }

    /// Make the status call for `job` fail.
    pub fn fail_tasks(&self, job: impl Into<String>, err: UpstreamError) {
        self.script.lock().tasks.insert(job.into(), Err(err));
    }

    /// Number of listing calls served so far.
    pub fn list_calls(&self) -> usize {
        self.script.lock().list_calls
    }

    /// Jobs whose status was requested, in call order.
    pub fn status_calls(&self) -> Vec<String> {
        self.script.lock().status_calls.clone()
    }
}

#[async_trait]
impl TaskSource for ScriptedSource {
    async fn list_jobs(&self) -> Result<Vec<String>, UpstreamError> {
        let mut script = self.script.lock();
        script.list_calls += 1;
        script.jobs.clone()
    }

    async fn task_states(&self, job: &str) -> Result<Vec<TaskState>, UpstreamError> {
        let mut script = self.script.lock();
        script.status_calls.push(job.to_string());
        // Unknown jobs behave like a connector deleted between list and status.
        script
            .tasks
            .get(job)
            .cloned()
            .unwrap_or(Err(UpstreamError::Status(404)))
    }

    fn description(&self) -> &str {
        "scripted"
    }
}
