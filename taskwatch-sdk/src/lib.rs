//! # taskwatch-sdk
//!
//! Polling engine for task-state exporters.
//!
//! A [`Poller`] periodically asks a [`TaskSource`] for every monitored job
//! and its tasks, aggregates the answers into a [`Snapshot`], and publishes
//! it to a [`MetricsStore`]. Scrapers read the store through the
//! [`prometheus`] module and never see a snapshot that is halfway through
//! being replaced.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use taskwatch_sdk::{Poller, ScriptedSource};
//! use taskwatch_types::TaskState;
//!
//! #[tokio::main]
//! async fn main() {
//!     let source = ScriptedSource::new();
//!     source.set_jobs(["orders-sink"]);
//!     source.set_tasks("orders-sink", vec![TaskState::new("RUNNING", "10.0.0.1:8083")]);
//!
//!     let poller = Poller::builder(source)
//!         .interval(Duration::from_secs(10))
//!         .build();
//!     let store = poller.store();
//!     let handle = poller.start();
//!
//!     // ... serve `store` ...
//!
//!     handle.stop().await;
//!     println!("last error: {:?}", store.err());
//! }
//! ```
//!
//! ## Guarantees
//!
//! - **All or nothing**: a cycle that fails at any job publishes nothing
//! - **Errors don't erase data**: a failed cycle records its error and keeps
//!   the last good snapshot
//! - **Consistent reads**: readers share the store; a write excludes them
//!   only for the swap
//! - **Clean shutdown**: [`PollerHandle::stop`] returns once the loop is gone

mod clock;
mod cycle;
mod error;
mod poller;
mod source;
mod store;

#[cfg(feature = "prometheus")]
pub mod prometheus;

pub use clock::{Clock, ManualClock, TokioClock};
pub use cycle::{build_snapshot, collect, Aggregator};
pub use error::{PollError, UpstreamError};
pub use poller::{Poller, PollerBuilder, PollerHandle, DEFAULT_POLL_INTERVAL};
pub use source::{ScriptedSource, TaskSource};
pub use store::{MetricsStore, StoreRead};

// Re-export types for convenience
pub use taskwatch_types::{Snapshot, TaskKey, TaskState};
