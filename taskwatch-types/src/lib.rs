//! # taskwatch-types
//!
//! Core types for task-state monitoring. This crate defines the data model
//! shared by the taskwatch poller, the upstream adapters and the exposition
//! layer: monitored jobs, the tasks running under them, and the aggregated
//! [`Snapshot`] that is published once per poll cycle.
//!
//! ## Design Goals
//!
//! - **Zero dependencies**: plain data, usable from any runtime
//! - **Deterministic**: snapshots iterate in a stable order and carry no
//!   hidden clock reads, so two builds from the same input compare equal
//! - **Ergonomic builders**: fluent API for constructing snapshots in tests
//!
//! ## Example
//!
//! ```rust
//! use taskwatch_types::Snapshot;
//!
//! let snapshot = Snapshot::builder()
//!     .job("conn-a", |j| {
//!         j.task("RUNNING", "w1")
//!          .task("RUNNING", "w1")
//!          .task("FAILED", "w2")
//!     })
//!     .build();
//!
//! assert_eq!(snapshot.get("conn-a", "RUNNING", "w1"), 2);
//! assert_eq!(snapshot.get("conn-a", "FAILED", "w2"), 1);
//! assert_eq!(snapshot.len(), 2);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod snapshot;
mod task;

pub use snapshot::*;
pub use task::*;
