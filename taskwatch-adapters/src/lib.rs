//! # taskwatch-adapters
//!
//! Upstream clients that feed task states into the taskwatch poller.
//!
//! Each adapter implements [`taskwatch_sdk::TaskSource`], so it can be handed
//! straight to [`taskwatch_sdk::Poller::builder`].
//!
//! ## Supported Systems
//!
//! - **Kafka Connect** (`connect` feature) - Lists connectors and the state of
//!   every task via the Connect REST API
//!
//! ## Quick Start (Kafka Connect)
//!
//! ```rust,no_run
//! use taskwatch_adapters::connect::ConnectAdapter;
//! use taskwatch_sdk::TaskSource;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let adapter = ConnectAdapter::builder()
//!         .host("http://localhost:8083")
//!         .build()?;
//!
//!     for connector in adapter.list_jobs().await? {
//!         let tasks = adapter.task_states(&connector).await?;
//!         println!("{}: {} tasks", connector, tasks.len());
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;

#[cfg(feature = "connect")]
pub mod connect;

pub use error::AdapterError;

// Re-export types for convenience
pub use taskwatch_types::TaskState;
