//! # taskwatch
//!
//! Prometheus exporter for Kafka Connect. Polls the Connect REST API on a
//! fixed interval and serves the number of tasks per connector, state and
//! worker as the `kafka_connect_tasks` gauge.
//!
//! The binary wires three pieces together:
//!
//! - [`AppConfig`](crate::config::AppConfig) resolves settings from defaults, a TOML file, the
//!   environment and the command line
//! - [`daemon::Daemon`] owns the poller and the metrics server
//! - [`logging::init`] installs the tracing subscriber

pub mod config;
pub mod daemon;
pub mod logging;

pub use crate::config::{AppConfig, Overrides};
pub use daemon::Daemon;
pub use logging::LogFormat;
