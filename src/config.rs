//! Layered daemon configuration.
//!
//! Sources, lowest precedence first:
//!
//! 1. built-in defaults
//! 2. an optional TOML file (`--config` or `TASKWATCH_CONFIG_FILE`)
//! 3. environment variables such as `TASKWATCH_CONNECT__HOST`
//! 4. command-line overrides

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use taskwatch_sdk::prometheus::PrometheusConfig;

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "TASKWATCH";

/// Fully resolved daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AppConfig {
    /// `[connect]`: upstream and polling.
    pub connect: ConnectSettings,
    /// `[prometheus]`: metrics endpoint.
    pub prometheus: PrometheusSettings,
    /// `[shutdown]`: exit behaviour.
    pub shutdown: ShutdownSettings,
}

/// The `[connect]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectSettings {
    /// Base URL of the Kafka Connect REST API.
    pub host: String,
    /// Seconds between poll cycles.
    pub poll_interval_secs: u64,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

/// The `[prometheus]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PrometheusSettings {
    /// Address the metrics server binds.
    pub listen_addr: SocketAddr,
    /// HTTP path serving the exposition.
    pub metrics_path: String,
    /// Metric name prefix; empty disables it.
    pub namespace: String,
}

/// The `[shutdown]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ShutdownSettings {
    /// Seconds to wait for the poller to exit.
    pub timeout_secs: u64,
}

/// Values given on the command line. `None` leaves the lower layers alone.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// TOML file layered over the defaults.
    pub config_file: Option<PathBuf>,
    /// Replaces `connect.host`.
    pub host: Option<String>,
    /// Replaces `connect.poll_interval_secs`.
    pub poll_interval_secs: Option<u64>,
    /// Replaces `prometheus.listen_addr`.
    pub listen_addr: Option<String>,
    /// Replaces `prometheus.metrics_path`.
    pub metrics_path: Option<String>,
}

impl AppConfig {
    /// Load configuration from every layer, reading the process environment.
    pub fn load(overrides: &Overrides) -> Result<Self> {
        Self::load_from(overrides, None)
    }

    /// Load configuration with an explicit environment instead of the
    /// process one.
    pub fn load_from(overrides: &Overrides, env: Option<HashMap<String, String>>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("connect.host", "")?
            .set_default("connect.poll_interval_secs", 10_i64)?
            .set_default("connect.timeout_secs", 10_i64)?
            .set_default("prometheus.listen_addr", "0.0.0.0:9400")?
            .set_default("prometheus.metrics_path", "/metrics")?
            .set_default("prometheus.namespace", "kafka")?
            .set_default("shutdown.timeout_secs", 10_i64)?;

        if let Some(path) = &overrides.config_file {
            builder = builder.add_source(File::from(path.as_path()).format(FileFormat::Toml));
        }

        let poll_interval = overrides.poll_interval_secs.map(|secs| secs as i64);

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .set_override_option("connect.host", overrides.host.clone())?
            .set_override_option("connect.poll_interval_secs", poll_interval)?
            .set_override_option("prometheus.listen_addr", overrides.listen_addr.clone())?
            .set_override_option("prometheus.metrics_path", overrides.metrics_path.clone())?
            .build()
            .context("reading configuration")?;

        let config: AppConfig = config
            .try_deserialize()
            .context("parsing configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the daemon cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.connect.host.trim().is_empty() {
            bail!("connect.host is required (set TASKWATCH_CONNECT__HOST or --connect-host)");
        }
        if self.connect.poll_interval_secs == 0 {
            bail!("connect.poll_interval_secs must be greater than zero");
        }
        if self.connect.timeout_secs == 0 {
            bail!("connect.timeout_secs must be greater than zero");
        }
        if self.shutdown.timeout_secs == 0 {
            bail!("shutdown.timeout_secs must be greater than zero");
        }
        if !self.prometheus.metrics_path.starts_with('/') {
            bail!(
                "prometheus.metrics_path must start with '/', got {:?}",
                self.prometheus.metrics_path
            );
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.connect.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.connect.timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown.timeout_secs)
    }

    /// Settings for the metrics endpoint.
    pub fn exporter(&self) -> PrometheusConfig {
        let builder = PrometheusConfig::builder()
            .listen_addr(self.prometheus.listen_addr.to_string())
            .metrics_path(self.prometheus.metrics_path.clone());
        if self.prometheus.namespace.is_empty() {
            builder.no_namespace().build()
        } else {
            builder.namespace(self.prometheus.namespace.clone()).build()
        }
    }
}
