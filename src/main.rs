use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use taskwatch::daemon::{shutdown_signal, Daemon};
use taskwatch::{logging, AppConfig, LogFormat, Overrides};

#[derive(Parser, Debug)]
#[command(name = "taskwatch")]
#[command(version, about = "Prometheus exporter for Kafka Connect task states")]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "TASKWATCH_CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Kafka Connect REST endpoint (e.g., "http://localhost:8083")
    #[arg(long)]
    connect_host: Option<String>,

    /// Seconds between polls of the Connect API
    #[arg(long)]
    poll_interval: Option<u64>,

    /// Address to serve metrics on (e.g., "0.0.0.0:9400")
    #[arg(long)]
    listen_addr: Option<String>,

    /// HTTP path for the metrics endpoint
    #[arg(long)]
    metrics_path: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            config_file: self.config.clone(),
            host: self.connect_host.clone(),
            poll_interval_secs: self.poll_interval,
            listen_addr: self.listen_addr.clone(),
            metrics_path: self.metrics_path.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.log_format);

    let config = AppConfig::load(&args.overrides())?;
    info!(
        host = %config.connect.host,
        listen_addr = %config.prometheus.listen_addr,
        "starting taskwatch"
    );

    let daemon = Daemon::bind(&config).await?;
    daemon
        .run(async {
            shutdown_signal().await;
            info!("Shutdown signal received");
        })
        .await
}
