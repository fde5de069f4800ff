//! Daemon lifecycle: start polling, serve metrics, stop on request.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use taskwatch_adapters::connect::ConnectAdapter;
use taskwatch_sdk::prometheus::PrometheusServer;
use taskwatch_sdk::{Poller, TaskSource};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::config::AppConfig;

/// A bound, not yet running exporter.
pub struct Daemon {
    poller: Poller,
    server: PrometheusServer,
    listener: TcpListener,
    shutdown_timeout: Duration,
}

impl Daemon {
    /// Build the Kafka Connect client and bind the metrics listener.
    pub async fn bind(config: &AppConfig) -> Result<Self> {
        let adapter = ConnectAdapter::builder()
            .host(config.connect.host.clone())
            .timeout(config.request_timeout())
            .build()
            .context("building Kafka Connect client")?;
        Self::bind_with_source(config, adapter).await
    }

    /// Like [`Daemon::bind`] but polls `source` instead of Kafka Connect.
    pub async fn bind_with_source(config: &AppConfig, source: impl TaskSource) -> Result<Self> {
        info!(
            upstream = source.description(),
            interval_secs = config.connect.poll_interval_secs,
            "configuring poller"
        );

        let poller = Poller::builder(source)
            .interval(config.poll_interval())
            .build();
        let server = PrometheusServer::new(config.exporter(), poller.store());
        let listen_addr = config.prometheus.listen_addr;
        let listener = server
            .bind()
            .await
            .with_context(|| format!("binding metrics listener on {}", listen_addr))?;

        Ok(Self {
            poller,
            server,
            listener,
            shutdown_timeout: config.shutdown_timeout(),
        })
    }

    /// Address the metrics server is listening on.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("reading metrics listener address")
    }

    /// Run until `shutdown` completes, then stop the server and the poller.
    ///
    /// The poller gets at most the configured shutdown timeout to exit.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let poller = self.poller.start();

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(self.server.serve(self.listener, async move {
            let _ = stop_rx.await;
        }));

        shutdown.await;
        info!("shutting down");

        let _ = stop_tx.send(());
        if let Err(e) = server.await {
            warn!(error = %e, "metrics server task failed");
        }

        match tokio::time::timeout(self.shutdown_timeout, poller.stop()).await {
            Ok(()) => info!("shutdown complete"),
            Err(_) => warn!(
                timeout_secs = self.shutdown_timeout.as_secs(),
                "poller did not stop in time, exiting anyway"
            ),
        }

        Ok(())
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM on Unix)
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
