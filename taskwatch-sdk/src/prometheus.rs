//! Prometheus exposition format support.
//!
//! This module serves the contents of a [`MetricsStore`] in the Prometheus
//! text-based exposition format, so it can be scraped by Prometheus or any
//! compatible monitoring system.
//!
//! While the store holds a cycle error, the metrics endpoint answers `500`
//! with the error message and encodes nothing: a scraper never sees stale
//! counts that could be mistaken for the current state.
//!
//! ## Example
//!
//! ```rust,no_run
//! use taskwatch_sdk::prometheus::{PrometheusConfig, PrometheusServer};
//! use taskwatch_sdk::{Poller, ScriptedSource};
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let poller = Poller::builder(ScriptedSource::new()).build();
//!
//!     let config = PrometheusConfig::builder()
//!         .listen_addr("0.0.0.0:9400")
//!         .metrics_path("/metrics")
//!         .build();
//!     let server = PrometheusServer::new(config, poller.store());
//!
//!     let handle = poller.start();
//!     let listener = server.bind().await?;
//!     server.serve(listener, async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     }).await;
//!
//!     handle.stop().await;
//!     Ok(())
//! }
//! ```

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use taskwatch_types::Snapshot;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::store::MetricsStore;

/// Pause after a failed `accept` before trying again.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

const TEXT_FORMAT: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Configuration for Prometheus metrics endpoint.
#[derive(Debug, Clone)]
pub struct PrometheusConfig {
    /// Address to listen on (e.g., "0.0.0.0:9400")
    pub listen_addr: String,
    /// Path for metrics endpoint (e.g., "/metrics")
    pub metrics_path: String,
    /// Optional namespace prefix for all metrics
    pub namespace: Option<String>,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:9400".to_string(),
            metrics_path: "/metrics".to_string(),
            namespace: Some("kafka".to_string()),
        }
    }
}

impl PrometheusConfig {
    /// Create a new builder for PrometheusConfig.
    pub fn builder() -> PrometheusConfigBuilder {
        PrometheusConfigBuilder::default()
    }
}

/// Builder for PrometheusConfig.
#[derive(Debug, Default)]
pub struct PrometheusConfigBuilder {
    listen_addr: Option<String>,
    metrics_path: Option<String>,
    namespace: Option<Option<String>>,
}

impl PrometheusConfigBuilder {
    /// Set the listen address.
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = Some(addr.into());
        self
    }

    /// Set the metrics path.
    pub fn metrics_path(mut self, path: impl Into<String>) -> Self {
        self.metrics_path = Some(path.into());
        self
    }

    /// Set the namespace prefix for all metrics.
    pub fn namespace(mut self, ns: impl Into<String>) -> Self {
        self.namespace = Some(Some(ns.into()));
        self
    }

    /// Emit metric names without a namespace prefix.
    pub fn no_namespace(mut self) -> Self {
        self.namespace = Some(None);
        self
    }

    /// Build the PrometheusConfig.
    pub fn build(self) -> PrometheusConfig {
        let defaults = PrometheusConfig::default();
        PrometheusConfig {
            listen_addr: self.listen_addr.unwrap_or(defaults.listen_addr),
            metrics_path: self.metrics_path.unwrap_or(defaults.metrics_path),
            namespace: self.namespace.unwrap_or(defaults.namespace),
        }
    }
}

/// HTTP server exposing a [`MetricsStore`] to scrapers.
///
/// Cheap to clone; clones share the same store.
#[derive(Debug, Clone)]
pub struct PrometheusServer {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    config: PrometheusConfig,
    store: Arc<MetricsStore>,
}

impl PrometheusServer {
    /// Create a server for `store`.
    pub fn new(config: PrometheusConfig, store: Arc<MetricsStore>) -> Self {
        Self {
            shared: Arc::new(Shared { config, store }),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &PrometheusConfig {
        &self.shared.config
    }

    /// Bind a listener on the configured address.
    pub async fn bind(&self) -> std::io::Result<TcpListener> {
        let addr: SocketAddr = self
            .shared
            .config
            .listen_addr
            .parse()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        TcpListener::bind(addr).await
    }

    /// Get the current response for the metrics path.
    pub fn render(&self) -> Response<Full<Bytes>> {
        let config = &self.shared.config;
        respond(
            &config.metrics_path,
            &config.metrics_path,
            config.namespace.as_deref(),
            &self.shared.store,
        )
    }

    /// Accept connections on `listener` until `shutdown` completes.
    ///
    /// Connections already accepted are left to finish on their own.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, path = %self.shared.config.metrics_path, "serving metrics");
        }

        tokio::pin!(shutdown);

        loop {
            let (stream, peer) = tokio::select! {
                _ = &mut shutdown => break,
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(error = %e, "failed to accept metrics connection");
                        // Errors like EMFILE persist; don't spin on them.
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                        continue;
                    }
                },
            };

            let io = TokioIo::new(stream);
            let shared = Arc::clone(&self.shared);

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                    let shared = Arc::clone(&shared);
                    async move {
                        let config = &shared.config;
                        Ok::<_, Infallible>(respond(
                            req.uri().path(),
                            &config.metrics_path,
                            config.namespace.as_deref(),
                            &shared.store,
                        ))
                    }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    debug!(%peer, error = %e, "metrics connection error");
                }
            });
        }

        info!("metrics server stopped accepting connections");
    }
}

/// Build the response for a request to `path`.
///
/// For the metrics path the store's error is checked first; only when it is
/// clear is a read taken, and that read is held until encoding is done.
pub fn respond(
    path: &str,
    metrics_path: &str,
    namespace: Option<&str>,
    store: &MetricsStore,
) -> Response<Full<Bytes>> {
    if path == metrics_path {
        if let Some(err) = store.err() {
            return text(StatusCode::INTERNAL_SERVER_ERROR, "text/plain", err.to_string());
        }

        let read = store.read();
        // A failed cycle may have landed between the check and the read.
        if let Some(err) = read.error() {
            return text(StatusCode::INTERNAL_SERVER_ERROR, "text/plain", err.to_string());
        }
        let body = format_prometheus(read.snapshot(), namespace);
        drop(read);

        text(StatusCode::OK, TEXT_FORMAT, body)
    } else if path == "/health" || path == "/healthz" {
        text(StatusCode::OK, "text/plain", "OK".to_string())
    } else {
        text(StatusCode::NOT_FOUND, "text/plain", "Not Found".to_string())
    }
}

fn text(status: StatusCode, content_type: &'static str, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// Format a snapshot as Prometheus exposition format.
///
/// `None` (nothing published yet) yields only the HELP and TYPE lines.
pub fn format_prometheus(snapshot: Option<&Snapshot>, namespace: Option<&str>) -> String {
    let mut output = String::new();
    let prefix = namespace.map(|n| format!("{}_", n)).unwrap_or_default();

    output.push_str(&format!("# HELP {}connect_tasks deployed tasks\n", prefix));
    output.push_str(&format!("# TYPE {}connect_tasks gauge\n", prefix));

    for (key, count) in snapshot.into_iter().flat_map(|s| s.iter()) {
        output.push_str(&format!(
            "{}connect_tasks{{connector=\"{}\",state=\"{}\",worker=\"{}\"}} {}\n",
            prefix,
            escape_label_value(&key.job),
            escape_label_value(&key.state),
            escape_label_value(&key.worker),
            count
        ));
    }

    output
}

/// Escape a label value for Prometheus format.
/// Backslash, double-quote, and newline must be escaped.
fn escape_label_value(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
