//! Kafka Connect adapter using the Connect REST API.
//!
//! This adapter lists connectors and their task states by querying a Connect
//! worker's REST interface, which is typically available on port 8083.
//!
//! ## Endpoints Used
//!
//! - `GET /connectors`: names of all deployed connectors
//! - `GET /connectors/{name}/status`: connector state plus one entry per task
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use taskwatch_adapters::connect::ConnectAdapter;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let adapter = ConnectAdapter::builder()
//!         .host("http://connect.local:8083")
//!         .timeout(Duration::from_secs(5))
//!         .build()?;
//!
//!     let status = adapter.connector_status("orders-sink").await?;
//!     for task in &status.tasks {
//!         println!("task {} is {} on {}", task.id, task.state, task.worker_id);
//!     }
//!
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::trace;

use taskwatch_sdk::{TaskSource, UpstreamError};
use taskwatch_types::TaskState;

use crate::AdapterError;

/// Default Connect REST endpoint.
pub const DEFAULT_HOST: &str = "http://localhost:8083";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_USER_AGENT: &str = concat!("taskwatch/", env!("CARGO_PKG_VERSION"));

/// Kafka Connect adapter for collecting task states.
#[derive(Debug, Clone)]
pub struct ConnectAdapter {
    client: Client,
    endpoint: String,
}

impl ConnectAdapter {
    /// Create a new builder for configuring the adapter.
    pub fn builder() -> ConnectAdapterBuilder {
        ConnectAdapterBuilder::default()
    }

    /// The normalized base URL requests are sent to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// List the names of all connectors deployed on the cluster.
    pub async fn list_connectors(&self) -> Result<Vec<String>, AdapterError> {
        let url = format!("{}/connectors", self.endpoint);
        self.get_json(&url).await
    }

    /// Fetch the status of one connector and its tasks.
    pub async fn connector_status(&self, name: &str) -> Result<ConnectorStatus, AdapterError> {
        let url = format!("{}/connectors/{}/status", self.endpoint, urlencoded(name));
        self.get_json(&url).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, AdapterError> {
        trace!(url, "GET");

        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AdapterError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl TaskSource for ConnectAdapter {
    async fn list_jobs(&self) -> Result<Vec<String>, UpstreamError> {
        Ok(self.list_connectors().await?)
    }

    async fn task_states(&self, job: &str) -> Result<Vec<TaskState>, UpstreamError> {
        let status = self.connector_status(job).await?;
        Ok(status.tasks.iter().map(TaskState::from).collect())
    }

    fn description(&self) -> &str {
        &self.endpoint
    }
}

/// Builder for ConnectAdapter.
#[derive(Debug, Default)]
pub struct ConnectAdapterBuilder {
    host: Option<String>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
}

impl ConnectAdapterBuilder {
    /// Set the Connect REST endpoint (e.g., "http://localhost:8083").
    ///
    /// A host without a scheme is assumed to be plain HTTP.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the request timeout (default: 10 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the User-Agent header sent with every request.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Build the adapter.
    pub fn build(self) -> Result<ConnectAdapter, AdapterError> {
        let endpoint = normalize_host(self.host.as_deref().unwrap_or(DEFAULT_HOST))?;

        let client = Client::builder()
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .user_agent(
                self.user_agent
                    .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            )
            .build()
            .map_err(|e| AdapterError::Config(e.to_string()))?;

        Ok(ConnectAdapter { client, endpoint })
    }
}

fn normalize_host(host: &str) -> Result<String, AdapterError> {
    let host = host.trim().trim_end_matches('/');
    if host.is_empty() {
        return Err(AdapterError::Config("host must not be empty".to_string()));
    }
    if host.contains("://") {
        Ok(host.to_string())
    } else {
        Ok(format!("http://{}", host))
    }
}

// Percent-encode a connector name for use as a single path segment
fn urlencoded(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

/// Connector status from `GET /connectors/{name}/status`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectorStatus {
    /// Connector name as registered with the cluster.
    pub name: String,
    /// State of the connector instance.
    pub connector: ConnectorState,
    /// One entry per task; absent while the connector has none.
    #[serde(default)]
    pub tasks: Vec<TaskStatus>,
    /// `source` or `sink`, when the worker reports it.
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

/// State of the connector instance itself.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectorState {
    /// e.g. `RUNNING`, `PAUSED`, `FAILED`.
    pub state: String,
    /// `host:port` of the worker running the connector.
    pub worker_id: String,
}

/// State of a single connector task.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskStatus {
    /// Task index within the connector.
    pub id: u32,
    /// e.g. `RUNNING`, `UNASSIGNED`, `FAILED`.
    pub state: String,
    /// `host:port` of the worker running the task.
    pub worker_id: String,
    /// Stack trace reported for failed tasks.
    #[serde(default)]
    pub trace: Option<String>,
}

impl From<&TaskStatus> for TaskState {
    fn from(task: &TaskStatus) -> Self {
        TaskState::new(task.state.clone(), task.worker_id.clone()).with_id(task.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves canned `(status, body)` pairs keyed by request path.
    async fn responder(routes: HashMap<&'static str, (u16, &'static str)>) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                let routes = routes.clone();
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 1024];
                    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                        match stream.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => buf.extend_from_slice(&chunk[..n]),
                        }
                    }
                    let request = String::from_utf8_lossy(&buf);
                    let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();
                    let (code, body) = routes.get(path.as_str()).copied().unwrap_or((404, "{}"));
                    let response = format!(
                        "HTTP/1.1 {} X\r\nContent-Type: application/json\r\n\
                         Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                        code,
                        body.len(),
                        body
                    );
                    let _ = stream.write_all(response.as_bytes()).await;
                    let _ = stream.shutdown().await;
                });
            }
        });

        addr
    }

    fn adapter_for(addr: SocketAddr) -> ConnectAdapter {
        ConnectAdapter::builder()
            .host(format!("http://{}", addr))
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap()
    }

    const STATUS_BODY: &str = r#"{
        "name": "conn-a",
        "connector": {"state": "RUNNING", "worker_id": "w1:8083"},
        "tasks": [
            {"id": 0, "state": "RUNNING", "worker_id": "w1:8083"},
            {"id": 1, "state": "FAILED", "worker_id": "w2:8083", "trace": "boom"}
        ],
        "type": "sink"
    }"#;

    #[test]
    fn test_builder_defaults() {
        let adapter = ConnectAdapter::builder().build().unwrap();
        assert_eq!(adapter.endpoint(), "http://localhost:8083");
        assert_eq!(adapter.description(), "http://localhost:8083");
    }

    #[test]
    fn test_builder_custom() {
        let adapter = ConnectAdapter::builder()
            .host("connect.local:8083/")
            .timeout(Duration::from_secs(3))
            .user_agent("probe/1.0")
            .build()
            .unwrap();

        assert_eq!(adapter.endpoint(), "http://connect.local:8083");
    }

    #[test]
    fn test_builder_rejects_empty_host() {
        let err = ConnectAdapter::builder().host("  ").build().unwrap_err();
        assert!(matches!(err, AdapterError::Config(_)));
    }

    #[test]
    fn test_urlencoded() {
        assert_eq!(urlencoded("simple"), "simple");
        assert_eq!(urlencoded("orders-sink_v2.1"), "orders-sink_v2.1");
        assert_eq!(urlencoded("my/connector"), "my%2Fconnector");
        assert_eq!(urlencoded("a b?c"), "a%20b%3Fc");
        assert_eq!(urlencoded("é"), "%C3%A9");
    }

    #[test]
    fn test_status_deserializes() {
        let status: ConnectorStatus = serde_json::from_str(STATUS_BODY).unwrap();
        assert_eq!(status.name, "conn-a");
        assert_eq!(status.connector.state, "RUNNING");
        assert_eq!(status.kind.as_deref(), Some("sink"));
        assert_eq!(status.tasks.len(), 2);
        assert_eq!(status.tasks[1].trace.as_deref(), Some("boom"));

        let task = TaskState::from(&status.tasks[1]);
        assert_eq!(task, TaskState::new("FAILED", "w2:8083").with_id(1));
    }

    #[test]
    fn test_status_without_tasks() {
        let status: ConnectorStatus = serde_json::from_str(
            r#"{"name": "idle", "connector": {"state": "PAUSED", "worker_id": "w1"}}"#,
        )
        .unwrap();
        assert!(status.tasks.is_empty());
    }

    #[tokio::test]
    async fn test_task_source_over_http() {
        let addr = responder(HashMap::from([
            ("/connectors", (200, r#"["conn-a","my connector"]"#)),
            ("/connectors/conn-a/status", (200, STATUS_BODY)),
        ]))
        .await;
        let adapter = adapter_for(addr);

        let jobs = adapter.list_jobs().await.unwrap();
        assert_eq!(jobs, vec!["conn-a".to_string(), "my connector".to_string()]);

        let tasks = adapter.task_states("conn-a").await.unwrap();
        assert_eq!(
            tasks,
            vec![
                TaskState::new("RUNNING", "w1:8083").with_id(0),
                TaskState::new("FAILED", "w2:8083").with_id(1),
            ]
        );
    }

    #[tokio::test]
    async fn test_names_are_encoded_in_paths() {
        let addr = responder(HashMap::from([(
            "/connectors/my%20connector/status",
            (200, STATUS_BODY),
        )]))
        .await;
        let adapter = adapter_for(addr);

        assert!(adapter.connector_status("my connector").await.is_ok());
    }

    #[tokio::test]
    async fn test_non_success_is_status_error() {
        let addr = responder(HashMap::from([("/connectors", (503, "{}"))])).await;
        let adapter = adapter_for(addr);

        assert_eq!(adapter.list_jobs().await, Err(UpstreamError::Status(503)));
        assert_eq!(
            adapter.task_states("missing").await,
            Err(UpstreamError::Status(404))
        );
    }

    #[tokio::test]
    async fn test_bad_json_is_decode_error() {
        let addr = responder(HashMap::from([("/connectors", (200, "not json"))])).await;
        let adapter = adapter_for(addr);

        let err = adapter.list_jobs().await.unwrap_err();
        assert!(matches!(err, UpstreamError::Decode(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = adapter_for(addr).list_jobs().await.unwrap_err();
        assert!(matches!(err, UpstreamError::Transport(_)), "{:?}", err);
    }
}
