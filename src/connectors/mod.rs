use crate::config::OrchestratorConfig;
use crate::types::{ConnectorKind, DataSource, OrchestratorError, RawItem, Result};
use async_trait::async_trait;
use backoff::{backoff::Backoff, exponential::ExponentialBackoff};
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

pub mod custom_api;
pub mod fire_crawl;
pub mod twitter;

pub use custom_api::CustomApiConnector;
pub use fire_crawl::FireCrawlConnector;
pub use twitter::TwitterConnector;

/// Adapter that pulls raw content from one external source type.
#[async_trait]
pub trait Connector: Send + Sync {
    fn kind(&self) -> ConnectorKind;

    /// Fetch items from the source, optionally restricted to those published
    /// after `since`.
    async fn fetch(&self, source: &DataSource, since: Option<DateTime<Utc>>)
        -> Result<Vec<RawItem>>;

    /// Lightweight connectivity check. Does not fetch content.
    async fn probe(&self, source: &DataSource) -> Result<()>;
}

/// Shared HTTP client with retry/backoff for transient failures, used by the
/// concrete connectors.
pub struct HttpFetcher {
    client: Client,
    max_retries: u32,
    retry_delay_secs: u64,
}

impl HttpFetcher {
    pub fn new(timeout_secs: u64, max_retries: u32, retry_delay_secs: u64) -> Self {
        let client = Client::builder()
            .user_agent("trend-orchestrator/0.1")
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            max_retries,
            retry_delay_secs,
        }
    }

    /// GET a JSON document, retrying transient failures with exponential
    /// backoff.
    pub async fn get_json(
        &self,
        url: &str,
        headers: &[(&str, String)],
    ) -> Result<serde_json::Value> {
        self.request_json(|| {
            let mut request = self.client.get(url);
            for (name, value) in headers {
                request = request.header(*name, value);
            }
            request
        })
        .await
    }

    /// POST a JSON body and return the JSON response, with the same retry
    /// behavior as [`HttpFetcher::get_json`].
    pub async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, String)],
        body: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        self.request_json(|| {
            let mut request = self.client.post(url).json(body);
            for (name, value) in headers {
                request = request.header(*name, value);
            }
            request
        })
        .await
    }

    async fn request_json<F>(&self, build: F) -> Result<serde_json::Value>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut backoff: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
            current_interval: Duration::from_secs(self.retry_delay_secs),
            initial_interval: Duration::from_secs(self.retry_delay_secs),
            max_interval: Duration::from_secs(self.retry_delay_secs * 16),
            multiplier: 2.0,
            max_elapsed_time: Some(Duration::from_secs(self.retry_delay_secs * 60)),
            ..Default::default()
        };

        let mut last_error: Option<OrchestratorError> = None;

        for attempt in 0..=self.max_retries {
            match build().send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response.json::<serde_json::Value>().await?);
                    }

                    last_error = Some(OrchestratorError::General(format!(
                        "HTTP {}: {}",
                        status,
                        status.canonical_reason().unwrap_or("Unknown")
                    )));

                    // Client errors other than 429 will not get better on retry.
                    if status.is_client_error() && status.as_u16() != 429 {
                        break;
                    }
                }
                Err(e) => {
                    last_error = Some(OrchestratorError::Http(e));
                }
            }

            if attempt < self.max_retries {
                if let Some(delay) = backoff.next_backoff() {
                    warn!("Attempt {} failed, retrying in {:?}", attempt + 1, delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| OrchestratorError::General("request failed".to_string())))
    }

    /// Issue a plain GET and report success/failure without reading the body.
    pub async fn probe(&self, url: &str) -> Result<()> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(OrchestratorError::General(format!(
                "HTTP {}: {}",
                status,
                status.canonical_reason().unwrap_or("Unknown")
            )))
        }
    }
}

/// Maps connector kinds to their adapter implementations. Built once at
/// startup and shared read-only afterwards.
pub struct ConnectorRegistry {
    connectors: HashMap<ConnectorKind, Arc<dyn Connector>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self {
            connectors: HashMap::new(),
        }
    }

    /// Registry with the built-in HTTP connectors installed.
    pub fn with_defaults(config: &OrchestratorConfig) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(FireCrawlConnector::new(config)));
        registry.register(Arc::new(TwitterConnector::new(config)));
        registry.register(Arc::new(CustomApiConnector::new(config)));
        registry
    }

    pub fn register(&mut self, connector: Arc<dyn Connector>) {
        debug!("Registering connector: {:?}", connector.kind());
        self.connectors.insert(connector.kind(), connector);
    }

    pub fn get(&self, kind: ConnectorKind) -> Result<Arc<dyn Connector>> {
        self.connectors
            .get(&kind)
            .cloned()
            .ok_or_else(|| {
                OrchestratorError::General(format!("no connector registered for {kind:?}"))
            })
    }

    pub fn kinds(&self) -> Vec<ConnectorKind> {
        self.connectors.keys().copied().collect()
    }
}

impl Default for ConnectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// In-memory connector for development and testing. Serves per-source item
/// lists and can be primed to fail or stall.
pub struct StaticConnector {
    kind: ConnectorKind,
    items: RwLock<HashMap<Uuid, Vec<RawItem>>>,
    failing: RwLock<HashSet<Uuid>>,
    fetch_calls: AtomicU32,
    delay_ms: u64,
}

impl StaticConnector {
    pub fn new(kind: ConnectorKind) -> Self {
        Self {
            kind,
            items: RwLock::new(HashMap::new()),
            failing: RwLock::new(HashSet::new()),
            fetch_calls: AtomicU32::new(0),
            delay_ms: 0,
        }
    }

    /// Total number of fetch invocations observed, across all sources.
    pub fn fetch_count(&self) -> u32 {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub async fn set_items(&self, source_id: Uuid, items: Vec<RawItem>) {
        self.items.write().await.insert(source_id, items);
    }

    pub async fn fail_source(&self, source_id: Uuid) {
        self.failing.write().await.insert(source_id);
    }

    pub async fn clear_failure(&self, source_id: Uuid) {
        self.failing.write().await.remove(&source_id);
    }
}

#[async_trait]
impl Connector for StaticConnector {
    fn kind(&self) -> ConnectorKind {
        self.kind
    }

    async fn fetch(
        &self,
        source: &DataSource,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawItem>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }

        if self.failing.read().await.contains(&source.id) {
            return Err(OrchestratorError::Connector {
                connector: source.name.clone(),
                message: "simulated fetch failure".to_string(),
            });
        }

        let items = self.items.read().await;
        let mut fetched = items.get(&source.id).cloned().unwrap_or_default();
        if let Some(since) = since {
            fetched.retain(|item| item.published_at.map(|t| t > since).unwrap_or(true));
        }
        Ok(fetched)
    }

    async fn probe(&self, source: &DataSource) -> Result<()> {
        if self.failing.read().await.contains(&source.id) {
            return Err(OrchestratorError::Connector {
                connector: source.name.clone(),
                message: "simulated probe failure".to_string(),
            });
        }
        Ok(())
    }
}
