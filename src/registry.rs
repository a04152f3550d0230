use crate::connectors::ConnectorRegistry;
use crate::ledger::ExecutionLedger;
use crate::types::{
    ConnectorKind, DataSource, HealthStatus, OrchestratorError, Result, WorkflowKind,
};
use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::info;
use url::Url;
use uuid::Uuid;

/// Input for registering a new data source.
#[derive(Debug, Clone)]
pub struct NewDataSource {
    pub name: String,
    pub connector: ConnectorKind,
    pub url: String,
    pub kinds: Vec<WorkflowKind>,
    pub description: String,
    pub enabled: bool,
}

/// Partial update applied to an existing source. `None` fields are left
/// untouched.
#[derive(Debug, Clone, Default)]
pub struct SourceUpdate {
    pub name: Option<String>,
    pub url: Option<String>,
    pub kinds: Option<Vec<WorkflowKind>>,
    pub description: Option<String>,
    pub enabled: Option<bool>,
}

/// Holds the configured content origins. Reads are concurrent; every
/// mutation happens inside one write-lock critical section so executions
/// never observe a source flipping state mid-fetch.
pub struct DataSourceRegistry {
    sources: RwLock<HashMap<Uuid, DataSource>>,
    connectors: Arc<ConnectorRegistry>,
    ledger: Arc<ExecutionLedger>,
    probe_timeout_secs: u64,
    fetch_timeout_secs: u64,
}

impl DataSourceRegistry {
    pub fn new(
        connectors: Arc<ConnectorRegistry>,
        ledger: Arc<ExecutionLedger>,
        probe_timeout_secs: u64,
        fetch_timeout_secs: u64,
    ) -> Self {
        Self {
            sources: RwLock::new(HashMap::new()),
            connectors,
            ledger,
            probe_timeout_secs,
            fetch_timeout_secs,
        }
    }

    /// Load a snapshot of sources at startup.
    pub async fn load(&self, sources: Vec<DataSource>) {
        let mut map = self.sources.write().await;
        for source in sources {
            map.insert(source.id, source);
        }
    }

    pub async fn register(&self, new: NewDataSource) -> Result<DataSource> {
        Self::validate_url(&new.url)?;

        let mut sources = self.sources.write().await;
        if sources.values().any(|s| s.url == new.url) {
            return Err(OrchestratorError::Conflict(format!(
                "a data source with URL {} already exists",
                new.url
            )));
        }

        let now = Utc::now();
        let source = DataSource {
            id: Uuid::new_v4(),
            name: new.name,
            connector: new.connector,
            url: new.url,
            enabled: new.enabled,
            health: HealthStatus::Inactive,
            kinds: new.kinds,
            last_sync: None,
            description: new.description,
            created_at: now,
            updated_at: now,
        };
        sources.insert(source.id, source.clone());

        info!("Registered data source: {} ({})", source.name, source.url);
        Ok(source)
    }

    pub async fn update(&self, id: Uuid, update: SourceUpdate) -> Result<DataSource> {
        if let Some(url) = &update.url {
            Self::validate_url(url)?;
        }

        let mut sources = self.sources.write().await;
        let source = sources
            .get_mut(&id)
            .ok_or(OrchestratorError::SourceNotFound { id })?;

        if let Some(name) = update.name {
            source.name = name;
        }
        if let Some(url) = update.url {
            source.url = url;
        }
        if let Some(kinds) = update.kinds {
            source.kinds = kinds;
        }
        if let Some(description) = update.description {
            source.description = description;
        }
        if let Some(enabled) = update.enabled {
            source.enabled = enabled;
            if !enabled {
                source.health = HealthStatus::Inactive;
            }
        }
        source.updated_at = Utc::now();

        Ok(source.clone())
    }

    pub async fn remove(&self, id: Uuid) -> Result<DataSource> {
        let mut sources = self.sources.write().await;
        sources
            .remove(&id)
            .ok_or(OrchestratorError::SourceNotFound { id })
    }

    pub async fn set_enabled(&self, id: Uuid, enabled: bool) -> Result<DataSource> {
        let mut sources = self.sources.write().await;
        let source = sources
            .get_mut(&id)
            .ok_or(OrchestratorError::SourceNotFound { id })?;

        source.enabled = enabled;
        if !enabled {
            // A disabled source is out of rotation; it re-earns Active
            // through an explicit test or sync.
            source.health = HealthStatus::Inactive;
        }
        source.updated_at = Utc::now();
        Ok(source.clone())
    }

    /// Lightweight connectivity probe. Updates health as a side effect and
    /// never mutates `enabled`.
    pub async fn test(&self, id: Uuid) -> Result<HealthStatus> {
        let source = self.get(id).await?;
        let connector = self.connectors.get(source.connector)?;

        let probe = timeout(
            Duration::from_secs(self.probe_timeout_secs),
            connector.probe(&source),
        )
        .await;

        let health = match probe {
            Ok(Ok(())) => {
                self.ledger
                    .info(
                        source.connector.module(),
                        format!("connectivity test passed for {}", source.name),
                        None,
                    )
                    .await;
                HealthStatus::Active
            }
            Ok(Err(e)) => {
                self.ledger
                    .warn(
                        source.connector.module(),
                        format!("connectivity test failed for {}: {}", source.name, e),
                        None,
                    )
                    .await;
                HealthStatus::Error
            }
            Err(_) => {
                self.ledger
                    .warn(
                        source.connector.module(),
                        format!(
                            "connectivity test for {} timed out after {}s",
                            source.name, self.probe_timeout_secs
                        ),
                        None,
                    )
                    .await;
                HealthStatus::Error
            }
        };

        let mut sources = self.sources.write().await;
        if let Some(source) = sources.get_mut(&id) {
            source.health = health;
            source.updated_at = Utc::now();
        }
        Ok(health)
    }

    /// Fetch from the source outside a workflow execution, stamping
    /// `last_sync` and health. Only permitted while the source is enabled.
    pub async fn sync(&self, id: Uuid) -> Result<usize> {
        let source = self.get(id).await?;
        if !source.enabled {
            return Err(OrchestratorError::Disabled {
                name: source.name.clone(),
            });
        }

        let connector = self.connectors.get(source.connector)?;
        let fetched = timeout(
            Duration::from_secs(self.fetch_timeout_secs),
            connector.fetch(&source, source.last_sync),
        )
        .await
        .map_err(|_| OrchestratorError::Timeout {
            operation: format!("sync of {}", source.name),
            seconds: self.fetch_timeout_secs,
        })
        .and_then(|r| r);

        let mut sources = self.sources.write().await;
        let stored = sources
            .get_mut(&id)
            .ok_or(OrchestratorError::SourceNotFound { id })?;

        match fetched {
            Ok(items) => {
                stored.last_sync = Some(Utc::now());
                stored.health = HealthStatus::Active;
                stored.updated_at = Utc::now();
                drop(sources);

                self.ledger
                    .info(
                        source.connector.module(),
                        format!("synced {} items from {}", items.len(), source.name),
                        Some(json!({ "itemCount": items.len() })),
                    )
                    .await;
                Ok(items.len())
            }
            Err(e) => {
                stored.health = HealthStatus::Error;
                stored.updated_at = Utc::now();
                drop(sources);

                self.ledger
                    .warn(
                        source.connector.module(),
                        format!("sync failed for {}: {}", source.name, e),
                        None,
                    )
                    .await;
                Err(e)
            }
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<DataSource> {
        let sources = self.sources.read().await;
        sources
            .get(&id)
            .cloned()
            .ok_or(OrchestratorError::SourceNotFound { id })
    }

    pub async fn list(&self) -> Vec<DataSource> {
        let sources = self.sources.read().await;
        let mut list: Vec<DataSource> = sources.values().cloned().collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        list
    }

    /// Enabled sources feeding the given workflow kind. Disabled sources are
    /// never returned, so they can never enter an execution's batch.
    pub async fn enabled_for(&self, kind: WorkflowKind) -> Vec<DataSource> {
        let sources = self.sources.read().await;
        let mut list: Vec<DataSource> = sources
            .values()
            .filter(|s| s.enabled && s.kinds.contains(&kind))
            .cloned()
            .collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        list
    }

    fn validate_url(url: &str) -> Result<()> {
        let parsed = Url::parse(url)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(OrchestratorError::General(format!(
                "unsupported URL scheme: {}",
                parsed.scheme()
            )));
        }
        if parsed.host().is_none() {
            return Err(OrchestratorError::General(format!(
                "URL has no host: {url}"
            )));
        }
        Ok(())
    }
}
