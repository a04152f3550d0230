use super::{Connector, HttpFetcher};
use crate::config::OrchestratorConfig;
use crate::types::{ConnectorKind, DataSource, OrchestratorError, RawItem, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

/// Connector for operator-provided JSON endpoints. The endpoint returns
/// either a bare array of items or an object with an `items` array; each
/// item carries `url`, `title`, `content` and optionally `published_at` and
/// `media`.
pub struct CustomApiConnector {
    fetcher: HttpFetcher,
}

impl CustomApiConnector {
    pub fn new(config: &OrchestratorConfig) -> Self {
        Self {
            fetcher: HttpFetcher::new(
                config.fetch_timeout_secs,
                config.max_retries,
                config.retry_delay_secs,
            ),
        }
    }
}

#[async_trait]
impl Connector for CustomApiConnector {
    fn kind(&self) -> ConnectorKind {
        ConnectorKind::CustomApi
    }

    async fn fetch(
        &self,
        source: &DataSource,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawItem>> {
        let value = self
            .fetcher
            .get_json(&source.url, &[])
            .await
            .map_err(|e| OrchestratorError::Connector {
                connector: source.name.clone(),
                message: e.to_string(),
            })?;

        let item_list = match value {
            serde_json::Value::Array(list) => serde_json::Value::Array(list),
            serde_json::Value::Object(mut map) => map
                .remove("items")
                .unwrap_or(serde_json::Value::Array(Vec::new())),
            _ => {
                return Err(OrchestratorError::Connector {
                    connector: source.name.clone(),
                    message: "endpoint did not return an item list".to_string(),
                })
            }
        };

        let mut items: Vec<RawItem> = serde_json::from_value(item_list)?;
        if let Some(since) = since {
            items.retain(|item| item.published_at.map(|t| t > since).unwrap_or(true));
        }

        info!("Fetched {} items from custom API {}", items.len(), source.url);
        Ok(items)
    }

    async fn probe(&self, source: &DataSource) -> Result<()> {
        self.fetcher
            .probe(&source.url)
            .await
            .map_err(|e| OrchestratorError::Connector {
                connector: source.name.clone(),
                message: e.to_string(),
            })
    }
}
