use super::{Connector, HttpFetcher};
use crate::config::OrchestratorConfig;
use crate::types::{ConnectorKind, DataSource, OrchestratorError, RawItem, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

/// Web-scrape connector backed by a FireCrawl-style scrape API.
pub struct FireCrawlConnector {
    fetcher: HttpFetcher,
    api_base: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Vec<ScrapedDocument>,
    #[serde(default)]
    warning: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScrapedDocument {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    markdown: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(rename = "publishedTime")]
    published_time: Option<DateTime<Utc>>,
    #[serde(default)]
    images: Vec<String>,
}

impl FireCrawlConnector {
    pub fn new(config: &OrchestratorConfig) -> Self {
        Self {
            fetcher: HttpFetcher::new(
                config.fetch_timeout_secs,
                config.max_retries,
                config.retry_delay_secs,
            ),
            api_base: config.firecrawl_api_base.clone(),
            api_key: config.firecrawl_api_key.clone(),
        }
    }

    fn auth_headers(&self) -> Vec<(&'static str, String)> {
        vec![("Authorization", format!("Bearer {}", self.api_key))]
    }
}

#[async_trait]
impl Connector for FireCrawlConnector {
    fn kind(&self) -> ConnectorKind {
        ConnectorKind::FireCrawl
    }

    async fn fetch(
        &self,
        source: &DataSource,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawItem>> {
        let endpoint = format!("{}/v1/scrape", self.api_base);
        let body = json!({
            "url": source.url,
            "formats": ["markdown"],
        });

        let value = self
            .fetcher
            .post_json(&endpoint, &self.auth_headers(), &body)
            .await
            .map_err(|e| OrchestratorError::Connector {
                connector: source.name.clone(),
                message: e.to_string(),
            })?;

        let response: ScrapeResponse = serde_json::from_value(value)?;
        if !response.success {
            return Err(OrchestratorError::Connector {
                connector: source.name.clone(),
                message: response
                    .warning
                    .unwrap_or_else(|| "scrape rejected by API".to_string()),
            });
        }

        let mut items: Vec<RawItem> = response
            .data
            .into_iter()
            .map(|doc| RawItem {
                url: if doc.url.is_empty() {
                    source.url.clone()
                } else {
                    doc.url
                },
                title: doc.title,
                content: if doc.markdown.is_empty() {
                    doc.description.unwrap_or_default()
                } else {
                    doc.markdown
                },
                published_at: doc.published_time,
                media: doc.images,
            })
            .collect();

        if let Some(since) = since {
            items.retain(|item| item.published_at.map(|t| t > since).unwrap_or(true));
        }

        info!(
            "Scraped {} items from {} ({})",
            items.len(),
            source.name,
            source.url
        );
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
