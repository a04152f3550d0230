use super::{Connector, HttpFetcher};
use crate::config::OrchestratorConfig;
use crate::types::{ConnectorKind, DataSource, OrchestratorError, RawItem, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;
use url::Url;

/// Social-feed connector for Twitter/X account timelines.
pub struct TwitterConnector {
    fetcher: HttpFetcher,
    api_base: String,
    bearer_token: String,
}

#[derive(Debug, Deserialize)]
struct TimelineResponse {
    #[serde(default)]
    tweets: Vec<Tweet>,
}

#[derive(Debug, Deserialize)]
struct Tweet {
    #[serde(default)]
    text: String,
    #[serde(default)]
    url: String,
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    media_urls: Vec<String>,
}

impl TwitterConnector {
    pub fn new(config: &OrchestratorConfig) -> Self {
        Self {
            fetcher: HttpFetcher::new(
                config.fetch_timeout_secs,
                config.max_retries,
                config.retry_delay_secs,
            ),
            api_base: config.twitter_api_base.clone(),
            bearer_token: config.twitter_bearer_token.clone(),
        }
    }

    /// Derive the account handle from a profile URL such as
    /// `https://x.com/OpenAI`.
    fn handle_from_url(url: &str) -> Result<String> {
        let parsed = Url::parse(url)?;
        parsed
            .path_segments()
            .and_then(|mut segments| segments.next().map(|s| s.to_string()))
            .filter(|handle| !handle.is_empty())
            .ok_or_else(|| {
                OrchestratorError::General(format!("no account handle in URL: {url}"))
            })
    }

    /// Tweets have no separate headline; use the first line, shortened.
    fn title_from_text(text: &str) -> String {
        let first_line = text.lines().next().unwrap_or("");
        if first_line.chars().count() > 80 {
            let truncated: String = first_line.chars().take(77).collect();
            format!("{truncated}...")
        } else {
            first_line.to_string()
        }
    }
}

#[async_trait]
impl Connector for TwitterConnector {
    fn kind(&self) -> ConnectorKind {
        ConnectorKind::Twitter
    }

    async fn fetch(
        &self,
        source: &DataSource,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawItem>> {
        let handle = Self::handle_from_url(&source.url)?;
        let endpoint = format!("{}/timeline?handle={}", self.api_base, handle);
        let headers = vec![("Authorization", format!("Bearer {}", self.bearer_token))];

        let value = self
            .fetcher
            .get_json(&endpoint, &headers)
            .await
            .map_err(|e| OrchestratorError::Connector {
                connector: source.name.clone(),
                message: e.to_string(),
            })?;

        let response: TimelineResponse = serde_json::from_value(value)?;

        let mut items: Vec<RawItem> = response
            .tweets
            .into_iter()
            .filter(|tweet| !tweet.text.is_empty())
            .map(|tweet| RawItem {
                title: Self::title_from_text(&tweet.text),
                url: if tweet.url.is_empty() {
                    source.url.clone()
                } else {
                    tweet.url
                },
                content: tweet.text,
                published_at: tweet.created_at,
                media: tweet.media_urls,
            })
            .collect();

        if let Some(since) = since {
            items.retain(|item| item.published_at.map(|t| t > since).unwrap_or(true));
        }

        info!("Pulled {} posts from @{}", items.len(), handle);
        Ok(items)
    }

    async fn probe(&self, source: &DataSource) -> Result<()> {
        // Probing the profile URL is enough to confirm reachability; the
        // timeline endpoint would spend API quota.
        self.fetcher
            .probe(&source.url)
            .await
            .map_err(|e| OrchestratorError::Connector {
                connector: source.name.clone(),
                message: e.to_string(),
            })
    }
}
