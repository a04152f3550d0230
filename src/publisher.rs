use crate::config::OrchestratorConfig;
use crate::types::{Artifact, OrchestratorError, Platform, PublishResult, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// Adapter that delivers a rendered artifact to one target platform.
/// `PublishResult::confirmed_count` must be exact even on partial success.
#[async_trait]
pub trait Publisher: Send + Sync {
    fn platform(&self) -> Platform;

    async fn publish(&self, artifact: &Artifact) -> Result<PublishResult>;
}

/// Maps platforms to publisher implementations. Built once at startup and
/// shared read-only afterwards.
pub struct PublisherRegistry {
    publishers: HashMap<Platform, Arc<dyn Publisher>>,
}

impl PublisherRegistry {
    pub fn new() -> Self {
        Self {
            publishers: HashMap::new(),
        }
    }

    pub fn with_defaults(config: &OrchestratorConfig) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(WeixinPublisher::new(config)));
        registry
    }

    pub fn register(&mut self, publisher: Arc<dyn Publisher>) {
        debug!("Registering publisher: {}", publisher.platform());
        self.publishers.insert(publisher.platform(), publisher);
    }

    pub fn get(&self, platform: Platform) -> Result<Arc<dyn Publisher>> {
        self.publishers.get(&platform).cloned().ok_or_else(|| {
            OrchestratorError::General(format!("no publisher registered for {platform}"))
        })
    }
}

impl Default for PublisherRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Publishes artifacts as drafts on a WeChat official account.
pub struct WeixinPublisher {
    client: Client,
    api_base: String,
    app_id: String,
    app_secret: String,
    author: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

#[derive(Debug, Deserialize)]
struct DraftResponse {
    media_id: Option<String>,
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

impl WeixinPublisher {
    pub fn new(config: &OrchestratorConfig) -> Self {
        let client = Client::builder()
            .user_agent("trend-orchestrator/0.1")
            .timeout(Duration::from_secs(config.publish_timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_base: config.weixin_api_base.clone(),
            app_id: config.weixin_app_id.clone(),
            app_secret: config.weixin_app_secret.clone(),
            author: config.author.clone(),
        }
    }

    async fn access_token(&self) -> Result<String> {
        let url = format!(
            "{}/cgi-bin/token?grant_type=client_credential&appid={}&secret={}",
            self.api_base, self.app_id, self.app_secret
        );
        let response: TokenResponse = self.client.get(&url).send().await?.json().await?;

        match response.access_token {
            Some(token) => Ok(token),
            // The platform reports quota and credential problems through
            // errcode/errmsg; surface them verbatim.
            None => Err(OrchestratorError::Publisher {
                platform: Platform::Weixin,
                message: format!("token request failed ({}): {}", response.errcode, response.errmsg),
            }),
        }
    }
}

#[async_trait]
impl Publisher for WeixinPublisher {
    fn platform(&self) -> Platform {
        Platform::Weixin
    }

    async fn publish(&self, artifact: &Artifact) -> Result<PublishResult> {
        let token = self.access_token().await?;
        let url = format!("{}/cgi-bin/draft/add?access_token={}", self.api_base, token);

        let body = json!({
            "articles": [{
                "title": artifact.title,
                "author": self.author,
                "content": artifact.body,
                "need_open_comment": 0,
                "only_fans_can_comment": 0,
            }]
        });

        let response: DraftResponse = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        if response.errcode != 0 {
            return Err(OrchestratorError::Publisher {
                platform: Platform::Weixin,
                message: format!("draft upload failed ({}): {}", response.errcode, response.errmsg),
            });
        }

        info!(
            "Published draft to weixin: {} items, media_id {:?}",
            artifact.item_count, response.media_id
        );

        Ok(PublishResult {
            confirmed_count: artifact.item_count,
            url: None,
            media_id: response.media_id,
            warning: None,
        })
    }
}

/// Scriptable behavior for [`StaticPublisher`].
#[derive(Debug, Clone)]
pub enum PublishBehavior {
    /// Confirm every item and return an artifact URL.
    Succeed,
    /// Confirm only `confirmed` items, carrying the platform's warning.
    Partial { confirmed: u32, warning: String },
    /// Fail with the given platform message.
    Fail { message: String },
    /// Sleep before confirming; lets callers exercise the delivery timeout.
    Stall { ms: u64 },
}

/// In-memory publisher for development and testing. Records every artifact
/// whose delivery it actually observed completing.
pub struct StaticPublisher {
    platform: Platform,
    behavior: RwLock<PublishBehavior>,
    delivered: RwLock<Vec<Artifact>>,
}

impl StaticPublisher {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            behavior: RwLock::new(PublishBehavior::Succeed),
            delivered: RwLock::new(Vec::new()),
        }
    }

    pub async fn set_behavior(&self, behavior: PublishBehavior) {
        *self.behavior.write().await = behavior;
    }

    pub async fn delivered(&self) -> Vec<Artifact> {
        self.delivered.read().await.clone()
    }
}

#[async_trait]
impl Publisher for StaticPublisher {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn publish(&self, artifact: &Artifact) -> Result<PublishResult> {
        let behavior = self.behavior.read().await.clone();
        match behavior {
            PublishBehavior::Succeed => {
                self.delivered.write().await.push(artifact.clone());
                Ok(PublishResult {
                    confirmed_count: artifact.item_count,
                    url: Some(format!("https://mp.weixin.example/s/{}", Uuid::new_v4())),
                    media_id: Some(Uuid::new_v4().simple().to_string()),
                    warning: None,
                })
            }
            PublishBehavior::Partial { confirmed, warning } => {
                self.delivered.write().await.push(artifact.clone());
                Ok(PublishResult {
                    confirmed_count: confirmed.min(artifact.item_count),
                    url: Some(format!("https://mp.weixin.example/s/{}", Uuid::new_v4())),
                    media_id: Some(Uuid::new_v4().simple().to_string()),
                    warning: Some(warning),
                })
            }
            PublishBehavior::Fail { message } => Err(OrchestratorError::Publisher {
                platform: self.platform,
                message,
            }),
            PublishBehavior::Stall { ms } => {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                self.delivered.write().await.push(artifact.clone());
                Ok(PublishResult {
                    confirmed_count: artifact.item_count,
                    url: Some(format!("https://mp.weixin.example/s/{}", Uuid::new_v4())),
                    media_id: None,
                    warning: None,
                })
            }
        }
    }
}
