use crate::types::{ContentItem, OrchestratorError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::info;

/// Condenses one selected item into publishable prose. Implementations call
/// out to a summarization service; the orchestrator only sees this trait.
#[async_trait]
pub trait Summarizer: Send + Sync {
    fn name(&self) -> String;

    async fn summarize(&self, item: &ContentItem) -> Result<String>;
}

/// Extractive summarizer: title plus the leading sentences, clipped to a
/// target length. Deterministic, which the pipeline tests rely on.
pub struct HeuristicSummarizer {
    max_chars: usize,
}

impl HeuristicSummarizer {
    pub fn new() -> Self {
        Self { max_chars: 280 }
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }
}

impl Default for HeuristicSummarizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Summarizer for HeuristicSummarizer {
    fn name(&self) -> String {
        "heuristic".to_string()
    }

    async fn summarize(&self, item: &ContentItem) -> Result<String> {
        let body = item.content.trim();
        if body.is_empty() {
            return Err(OrchestratorError::General(format!(
                "nothing to summarize for {}",
                item.url
            )));
        }

        let mut excerpt: String = body.chars().take(self.max_chars).collect();
        // Cut at the last full sentence when one fits.
        if let Some(last_period) = excerpt.rfind('.') {
            if last_period > self.max_chars / 3 {
                excerpt.truncate(last_period + 1);
            }
        }

        let summary = if excerpt.chars().count() < body.chars().count() && !excerpt.ends_with('.') {
            format!("{}: {}...", item.title, excerpt.trim())
        } else {
            format!("{}: {}", item.title, excerpt.trim())
        };
        Ok(summary)
    }
}

/// Summarizer double for development and testing. Delegates to the
/// heuristic summarizer but can be primed to fail or stall per URL.
pub struct MockSummarizer {
    inner: HeuristicSummarizer,
    fail_urls: RwLock<HashSet<String>>,
    delay_ms: u64,
}

impl MockSummarizer {
    pub fn new() -> Self {
        Self {
            inner: HeuristicSummarizer::new(),
            fail_urls: RwLock::new(HashSet::new()),
            delay_ms: 0,
        }
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub async fn fail_on(&self, url: &str) {
        self.fail_urls.write().await.insert(url.to_string());
    }
}

impl Default for MockSummarizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Summarizer for MockSummarizer {
    fn name(&self) -> String {
        "mock".to_string()
    }

    async fn summarize(&self, item: &ContentItem) -> Result<String> {
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
        if self.fail_urls.read().await.contains(&item.url) {
            return Err(OrchestratorError::General(format!(
                "simulated summarization failure for {}",
                item.url
            )));
        }
        self.inner.summarize(item).await
    }
}

/// Registry of summarizer implementations. The first registered becomes the
/// default; built once at startup and shared read-only afterwards.
pub struct SummarizerRegistry {
    summarizers: HashMap<String, Arc<dyn Summarizer>>,
    default_name: Option<String>,
}

impl SummarizerRegistry {
    pub fn new() -> Self {
        Self {
            summarizers: HashMap::new(),
            default_name: None,
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(HeuristicSummarizer::new()));
        registry
    }

    pub fn register(&mut self, summarizer: Arc<dyn Summarizer>) {
        let name = summarizer.name();
        info!("Registering summarizer: {}", name);
        if self.default_name.is_none() {
            self.default_name = Some(name.clone());
        }
        self.summarizers.insert(name, summarizer);
    }

    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if self.summarizers.contains_key(name) {
            self.default_name = Some(name.to_string());
            Ok(())
        } else {
            Err(OrchestratorError::General(format!(
                "summarizer '{name}' not found"
            )))
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Summarizer>> {
        self.summarizers.get(name).cloned()
    }

    pub fn default_summarizer(&self) -> Result<Arc<dyn Summarizer>> {
        self.default_name
            .as_ref()
            .and_then(|name| self.summarizers.get(name).cloned())
            .ok_or_else(|| OrchestratorError::General("no summarizer registered".to_string()))
    }

    pub fn list(&self) -> Vec<String> {
        self.summarizers.keys().cloned().collect()
    }
}

impl Default for SummarizerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContentItem, ContentStatus};
    use uuid::Uuid;

    fn item(title: &str, content: &str) -> ContentItem {
        ContentItem {
            id: Uuid::new_v4(),
            source_id: Uuid::new_v4(),
            title: title.to_string(),
            content: content.to_string(),
            url: "https://example.com/a".to_string(),
            keywords: Vec::new(),
            score: 50.0,
            media: Vec::new(),
            status: ContentStatus::Selected,
            published_at: None,
            summary: None,
        }
    }

    #[tokio::test]
    async fn summary_leads_with_the_title() {
        let summarizer = HeuristicSummarizer::new();
        let summary = summarizer
            .summarize(&item("Model update", "A new model shipped. It is faster."))
            .await
            .unwrap();
        assert!(summary.starts_with("Model update:"));
    }

    #[tokio::test]
    async fn empty_body_is_an_error() {
        let summarizer = HeuristicSummarizer::new();
        assert!(summarizer.summarize(&item("Title", "   ")).await.is_err());
    }

    #[tokio::test]
    async fn long_bodies_are_clipped() {
        let summarizer = HeuristicSummarizer::new().with_max_chars(120);
        let body = "word ".repeat(200);
        let summary = summarizer.summarize(&item("Long", &body)).await.unwrap();
        assert!(summary.chars().count() < body.chars().count());
    }

    #[tokio::test]
    async fn registry_defaults_to_first_registered() {
        let registry = SummarizerRegistry::with_defaults();
        assert_eq!(registry.default_summarizer().unwrap().name(), "heuristic");
    }
}
