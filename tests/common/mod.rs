#![allow(dead_code)]

use chrono::{Duration, Utc};
use std::sync::Arc;
use trend_orchestrator::connectors::{ConnectorRegistry, StaticConnector};
use trend_orchestrator::ledger::ExecutionLedger;
use trend_orchestrator::publisher::{PublisherRegistry, StaticPublisher};
use trend_orchestrator::registry::{DataSourceRegistry, NewDataSource};
use trend_orchestrator::scheduler::{NewWorkflow, Scheduler};
use trend_orchestrator::summarizer::{MockSummarizer, SummarizerRegistry};
use trend_orchestrator::templates::TemplateStore;
use trend_orchestrator::types::{
    ConnectorKind, DataSource, Platform, RawItem, Workflow, WorkflowKind,
};
use trend_orchestrator::{Console, OrchestratorConfig};

/// Fully wired orchestrator over in-memory adapters.
pub struct Harness {
    pub console: Console,
    pub scheduler: Arc<Scheduler>,
    pub registry: Arc<DataSourceRegistry>,
    pub templates: Arc<TemplateStore>,
    pub ledger: Arc<ExecutionLedger>,
    pub connector: Arc<StaticConnector>,
    pub summarizer: Arc<MockSummarizer>,
    pub publisher: Arc<StaticPublisher>,
}

pub fn test_config() -> OrchestratorConfig {
    OrchestratorConfig {
        tick_secs: 1,
        fetch_timeout_secs: 2,
        publish_timeout_secs: 1,
        probe_timeout_secs: 1,
        ..OrchestratorConfig::default()
    }
}

pub async fn harness() -> Harness {
    harness_with(test_config(), 0).await
}

/// Harness whose static connector stalls `connector_delay_ms` per fetch,
/// which keeps executions observable from racing callers.
pub async fn harness_with(config: OrchestratorConfig, connector_delay_ms: u64) -> Harness {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .try_init();

    let ledger = Arc::new(ExecutionLedger::new(config.log_retention));

    let connector =
        Arc::new(StaticConnector::new(ConnectorKind::CustomApi).with_delay(connector_delay_ms));
    let mut connectors = ConnectorRegistry::new();
    connectors.register(connector.clone());
    let connectors = Arc::new(connectors);

    let registry = Arc::new(DataSourceRegistry::new(
        connectors.clone(),
        ledger.clone(),
        config.probe_timeout_secs,
        config.fetch_timeout_secs,
    ));

    let summarizer = Arc::new(MockSummarizer::new());
    let mut summarizers = SummarizerRegistry::new();
    summarizers.register(summarizer.clone());
    let summarizers = Arc::new(summarizers);

    let templates = Arc::new(TemplateStore::with_defaults().await);

    let publisher = Arc::new(StaticPublisher::new(Platform::Weixin));
    let mut publishers = PublisherRegistry::new();
    publishers.register(publisher.clone());
    let publishers = Arc::new(publishers);

    let scheduler = Arc::new(Scheduler::new(
        config,
        registry.clone(),
        connectors,
        summarizers,
        templates.clone(),
        publishers,
        ledger.clone(),
    ));

    let console = Console::from_parts(
        scheduler.clone(),
        registry.clone(),
        templates.clone(),
        ledger.clone(),
    );

    Harness {
        console,
        scheduler,
        registry,
        templates,
        ledger,
        connector,
        summarizer,
        publisher,
    }
}

/// Register a source for the article workflow and prime the static
/// connector with its items.
pub async fn add_source(harness: &Harness, name: &str, items: Vec<RawItem>) -> DataSource {
    let source = harness
        .console
        .register_source(NewDataSource {
            name: name.to_string(),
            connector: ConnectorKind::CustomApi,
            url: format!("https://example.com/feeds/{name}"),
            kinds: vec![WorkflowKind::WeixinArticle],
            description: String::new(),
            enabled: true,
        })
        .await
        .expect("register source");
    harness.connector.set_items(source.id, items).await;
    source
}

pub async fn add_workflow(harness: &Harness, name: &str, article_num: usize) -> Workflow {
    harness
        .console
        .create_workflow(NewWorkflow {
            name: name.to_string(),
            kind: WorkflowKind::WeixinArticle,
            schedule: "0 0 3 * * *".to_string(),
            description: String::new(),
            article_num: Some(article_num),
            template_id: None,
        })
        .await
        .expect("create workflow")
}

/// A workflow value for exercising the ledger directly, outside the
/// scheduler.
pub fn workflow_fixture(name: &str, kind: WorkflowKind) -> Workflow {
    use trend_orchestrator::types::WorkflowStatus;
    let now = Utc::now();
    Workflow {
        id: uuid::Uuid::new_v4(),
        name: name.to_string(),
        kind,
        schedule: "0 0 3 * * *".to_string(),
        enabled: true,
        status: WorkflowStatus::Stopped,
        article_num: 10,
        template_id: None,
        last_run: None,
        next_run: None,
        description: String::new(),
        created_at: now,
        updated_at: now,
    }
}

/// Items whose content scores high on the topic heuristic.
pub fn relevant_items(prefix: &str, count: usize) -> Vec<RawItem> {
    (0..count)
        .map(|i| RawItem {
            url: format!("https://example.com/{prefix}/{i}"),
            title: format!("{prefix} AI benchmark update {i}"),
            content: format!(
                "The new AI model topped the LLM benchmark again. Release notes for {prefix} {i}."
            ),
            published_at: Some(Utc::now() - Duration::minutes(i as i64)),
            media: Vec::new(),
        })
        .collect()
}

/// Items with no topic hits; they rank strictly below relevant ones.
pub fn filler_items(prefix: &str, count: usize) -> Vec<RawItem> {
    (0..count)
        .map(|i| RawItem {
            url: format!("https://example.com/{prefix}/filler-{i}"),
            title: format!("Gardening tips volume {i}"),
            content: "Spring flowers bloom early.".to_string(),
            published_at: Some(Utc::now() - Duration::minutes(i as i64)),
            media: Vec::new(),
        })
        .collect()
}
