use crate::config::OrchestratorConfig;
use crate::connectors::ConnectorRegistry;
use crate::ledger::{ExecutionLedger, LogFilter, Page, PageRequest, RecordFilter};
use crate::publisher::PublisherRegistry;
use crate::registry::{DataSourceRegistry, NewDataSource, SourceUpdate};
use crate::scheduler::{NewWorkflow, Scheduler, WorkflowUpdate};
use crate::summarizer::SummarizerRegistry;
use crate::templates::{NewTemplate, TemplateStore};
use crate::types::{
    DataSource, HealthStatus, LogEntry, PublishRecord, Result, Template, Workflow,
};
use std::sync::Arc;
use uuid::Uuid;

/// The narrow API surface consumed by the administrative console. Every
/// method returns only after the corresponding store write, so the console
/// always reflects durably recorded state.
pub struct Console {
    scheduler: Arc<Scheduler>,
    registry: Arc<DataSourceRegistry>,
    templates: Arc<TemplateStore>,
    ledger: Arc<ExecutionLedger>,
}

impl Console {
    /// Wire up the default component set: HTTP connectors, the heuristic
    /// summarizer and the weixin publisher.
    pub async fn new(config: OrchestratorConfig) -> Self {
        let ledger = Arc::new(ExecutionLedger::new(config.log_retention));
        let connectors = Arc::new(ConnectorRegistry::with_defaults(&config));
        let registry = Arc::new(DataSourceRegistry::new(
            connectors.clone(),
            ledger.clone(),
            config.probe_timeout_secs,
            config.fetch_timeout_secs,
        ));
        let summarizers = Arc::new(SummarizerRegistry::with_defaults());
        let templates = Arc::new(TemplateStore::with_defaults().await);
        let publishers = Arc::new(PublisherRegistry::with_defaults(&config));
        let scheduler = Arc::new(Scheduler::new(
            config,
            registry.clone(),
            connectors,
            summarizers,
            templates.clone(),
            publishers,
            ledger.clone(),
        ));

        Self {
            scheduler,
            registry,
            templates,
            ledger,
        }
    }

    /// Assemble a console over externally constructed components (used by
    /// tests and embedders that install their own adapters).
    pub fn from_parts(
        scheduler: Arc<Scheduler>,
        registry: Arc<DataSourceRegistry>,
        templates: Arc<TemplateStore>,
        ledger: Arc<ExecutionLedger>,
    ) -> Self {
        Self {
            scheduler,
            registry,
            templates,
            ledger,
        }
    }

    pub fn scheduler(&self) -> Arc<Scheduler> {
        self.scheduler.clone()
    }

    pub fn ledger(&self) -> Arc<ExecutionLedger> {
        self.ledger.clone()
    }

    // ----- workflows -------------------------------------------------------

    pub async fn create_workflow(&self, new: NewWorkflow) -> Result<Workflow> {
        self.scheduler.create(new).await
    }

    pub async fn update_workflow(&self, id: Uuid, update: WorkflowUpdate) -> Result<Workflow> {
        self.scheduler.update(id, update).await
    }

    pub async fn delete_workflow(&self, id: Uuid) -> Result<Workflow> {
        self.scheduler.delete(id).await
    }

    pub async fn workflow(&self, id: Uuid) -> Result<Workflow> {
        self.scheduler.get(id).await
    }

    pub async fn workflows(&self) -> Vec<Workflow> {
        self.scheduler.list().await
    }

    pub async fn start_workflow(&self, id: Uuid) -> Result<Workflow> {
        self.scheduler.start(id).await
    }

    pub async fn stop_workflow(&self, id: Uuid) -> Result<Workflow> {
        self.scheduler.stop(id).await
    }

    pub async fn run_workflow_now(&self, id: Uuid) -> Result<PublishRecord> {
        self.scheduler.run_now(id).await
    }

    // ----- data sources ----------------------------------------------------

    pub async fn register_source(&self, new: NewDataSource) -> Result<DataSource> {
        self.registry.register(new).await
    }

    pub async fn update_source(&self, id: Uuid, update: SourceUpdate) -> Result<DataSource> {
        self.registry.update(id, update).await
    }

    pub async fn remove_source(&self, id: Uuid) -> Result<DataSource> {
        self.registry.remove(id).await
    }

    pub async fn source(&self, id: Uuid) -> Result<DataSource> {
        self.registry.get(id).await
    }

    pub async fn sources(&self) -> Vec<DataSource> {
        self.registry.list().await
    }

    pub async fn set_source_enabled(&self, id: Uuid, enabled: bool) -> Result<DataSource> {
        self.registry.set_enabled(id, enabled).await
    }

    pub async fn test_source(&self, id: Uuid) -> Result<HealthStatus> {
        self.registry.test(id).await
    }

    pub async fn sync_source(&self, id: Uuid) -> Result<usize> {
        self.registry.sync(id).await
    }

    // ----- templates -------------------------------------------------------

    pub async fn create_template(&self, new: NewTemplate) -> Result<Template> {
        self.templates.create(new).await
    }

    pub async fn update_template(
        &self,
        id: Uuid,
        name: Option<String>,
        body: Option<String>,
    ) -> Result<Template> {
        self.templates.update_body(id, name, body).await
    }

    pub async fn delete_template(&self, id: Uuid) -> Result<Template> {
        self.templates.remove(id).await
    }

    pub async fn template(&self, id: Uuid) -> Result<Template> {
        self.templates.get(id).await
    }

    pub async fn templates(&self) -> Vec<Template> {
        self.templates.list().await
    }

    pub async fn set_default_template(&self, id: Uuid) -> Result<Template> {
        self.templates.set_default(id).await
    }

    // ----- ledger queries --------------------------------------------------

    pub async fn publish_records(
        &self,
        filter: &RecordFilter,
        page: PageRequest,
    ) -> Page<PublishRecord> {
        self.ledger.records(filter, page).await
    }

    pub async fn logs(&self, filter: &LogFilter, page: PageRequest) -> Page<LogEntry> {
        self.ledger.logs(filter, page).await
    }

    pub async fn export_logs(&self, filter: &LogFilter) -> String {
        self.ledger.export_logs(filter).await
    }

    // ----- lifecycle -------------------------------------------------------

    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
    }
}
