use crate::config::OrchestratorConfig;
use crate::connectors::ConnectorRegistry;
use crate::ledger::{ExecutionLedger, RecordOutcome};
use crate::publisher::PublisherRegistry;
use crate::ranker::{self, ContentScorer, HeuristicScorer};
use crate::registry::DataSourceRegistry;
use crate::summarizer::SummarizerRegistry;
use crate::templates::{TemplateRenderer, TemplateStore};
use crate::types::{
    ContentItem, OrchestratorError, Platform, PublishRecord, Result, Workflow, WorkflowKind,
    WorkflowStatus,
};
use chrono::{DateTime, Utc};
use cron::Schedule;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, Semaphore};
use tokio::time::{interval, timeout};
use tracing::{debug, error, info};
use uuid::Uuid;

/// Input for creating a workflow definition.
#[derive(Debug, Clone)]
pub struct NewWorkflow {
    pub name: String,
    pub kind: WorkflowKind,
    pub schedule: String,
    pub description: String,
    pub article_num: Option<usize>,
    pub template_id: Option<Uuid>,
}

/// Partial update applied to an existing workflow. `None` fields are left
/// untouched.
#[derive(Debug, Clone, Default)]
pub struct WorkflowUpdate {
    pub name: Option<String>,
    pub schedule: Option<String>,
    pub description: Option<String>,
    pub article_num: Option<usize>,
    pub template_id: Option<Uuid>,
    pub enabled: Option<bool>,
}

/// Validate a cron expression without keeping the parsed schedule.
pub fn validate_cron(expr: &str) -> Result<()> {
    Schedule::from_str(expr).map_err(|e| OrchestratorError::InvalidCron {
        expr: expr.to_string(),
        message: e.to_string(),
    })?;
    Ok(())
}

/// Next firing time strictly after `after`, `None` when the schedule has no
/// future occurrences.
pub fn next_occurrence(expr: &str, after: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
    let schedule = Schedule::from_str(expr).map_err(|e| OrchestratorError::InvalidCron {
        expr: expr.to_string(),
        message: e.to_string(),
    })?;
    Ok(schedule.after(&after).next())
}

struct RunSuccess {
    title: String,
    article_count: u32,
    success_count: u32,
    url: Option<String>,
}

struct RunFailure {
    article_count: u32,
    error: OrchestratorError,
}

/// Owns workflow definitions and their run state, fires executions on cron
/// schedules or on demand, and drives the fetch → rank → summarize → render
/// → publish pipeline. At most one execution per workflow is in flight at
/// any time; executions of different workflows share a fixed-size pool of
/// parallel slots.
pub struct Scheduler {
    workflows: RwLock<HashMap<Uuid, Workflow>>,
    /// Workflows with an execution in flight. Claimed before the execution
    /// starts, released after its PublishRecord is finalized.
    executing: Mutex<HashSet<Uuid>>,
    pool: Arc<Semaphore>,
    shutting_down: RwLock<bool>,
    registry: Arc<DataSourceRegistry>,
    connectors: Arc<ConnectorRegistry>,
    summarizers: Arc<SummarizerRegistry>,
    renderer: TemplateRenderer,
    publishers: Arc<PublisherRegistry>,
    ledger: Arc<ExecutionLedger>,
    scorer: Arc<dyn ContentScorer>,
    config: OrchestratorConfig,
}

impl Scheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: OrchestratorConfig,
        registry: Arc<DataSourceRegistry>,
        connectors: Arc<ConnectorRegistry>,
        summarizers: Arc<SummarizerRegistry>,
        templates: Arc<TemplateStore>,
        publishers: Arc<PublisherRegistry>,
        ledger: Arc<ExecutionLedger>,
    ) -> Self {
        Self {
            workflows: RwLock::new(HashMap::new()),
            executing: Mutex::new(HashSet::new()),
            pool: Arc::new(Semaphore::new(config.worker_count.max(1))),
            shutting_down: RwLock::new(false),
            registry,
            connectors,
            summarizers,
            renderer: TemplateRenderer::new(templates),
            publishers,
            ledger,
            scorer: Arc::new(HeuristicScorer),
            config,
        }
    }

    /// Swap in a different item scorer (the default is the deterministic
    /// heuristic).
    pub fn with_scorer(mut self, scorer: Arc<dyn ContentScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    // ----- workflow CRUD ---------------------------------------------------

    pub async fn create(&self, new: NewWorkflow) -> Result<Workflow> {
        validate_cron(&new.schedule)?;

        let now = Utc::now();
        let workflow = Workflow {
            id: Uuid::new_v4(),
            name: new.name,
            kind: new.kind,
            schedule: new.schedule,
            enabled: true,
            status: WorkflowStatus::Stopped,
            article_num: new.article_num.unwrap_or(self.config.article_num),
            template_id: new.template_id,
            last_run: None,
            next_run: None,
            description: new.description,
            created_at: now,
            updated_at: now,
        };

        let mut workflows = self.workflows.write().await;
        workflows.insert(workflow.id, workflow.clone());
        info!("Created workflow: {} ({})", workflow.name, workflow.kind);
        Ok(workflow)
    }

    pub async fn update(&self, id: Uuid, update: WorkflowUpdate) -> Result<Workflow> {
        if let Some(schedule) = &update.schedule {
            validate_cron(schedule)?;
        }

        let mut workflows = self.workflows.write().await;
        let workflow = workflows
            .get_mut(&id)
            .ok_or(OrchestratorError::WorkflowNotFound { id })?;

        if let Some(name) = update.name {
            workflow.name = name;
        }
        if let Some(schedule) = update.schedule {
            workflow.schedule = schedule;
            if workflow.status == WorkflowStatus::Running {
                workflow.next_run = next_occurrence(&workflow.schedule, Utc::now())?;
            }
        }
        if let Some(description) = update.description {
            workflow.description = description;
        }
        if let Some(article_num) = update.article_num {
            workflow.article_num = article_num;
        }
        if let Some(template_id) = update.template_id {
            workflow.template_id = Some(template_id);
        }
        if let Some(enabled) = update.enabled {
            workflow.enabled = enabled;
        }
        workflow.updated_at = Utc::now();
        Ok(workflow.clone())
    }

    pub async fn get(&self, id: Uuid) -> Result<Workflow> {
        let workflows = self.workflows.read().await;
        workflows
            .get(&id)
            .cloned()
            .ok_or(OrchestratorError::WorkflowNotFound { id })
    }

    pub async fn list(&self) -> Vec<Workflow> {
        let workflows = self.workflows.read().await;
        let mut list: Vec<Workflow> = workflows.values().cloned().collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        list
    }

    // ----- state machine ---------------------------------------------------

    /// Activate scheduling: status becomes `Running` and the next firing
    /// time is computed from the cron expression.
    pub async fn start(&self, id: Uuid) -> Result<Workflow> {
        let mut workflows = self.workflows.write().await;
        let workflow = workflows
            .get_mut(&id)
            .ok_or(OrchestratorError::WorkflowNotFound { id })?;

        if !workflow.enabled {
            return Err(OrchestratorError::Conflict(format!(
                "workflow {} is disabled",
                workflow.name
            )));
        }

        workflow.status = WorkflowStatus::Running;
        workflow.next_run = next_occurrence(&workflow.schedule, Utc::now())?;
        workflow.updated_at = Utc::now();
        info!(
            "Started workflow {} (next run {:?})",
            workflow.name, workflow.next_run
        );
        Ok(workflow.clone())
    }

    /// Cancel the schedule. An execution already in progress finishes and
    /// its outcome is still recorded.
    pub async fn stop(&self, id: Uuid) -> Result<Workflow> {
        let mut workflows = self.workflows.write().await;
        let workflow = workflows
            .get_mut(&id)
            .ok_or(OrchestratorError::WorkflowNotFound { id })?;

        workflow.status = WorkflowStatus::Stopped;
        workflow.next_run = None;
        workflow.updated_at = Utc::now();
        info!("Stopped workflow {}", workflow.name);
        Ok(workflow.clone())
    }

    /// Remove a workflow definition. Refused while an execution is in
    /// flight.
    pub async fn delete(&self, id: Uuid) -> Result<Workflow> {
        let executing = self.executing.lock().await;
        if executing.contains(&id) {
            return Err(OrchestratorError::Conflict(
                "cannot delete a workflow while it is executing".to_string(),
            ));
        }
        drop(executing);

        let mut workflows = self.workflows.write().await;
        workflows
            .remove(&id)
            .ok_or(OrchestratorError::WorkflowNotFound { id })
    }

    /// Trigger an out-of-band execution and wait for its outcome. Fails with
    /// `AlreadyRunning` when an execution of the same workflow is in flight;
    /// duplicate triggers are never queued.
    pub async fn run_now(&self, id: Uuid) -> Result<PublishRecord> {
        let workflow = self.get(id).await?;
        self.claim(workflow.id, &workflow.name).await?;

        // Manual runs surface as Running for their duration; remember
        // whether the workflow was under an active schedule before.
        let was_scheduled = {
            let mut workflows = self.workflows.write().await;
            match workflows.get_mut(&id) {
                Some(w) => {
                    let was = w.status == WorkflowStatus::Running;
                    w.status = WorkflowStatus::Running;
                    was
                }
                None => false,
            }
        };

        let record = self.execute(workflow, was_scheduled).await;
        self.release(id).await;
        Ok(record)
    }

    async fn claim(&self, id: Uuid, name: &str) -> Result<()> {
        let mut executing = self.executing.lock().await;
        if executing.contains(&id) {
            return Err(OrchestratorError::AlreadyRunning {
                workflow: name.to_string(),
            });
        }
        executing.insert(id);
        Ok(())
    }

    async fn release(&self, id: Uuid) {
        self.executing.lock().await.remove(&id);
    }

    pub async fn is_executing(&self, id: Uuid) -> bool {
        self.executing.lock().await.contains(&id)
    }

    // ----- timer loop ------------------------------------------------------

    /// Drive scheduled fires until [`Scheduler::shutdown`] is called.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = interval(Duration::from_secs(self.config.tick_secs.max(1)));
        info!(
            "Scheduler loop started ({}s tick, {} workers)",
            self.config.tick_secs, self.config.worker_count
        );

        loop {
            ticker.tick().await;
            if *self.shutting_down.read().await {
                break;
            }
            Arc::clone(&self).fire_due_workflows().await;
        }

        info!("Scheduler loop stopped");
    }

    /// Request cooperative shutdown. In-flight executions observe the flag
    /// between stages; in-flight network calls complete or time out first.
    pub async fn shutdown(&self) {
        *self.shutting_down.write().await = true;
    }

    async fn is_shutting_down(&self) -> bool {
        *self.shutting_down.read().await
    }

    async fn fire_due_workflows(self: Arc<Self>) {
        let now = Utc::now();
        let due: Vec<Workflow> = {
            let workflows = self.workflows.read().await;
            workflows
                .values()
                .filter(|w| {
                    w.enabled
                        && w.status == WorkflowStatus::Running
                        && w.next_run.map(|t| t <= now).unwrap_or(false)
                })
                .cloned()
                .collect()
        };

        for workflow in due {
            match self.claim(workflow.id, &workflow.name).await {
                Ok(()) => {
                    let scheduler = Arc::clone(&self);
                    tokio::spawn(async move {
                        let id = workflow.id;
                        scheduler.execute(workflow, true).await;
                        scheduler.release(id).await;
                    });
                }
                // A duplicate fire of a still-executing workflow is dropped,
                // not queued.
                Err(OrchestratorError::AlreadyRunning { workflow }) => {
                    debug!("Skipping fire, workflow already running: {}", workflow);
                }
                Err(e) => error!("Failed to claim workflow for firing: {}", e),
            }
        }
    }

    // ----- execution -------------------------------------------------------

    /// Run one execution end to end. Always finalizes exactly one
    /// PublishRecord; the caller holds the per-workflow claim.
    async fn execute(&self, workflow: Workflow, was_scheduled: bool) -> PublishRecord {
        // Backpressure: wait for a pool slot before doing any work.
        let _permit = self.pool.acquire().await.ok();

        let module = workflow.kind.as_str();
        self.ledger
            .info(
                module,
                format!("workflow execution started: {}", workflow.name),
                None,
            )
            .await;

        let placeholder_title =
            format!("{} · {}", workflow.name, Utc::now().format("%Y-%m-%d"));
        let record = self.ledger.open_record(&workflow, placeholder_title).await;
        let started_at = record.started_at;

        let outcome = match self.run_pipeline(&workflow).await {
            Ok(success) => {
                self.ledger
                    .info(
                        module,
                        format!(
                            "workflow execution finished, published {} of {} articles",
                            success.success_count, success.article_count
                        ),
                        Some(json!({
                            "articleCount": success.article_count,
                            "successCount": success.success_count,
                        })),
                    )
                    .await;
                RecordOutcome::Published {
                    title: Some(success.title),
                    article_count: success.article_count,
                    success_count: success.success_count,
                    url: success.url,
                }
            }
            Err(failure) => {
                self.ledger
                    .error(
                        module,
                        format!("workflow execution failed: {}", failure.error),
                        None,
                    )
                    .await;
                RecordOutcome::Failed {
                    title: None,
                    article_count: failure.article_count,
                    error: failure.error.to_string(),
                }
            }
        };

        let finalized = match self.ledger.finalize(record.id, outcome).await {
            Ok(record) => record,
            Err(e) => {
                error!("Failed to finalize publish record {}: {}", record.id, e);
                record
            }
        };

        self.complete_workflow(workflow.id, started_at, was_scheduled)
            .await;
        finalized
    }

    /// Post-run state transition: stamp `lastRun`, recompute `nextRun`. A
    /// scheduled workflow stays `Running` and schedulable even after a
    /// failed run (the failure lives in the ledger); a manual run returns
    /// the workflow to `Stopped`. `Error` is entered only when an active
    /// schedule can no longer produce a next firing time.
    async fn complete_workflow(&self, id: Uuid, started_at: DateTime<Utc>, was_scheduled: bool) {
        let mut workflows = self.workflows.write().await;
        let Some(workflow) = workflows.get_mut(&id) else {
            return;
        };

        workflow.last_run = Some(started_at);
        workflow.updated_at = Utc::now();

        if was_scheduled && workflow.status == WorkflowStatus::Running && workflow.enabled {
            match next_occurrence(&workflow.schedule, Utc::now()) {
                Ok(Some(next)) => workflow.next_run = Some(next),
                Ok(None) | Err(_) => {
                    workflow.status = WorkflowStatus::Error;
                    workflow.next_run = None;
                }
            }
        } else {
            workflow.status = WorkflowStatus::Stopped;
            workflow.next_run = None;
        }
    }

    async fn run_pipeline(
        &self,
        workflow: &Workflow,
    ) -> std::result::Result<RunSuccess, RunFailure> {
        let module = workflow.kind.as_str();

        // Stage 1: resolve enabled sources for this workflow kind.
        let sources = self.registry.enabled_for(workflow.kind).await;
        if sources.is_empty() {
            self.ledger
                .warn(module, "no enabled data sources for workflow", None)
                .await;
            return Err(RunFailure {
                article_count: 0,
                error: OrchestratorError::NoSources,
            });
        }

        // Stage 2: fetch from every source; partial failures are logged and
        // excluded rather than aborting the run.
        let mut batch: Vec<ContentItem> = Vec::new();
        for source in &sources {
            let connector = match self.connectors.get(source.connector) {
                Ok(connector) => connector,
                Err(e) => {
                    self.ledger
                        .warn(
                            source.connector.module(),
                            format!("skipping {}: {}", source.name, e),
                            None,
                        )
                        .await;
                    continue;
                }
            };

            let fetch = timeout(
                Duration::from_secs(self.config.fetch_timeout_secs),
                connector.fetch(source, source.last_sync),
            )
            .await;

            match fetch {
                Ok(Ok(items)) => {
                    self.ledger
                        .info(
                            source.connector.module(),
                            format!("fetched {} items from {}", items.len(), source.name),
                            Some(json!({ "itemCount": items.len() })),
                        )
                        .await;
                    batch.extend(items.into_iter().map(|raw| {
                        ranker::build_content_item(source, raw, self.scorer.as_ref())
                    }));
                }
                Ok(Err(e)) => {
                    self.ledger
                        .warn(
                            source.connector.module(),
                            format!("fetch failed for {}: {}", source.name, e),
                            None,
                        )
                        .await;
                }
                Err(_) => {
                    self.ledger
                        .warn(
                            source.connector.module(),
                            format!(
                                "fetch from {} timed out after {}s",
                                source.name, self.config.fetch_timeout_secs
                            ),
                            None,
                        )
                        .await;
                }
            }
        }

        // Stage 3: rank and select.
        let total = batch.len();
        if total == 0 {
            return Err(RunFailure {
                article_count: 0,
                error: OrchestratorError::NoContent,
            });
        }
        let ranked = ranker::rank(batch);
        let selected = ranker::select(ranked, workflow.article_num);
        self.ledger
            .info(
                "ContentRanker",
                format!(
                    "ranked {} items, selected {} for publication",
                    total,
                    selected.len()
                ),
                Some(json!({ "totalCount": total, "selectedCount": selected.len() })),
            )
            .await;

        if self.is_shutting_down().await {
            return Err(RunFailure {
                article_count: 0,
                error: OrchestratorError::General(
                    "execution cancelled before summarization".to_string(),
                ),
            });
        }

        // Stage 4: summarize; items that fail are dropped, not fatal.
        let summarizer = self
            .summarizers
            .default_summarizer()
            .map_err(|error| RunFailure {
                article_count: 0,
                error,
            })?;

        let mut survivors: Vec<ContentItem> = Vec::new();
        for mut item in selected {
            match summarizer.summarize(&item).await {
                Ok(summary) => {
                    item.summary = Some(summary);
                    survivors.push(item);
                }
                Err(e) => {
                    self.ledger
                        .warn(
                            "AISummarizer",
                            format!("dropping item {}: {}", item.url, e),
                            None,
                        )
                        .await;
                }
            }
        }

        if survivors.is_empty() {
            return Err(RunFailure {
                article_count: 0,
                error: OrchestratorError::NoContent,
            });
        }
        self.ledger
            .info(
                "AISummarizer",
                format!("summarized {} items", survivors.len()),
                Some(json!({ "processedCount": survivors.len() })),
            )
            .await;

        let article_count = survivors.len() as u32;

        if self.is_shutting_down().await {
            return Err(RunFailure {
                article_count,
                error: OrchestratorError::General(
                    "execution cancelled before rendering".to_string(),
                ),
            });
        }

        // Stage 5: render into one artifact.
        let artifact = self
            .renderer
            .render(workflow, &survivors, &self.config.author)
            .await
            .map_err(|error| RunFailure {
                article_count,
                error,
            })?;
        self.ledger
            .info(
                "TemplateRenderer",
                "template rendered",
                Some(json!({ "templateType": workflow.kind.template_kind().as_str() })),
            )
            .await;

        if self.is_shutting_down().await {
            return Err(RunFailure {
                article_count,
                error: OrchestratorError::General(
                    "execution cancelled before publishing".to_string(),
                ),
            });
        }

        // Stage 6: publish; the result is captured verbatim.
        let platform = workflow.kind.platform();
        let publisher_module = publisher_module(platform);
        let publisher = self
            .publishers
            .get(platform)
            .map_err(|error| RunFailure {
                article_count,
                error,
            })?;

        let publish = timeout(
            Duration::from_secs(self.config.publish_timeout_secs),
            publisher.publish(&artifact),
        )
        .await;

        let result = match publish {
            Ok(Ok(result)) => result,
            Ok(Err(error)) => {
                self.ledger
                    .error(publisher_module, format!("publish failed: {error}"), None)
                    .await;
                return Err(RunFailure {
                    article_count,
                    error,
                });
            }
            Err(_) => {
                let error = OrchestratorError::Timeout {
                    operation: format!("publish to {platform}"),
                    seconds: self.config.publish_timeout_secs,
                };
                self.ledger
                    .error(publisher_module, format!("publish failed: {error}"), None)
                    .await;
                return Err(RunFailure {
                    article_count,
                    error,
                });
            }
        };

        if let Some(warning) = &result.warning {
            self.ledger
                .warn(publisher_module, warning.clone(), None)
                .await;
        }
        self.ledger
            .info(
                publisher_module,
                format!("artifact published to {platform}"),
                Some(json!({ "mediaId": result.media_id })),
            )
            .await;

        Ok(RunSuccess {
            title: artifact.title,
            article_count,
            success_count: result.confirmed_count.min(article_count),
            url: result.url,
        })
    }
}

fn publisher_module(platform: Platform) -> &'static str {
    match platform {
        Platform::Weixin => "WeixinPublisher",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cron_validation() {
        assert!(validate_cron("0 0 3 * * *").is_ok());
        assert!(matches!(
            validate_cron("not a schedule"),
            Err(OrchestratorError::InvalidCron { .. })
        ));
    }

    #[test]
    fn next_occurrence_moves_forward() {
        let after = Utc::now();
        let next = next_occurrence("0 0 3 * * *", after).unwrap().unwrap();
        assert!(next > after);
    }
}
