use crate::types::{
    LogEntry, LogLevel, OrchestratorError, Platform, PublishRecord, PublishStatus, Result,
    Workflow, WorkflowKind,
};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Append-only store of publish records and structured log entries.
///
/// Records are opened as `Pending` and finalized exactly once; `Published`
/// and `Failed` records are immutable. Log entries are evicted oldest-first
/// past the retention cap so the ledger stays bounded.
pub struct ExecutionLedger {
    records: RwLock<Vec<PublishRecord>>,
    logs: RwLock<VecDeque<LogEntry>>,
    log_retention: usize,
}

/// Terminal outcome applied to a `Pending` record.
#[derive(Debug, Clone)]
pub enum RecordOutcome {
    Published {
        title: Option<String>,
        article_count: u32,
        success_count: u32,
        url: Option<String>,
    },
    Failed {
        title: Option<String>,
        article_count: u32,
        error: String,
    },
}

#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub platform: Option<Platform>,
    pub status: Option<PublishStatus>,
    pub kind: Option<WorkflowKind>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Case-insensitive match over title and error message.
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub level: Option<LogLevel>,
    pub module: Option<String>,
    /// Case-insensitive match over module and message.
    pub search: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    pub offset: usize,
    pub limit: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { offset: 0, limit: 50 }
    }
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub offset: usize,
}

impl ExecutionLedger {
    pub fn new(log_retention: usize) -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            logs: RwLock::new(VecDeque::new()),
            log_retention,
        }
    }

    /// Append a `Pending` record for a freshly started execution.
    pub async fn open_record(&self, workflow: &Workflow, title: String) -> PublishRecord {
        let record = PublishRecord {
            id: Uuid::new_v4(),
            workflow_id: workflow.id,
            workflow_kind: workflow.kind,
            title,
            platform: workflow.kind.platform(),
            status: PublishStatus::Pending,
            started_at: Utc::now(),
            finished_at: None,
            article_count: 0,
            success_count: 0,
            url: None,
            error: None,
        };

        let mut records = self.records.write().await;
        records.push(record.clone());
        record
    }

    /// Apply the terminal outcome to a `Pending` record. Finalizing an
    /// already-terminal record is a conflict; the ledger never rewrites
    /// history.
    pub async fn finalize(&self, id: Uuid, outcome: RecordOutcome) -> Result<PublishRecord> {
        let mut records = self.records.write().await;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(OrchestratorError::General(format!(
                "publish record not found: {id}"
            )))?;

        if record.status != PublishStatus::Pending {
            return Err(OrchestratorError::Conflict(format!(
                "publish record {id} is already finalized"
            )));
        }

        record.finished_at = Some(Utc::now());
        match outcome {
            RecordOutcome::Published {
                title,
                article_count,
                success_count,
                url,
            } => {
                record.status = PublishStatus::Published;
                record.article_count = article_count;
                // successCount can never exceed the rendered item count
                record.success_count = success_count.min(article_count);
                record.url = url;
                if let Some(title) = title {
                    record.title = title;
                }
            }
            RecordOutcome::Failed {
                title,
                article_count,
                error,
            } => {
                record.status = PublishStatus::Failed;
                record.article_count = article_count;
                record.success_count = 0;
                record.error = Some(error);
                if let Some(title) = title {
                    record.title = title;
                }
            }
        }

        Ok(record.clone())
    }

    pub async fn record(&self, id: Uuid) -> Option<PublishRecord> {
        let records = self.records.read().await;
        records.iter().find(|r| r.id == id).cloned()
    }

    /// Filtered, paginated projection over publish records, newest first.
    pub async fn records(&self, filter: &RecordFilter, page: PageRequest) -> Page<PublishRecord> {
        let records = self.records.read().await;
        let mut matched: Vec<PublishRecord> = records
            .iter()
            .filter(|r| Self::record_matches(r, filter))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.started_at.cmp(&a.started_at));

        let total = matched.len();
        let items = matched
            .into_iter()
            .skip(page.offset)
            .take(page.limit)
            .collect();
        Page {
            items,
            total,
            offset: page.offset,
        }
    }

    fn record_matches(record: &PublishRecord, filter: &RecordFilter) -> bool {
        if let Some(platform) = filter.platform {
            if record.platform != platform {
                return false;
            }
        }
        if let Some(status) = filter.status {
            if record.status != status {
                return false;
            }
        }
        if let Some(kind) = filter.kind {
            if record.workflow_kind != kind {
                return false;
            }
        }
        if let Some(from) = filter.from {
            if record.started_at < from {
                return false;
            }
        }
        if let Some(to) = filter.to {
            if record.started_at > to {
                return false;
            }
        }
        if let Some(search) = &filter.search {
            let needle = search.to_lowercase();
            let in_title = record.title.to_lowercase().contains(&needle);
            let in_error = record
                .error
                .as_deref()
                .map(|e| e.to_lowercase().contains(&needle))
                .unwrap_or(false);
            if !in_title && !in_error {
                return false;
            }
        }
        true
    }

    /// Append one structured log entry, evicting the oldest past retention.
    pub async fn log(
        &self,
        level: LogLevel,
        module: &str,
        message: impl Into<String>,
        detail: Option<serde_json::Value>,
    ) {
        let entry = LogEntry {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            level,
            module: module.to_string(),
            message: message.into(),
            detail,
        };
        debug!(module = %entry.module, level = ?entry.level, "{}", entry.message);

        let mut logs = self.logs.write().await;
        logs.push_back(entry);
        while logs.len() > self.log_retention {
            logs.pop_front();
        }
    }

    pub async fn info(&self, module: &str, message: impl Into<String>, detail: Option<serde_json::Value>) {
        self.log(LogLevel::Info, module, message, detail).await;
    }

    pub async fn warn(&self, module: &str, message: impl Into<String>, detail: Option<serde_json::Value>) {
        self.log(LogLevel::Warn, module, message, detail).await;
    }

    pub async fn error(&self, module: &str, message: impl Into<String>, detail: Option<serde_json::Value>) {
        self.log(LogLevel::Error, module, message, detail).await;
    }

    /// Filtered, paginated projection over log entries, newest first.
    pub async fn logs(&self, filter: &LogFilter, page: PageRequest) -> Page<LogEntry> {
        let logs = self.logs.read().await;
        let mut matched: Vec<LogEntry> = logs
            .iter()
            .filter(|e| Self::log_matches(e, filter))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let total = matched.len();
        let items = matched
            .into_iter()
            .skip(page.offset)
            .take(page.limit)
            .collect();
        Page {
            items,
            total,
            offset: page.offset,
        }
    }

    fn log_matches(entry: &LogEntry, filter: &LogFilter) -> bool {
        if let Some(level) = filter.level {
            if entry.level != level {
                return false;
            }
        }
        if let Some(module) = &filter.module {
            if &entry.module != module {
                return false;
            }
        }
        if let Some(from) = filter.from {
            if entry.timestamp < from {
                return false;
            }
        }
        if let Some(to) = filter.to {
            if entry.timestamp > to {
                return false;
            }
        }
        if let Some(search) = &filter.search {
            let needle = search.to_lowercase();
            if !entry.message.to_lowercase().contains(&needle)
                && !entry.module.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        true
    }

    /// Flattened text rendering of the filtered log set, oldest first:
    /// `[timestamp] [LEVEL] [module] message` per line.
    pub async fn export_logs(&self, filter: &LogFilter) -> String {
        let logs = self.logs.read().await;
        let mut matched: Vec<&LogEntry> =
            logs.iter().filter(|e| Self::log_matches(e, filter)).collect();
        matched.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

        matched
            .iter()
            .map(|e| {
                format!(
                    "[{}] [{}] [{}] {}",
                    e.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    e.level.as_str(),
                    e.module,
                    e.message
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub async fn log_count(&self) -> usize {
        self.logs.read().await.len()
    }

    pub async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }
}
