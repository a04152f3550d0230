use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Workflow type. Selects which connectors, template kind and target
/// platform apply to an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowKind {
    WeixinArticle,
    WeixinAiBench,
    WeixinHelloGithub,
}

impl WorkflowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowKind::WeixinArticle => "WeixinWorkflow",
            WorkflowKind::WeixinAiBench => "WeixinAIBenchWorkflow",
            WorkflowKind::WeixinHelloGithub => "WeixinHelloGithubWorkflow",
        }
    }

    pub fn template_kind(&self) -> TemplateKind {
        match self {
            WorkflowKind::WeixinArticle => TemplateKind::Article,
            WorkflowKind::WeixinAiBench => TemplateKind::AiBench,
            WorkflowKind::WeixinHelloGithub => TemplateKind::HelloGithub,
        }
    }

    pub fn platform(&self) -> Platform {
        Platform::Weixin
    }
}

impl std::fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run state of a workflow as shown to operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Stopped,
    Running,
    Error,
}

/// A named, schedulable pipeline definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: Uuid,
    pub name: String,
    pub kind: WorkflowKind,
    /// Cron expression, e.g. `"0 0 3 * * * *"` for 03:00 daily.
    pub schedule: String,
    pub enabled: bool,
    pub status: WorkflowStatus,
    /// Upper bound on the number of items selected by the ranker.
    pub article_num: usize,
    /// Explicitly pinned template; the kind's default template when `None`.
    pub template_id: Option<Uuid>,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorKind {
    #[serde(rename = "firecrawl")]
    FireCrawl,
    Twitter,
    #[serde(rename = "custom")]
    CustomApi,
}

impl ConnectorKind {
    /// Module name used for ledger log entries emitted on behalf of sources
    /// of this kind.
    pub fn module(&self) -> &'static str {
        match self {
            ConnectorKind::FireCrawl => "FireCrawlScraper",
            ConnectorKind::Twitter => "TwitterScraper",
            ConnectorKind::CustomApi => "CustomApiScraper",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Active,
    Error,
    Inactive,
}

/// A configured content origin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSource {
    pub id: Uuid,
    pub name: String,
    pub connector: ConnectorKind,
    pub url: String,
    pub enabled: bool,
    pub health: HealthStatus,
    /// Workflow kinds this source feeds.
    pub kinds: Vec<WorkflowKind>,
    pub last_sync: Option<DateTime<Utc>>,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A unit of content as returned by a connector, before ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawItem {
    pub url: String,
    pub title: String,
    pub content: String,
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub media: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    Draft,
    Selected,
    Published,
    Failed,
}

/// A candidate content item flowing through one execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: Uuid,
    pub source_id: Uuid,
    pub title: String,
    pub content: String,
    pub url: String,
    pub keywords: Vec<String>,
    /// Quality score in the 0-100 range.
    pub score: f64,
    pub media: Vec<String>,
    pub status: ContentStatus,
    /// Publish timestamp reported by the origin, used as ranking tie-break.
    pub published_at: Option<DateTime<Utc>>,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Weixin,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Weixin => "weixin",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishStatus {
    Pending,
    Published,
    Failed,
}

/// Outcome of one workflow execution. Append-only: once the status reaches
/// `Published` or `Failed` the record is immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishRecord {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub workflow_kind: WorkflowKind,
    pub title: String,
    pub platform: Platform,
    pub status: PublishStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Items that reached the render/publish stage.
    pub article_count: u32,
    /// Items the publisher confirmed delivered.
    pub success_count: u32,
    pub url: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    Article,
    AiBench,
    HelloGithub,
}

impl TemplateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateKind::Article => "article",
            TemplateKind::AiBench => "aibench",
            TemplateKind::HelloGithub => "hellogithub",
        }
    }
}

/// A named rendering definition scoped to a workflow type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: Uuid,
    pub name: String,
    pub kind: TemplateKind,
    pub body: String,
    pub is_default: bool,
    pub updated_at: DateTime<Utc>,
}

/// The rendered, platform-ready output of the template renderer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub title: String,
    pub body: String,
    pub item_count: u32,
    pub platform: Platform,
    pub media: Vec<String>,
}

/// What a publisher reports back. `confirmed_count` is exact even on partial
/// success; callers must not assume all-or-nothing delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishResult {
    pub confirmed_count: u32,
    pub url: Option<String>,
    pub media_id: Option<String>,
    /// Verbatim quota or rate-limit signal from the platform, if any.
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

/// A structured observation emitted by a component during execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub module: String,
    pub message: String,
    pub detail: Option<serde_json::Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("workflow not found: {id}")]
    WorkflowNotFound { id: Uuid },

    #[error("data source not found: {id}")]
    SourceNotFound { id: Uuid },

    #[error("template not found: {id}")]
    TemplateNotFound { id: Uuid },

    #[error("no template configured for kind {kind:?}")]
    NoTemplateForKind { kind: TemplateKind },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("workflow already running: {workflow}")]
    AlreadyRunning { workflow: String },

    #[error("no enabled data sources for this workflow")]
    NoSources,

    #[error("no content survived the pipeline")]
    NoContent,

    #[error("connector failure ({connector}): {message}")]
    Connector { connector: String, message: String },

    #[error("publisher failure ({platform}): {message}")]
    Publisher { platform: Platform, message: String },

    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    #[error("invalid cron expression '{expr}': {message}")]
    InvalidCron { expr: String, message: String },

    #[error("data source is disabled: {name}")]
    Disabled { name: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    General(String),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
