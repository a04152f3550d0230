pub mod config;
pub mod connectors;
pub mod console;
pub mod ledger;
pub mod publisher;
pub mod ranker;
pub mod registry;
pub mod scheduler;
pub mod summarizer;
pub mod templates;
pub mod types;

pub use config::OrchestratorConfig;
pub use connectors::{Connector, ConnectorRegistry, StaticConnector};
pub use console::Console;
pub use ledger::{ExecutionLedger, LogFilter, Page, PageRequest, RecordFilter};
pub use publisher::{PublishBehavior, Publisher, PublisherRegistry, StaticPublisher};
pub use ranker::{ContentScorer, HeuristicScorer};
pub use registry::{DataSourceRegistry, NewDataSource, SourceUpdate};
pub use scheduler::{NewWorkflow, Scheduler, WorkflowUpdate};
pub use summarizer::{HeuristicSummarizer, MockSummarizer, Summarizer, SummarizerRegistry};
pub use templates::{NewTemplate, TemplateRenderer, TemplateStore};
pub use types::*;
