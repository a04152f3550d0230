use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use trend_orchestrator::registry::NewDataSource;
use trend_orchestrator::scheduler::NewWorkflow;
use trend_orchestrator::types::{ConnectorKind, WorkflowKind};
use trend_orchestrator::{Console, OrchestratorConfig};

#[derive(Parser)]
#[command(
    name = "trend-orchestrator",
    about = "Content publishing workflow orchestrator"
)]
struct Cli {
    /// Seed demo workflows and data sources at startup.
    #[arg(long)]
    demo: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = OrchestratorConfig::from_env();
    info!(
        "Starting trend-orchestrator ({} workers, {}s tick)",
        config.worker_count, config.tick_secs
    );

    let console = Console::new(config).await;
    if cli.demo {
        seed_demo(&console).await?;
    }

    let scheduler = console.scheduler();
    let loop_handle = tokio::spawn(scheduler.run());

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    console.shutdown().await;
    loop_handle.abort();
    info!("Orchestrator stopped");
    Ok(())
}

/// Install a few representative sources and workflows so a fresh instance
/// has something to schedule.
async fn seed_demo(console: &Console) -> anyhow::Result<()> {
    let demo_sources = [
        (
            "Hacker News",
            ConnectorKind::FireCrawl,
            "https://news.ycombinator.com/",
            "Tech news and discussion",
        ),
        (
            "Reuters AI News",
            ConnectorKind::FireCrawl,
            "https://www.reuters.com/technology/artificial-intelligence/",
            "Reuters AI coverage",
        ),
        (
            "OpenAI on X",
            ConnectorKind::Twitter,
            "https://x.com/OpenAI",
            "Official OpenAI account",
        ),
    ];

    for (name, connector, url, description) in demo_sources {
        let source = console
            .register_source(NewDataSource {
                name: name.to_string(),
                connector,
                url: url.to_string(),
                kinds: vec![WorkflowKind::WeixinArticle],
                description: description.to_string(),
                enabled: true,
            })
            .await?;
        info!("Seeded data source: {} ({})", source.name, source.url);
    }

    let demo_workflows = [
        (
            "Daily AI briefing",
            WorkflowKind::WeixinArticle,
            // 03:00 every day
            "0 0 3 * * *",
            "Collects AI coverage overnight and publishes a morning briefing",
        ),
        (
            "Model benchmark board",
            WorkflowKind::WeixinAiBench,
            // 03:00 every Tuesday
            "0 0 3 * * Tue",
            "Weekly model standings update",
        ),
        (
            "GitHub project roundup",
            WorkflowKind::WeixinHelloGithub,
            // 03:00 every Wednesday
            "0 0 3 * * Wed",
            "Weekly trending AI project recommendations",
        ),
    ];

    for (name, kind, schedule, description) in demo_workflows {
        let workflow = console
            .create_workflow(NewWorkflow {
                name: name.to_string(),
                kind,
                schedule: schedule.to_string(),
                description: description.to_string(),
                article_num: None,
                template_id: None,
            })
            .await?;
        match console.start_workflow(workflow.id).await {
            Ok(started) => info!(
                "Seeded workflow: {} (next run {:?})",
                started.name, started.next_run
            ),
            Err(e) => error!("Failed to start seeded workflow {}: {}", workflow.name, e),
        }
    }

    Ok(())
}
