mod common;

use common::workflow_fixture;
use trend_orchestrator::ledger::{
    ExecutionLedger, LogFilter, PageRequest, RecordFilter, RecordOutcome,
};
use trend_orchestrator::types::{
    LogLevel, OrchestratorError, Platform, PublishStatus, WorkflowKind,
};

#[tokio::test]
async fn finalized_records_are_immutable() {
    let ledger = ExecutionLedger::new(100);
    let workflow = workflow_fixture("immutable", WorkflowKind::WeixinArticle);

    let record = ledger.open_record(&workflow, "pending title".to_string()).await;
    assert_eq!(record.status, PublishStatus::Pending);

    let finalized = ledger
        .finalize(
            record.id,
            RecordOutcome::Published {
                title: Some("final title".to_string()),
                article_count: 8,
                success_count: 8,
                url: Some("https://mp.weixin.example/s/abc".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(finalized.status, PublishStatus::Published);
    assert_eq!(finalized.title, "final title");
    assert!(finalized.finished_at.is_some());

    let again = ledger
        .finalize(
            record.id,
            RecordOutcome::Failed {
                title: None,
                article_count: 0,
                error: "should not apply".to_string(),
            },
        )
        .await;
    assert!(matches!(again, Err(OrchestratorError::Conflict(_))));

    let stored = ledger.record(record.id).await.unwrap();
    assert_eq!(stored.status, PublishStatus::Published);
    assert_eq!(stored.article_count, 8);
}

#[tokio::test]
async fn success_count_is_clamped_to_article_count() {
    let ledger = ExecutionLedger::new(100);
    let workflow = workflow_fixture("clamp", WorkflowKind::WeixinArticle);
    let record = ledger.open_record(&workflow, "t".to_string()).await;

    let finalized = ledger
        .finalize(
            record.id,
            RecordOutcome::Published {
                title: None,
                article_count: 5,
                success_count: 10,
                url: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(finalized.success_count, 5);
}

#[tokio::test]
async fn record_queries_filter_and_paginate() {
    let ledger = ExecutionLedger::new(100);

    for i in 0..3 {
        let workflow = workflow_fixture("articles", WorkflowKind::WeixinArticle);
        let record = ledger
            .open_record(&workflow, format!("AI briefing {i}"))
            .await;
        ledger
            .finalize(
                record.id,
                RecordOutcome::Published {
                    title: None,
                    article_count: 5,
                    success_count: 5,
                    url: None,
                },
            )
            .await
            .unwrap();
    }

    let bench = workflow_fixture("bench", WorkflowKind::WeixinAiBench);
    let record = ledger.open_record(&bench, "Benchmark board".to_string()).await;
    ledger
        .finalize(
            record.id,
            RecordOutcome::Failed {
                title: None,
                article_count: 2,
                error: "insufficient API quota".to_string(),
            },
        )
        .await
        .unwrap();

    let all = ledger
        .records(&RecordFilter::default(), PageRequest::default())
        .await;
    assert_eq!(all.total, 4);

    let failed = ledger
        .records(
            &RecordFilter {
                status: Some(PublishStatus::Failed),
                ..Default::default()
            },
            PageRequest::default(),
        )
        .await;
    assert_eq!(failed.total, 1);
    assert_eq!(failed.items[0].workflow_kind, WorkflowKind::WeixinAiBench);

    let by_kind = ledger
        .records(
            &RecordFilter {
                kind: Some(WorkflowKind::WeixinArticle),
                ..Default::default()
            },
            PageRequest::default(),
        )
        .await;
    assert_eq!(by_kind.total, 3);

    // Free-text search covers both the title and the error message.
    let by_title = ledger
        .records(
            &RecordFilter {
                search: Some("briefing".to_string()),
                ..Default::default()
            },
            PageRequest::default(),
        )
        .await;
    assert_eq!(by_title.total, 3);

    let by_error = ledger
        .records(
            &RecordFilter {
                search: Some("QUOTA".to_string()),
                ..Default::default()
            },
            PageRequest::default(),
        )
        .await;
    assert_eq!(by_error.total, 1);

    let by_platform = ledger
        .records(
            &RecordFilter {
                platform: Some(Platform::Weixin),
                ..Default::default()
            },
            PageRequest::default(),
        )
        .await;
    assert_eq!(by_platform.total, 4);

    let page = ledger
        .records(
            &RecordFilter::default(),
            PageRequest {
                offset: 2,
                limit: 2,
            },
        )
        .await;
    assert_eq!(page.total, 4);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.offset, 2);
}

#[tokio::test]
async fn log_queries_filter_by_level_module_and_text() {
    let ledger = ExecutionLedger::new(100);
    ledger
        .info("ContentRanker", "ranked 15 items, selected 8", None)
        .await;
    ledger
        .warn("FireCrawlScraper", "API quota below 20%", None)
        .await;
    ledger
        .error("TwitterScraper", "rate limit exceeded", None)
        .await;
    ledger.info("AISummarizer", "summarized 8 items", None).await;

    let warns = ledger
        .logs(
            &LogFilter {
                level: Some(LogLevel::Warn),
                ..Default::default()
            },
            PageRequest::default(),
        )
        .await;
    assert_eq!(warns.total, 1);
    assert_eq!(warns.items[0].module, "FireCrawlScraper");

    let by_module = ledger
        .logs(
            &LogFilter {
                module: Some("ContentRanker".to_string()),
                ..Default::default()
            },
            PageRequest::default(),
        )
        .await;
    assert_eq!(by_module.total, 1);

    let by_text = ledger
        .logs(
            &LogFilter {
                search: Some("rate limit".to_string()),
                ..Default::default()
            },
            PageRequest::default(),
        )
        .await;
    assert_eq!(by_text.total, 1);

    // Newest entries come back first.
    let all = ledger.logs(&LogFilter::default(), PageRequest::default()).await;
    assert_eq!(all.total, 4);
    assert_eq!(all.items[0].module, "AISummarizer");
}

#[tokio::test]
async fn log_retention_evicts_the_oldest_entries() {
    let ledger = ExecutionLedger::new(5);
    for i in 0..8 {
        ledger.info("ConfigManager", format!("refresh {i}"), None).await;
    }

    assert_eq!(ledger.log_count().await, 5);

    let survivors = ledger
        .logs(&LogFilter::default(), PageRequest::default())
        .await;
    let messages: Vec<&str> = survivors.items.iter().map(|e| e.message.as_str()).collect();
    assert!(!messages.contains(&"refresh 0"));
    assert!(!messages.contains(&"refresh 2"));
    assert!(messages.contains(&"refresh 7"));
}

#[tokio::test]
async fn export_renders_flattened_chronological_lines() {
    let ledger = ExecutionLedger::new(100);
    ledger.info("WeixinWorkflow", "execution started", None).await;
    ledger
        .warn("FireCrawlScraper", "quota running low", None)
        .await;

    let export = ledger.export_logs(&LogFilter::default()).await;
    let lines: Vec<&str> = export.lines().collect();
    assert_eq!(lines.len(), 2);
    // Oldest first in the export.
    assert!(lines[0].contains("[INFO] [WeixinWorkflow] execution started"));
    assert!(lines[1].contains("[WARN] [FireCrawlScraper] quota running low"));

    let filtered = ledger
        .export_logs(&LogFilter {
            level: Some(LogLevel::Warn),
            ..Default::default()
        })
        .await;
    assert_eq!(filtered.lines().count(), 1);
}
