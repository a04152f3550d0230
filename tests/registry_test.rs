mod common;

use common::{add_source, harness, relevant_items};
use trend_orchestrator::registry::{NewDataSource, SourceUpdate};
use trend_orchestrator::types::{ConnectorKind, HealthStatus, OrchestratorError, WorkflowKind};

#[tokio::test]
async fn register_rejects_bad_and_duplicate_urls() {
    let h = harness().await;

    let bad_scheme = h
        .console
        .register_source(NewDataSource {
            name: "ftp".to_string(),
            connector: ConnectorKind::CustomApi,
            url: "ftp://example.com/feed".to_string(),
            kinds: vec![WorkflowKind::WeixinArticle],
            description: String::new(),
            enabled: true,
        })
        .await;
    assert!(bad_scheme.is_err());

    add_source(&h, "feed", relevant_items("feed", 1)).await;
    let duplicate = h
        .console
        .register_source(NewDataSource {
            name: "copy".to_string(),
            connector: ConnectorKind::CustomApi,
            url: "https://example.com/feeds/feed".to_string(),
            kinds: vec![WorkflowKind::WeixinArticle],
            description: String::new(),
            enabled: true,
        })
        .await;
    assert!(matches!(duplicate, Err(OrchestratorError::Conflict(_))));
}

#[tokio::test]
async fn test_updates_health_but_never_enabled() {
    let h = harness().await;
    let source = add_source(&h, "probed", relevant_items("probed", 1)).await;
    assert_eq!(source.health, HealthStatus::Inactive);

    let health = h.console.test_source(source.id).await.unwrap();
    assert_eq!(health, HealthStatus::Active);
    let stored = h.console.source(source.id).await.unwrap();
    assert_eq!(stored.health, HealthStatus::Active);
    assert!(stored.enabled);

    h.connector.fail_source(source.id).await;
    let health = h.console.test_source(source.id).await.unwrap();
    assert_eq!(health, HealthStatus::Error);
    let stored = h.console.source(source.id).await.unwrap();
    assert_eq!(stored.health, HealthStatus::Error);
    assert!(stored.enabled, "test must not flip the enabled flag");
}

#[tokio::test]
async fn sync_requires_an_enabled_source() {
    let h = harness().await;
    let source = add_source(&h, "synced", relevant_items("synced", 4)).await;

    let count = h.console.sync_source(source.id).await.unwrap();
    assert_eq!(count, 4);
    let stored = h.console.source(source.id).await.unwrap();
    assert!(stored.last_sync.is_some());
    assert_eq!(stored.health, HealthStatus::Active);

    h.console
        .set_source_enabled(source.id, false)
        .await
        .unwrap();
    let denied = h.console.sync_source(source.id).await;
    assert!(matches!(denied, Err(OrchestratorError::Disabled { .. })));
}

#[tokio::test]
async fn disabling_parks_the_source_as_inactive() {
    let h = harness().await;
    let source = add_source(&h, "parked", relevant_items("parked", 1)).await;
    h.console.test_source(source.id).await.unwrap();

    let disabled = h
        .console
        .set_source_enabled(source.id, false)
        .await
        .unwrap();
    assert!(!disabled.enabled);
    assert_eq!(disabled.health, HealthStatus::Inactive);

    // Re-enabling does not forge health; only test/sync can set Active.
    let enabled = h.console.set_source_enabled(source.id, true).await.unwrap();
    assert_eq!(enabled.health, HealthStatus::Inactive);
}

#[tokio::test]
async fn updates_apply_only_the_given_fields() {
    let h = harness().await;
    let source = add_source(&h, "editable", relevant_items("editable", 1)).await;

    let updated = h
        .console
        .update_source(
            source.id,
            SourceUpdate {
                description: Some("AI press coverage".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.description, "AI press coverage");
    assert_eq!(updated.name, "editable");
    assert_eq!(updated.url, source.url);
}

#[tokio::test]
async fn sync_failure_marks_the_source_unhealthy() {
    let h = harness().await;
    let source = add_source(&h, "flaky", relevant_items("flaky", 2)).await;
    h.connector.fail_source(source.id).await;

    let failed = h.console.sync_source(source.id).await;
    assert!(failed.is_err());

    let stored = h.console.source(source.id).await.unwrap();
    assert_eq!(stored.health, HealthStatus::Error);
    assert!(stored.last_sync.is_none());
}
