//! ClickHouse and PostgreSQL store tests.
//!
//! Require Docker (or the `PIPELINE_TEST_*_URL` variables); run with
//! `cargo test -p integration-tests --test stores -- --ignored`.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use clickhouse_client::{count_events, query_session_events, ClickHouseEventStore};
use engine_core::{
    ElementInfo, EventData, EventStore, SessionKey, SessionStore, SessionUpdate,
};
use integration_tests::{
    containers::{ClickHouseContainer, PostgresContainer},
    fixtures,
};
use postgres_client::PostgresSessionStore;
use uuid::Uuid;

fn click() -> EventData {
    EventData::Click {
        element: ElementInfo::default(),
        position: None,
    }
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_clickhouse_redelivery_collapses() {
    let ch = ClickHouseContainer::start().await;
    let store = ClickHouseEventStore::new(ch.client.clone());

    let tenant = format!("tenant-{}", Uuid::new_v4());
    let session = Uuid::new_v4().to_string();
    let event = fixtures::event(&tenant, &session, 1_700_000_000_000);

    // Same idempotency key, different server ids: a redelivered job.
    let mut redelivered = event.clone();
    redelivered.id = Uuid::new_v4();

    store.insert(&event).await.expect("first insert");
    store.insert(&redelivered).await.expect("second insert");

    let count = count_events(&ch.client, &tenant).await.expect("count");
    assert_eq!(count, 1);

    let rows = query_session_events(&ch.client, &tenant, &session)
        .await
        .expect("query");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].event_type, "pageview");
    assert_eq!(rows[0].idempotency_key, event.idempotency_key.to_string());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_postgres_upsert_follows_fold() {
    let pg = PostgresContainer::start().await;
    let store = PostgresSessionStore::new(pg.pool.clone());

    let tenant = fixtures::TENANT_ID;
    let session = Uuid::new_v4().to_string();
    let start = 1_700_000_000_000;

    let pageview = fixtures::event(tenant, &session, start);
    let click = fixtures::with_data(fixtures::event(tenant, &session, start + 2_000), click());
    let unload = fixtures::with_data(
        fixtures::event(tenant, &session, start + 5_000),
        EventData::Unload,
    );

    let mut expected = None;
    for event in [&pageview, &click, &unload] {
        let update = SessionUpdate::from_event(event);
        store.apply(&update).await.expect("apply");
        expected = Some(update.fold(expected));
    }

    let stored = store
        .get(&SessionKey::new(tenant, &session))
        .await
        .expect("get")
        .expect("session exists");
    let expected = expected.unwrap();

    assert_eq!(stored.start_time, expected.start_time);
    assert_eq!(stored.end_time, expected.end_time);
    assert_eq!(stored.duration_ms, Some(5_000));
    assert_eq!(stored.page_views, 1);
    assert_eq!(stored.clicks, 1);
    assert!(!stored.is_bounce);
    assert_eq!(stored.first_page, expected.first_page);
    assert_eq!(stored.last_event, expected.last_event);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_postgres_concurrent_updates_do_not_lose_counts() {
    let pg = PostgresContainer::start().await;
    let store = Arc::new(PostgresSessionStore::new(pg.pool.clone()));

    let session = Uuid::new_v4().to_string();
    let base = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..50 {
        let store = store.clone();
        let mut event = fixtures::with_data(
            fixtures::event(fixtures::TENANT_ID, &session, 0),
            click(),
        );
        event.timestamp = base + Duration::milliseconds(i);
        tasks.spawn(async move { store.apply(&SessionUpdate::from_event(&event)).await });
    }
    while let Some(joined) = tasks.join_next().await {
        joined.expect("task").expect("apply");
    }

    let stored = store
        .get(&SessionKey::new(fixtures::TENANT_ID, &session))
        .await
        .expect("get")
        .expect("session exists");
    assert_eq!(stored.clicks, 50);
    assert!(!stored.is_bounce);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_postgres_purge_by_start_time() {
    let pg = PostgresContainer::start().await;
    let store = PostgresSessionStore::new(pg.pool.clone());

    let old = Uuid::new_v4().to_string();
    let recent = Uuid::new_v4().to_string();
    let now = Utc::now();

    let old_event = fixtures::event(
        fixtures::TENANT_ID,
        &old,
        (now - Duration::days(400)).timestamp_millis(),
    );
    let recent_event = fixtures::event(fixtures::TENANT_ID, &recent, now.timestamp_millis());
    store.apply(&SessionUpdate::from_event(&old_event)).await.expect("apply");
    store.apply(&SessionUpdate::from_event(&recent_event)).await.expect("apply");

    let purged = store
        .purge_started_before(now - Duration::days(365))
        .await
        .expect("purge");
    assert!(purged >= 1);

    let key = |s: &str| SessionKey::new(fixtures::TENANT_ID, s);
    assert!(store.get(&key(&old)).await.expect("get").is_none());
    assert!(store.get(&key(&recent)).await.expect("get").is_some());
}
