// tests/store_snapshot.rs
mod common;

use common::{count, day, ScriptedConnection};
use market_data_ingest::ingest::types::{IndicatorRecord, NewsRecord};
use market_data_ingest::store::{SnapshotStore, StoreError, Table};
use sqlx::sqlite::SqliteConnection;
use sqlx::Connection;

async fn memory_db() -> SqliteConnection {
    SqliteConnection::connect("sqlite::memory:").await.unwrap()
}

fn indicator_rows(tickers: &[&str], snapshot: chrono::NaiveDate) -> Vec<IndicatorRecord> {
    tickers
        .iter()
        .map(|t| IndicatorRecord {
            ticker: t.to_string(),
            observation_date: day(2023, 4, 6),
            value: Some(7.0),
            snapshot_date: snapshot,
        })
        .collect()
}

#[tokio::test]
async fn schema_creation_is_idempotent() {
    let mut conn = memory_db().await;
    let store = SnapshotStore::default();
    store.ensure_schema(&mut conn).await.unwrap();
    store.ensure_schema(&mut conn).await.unwrap();

    assert_eq!(count(&mut conn, "SELECT COUNT(*) FROM economy_data").await, 0);
    assert_eq!(count(&mut conn, "SELECT COUNT(*) FROM market_news").await, 0);
    assert_eq!(
        store
            .latest_snapshot_date(&mut conn, Table::EconomyData)
            .await
            .unwrap(),
        None
    );
}

#[tokio::test]
async fn rotate_keeps_only_todays_snapshot() {
    let mut conn = memory_db().await;
    let store = SnapshotStore::default();
    store.ensure_schema(&mut conn).await.unwrap();

    let d1 = day(2023, 4, 7);
    let today = day(2023, 4, 8);
    store
        .bulk_insert(&mut conn, &indicator_rows(&["t1", "t2", "t3"], d1))
        .await
        .unwrap();
    let inserted = store
        .bulk_insert(&mut conn, &indicator_rows(&["t1", "t2", "t3", "t4"], today))
        .await
        .unwrap();
    assert_eq!(inserted, 4);
    assert_eq!(count(&mut conn, "SELECT COUNT(*) FROM economy_data").await, 7);

    let deleted = store
        .rotate(&mut conn, Table::EconomyData, today)
        .await
        .unwrap();
    assert_eq!(deleted, 3);
    assert_eq!(count(&mut conn, "SELECT COUNT(*) FROM economy_data").await, 4);
    assert_eq!(
        store
            .latest_snapshot_date(&mut conn, Table::EconomyData)
            .await
            .unwrap(),
        Some(today)
    );
}

#[tokio::test]
async fn rotate_refuses_when_latest_is_not_today() {
    let mut conn = memory_db().await;
    let store = SnapshotStore::default();
    store.ensure_schema(&mut conn).await.unwrap();

    let d1 = day(2023, 4, 6);
    let d2 = day(2023, 4, 7);
    store
        .bulk_insert(&mut conn, &indicator_rows(&["a", "b"], d1))
        .await
        .unwrap();
    store
        .bulk_insert(&mut conn, &indicator_rows(&["a"], d2))
        .await
        .unwrap();

    let today = day(2023, 4, 8);
    let err = store
        .rotate(&mut conn, Table::EconomyData, today)
        .await
        .unwrap_err();
    match err {
        StoreError::NoRecentSnapshot {
            table,
            latest,
            today: t,
        } => {
            assert_eq!(table, Table::EconomyData);
            assert_eq!(latest, Some(d2));
            assert_eq!(t, today);
        }
        other => panic!("unexpected {other:?}"),
    }
    // Nothing deleted.
    assert_eq!(count(&mut conn, "SELECT COUNT(*) FROM economy_data").await, 3);
}

#[tokio::test]
async fn rotate_on_empty_table_is_refused() {
    let mut conn = memory_db().await;
    let store = SnapshotStore::default();
    store.ensure_schema(&mut conn).await.unwrap();

    let err = store
        .rotate(&mut conn, Table::MarketNews, day(2024, 1, 1))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::NoRecentSnapshot { latest: None, .. }
    ));
}

#[tokio::test]
async fn empty_insert_issues_no_statement() {
    let wrapped = ScriptedConnection::new(memory_db().await);
    let executed = wrapped.executed.clone();
    let mut conn = wrapped;

    let rows: Vec<NewsRecord> = Vec::new();
    let err = SnapshotStore::default()
        .bulk_insert(&mut conn, &rows)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::EmptyPayload {
            table: Table::MarketNews
        }
    ));
    assert!(executed.lock().unwrap().is_empty());
}

#[tokio::test]
async fn inserts_are_split_into_batches() {
    let wrapped = ScriptedConnection::new(memory_db().await);
    let executed = wrapped.executed.clone();
    let mut conn = wrapped;

    let store = SnapshotStore::new(2);
    store.ensure_schema(&mut conn).await.unwrap();
    executed.lock().unwrap().clear();

    let today = day(2024, 5, 2);
    let rows = indicator_rows(&["a", "b", "c", "d", "e"], today);
    let inserted = store.bulk_insert(&mut conn, &rows).await.unwrap();
    assert_eq!(inserted, 5);

    let statements = executed.lock().unwrap().clone();
    assert_eq!(statements.len(), 3);
    assert!(statements.iter().all(|s| s.starts_with("INSERT INTO economy_data")));
}

#[tokio::test]
async fn news_rows_get_surrogate_ids_and_nulls() {
    let mut conn = memory_db().await;
    let store = SnapshotStore::default();
    store.ensure_schema(&mut conn).await.unwrap();

    let today = day(2024, 5, 2);
    let row = NewsRecord {
        title: Some("Same title".into()),
        description: None,
        url: None,
        source: Some("Wire".into()),
        image: None,
        category: Some("business".into()),
        language: Some("en".into()),
        country: Some("us".into()),
        snapshot_date: today,
    };
    // No natural key: identical articles are both kept.
    store
        .bulk_insert(&mut conn, &[row.clone(), row])
        .await
        .unwrap();

    assert_eq!(
        count(&mut conn, "SELECT COUNT(DISTINCT id) FROM market_news").await,
        2
    );
    assert_eq!(
        count(
            &mut conn,
            "SELECT COUNT(*) FROM market_news WHERE description IS NULL"
        )
        .await,
        2
    );
}

#[tokio::test]
async fn duplicate_primary_key_is_an_operation_error() {
    let mut conn = memory_db().await;
    let store = SnapshotStore::default();
    store.ensure_schema(&mut conn).await.unwrap();

    let today = day(2024, 5, 2);
    let rows = indicator_rows(&["dup", "dup"], today);
    let err = store.bulk_insert(&mut conn, &rows).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::Operation {
            op: "insert",
            table: Some(Table::EconomyData),
            ..
        }
    ));
}

#[tokio::test]
async fn oversized_batch_is_split_under_bind_limit() {
    let wrapped = ScriptedConnection::new(memory_db().await);
    let executed = wrapped.executed.clone();
    let mut conn = wrapped;

    let store = SnapshotStore::new(8000);
    store.ensure_schema(&mut conn).await.unwrap();
    executed.lock().unwrap().clear();

    let today = day(2024, 5, 2);
    let row = NewsRecord {
        title: Some("headline".into()),
        description: Some("body".into()),
        url: Some("https://news.test/headline".into()),
        source: Some("Wire".into()),
        image: None,
        category: Some("business".into()),
        language: Some("en".into()),
        country: Some("us".into()),
        snapshot_date: today,
    };
    let rows = vec![row; 8000];
    let inserted = store.bulk_insert(&mut conn, &rows).await.unwrap();
    assert_eq!(inserted, 8000);

    // 9 columns against SQLite's 32766 parameters: 3640 rows per statement.
    assert_eq!(executed.lock().unwrap().len(), 3);
    assert_eq!(count(&mut conn.into_inner(), "SELECT COUNT(*) FROM market_news").await, 8000);
}
