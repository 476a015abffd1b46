// src/store/mod.rs
//! Snapshot storage: schema, bulk insert, latest-date lookup and rotation.
//!
//! [`SnapshotStore`] holds only tuning knobs; every operation takes the connection it
//! runs on, so callers decide transaction boundaries.

pub mod connection;
pub mod session;

use chrono::NaiveDate;

use crate::ingest::types::{IndicatorRecord, NewsRecord};
use crate::store::connection::{Dialect, SqlConnection, SqlValue};

pub use connection::{Backend, ConnectTarget};
pub use session::{Released, Session};

/// Rows per multi-row INSERT statement.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Every table stamps rows with the day they were ingested.
pub const SNAPSHOT_COLUMN: &str = "date_created";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    EconomyData,
    MarketNews,
}

impl Table {
    pub fn name(self) -> &'static str {
        match self {
            Table::EconomyData => "economy_data",
            Table::MarketNews => "market_news",
        }
    }

    fn create_sql(self, dialect: Dialect) -> String {
        match self {
            Table::EconomyData => format!(
                "CREATE TABLE IF NOT EXISTS economy_data (
                    ticker_name VARCHAR(40) NOT NULL,
                    dates DATE NOT NULL,
                    value FLOAT,
                    {SNAPSHOT_COLUMN} DATE NOT NULL DEFAULT CURRENT_DATE,
                    PRIMARY KEY (ticker_name, dates, {SNAPSHOT_COLUMN})
                )"
            ),
            Table::MarketNews => format!(
                "CREATE TABLE IF NOT EXISTS market_news (
                    {},
                    title TEXT,
                    description TEXT,
                    url TEXT,
                    source TEXT,
                    image TEXT,
                    category VARCHAR(20),
                    language VARCHAR(10),
                    country VARCHAR(5),
                    {SNAPSHOT_COLUMN} DATE NOT NULL DEFAULT CURRENT_DATE
                )",
                dialect.surrogate_key()
            ),
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unable to connect to database: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("{op} failed{}: {source}", on_table(.table))]
    Operation {
        op: &'static str,
        table: Option<Table>,
        #[source]
        source: sqlx::Error,
    },

    #[error("latest snapshot in {table} is {latest:?}, not {today}; refusing to rotate")]
    NoRecentSnapshot {
        table: Table,
        latest: Option<NaiveDate>,
        today: NaiveDate,
    },

    #[error("no rows supplied for {table}")]
    EmptyPayload { table: Table },
}

fn on_table(table: &Option<Table>) -> String {
    table.map(|t| format!(" on {t}")).unwrap_or_default()
}

/// A record type that lives in one snapshot table.
pub trait SnapshotRow {
    const TABLE: Table;
    /// Insert columns, in the order `params` yields values.
    const COLUMNS: &'static [&'static str];

    fn params(&self) -> Vec<SqlValue>;
}

impl SnapshotRow for IndicatorRecord {
    const TABLE: Table = Table::EconomyData;
    const COLUMNS: &'static [&'static str] = &["ticker_name", "dates", "value", SNAPSHOT_COLUMN];

    fn params(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Text(Some(self.ticker.clone())),
            SqlValue::Date(self.observation_date),
            SqlValue::Float(self.value),
            SqlValue::Date(self.snapshot_date),
        ]
    }
}

impl SnapshotRow for NewsRecord {
    const TABLE: Table = Table::MarketNews;
    const COLUMNS: &'static [&'static str] = &[
        "title",
        "description",
        "url",
        "source",
        "image",
        "category",
        "language",
        "country",
        SNAPSHOT_COLUMN,
    ];

    fn params(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Text(self.title.clone()),
            SqlValue::Text(self.description.clone()),
            SqlValue::Text(self.url.clone()),
            SqlValue::Text(self.source.clone()),
            SqlValue::Text(self.image.clone()),
            SqlValue::Text(self.category.clone()),
            SqlValue::Text(self.language.clone()),
            SqlValue::Text(self.country.clone()),
            SqlValue::Date(self.snapshot_date),
        ]
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SnapshotStore {
    batch_size: usize,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

impl SnapshotStore {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Create both tables if they are missing.
    pub async fn ensure_schema<C: SqlConnection>(&self, conn: &mut C) -> Result<(), StoreError> {
        let dialect = conn.dialect();
        for table in [Table::EconomyData, Table::MarketNews] {
            conn.execute(&table.create_sql(dialect), &[])
                .await
                .map_err(|source| StoreError::Operation {
                    op: "create table",
                    table: Some(table),
                    source,
                })?;
        }
        Ok(())
    }

    /// `MAX(date_created)`, or `None` for an empty table.
    pub async fn latest_snapshot_date<C: SqlConnection>(
        &self,
        conn: &mut C,
        table: Table,
    ) -> Result<Option<NaiveDate>, StoreError> {
        let sql = format!("SELECT MAX({SNAPSHOT_COLUMN}) FROM {}", table.name());
        conn.fetch_max_date(&sql)
            .await
            .map_err(|source| StoreError::Operation {
                op: "latest snapshot lookup",
                table: Some(table),
                source,
            })
    }

    /// Insert `rows` with multi-row statements of at most `batch_size` rows each, fewer
    /// when the backend's bind parameter limit would be exceeded.
    pub async fn bulk_insert<C, R>(&self, conn: &mut C, rows: &[R]) -> Result<u64, StoreError>
    where
        C: SqlConnection,
        R: SnapshotRow + Sync,
    {
        if rows.is_empty() {
            return Err(StoreError::EmptyPayload { table: R::TABLE });
        }

        let dialect = conn.dialect();
        let per_statement = rows_per_statement(self.batch_size, dialect, R::COLUMNS.len());
        let mut inserted = 0u64;
        for chunk in rows.chunks(per_statement) {
            let sql = insert_sql(dialect, R::TABLE, R::COLUMNS, chunk.len());
            let params: Vec<SqlValue> = chunk.iter().flat_map(|r| r.params()).collect();
            inserted += conn
                .execute(&sql, &params)
                .await
                .map_err(|source| StoreError::Operation {
                    op: "insert",
                    table: Some(R::TABLE),
                    source,
                })?;
        }
        tracing::debug!(table = %R::TABLE, rows = inserted, "bulk insert done");
        Ok(inserted)
    }

    /// Delete every snapshot except today's. Refuses unless today's snapshot is the latest.
    pub async fn rotate<C: SqlConnection>(
        &self,
        conn: &mut C,
        table: Table,
        today: NaiveDate,
    ) -> Result<u64, StoreError> {
        let latest = self.latest_snapshot_date(conn, table).await?;
        if latest != Some(today) {
            return Err(StoreError::NoRecentSnapshot {
                table,
                latest,
                today,
            });
        }

        let sql = format!(
            "DELETE FROM {} WHERE {SNAPSHOT_COLUMN} <> {}",
            table.name(),
            conn.dialect().placeholder(1)
        );
        conn.execute(&sql, &[SqlValue::Date(today)])
            .await
            .map_err(|source| StoreError::Operation {
                op: "rotate",
                table: Some(table),
                source,
            })
    }
}

fn rows_per_statement(batch_size: usize, dialect: Dialect, width: usize) -> usize {
    let bind_limit = dialect.max_bind_params() / width.max(1);
    batch_size.min(bind_limit).max(1)
}

fn insert_sql(dialect: Dialect, table: Table, columns: &[&str], rows: usize) -> String {
    let width = columns.len();
    let tuples: Vec<String> = (0..rows)
        .map(|r| {
            let slots: Vec<String> = (1..=width)
                .map(|c| dialect.placeholder(r * width + c))
                .collect();
            format!("({})", slots.join(", "))
        })
        .collect();
    format!(
        "INSERT INTO {} ({}) VALUES {}",
        table.name(),
        columns.join(", "),
        tuples.join(", ")
    )
}
