// src/store/connection.rs
//! The relational engine contract and its two `sqlx` backends.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection};

/// A bound statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(Option<String>),
    Float(Option<f64>),
    Date(NaiveDate),
}

/// SQL flavour differences the store has to care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl Dialect {
    /// Positional placeholder, 1-based.
    pub fn placeholder(self, n: usize) -> String {
        match self {
            Dialect::Postgres => format!("${n}"),
            Dialect::Sqlite => format!("?{n}"),
        }
    }

    /// Column definition for an auto-incrementing surrogate key named `id`.
    pub fn surrogate_key(self) -> &'static str {
        match self {
            Dialect::Postgres => "id SERIAL PRIMARY KEY",
            Dialect::Sqlite => "id INTEGER PRIMARY KEY AUTOINCREMENT",
        }
    }

    /// Most bound parameters one statement may carry.
    pub fn max_bind_params(self) -> usize {
        match self {
            Dialect::Postgres => 65_535,
            Dialect::Sqlite => 32_766,
        }
    }
}

/// One open connection, used strictly sequentially.
#[async_trait]
pub trait SqlConnection: Send {
    fn dialect(&self) -> Dialect;

    /// Run one statement, returning the number of affected rows.
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, sqlx::Error>;

    /// Run a single-column, single-row query yielding a nullable date (e.g. `MAX(..)`).
    async fn fetch_max_date(&mut self, sql: &str) -> Result<Option<NaiveDate>, sqlx::Error>;

    async fn close(self) -> Result<(), sqlx::Error>
    where
        Self: Sized;
}

// `bind` is generic over the database, so each backend spells the loop out.
macro_rules! bind_all {
    ($query:expr, $params:expr) => {{
        let mut q = $query;
        for p in $params {
            q = match p {
                SqlValue::Text(v) => q.bind(v.clone()),
                SqlValue::Float(v) => q.bind(*v),
                SqlValue::Date(v) => q.bind(*v),
            };
        }
        q
    }};
}

#[async_trait]
impl SqlConnection for PgConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, sqlx::Error> {
        if params.is_empty() {
            // Simple-query protocol: DDL and transaction control cannot always be prepared.
            let res = sqlx::Executor::execute(&mut *self, sqlx::raw_sql(sql)).await?;
            return Ok(res.rows_affected());
        }
        let q = bind_all!(sqlx::query(sql), params);
        Ok(q.execute(&mut *self).await?.rows_affected())
    }

    async fn fetch_max_date(&mut self, sql: &str) -> Result<Option<NaiveDate>, sqlx::Error> {
        sqlx::query_scalar::<_, Option<NaiveDate>>(sql)
            .fetch_one(&mut *self)
            .await
    }

    async fn close(self) -> Result<(), sqlx::Error> {
        Connection::close(self).await
    }
}

#[async_trait]
impl SqlConnection for SqliteConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, sqlx::Error> {
        if params.is_empty() {
            let res = sqlx::Executor::execute(&mut *self, sqlx::raw_sql(sql)).await?;
            return Ok(res.rows_affected());
        }
        let q = bind_all!(sqlx::query(sql), params);
        Ok(q.execute(&mut *self).await?.rows_affected())
    }

    async fn fetch_max_date(&mut self, sql: &str) -> Result<Option<NaiveDate>, sqlx::Error> {
        // SQLite keeps dates as ISO-8601 text, and MAX() loses the declared column type.
        let raw = sqlx::query_scalar::<_, Option<String>>(sql)
            .fetch_one(&mut *self)
            .await?;
        raw.map(|s| {
            NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                .map_err(|e| sqlx::Error::Decode(Box::new(e)))
        })
        .transpose()
    }

    async fn close(self) -> Result<(), sqlx::Error> {
        Connection::close(self).await
    }
}

/// Where to connect. Built from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectTarget {
    /// A full `postgres://` or `sqlite:` url.
    Url(String),
    Postgres {
        host: String,
        port: u16,
        database: String,
        user: String,
        password: String,
    },
}

/// The connection a production run holds: whichever engine the target names.
pub enum Backend {
    Postgres(PgConnection),
    Sqlite(SqliteConnection),
}

impl Backend {
    pub async fn connect(target: &ConnectTarget) -> Result<Self, sqlx::Error> {
        match target {
            ConnectTarget::Url(url) if url.starts_with("sqlite:") => {
                let opts = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
                Ok(Backend::Sqlite(opts.connect().await?))
            }
            ConnectTarget::Url(url) => {
                let opts = PgConnectOptions::from_str(url)?;
                Ok(Backend::Postgres(opts.connect().await?))
            }
            ConnectTarget::Postgres {
                host,
                port,
                database,
                user,
                password,
            } => {
                let opts = PgConnectOptions::new()
                    .host(host)
                    .port(*port)
                    .database(database)
                    .username(user)
                    .password(password);
                Ok(Backend::Postgres(opts.connect().await?))
            }
        }
    }
}

#[async_trait]
impl SqlConnection for Backend {
    fn dialect(&self) -> Dialect {
        match self {
            Backend::Postgres(c) => c.dialect(),
            Backend::Sqlite(c) => c.dialect(),
        }
    }

    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, sqlx::Error> {
        match self {
            Backend::Postgres(c) => SqlConnection::execute(c, sql, params).await,
            Backend::Sqlite(c) => SqlConnection::execute(c, sql, params).await,
        }
    }

    async fn fetch_max_date(&mut self, sql: &str) -> Result<Option<NaiveDate>, sqlx::Error> {
        match self {
            Backend::Postgres(c) => c.fetch_max_date(sql).await,
            Backend::Sqlite(c) => c.fetch_max_date(sql).await,
        }
    }

    async fn close(self) -> Result<(), sqlx::Error> {
        match self {
            Backend::Postgres(c) => SqlConnection::close(c).await,
            Backend::Sqlite(c) => SqlConnection::close(c).await,
        }
    }
}
