// tests/common/mod.rs
// Shared test doubles: a scripted source client and a connection wrapper that can fail
// chosen statements and counts what it sees.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use market_data_ingest::ingest::client::{FetchError, SourceClient};
use market_data_ingest::ingest::news::NewsQuery;
use market_data_ingest::ingest::types::IndicatorSource;
use market_data_ingest::store::connection::{Dialect, SqlConnection, SqlValue};
use market_data_ingest::store::ConnectTarget;
use market_data_ingest::Config;
use serde_json::{json, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::ConnectOptions;

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// ---------------------------------------------------------------------------
// Source client
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum Scripted {
    Body(Value),
    Status(u16),
}

/// Serves canned responses per url after an optional delay.
#[derive(Default)]
pub struct FakeClient {
    routes: HashMap<String, (Duration, Scripted)>,
    pub requested: Mutex<Vec<String>>,
    pub completed: Mutex<Vec<String>>,
}

impl FakeClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ok(mut self, url: &str, delay_ms: u64, body: Value) -> Self {
        self.routes.insert(
            url.to_string(),
            (Duration::from_millis(delay_ms), Scripted::Body(body)),
        );
        self
    }

    pub fn status(mut self, url: &str, delay_ms: u64, status: u16) -> Self {
        self.routes.insert(
            url.to_string(),
            (Duration::from_millis(delay_ms), Scripted::Status(status)),
        );
        self
    }

    pub fn request_count(&self) -> usize {
        self.requested.lock().unwrap().len()
    }
}

#[async_trait]
impl SourceClient for FakeClient {
    async fn fetch(&self, url: &str) -> Result<Value, FetchError> {
        self.requested.lock().unwrap().push(url.to_string());
        let (delay, scripted) = self
            .routes
            .get(url)
            .cloned()
            .unwrap_or((Duration::ZERO, Scripted::Status(404)));
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.completed.lock().unwrap().push(url.to_string());
        match scripted {
            Scripted::Body(v) => Ok(v),
            Scripted::Status(status) => Err(FetchError::Status {
                url: url.to_string(),
                status,
            }),
        }
    }
}

pub fn indicator_body(ticker: &str, dates: &[&str], values: &[f64]) -> Value {
    json!({ "ticker": ticker, "data": { "dates": dates, "values": values } })
}

pub fn news_body(category: &str, titles: &[&str]) -> Value {
    let data: Vec<Value> = titles
        .iter()
        .map(|t| {
            json!({
                "author": null,
                "title": t,
                "description": format!("{t} description"),
                "url": format!("https://news.test/{}", t.replace(' ', "-")),
                "source": "Wire",
                "image": null,
                "category": category,
                "language": "en",
                "country": "us"
            })
        })
        .collect();
    json!({ "pagination": { "count": data.len() }, "data": data })
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

pub const NEWS_BASE: &str = "http://news.test/v1/news";

pub fn news_query(categories: &[&str]) -> NewsQuery {
    let mut q = NewsQuery::new("test-key");
    q.base_url = NEWS_BASE.to_string();
    q.categories = categories.iter().map(|c| c.to_string()).collect();
    q
}

pub fn indicator(ticker: &str) -> IndicatorSource {
    IndicatorSource {
        ticker: ticker.to_string(),
        url: format!("http://indicators.test/{ticker}"),
    }
}

pub fn test_config(db: &Path, indicators: Vec<IndicatorSource>, news: NewsQuery) -> Config {
    Config {
        database: ConnectTarget::Url(format!("sqlite://{}", db.display())),
        news,
        indicators,
        http_timeout: Duration::from_secs(5),
        insert_batch_size: 1000,
    }
}

/// A client answering every configured source of `config` successfully.
pub fn healthy_client(config: &Config) -> FakeClient {
    let mut client = FakeClient::new();
    for ind in &config.indicators {
        client = client.ok(
            &ind.url,
            0,
            indicator_body(&ind.ticker, &["2024-01-01", "2024-02-01"], &[1.0, 2.0]),
        );
    }
    let urls = config.news.urls().unwrap();
    for (url, category) in urls.iter().zip(&config.news.categories) {
        client = client.ok(url, 0, news_body(category, &["first", "second"]));
    }
    client
}

// ---------------------------------------------------------------------------
// Database
// ---------------------------------------------------------------------------

pub async fn sqlite_file(path: &Path) -> SqliteConnection {
    SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .connect()
        .await
        .unwrap()
}

pub async fn count(conn: &mut SqliteConnection, sql: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(sql)
        .fetch_one(&mut *conn)
        .await
        .unwrap()
}

/// Wraps a real connection; fails any statement containing `fail_on` and counts calls.
pub struct ScriptedConnection<C> {
    inner: C,
    fail_on: Option<String>,
    abort_on_error: bool,
    aborted: bool,
    pub rejected: Arc<AtomicUsize>,
    pub executed: Arc<Mutex<Vec<String>>>,
    pub closes: Arc<AtomicUsize>,
}

impl<C> ScriptedConnection<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            fail_on: None,
            abort_on_error: false,
            aborted: false,
            rejected: Arc::new(AtomicUsize::new(0)),
            executed: Arc::new(Mutex::new(Vec::new())),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing_on(mut self, needle: &str) -> Self {
        self.fail_on = Some(needle.to_string());
        self
    }

    /// Behave like PostgreSQL: after a failed statement, reject everything until
    /// `ROLLBACK TO SAVEPOINT` (or a full `ROLLBACK`).
    pub fn aborting_transaction(mut self) -> Self {
        self.abort_on_error = true;
        self
    }

    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C> ScriptedConnection<C> {
    fn reject(&self) -> sqlx::Error {
        self.rejected.fetch_add(1, Ordering::SeqCst);
        sqlx::Error::Protocol(
            "current transaction is aborted, commands ignored until end of transaction block"
                .into(),
        )
    }
}

#[async_trait]
impl<C: SqlConnection> SqlConnection for ScriptedConnection<C> {
    fn dialect(&self) -> Dialect {
        self.inner.dialect()
    }

    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, sqlx::Error> {
        self.executed.lock().unwrap().push(sql.to_string());
        if self.aborted {
            if sql.starts_with("ROLLBACK") {
                self.aborted = false;
            } else {
                return Err(self.reject());
            }
        }
        if let Some(needle) = &self.fail_on {
            if sql.contains(needle.as_str()) {
                let err = sqlx::Error::Protocol(format!("injected failure: {needle}"));
                self.aborted = self.abort_on_error;
                return Err(err);
            }
        }
        let res = self.inner.execute(sql, params).await;
        if res.is_err() && self.abort_on_error {
            self.aborted = true;
        }
        res
    }

    async fn fetch_max_date(&mut self, sql: &str) -> Result<Option<NaiveDate>, sqlx::Error> {
        self.executed.lock().unwrap().push(sql.to_string());
        if self.aborted {
            return Err(self.reject());
        }
        self.inner.fetch_max_date(sql).await
    }

    async fn close(self) -> Result<(), sqlx::Error> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.inner.close().await
    }
}
