// src/config.rs
//! Run configuration, read once from the environment (and `.env` via `dotenvy` in the
//! binary) and handed to the orchestrator explicitly.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::ingest::client::DEFAULT_HTTP_TIMEOUT;
use crate::ingest::config::load_indicators_default;
use crate::ingest::news::NewsQuery;
use crate::ingest::types::IndicatorSource;
use crate::store::{ConnectTarget, DEFAULT_BATCH_SIZE};

#[derive(Debug, Clone)]
pub struct Config {
    pub database: ConnectTarget,
    pub news: NewsQuery,
    pub indicators: Vec<IndicatorSource>,
    pub http_timeout: Duration,
    pub insert_batch_size: usize,
}

impl Config {
    /// Environment + indicator list file (see [`load_indicators_default`]).
    pub fn from_env() -> Result<Self> {
        let indicators = load_indicators_default()?;
        Self::from_env_with_indicators(indicators)
    }

    pub fn from_env_with_indicators(indicators: Vec<IndicatorSource>) -> Result<Self> {
        let database = database_from_env()?;

        let mut news = NewsQuery::new(required("API_KEY")?);
        if let Some(base) = optional("NEWS_BASE_URL") {
            news.base_url = base;
        }
        if let Some(raw) = optional("NEWS_CATEGORIES") {
            let categories: Vec<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect();
            if categories.is_empty() {
                return Err(anyhow!("NEWS_CATEGORIES is set but lists no category"));
            }
            news.categories = categories;
        }
        if let Some(limit) = parsed::<u32>("NEWS_LIMIT")? {
            news.limit = limit;
        }
        if let Some(sort) = optional("NEWS_SORT") {
            news.sort = sort;
        }

        let http_timeout = parsed::<u64>("HTTP_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_HTTP_TIMEOUT);
        let insert_batch_size = parsed::<usize>("INSERT_BATCH_SIZE")?.unwrap_or(DEFAULT_BATCH_SIZE);
        if insert_batch_size == 0 {
            return Err(anyhow!("INSERT_BATCH_SIZE must be positive"));
        }

        Ok(Self {
            database,
            news,
            indicators,
            http_timeout,
            insert_batch_size,
        })
    }
}

/// `DATABASE_URL` wins; otherwise the discrete `DB_*` variables describe a Postgres server.
fn database_from_env() -> Result<ConnectTarget> {
    if let Some(url) = optional("DATABASE_URL") {
        return Ok(ConnectTarget::Url(url));
    }
    Ok(ConnectTarget::Postgres {
        host: required("DB_HOST")?,
        port: parsed::<u16>("DB_PORT")?.unwrap_or(5432),
        database: required("DB_NAME")?,
        user: required("DB_USER")?,
        password: required("DB_PASSWORD")?,
    })
}

fn optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(key: &str) -> Result<String> {
    optional(key).ok_or_else(|| anyhow!("Missing {key} env var"))
}

fn parsed<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    optional(key)
        .map(|v| v.parse::<T>().with_context(|| format!("invalid {key}={v:?}")))
        .transpose()
}
