// src/ingest/types.rs
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::ingest::client::FetchError;

/// Outcome of a single source fetch. Collected per source, reduced after the join.
pub type FetchResult = Result<serde_json::Value, FetchError>;

/// One configured indicator endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndicatorSource {
    pub ticker: String, // e.g. "GDP", "CPIAUCSL"
    pub url: String,
}

/// One observation of an indicator, tagged with the snapshot it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndicatorRecord {
    pub ticker: String,
    pub observation_date: NaiveDate,
    pub value: Option<f64>,
    pub snapshot_date: NaiveDate,
}

/// One news article, tagged with the snapshot it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewsRecord {
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub source: Option<String>,
    pub image: Option<String>,
    pub category: Option<String>,
    pub language: Option<String>,
    pub country: Option<String>,
    pub snapshot_date: NaiveDate,
}

/// A dataset producer: fans out to its sources and returns the full batch for `today`.
#[async_trait]
pub trait Collector: Send + Sync {
    type Row: Send;

    async fn collect(&self, today: NaiveDate) -> Result<Vec<Self::Row>, CollectError>;
    fn name(&self) -> &'static str;
}

#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    /// At least one source failed; the whole batch is void.
    #[error("{failed} of {total} sources failed, discarding batch")]
    Connectivity { failed: usize, total: usize },

    #[error("malformed observation date {raw:?} for {ticker}")]
    MalformedDate {
        ticker: String,
        raw: String,
        #[source]
        source: chrono::ParseError,
    },
}
