// src/ingest/indicators.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::ingest::client::SourceClient;
use crate::ingest::types::{CollectError, Collector, IndicatorRecord, IndicatorSource};
use crate::ingest::{fetch_all, reduce_batch};

/// Observation dates are plain calendar days.
pub const OBSERVATION_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Deserialize)]
struct IndicatorPayload {
    ticker: String,
    data: Series,
}

#[derive(Debug, Deserialize)]
struct Series {
    dates: Vec<String>,
    values: Vec<Option<f64>>,
}

/// Collects every configured indicator series into one snapshot batch.
pub struct IndicatorCollector<C: ?Sized> {
    client: Arc<C>,
    sources: Vec<IndicatorSource>,
}

impl<C: SourceClient + ?Sized> IndicatorCollector<C> {
    pub fn new(client: Arc<C>, sources: Vec<IndicatorSource>) -> Self {
        Self { client, sources }
    }
}

#[async_trait]
impl<C: SourceClient + ?Sized> Collector for IndicatorCollector<C> {
    type Row = IndicatorRecord;

    async fn collect(&self, today: NaiveDate) -> Result<Vec<IndicatorRecord>, CollectError> {
        let urls: Vec<String> = self.sources.iter().map(|s| s.url.clone()).collect();
        let results = fetch_all(self.client.as_ref(), &urls).await;

        let rows = reduce_batch(self.name(), results, |payload| {
            normalize_payload(payload, today)
        })?;
        tracing::info!(
            dataset = self.name(),
            sources = self.sources.len(),
            rows = rows.len(),
            "indicator batch collected"
        );
        Ok(rows)
    }

    fn name(&self) -> &'static str {
        "economy_data"
    }
}

/// Turn one `{ticker, data: {dates, values}}` payload into rows.
///
/// Returns `Ok(None)` when the payload does not have that shape.
pub fn normalize_payload(
    payload: serde_json::Value,
    today: NaiveDate,
) -> Result<Option<Vec<IndicatorRecord>>, CollectError> {
    let parsed: IndicatorPayload = match serde_json::from_value(payload) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(error = %e, "unexpected indicator payload shape");
            return Ok(None);
        }
    };

    let IndicatorPayload { ticker, data } = parsed;
    if data.dates.len() != data.values.len() {
        tracing::warn!(
            ticker = %ticker,
            dates = data.dates.len(),
            values = data.values.len(),
            "date/value length mismatch, extra tail ignored"
        );
    }

    let mut rows = Vec::with_capacity(data.dates.len().min(data.values.len()));
    for (raw, value) in data.dates.into_iter().zip(data.values) {
        let observation_date = NaiveDate::parse_from_str(&raw, OBSERVATION_DATE_FORMAT)
            .map_err(|source| CollectError::MalformedDate {
                ticker: ticker.clone(),
                raw: raw.clone(),
                source,
            })?;
        rows.push(IndicatorRecord {
            ticker: ticker.clone(),
            observation_date,
            value,
            snapshot_date: today,
        });
    }
    Ok(Some(rows))
}
