// src/ingest/mod.rs
pub mod client;
pub mod config;
pub mod indicators;
pub mod news;
pub mod types;

use futures::future::join_all;
use metrics::counter;

use crate::ingest::client::SourceClient;
use crate::ingest::types::{CollectError, FetchResult};

/// Fetch every url concurrently. The output is in submission order regardless of
/// completion order, and no failure escapes the join.
pub async fn fetch_all<C>(client: &C, urls: &[String]) -> Vec<FetchResult>
where
    C: SourceClient + ?Sized,
{
    join_all(urls.iter().map(|url| client.fetch(url))).await
}

/// Reduce per-source outcomes into one batch.
///
/// `normalize` runs for every successful payload, in order. Any failed source voids the
/// whole batch (rows from successful siblings are dropped), but a normalization error is
/// reported first because it is a data problem rather than a connectivity one.
pub fn reduce_batch<T, F>(
    dataset: &'static str,
    results: Vec<FetchResult>,
    mut normalize: F,
) -> Result<Vec<T>, CollectError>
where
    F: FnMut(serde_json::Value) -> Result<Option<Vec<T>>, CollectError>,
{
    let total = results.len();
    let mut failed = 0usize;
    let mut rows = Vec::new();

    for res in results {
        match res {
            Ok(payload) => match normalize(payload)? {
                Some(mut batch) => rows.append(&mut batch),
                None => {
                    tracing::warn!(dataset, "source returned an unusable payload");
                    counter!("ingest_source_errors_total", "dataset" => dataset).increment(1);
                    failed += 1;
                }
            },
            Err(e) => {
                tracing::warn!(dataset, url = e.url(), error = %e, "source fetch failed");
                counter!("ingest_source_errors_total", "dataset" => dataset).increment(1);
                failed += 1;
            }
        }
    }

    if failed != 0 {
        tracing::warn!(
            dataset,
            failed,
            total,
            discarded = rows.len(),
            "batch voided by failed sources"
        );
        return Err(CollectError::Connectivity { failed, total });
    }
    Ok(rows)
}
