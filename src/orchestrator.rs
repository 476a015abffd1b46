// src/orchestrator.rs
//! One ingestion run: check → fetch (concurrently) → load → rotate, per dataset.
//!
//! The two datasets share one connection and one transaction. Each dataset's database
//! work sits inside its own savepoint, so a failure in one is rolled back without
//! poisoning the other, and the session is released exactly once at the end.

use std::sync::Arc;

use chrono::NaiveDate;
use metrics::{counter, gauge};

use crate::config::Config;
use crate::events::{EventSink, RunEvent, TracingSink};
use crate::ingest::client::{HttpSourceClient, SourceClient};
use crate::ingest::indicators::IndicatorCollector;
use crate::ingest::news::NewsCollector;
use crate::ingest::types::{CollectError, Collector};
use crate::store::connection::SqlConnection;
use crate::store::{Backend, Session, SnapshotRow, SnapshotStore, StoreError, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dataset {
    Indicators,
    News,
}

impl Dataset {
    pub const ALL: [Dataset; 2] = [Dataset::Indicators, Dataset::News];

    pub fn table(self) -> Table {
        match self {
            Dataset::Indicators => Table::EconomyData,
            Dataset::News => Table::MarketNews,
        }
    }

    fn savepoint(self) -> &'static str {
        match self {
            Dataset::Indicators => "ingest_indicators",
            Dataset::News => "ingest_news",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Dataset::Indicators => "indicators",
            Dataset::News => "news",
        }
    }
}

impl std::fmt::Display for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error(transparent)]
    Collect(#[from] CollectError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("schema unavailable")]
    SchemaUnavailable,
}

#[derive(Debug)]
pub enum DatasetOutcome {
    /// Today's snapshot was already stored; nothing fetched, nothing written.
    AlreadyCurrent { latest: NaiveDate },
    Loaded { inserted: u64, rotated: u64 },
    Failed(DatasetError),
}

impl DatasetOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, DatasetOutcome::Failed(_))
    }
}

#[derive(Debug)]
pub struct RunReport {
    pub today: NaiveDate,
    pub indicators: DatasetOutcome,
    pub news: DatasetOutcome,
    pub schema_error: Option<StoreError>,
    /// Whether the final commit went through.
    pub committed: bool,
}

impl RunReport {
    pub fn outcome(&self, dataset: Dataset) -> &DatasetOutcome {
        match dataset {
            Dataset::Indicators => &self.indicators,
            Dataset::News => &self.news,
        }
    }
}

/// Result of the pre-fetch latest-snapshot check.
enum Freshness {
    Current(NaiveDate),
    Stale,
}

pub struct Orchestrator<C: SourceClient + ?Sized> {
    config: Config,
    indicators: IndicatorCollector<C>,
    news: NewsCollector<C>,
    store: SnapshotStore,
    sink: Arc<dyn EventSink>,
}

impl Orchestrator<HttpSourceClient> {
    /// Production wiring: one shared `reqwest` client for every source.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let client = Arc::new(HttpSourceClient::new().with_timeout(config.http_timeout));
        Self::new(config, client)
    }
}

impl<C: SourceClient + ?Sized> Orchestrator<C> {
    pub fn new(config: Config, client: Arc<C>) -> anyhow::Result<Self> {
        let indicators = IndicatorCollector::new(client.clone(), config.indicators.clone());
        let news = NewsCollector::new(client, &config.news)?;
        let store = SnapshotStore::new(config.insert_batch_size);
        Ok(Self {
            config,
            indicators,
            news,
            store,
            sink: Arc::new(TracingSink),
        })
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Connect to the configured database and run. Only a connection failure is an `Err`.
    pub async fn run(&self, today: NaiveDate) -> Result<RunReport, StoreError> {
        let conn = Backend::connect(&self.config.database)
            .await
            .map_err(StoreError::Connection)?;
        self.run_with(conn, today).await
    }

    /// Run on an already established connection, which is consumed and always released.
    pub async fn run_with<S: SqlConnection>(
        &self,
        conn: S,
        today: NaiveDate,
    ) -> Result<RunReport, StoreError> {
        crate::telemetry::ensure_metrics_described();

        let mut session = Session::begin(conn).await?;
        self.sink.emit(RunEvent::SessionOpened);

        let mut report = self.run_datasets(&mut session, today).await;

        let (released, res) = session.release().await;
        if let Err(e) = res {
            tracing::error!(error = %e, "releasing database session failed");
        }
        report.committed = released.committed;
        self.sink.emit(RunEvent::SessionReleased {
            committed: released.committed,
        });
        gauge!("ingest_last_run_ts").set(chrono::Utc::now().timestamp() as f64);
        Ok(report)
    }

    async fn run_datasets<S: SqlConnection>(
        &self,
        session: &mut Session<S>,
        today: NaiveDate,
    ) -> RunReport {
        if let Err(e) = self.store.ensure_schema(session.conn()).await {
            self.sink.emit(RunEvent::SchemaFailed {
                error: e.to_string(),
            });
            for ds in Dataset::ALL {
                counter!("ingest_dataset_failures_total", "dataset" => ds.label()).increment(1);
            }
            return RunReport {
                today,
                indicators: DatasetOutcome::Failed(DatasetError::SchemaUnavailable),
                news: DatasetOutcome::Failed(DatasetError::SchemaUnavailable),
                schema_error: Some(e),
                committed: false,
            };
        }
        self.sink.emit(RunEvent::SchemaReady);

        // Checks are hoisted before the network so a current dataset costs no requests.
        let ind_fresh = self.check(session, Dataset::Indicators, today).await;
        let news_fresh = self.check(session, Dataset::News, today).await;

        let (ind_rows, news_rows) = tokio::join!(
            collect_if(&self.indicators, matches!(ind_fresh, Ok(Freshness::Stale)), today),
            collect_if(&self.news, matches!(news_fresh, Ok(Freshness::Stale)), today),
        );

        let indicators = self
            .finish(session, Dataset::Indicators, ind_fresh, ind_rows, today)
            .await;
        let news = self
            .finish(session, Dataset::News, news_fresh, news_rows, today)
            .await;

        RunReport {
            today,
            indicators,
            news,
            schema_error: None,
            committed: false,
        }
    }

    async fn check<S: SqlConnection>(
        &self,
        session: &mut Session<S>,
        ds: Dataset,
        today: NaiveDate,
    ) -> Result<Freshness, StoreError> {
        session.savepoint(ds.savepoint()).await?;
        let res = self
            .store
            .latest_snapshot_date(session.conn(), ds.table())
            .await;
        match settle(session, ds, res).await? {
            Some(latest) if latest == today => Ok(Freshness::Current(latest)),
            _ => Ok(Freshness::Stale),
        }
    }

    async fn finish<S, R>(
        &self,
        session: &mut Session<S>,
        ds: Dataset,
        fresh: Result<Freshness, StoreError>,
        rows: Option<Result<Vec<R>, CollectError>>,
        today: NaiveDate,
    ) -> DatasetOutcome
    where
        S: SqlConnection,
        R: SnapshotRow + Sync,
    {
        let outcome = match (fresh, rows) {
            (Err(e), _) => DatasetOutcome::Failed(e.into()),
            (Ok(Freshness::Current(latest)), _) => {
                self.sink.emit(RunEvent::AlreadyCurrent {
                    dataset: ds,
                    latest,
                });
                counter!("ingest_dataset_skipped_total", "dataset" => ds.label()).increment(1);
                return DatasetOutcome::AlreadyCurrent { latest };
            }
            (Ok(Freshness::Stale), Some(Err(e))) => DatasetOutcome::Failed(e.into()),
            (Ok(Freshness::Stale), Some(Ok(rows))) => {
                self.sink.emit(RunEvent::Collected {
                    dataset: ds,
                    rows: rows.len(),
                });
                match self.load(session, ds, &rows, today).await {
                    Ok((inserted, rotated)) => DatasetOutcome::Loaded { inserted, rotated },
                    Err(e) => DatasetOutcome::Failed(e.into()),
                }
            }
            // collect_if always runs for a stale dataset
            (Ok(Freshness::Stale), None) => unreachable!("stale dataset was not collected"),
        };

        if let DatasetOutcome::Failed(e) = &outcome {
            self.sink.emit(RunEvent::DatasetFailed {
                dataset: ds,
                error: e.to_string(),
            });
            counter!("ingest_dataset_failures_total", "dataset" => ds.label()).increment(1);
        }
        outcome
    }

    /// Insert today's rows, then rotate older snapshots out, inside the dataset savepoint.
    async fn load<S, R>(
        &self,
        session: &mut Session<S>,
        ds: Dataset,
        rows: &[R],
        today: NaiveDate,
    ) -> Result<(u64, u64), StoreError>
    where
        S: SqlConnection,
        R: SnapshotRow + Sync,
    {
        session.savepoint(ds.savepoint()).await?;
        let res: Result<(u64, u64), StoreError> = async {
            let inserted = self.store.bulk_insert(session.conn(), rows).await?;
            self.sink.emit(RunEvent::Loaded {
                dataset: ds,
                rows: inserted,
            });
            let rotated = self.store.rotate(session.conn(), ds.table(), today).await?;
            self.sink.emit(RunEvent::Rotated {
                dataset: ds,
                deleted: rotated,
            });
            Ok((inserted, rotated))
        }
        .await;

        let (inserted, rotated) = settle(session, ds, res).await?;
        counter!("ingest_rows_loaded_total", "dataset" => ds.label()).increment(inserted);
        counter!("ingest_rows_rotated_total", "dataset" => ds.label()).increment(rotated);
        Ok((inserted, rotated))
    }
}

async fn collect_if<K: Collector>(
    collector: &K,
    needed: bool,
    today: NaiveDate,
) -> Option<Result<Vec<K::Row>, CollectError>> {
    if needed {
        Some(collector.collect(today).await)
    } else {
        None
    }
}

/// Close the dataset savepoint: keep its work on success, undo it on failure.
async fn settle<S: SqlConnection, T>(
    session: &mut Session<S>,
    ds: Dataset,
    res: Result<T, StoreError>,
) -> Result<T, StoreError> {
    match res {
        Ok(v) => {
            session.release_savepoint(ds.savepoint()).await?;
            Ok(v)
        }
        Err(e) => {
            let undo = match session.rollback_to(ds.savepoint()).await {
                Ok(()) => session.release_savepoint(ds.savepoint()).await,
                Err(rb) => Err(rb),
            };
            if let Err(rb) = undo {
                tracing::warn!(dataset = %ds, error = %rb, "savepoint rollback failed");
            }
            Err(e)
        }
    }
}
