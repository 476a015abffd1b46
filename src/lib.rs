// src/lib.rs
// Public library surface for the binary, serverless hosts and integration tests.

pub mod config;
pub mod events;
pub mod ingest;
pub mod orchestrator;
pub mod store;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::config::Config;
pub use crate::events::{EventSink, RecordingSink, RunEvent, TracingSink};
pub use crate::orchestrator::{Dataset, DatasetError, DatasetOutcome, Orchestrator, RunReport};

use tracing::info;

/// Run one ingestion pass with configuration from the environment.
///
/// Per-dataset failures are logged and reported in the returned [`RunReport`]; only a
/// configuration problem or a failed database connection is an `Err`.
pub async fn run() -> anyhow::Result<RunReport> {
    let config = Config::from_env()?;
    info!(
        indicators = config.indicators.len(),
        categories = config.news.categories.len(),
        "ingest configuration loaded"
    );
    let orchestrator = Orchestrator::from_config(config)?;
    let today = chrono::Local::now().date_naive();
    Ok(orchestrator.run(today).await?)
}

/// Serverless entry shape. The event and context are accepted and ignored; behaviour is
/// identical to [`run`].
pub async fn handler(
    _event: serde_json::Value,
    _context: serde_json::Value,
) -> anyhow::Result<RunReport> {
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();
    run().await
}
