// src/telemetry.rs
use metrics::{describe_counter, describe_gauge};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const DEFAULT_LOG_FILTER: &str = "market_data_ingest=info,warn";

/// Install the global subscriber. Safe to call more than once (warm serverless
/// containers reuse the process); later calls are no-ops.
///
/// `RUST_LOG` overrides the filter; `LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// One-time metric registration so series show up in whatever recorder the host installs.
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "ingest_source_errors_total",
            "Source fetches that failed or returned an unusable payload."
        );
        describe_counter!(
            "ingest_rows_loaded_total",
            "Rows inserted into a snapshot table."
        );
        describe_counter!(
            "ingest_rows_rotated_total",
            "Rows deleted from a snapshot table by rotation."
        );
        describe_counter!(
            "ingest_dataset_failures_total",
            "Dataset paths that ended in an error."
        );
        describe_counter!(
            "ingest_dataset_skipped_total",
            "Dataset paths skipped because today's snapshot was already present."
        );
        describe_gauge!("ingest_last_run_ts", "Unix ts when the ingest job last ran.");
    });
}
