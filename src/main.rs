//! Daily market data ingest: binary entrypoint.
//! Loads `.env`, initialises tracing and performs a single run.

use std::process::ExitCode;

use market_data_ingest::{telemetry, DatasetOutcome};

// One logical worker: fetches interleave, nothing runs in parallel.
#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when the platform injects variables.
    let _ = dotenvy::dotenv();

    telemetry::init_tracing();

    match market_data_ingest::run().await {
        Ok(report) => {
            for (name, outcome) in [("indicators", &report.indicators), ("news", &report.news)] {
                match outcome {
                    DatasetOutcome::AlreadyCurrent { latest } => {
                        tracing::info!(dataset = name, %latest, "already current")
                    }
                    DatasetOutcome::Loaded { inserted, rotated } => {
                        tracing::info!(dataset = name, inserted, rotated, "loaded")
                    }
                    DatasetOutcome::Failed(error) => {
                        tracing::warn!(dataset = name, %error, "not loaded this run")
                    }
                }
            }
            // Dataset failures are retried by the next scheduled invocation.
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = ?e, "ingest run aborted");
            ExitCode::FAILURE
        }
    }
}
