// src/events.rs
use std::sync::Mutex;

use chrono::NaiveDate;

use crate::orchestrator::Dataset;

/// Progress of a run, emitted in order to an injected [`EventSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    SessionOpened,
    SchemaReady,
    SchemaFailed { error: String },
    AlreadyCurrent { dataset: Dataset, latest: NaiveDate },
    Collected { dataset: Dataset, rows: usize },
    Loaded { dataset: Dataset, rows: u64 },
    Rotated { dataset: Dataset, deleted: u64 },
    DatasetFailed { dataset: Dataset, error: String },
    SessionReleased { committed: bool },
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: RunEvent);
}

/// Default sink: structured `tracing` output.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: RunEvent) {
        match event {
            RunEvent::SessionOpened => tracing::info!("database session opened"),
            RunEvent::SchemaReady => tracing::debug!("schema ready"),
            RunEvent::SchemaFailed { error } => {
                tracing::error!(%error, "schema setup failed, skipping all datasets")
            }
            RunEvent::AlreadyCurrent { dataset, latest } => {
                tracing::warn!(%dataset, %latest, "latest snapshot already exists")
            }
            RunEvent::Collected { dataset, rows } => {
                tracing::info!(%dataset, rows, "collected new snapshot")
            }
            RunEvent::Loaded { dataset, rows } => {
                tracing::info!(%dataset, rows, "inserted new snapshot")
            }
            RunEvent::Rotated { dataset, deleted } => {
                tracing::info!(%dataset, deleted, "deleted previous snapshots")
            }
            RunEvent::DatasetFailed { dataset, error } => {
                tracing::error!(%dataset, %error, "dataset failed")
            }
            RunEvent::SessionReleased { committed } => {
                tracing::info!(committed, "database session released")
            }
        }
    }
}

/// Keeps every event in memory. Handy for embedding hosts and tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<RunEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RunEvent> {
        self.events.lock().expect("event sink mutex poisoned").clone()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: RunEvent) {
        self.events
            .lock()
            .expect("event sink mutex poisoned")
            .push(event);
    }
}
