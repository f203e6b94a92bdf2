//! Ingestion and output helpers for the `detector-worker` binary.

pub mod ingest;
pub mod output;

pub use ingest::{parse_line, IngestError};
pub use output::render_anomalies;
