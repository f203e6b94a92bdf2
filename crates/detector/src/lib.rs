//! Streaming anomaly scoring.
//!
//! - [`Cursor`]: pure EWMA mean/deviation transition with outlier clipping
//! - [`StateStore`]: persistence boundary for per-(metric, rule) state
//! - [`Pipeline`]: filter → load state → cursor → save state, per sample

pub mod cursor;
pub mod pipeline;
pub mod stats;
pub mod store;

pub use cursor::{Cursor, DEFAULT_SIGMA};
pub use pipeline::{Detection, Pipeline};
pub use stats::{PipelineStats, StatsSnapshot};
pub use store::{MemoryStateStore, StateKey, StateStore, StoreError};
