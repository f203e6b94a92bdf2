use serde::{Deserialize, Serialize};

/// Moving statistics for one (metric, rule) pair.
///
/// Owned by the caller: the cursor reads one and returns the next, and an
/// external store persists it between samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// Samples seen so far, saturating at the cursor's warm-up threshold.
    pub count: u32,
    /// Exponentially weighted mean.
    pub average: f64,
    /// Exponentially weighted standard deviation, never negative.
    pub std_dev: f64,
}

impl State {
    /// State after the very first observation of a pair.
    pub fn first(value: f64) -> Self {
        Self {
            count: 1,
            average: value,
            std_dev: 0.0,
        }
    }
}
