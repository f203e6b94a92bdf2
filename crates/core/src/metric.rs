use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction classification of a scored sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    /// Within `k` standard deviations of the baseline (or not scored at all).
    #[default]
    Normal,
    /// Anomalous, above the baseline.
    Up,
    /// Anomalous, below the baseline.
    Down,
}

impl Trend {
    /// Classify a signed score against the threshold `k`.
    ///
    /// `|score| >= k` is anomalous; the sign picks the direction.
    pub fn classify(score: f64, k: f64) -> Self {
        if score.abs() < k {
            Trend::Normal
        } else if score > 0.0 {
            Trend::Up
        } else if score < 0.0 {
            Trend::Down
        } else {
            // Only reachable with k <= 0, which the cursor rejects.
            Trend::Normal
        }
    }
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trend::Normal => write!(f, "normal"),
            Trend::Up => write!(f, "up"),
            Trend::Down => write!(f, "down"),
        }
    }
}

/// A single named observation.
///
/// The derived fields (`average`, `std_dev`, `score`, `trend`) are zero /
/// `Normal` until the sample has been passed through a cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    /// Dotted-segment name, e.g. `timer.mean_90.api.login`.
    pub name: String,
    pub stamp: DateTime<Utc>,
    pub value: f64,
    /// Baseline mean after this sample was folded in.
    #[serde(default)]
    pub average: f64,
    /// Baseline standard deviation after this sample was folded in.
    #[serde(default)]
    pub std_dev: f64,
    /// Signed deviation from the previous baseline, in standard deviations.
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub trend: Trend,
}

impl Metric {
    /// Create a sample stamped with the current time.
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self::at(name, Utc::now(), value)
    }

    /// Create a sample with an explicit stamp.
    pub fn at(name: impl Into<String>, stamp: DateTime<Utc>, value: f64) -> Self {
        Self {
            name: name.into(),
            stamp,
            value,
            average: 0.0,
            std_dev: 0.0,
            score: 0.0,
            trend: Trend::Normal,
        }
    }

    pub fn is_anomalous(&self) -> bool {
        self.trend != Trend::Normal
    }

    pub fn is_anomalous_trend_up(&self) -> bool {
        self.trend == Trend::Up
    }

    pub fn is_anomalous_trend_down(&self) -> bool {
        self.trend == Trend::Down
    }
}
