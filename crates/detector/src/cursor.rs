//! [`Cursor`]: one step of the moving baseline for a (metric, rule) pair.

use vigil_core::config::DetectorConfig;
use vigil_core::{Metric, State, Trend, VigilError};

/// Default anomaly threshold and clipping bound, in standard deviations.
pub const DEFAULT_SIGMA: f64 = 3.0;

/// Exponentially weighted mean/deviation scorer.
///
/// Holds only configuration; every call to [`next`](Cursor::next) is a pure
/// function of the previous [`State`] and the sample, so one cursor can be
/// shared by any number of threads. Calls for the *same* pair must still be
/// serialized by the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cursor {
    weight_factor: f64,
    least_count: u32,
    sigma: f64,
}

impl Cursor {
    /// Create a cursor with the default three-sigma threshold.
    ///
    /// `weight_factor` must lie in (0, 1] and `least_count` must be at least 1.
    pub fn new(weight_factor: f64, least_count: u32) -> Result<Self, VigilError> {
        if !(weight_factor > 0.0 && weight_factor <= 1.0) {
            return Err(VigilError::InvalidConfig(format!(
                "weight factor must be in (0, 1], got {}",
                weight_factor
            )));
        }
        if least_count < 1 {
            return Err(VigilError::InvalidConfig(
                "least count must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            weight_factor,
            least_count,
            sigma: DEFAULT_SIGMA,
        })
    }

    /// Override the threshold/clipping bound. Must be finite and positive.
    pub fn with_sigma(mut self, sigma: f64) -> Result<Self, VigilError> {
        if !(sigma.is_finite() && sigma > 0.0) {
            return Err(VigilError::InvalidConfig(format!(
                "sigma must be a positive number, got {}",
                sigma
            )));
        }
        self.sigma = sigma;
        Ok(self)
    }

    pub fn from_config(config: &DetectorConfig) -> Result<Self, VigilError> {
        Self::new(config.weight_factor, config.least_count)?.with_sigma(config.sigma)
    }

    pub fn weight_factor(&self) -> f64 {
        self.weight_factor
    }

    pub fn least_count(&self) -> u32 {
        self.least_count
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Fold `metric` into `state`, annotate `metric`, and return the new state.
    ///
    /// - No prior state: the sample becomes the baseline, nothing is scored.
    /// - Warming up (`count < least_count`): not scored; the raw deviation
    ///   updates the baseline.
    /// - Warmed up: scored against the previous baseline; the deviation used
    ///   for the update is clipped to `±sigma·std_dev` so a single spike
    ///   cannot blow the baseline open.
    /// - Warmed up with no spread (`std_dev` of zero): not scored, and the
    ///   raw deviation updates the baseline, as in warm-up.
    ///
    /// `metric.value` is expected to be finite.
    pub fn next(&self, state: Option<&State>, metric: &mut Metric) -> State {
        let Some(prev) = state else {
            let first = State::first(metric.value);
            annotate(metric, &first, 0.0, Trend::Normal);
            return first;
        };

        let deviation = metric.value - prev.average;

        let (score, step, count) = if prev.count < self.least_count {
            (0.0, deviation, prev.count.saturating_add(1).min(self.least_count))
        } else if prev.std_dev <= f64::EPSILON {
            // A zero clip bound would pin the baseline for good.
            (0.0, deviation, prev.count)
        } else {
            let bound = self.sigma * prev.std_dev;
            let clipped = deviation.max(-bound).min(bound);
            (deviation / prev.std_dev, clipped, prev.count)
        };

        let w = self.weight_factor;
        let average = prev.average + w * step;
        let variance = (1.0 - w) * prev.std_dev * prev.std_dev + w * step * step;
        let next = State {
            count,
            average,
            std_dev: variance.max(0.0).sqrt(),
        };

        annotate(metric, &next, score, Trend::classify(score, self.sigma));
        next
    }
}

fn annotate(metric: &mut Metric, state: &State, score: f64, trend: Trend) {
    metric.average = state.average;
    metric.std_dev = state.std_dev;
    metric.score = score;
    metric.trend = trend;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor() -> Cursor {
        Cursor::new(0.05, 18).unwrap()
    }

    #[test]
    fn first_observation_bootstraps_state() {
        let mut m = Metric::new("a.b", 1.32);
        let s = cursor().next(None, &mut m);

        assert_eq!(m.average, m.value);
        assert_eq!(m.score, 0.0);
        assert!(!m.is_anomalous());
        assert_eq!(s.count, 1);
        assert_eq!(s.std_dev, 0.0);
        assert_eq!(s.average, 1.32);
    }

    #[test]
    fn warm_up_is_never_scored() {
        let c = cursor();
        let s = State { count: 17, average: 0.1, std_dev: 0.1 };
        let mut m = Metric::new("a", 1000.0);

        let n = c.next(Some(&s), &mut m);
        assert_eq!(m.score, 0.0);
        assert!(!m.is_anomalous());
        assert_eq!(n.count, 18);
    }

    #[test]
    fn warm_up_uses_unclipped_deviation() {
        let c = cursor();
        let s = State { count: 5, average: 10.0, std_dev: 1.0 };
        let mut m = Metric::new("a", 110.0);

        let n = c.next(Some(&s), &mut m);
        // mean += 0.05 * 100
        assert!((n.average - 15.0).abs() < 1e-12);
        // var = 0.95 * 1 + 0.05 * 100^2
        assert!((n.std_dev - (0.95f64 + 500.0).sqrt()).abs() < 1e-12);
        assert_eq!(n.count, 6);
    }

    #[test]
    fn count_saturates_at_least_count() {
        let c = cursor();
        let mut s = State { count: 18, average: 5.0, std_dev: 1.0 };
        for _ in 0..10 {
            let mut m = Metric::new("a", 5.5);
            s = c.next(Some(&s), &mut m);
            assert_eq!(s.count, 18);
        }
    }

    #[test]
    fn warmed_up_update_is_clipped() {
        let c = cursor();
        let s = State { count: 18, average: 100.0, std_dev: 2.0 };
        let mut m = Metric::new("a", 1100.0);

        let n = c.next(Some(&s), &mut m);
        // Score uses the raw deviation against the previous baseline.
        assert!((m.score - 500.0).abs() < 1e-9);
        assert!(m.is_anomalous_trend_up());
        // Update uses deviation clipped to 3 * 2 = 6.
        assert!((n.average - 100.3).abs() < 1e-12);
        let expected_var = 0.95 * 4.0 + 0.05 * 36.0;
        assert!((n.std_dev - f64::sqrt(expected_var)).abs() < 1e-12);
        assert_eq!(m.average, n.average);
        assert_eq!(m.std_dev, n.std_dev);
    }

    #[test]
    fn score_is_inclusive_at_threshold() {
        let c = cursor();
        let s = State { count: 18, average: 0.0, std_dev: 1.0 };

        let mut m = Metric::new("a", -3.0);
        c.next(Some(&s), &mut m);
        assert!(m.is_anomalous_trend_down());

        let mut m = Metric::new("a", 2.5);
        c.next(Some(&s), &mut m);
        assert!(!m.is_anomalous());
        assert!((m.score - 2.5).abs() < 1e-12);
    }

    #[test]
    fn zero_spread_scores_zero_and_moves_unclipped() {
        let c = cursor();
        let s = State { count: 18, average: 7.0, std_dev: 0.0 };
        let mut m = Metric::new("a", 107.0);

        let n = c.next(Some(&s), &mut m);
        assert_eq!(m.score, 0.0);
        assert!(!m.is_anomalous());
        // mean += 0.05 * 100, var = 0.05 * 100^2
        assert!((n.average - 12.0).abs() < 1e-12);
        assert!((n.std_dev - 500f64.sqrt()).abs() < 1e-12);
        assert_eq!(n.count, 18);
    }

    #[test]
    fn least_count_of_one_scores_from_the_third_sample() {
        let c = Cursor::new(0.5, 1).unwrap();
        let mut m = Metric::new("a", 10.0);
        let s = c.next(None, &mut m);

        // Zero spread after one sample: unscored, but the baseline opens up.
        let mut m = Metric::new("a", 20.0);
        let s = c.next(Some(&s), &mut m);
        assert_eq!(m.score, 0.0);
        assert_eq!(s.count, 1);
        assert!((s.average - 15.0).abs() < 1e-12);
        assert!((s.std_dev - 50f64.sqrt()).abs() < 1e-12);

        let mut m = Metric::new("a", 14.0);
        c.next(Some(&s), &mut m);
        assert!((m.score - (-1.0 / 50f64.sqrt())).abs() < 1e-12);

        let mut m = Metric::new("a", 1000.0);
        c.next(Some(&s), &mut m);
        assert!(m.is_anomalous_trend_up());
    }

    #[test]
    fn rejects_out_of_range_parameters() {
        assert!(Cursor::new(0.0, 18).is_err());
        assert!(Cursor::new(-0.1, 18).is_err());
        assert!(Cursor::new(1.01, 18).is_err());
        assert!(Cursor::new(f64::NAN, 18).is_err());
        assert!(Cursor::new(0.05, 0).is_err());
        assert!(Cursor::new(1.0, 1).is_ok());

        assert!(cursor().with_sigma(0.0).is_err());
        assert!(cursor().with_sigma(f64::INFINITY).is_err());
        assert_eq!(cursor().with_sigma(2.5).unwrap().sigma(), 2.5);
    }

    #[test]
    fn from_config_applies_all_fields() {
        let config = DetectorConfig { weight_factor: 0.1, least_count: 5, sigma: 4.0 };
        let c = Cursor::from_config(&config).unwrap();
        assert_eq!(c.weight_factor(), 0.1);
        assert_eq!(c.least_count(), 5);
        assert_eq!(c.sigma(), 4.0);

        let bad = DetectorConfig { weight_factor: 2.0, ..config };
        assert!(matches!(Cursor::from_config(&bad), Err(VigilError::InvalidConfig(_))));
    }
}
