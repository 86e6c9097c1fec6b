use web_time::Instant;

use crate::types::{BandwidthSample, EstimatorKind};

/// Trait for bandwidth estimation strategies.
///
/// Allows testing `AbrController` with mock estimators.
#[cfg_attr(test, unimock::unimock(api = EstimatorMock))]
pub trait Estimator {
    /// Current bandwidth estimate in megabits per second.
    fn estimate_mbps(&self) -> Option<f64>;

    /// Feed one fragment's telemetry. Returns `false` when the sample was rejected.
    fn push_sample(&mut self, sample: BandwidthSample) -> bool;

    /// When the estimate last changed.
    fn last_update(&self) -> Option<Instant>;

    /// Forget all samples (new resource).
    fn reset(&mut self);
}

/// The most recent fragment's throughput is the estimate.
#[derive(Clone, Debug, Default)]
pub struct LastSampleEstimator {
    mbps: Option<f64>,
    last_update: Option<Instant>,
}

impl LastSampleEstimator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Estimator for LastSampleEstimator {
    fn estimate_mbps(&self) -> Option<f64> {
        self.mbps
    }

    fn push_sample(&mut self, sample: BandwidthSample) -> bool {
        let Some(mbps) = sample.mbps() else {
            return false;
        };
        self.mbps = Some(mbps);
        self.last_update = Some(sample.at);
        true
    }

    fn last_update(&self) -> Option<Instant> {
        self.last_update
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Dual EWMA estimator: reports the lower of a fast and a slow average.
#[derive(Clone, Debug)]
pub struct EwmaEstimator {
    fast: DecayingAverage,
    slow: DecayingAverage,
    last_update: Option<Instant>,
}

impl EwmaEstimator {
    const FAST_HALF_LIFE_SECS: f64 = 2.0;
    const SLOW_HALF_LIFE_SECS: f64 = 10.0;

    #[must_use]
    pub fn new() -> Self {
        Self {
            fast: DecayingAverage::new(Self::FAST_HALF_LIFE_SECS),
            slow: DecayingAverage::new(Self::SLOW_HALF_LIFE_SECS),
            last_update: None,
        }
    }
}

impl Default for EwmaEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl Estimator for EwmaEstimator {
    fn estimate_mbps(&self) -> Option<f64> {
        let est = self.fast.value().min(self.slow.value());
        (est > 0.0).then_some(est)
    }

    fn push_sample(&mut self, sample: BandwidthSample) -> bool {
        let Some(mbps) = sample.mbps() else {
            return false;
        };
        let secs = sample.elapsed.as_secs_f64();
        self.fast.push(secs, mbps);
        self.slow.push(secs, mbps);
        self.last_update = Some(sample.at);
        true
    }

    fn last_update(&self) -> Option<Instant> {
        self.last_update
    }

    fn reset(&mut self) {
        *self = Self::new();
    }
}

/// Estimator picked at runtime from `AbrOptions::estimator`.
#[derive(Clone, Debug)]
pub enum AnyEstimator {
    LastSample(LastSampleEstimator),
    Ewma(EwmaEstimator),
}

impl AnyEstimator {
    #[must_use]
    pub fn new(kind: EstimatorKind) -> Self {
        match kind {
            EstimatorKind::LastSample => Self::LastSample(LastSampleEstimator::new()),
            EstimatorKind::Ewma => Self::Ewma(EwmaEstimator::new()),
        }
    }
}

impl Estimator for AnyEstimator {
    fn estimate_mbps(&self) -> Option<f64> {
        match self {
            Self::LastSample(e) => e.estimate_mbps(),
            Self::Ewma(e) => e.estimate_mbps(),
        }
    }

    fn push_sample(&mut self, sample: BandwidthSample) -> bool {
        match self {
            Self::LastSample(e) => e.push_sample(sample),
            Self::Ewma(e) => e.push_sample(sample),
        }
    }

    fn last_update(&self) -> Option<Instant> {
        match self {
            Self::LastSample(e) => e.last_update(),
            Self::Ewma(e) => e.last_update(),
        }
    }

    fn reset(&mut self) {
        match self {
            Self::LastSample(e) => e.reset(),
            Self::Ewma(e) => e.reset(),
        }
    }
}

/// Duration-weighted average whose memory halves every `half_life_secs`.
#[derive(Clone, Debug)]
struct DecayingAverage {
    half_life_secs: f64,
    biased: f64,
    seen_secs: f64,
}

impl DecayingAverage {
    fn new(half_life_secs: f64) -> Self {
        Self {
            half_life_secs: half_life_secs.max(0.001),
            biased: 0.0,
            seen_secs: 0.0,
        }
    }

    /// Share of the old value that survives `secs` of new data.
    fn retained(&self, secs: f64) -> f64 {
        (-std::f64::consts::LN_2 * secs / self.half_life_secs).exp()
    }

    fn push(&mut self, secs: f64, value: f64) {
        let secs = secs.max(0.0);
        let keep = self.retained(secs);
        self.biased = keep * self.biased + (1.0 - keep) * value;
        self.seen_secs += secs;
    }

    fn value(&self) -> f64 {
        if self.seen_secs <= 0.0 {
            return 0.0;
        }
        // Undo the pull towards the zero starting point.
        let filled = 1.0 - self.retained(self.seen_secs);
        self.biased / filled.max(1e-6)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rstest::rstest;

    use super::*;

    fn sample(bytes: u64, ms: u64) -> BandwidthSample {
        BandwidthSample::new(bytes, Duration::from_millis(ms), Instant::now())
    }

    #[test]
    fn no_estimate_without_samples() {
        let est = LastSampleEstimator::new();
        assert_eq!(est.estimate_mbps(), None);
        assert!(est.last_update().is_none());
    }

    #[test]
    fn last_sample_replaces_previous() {
        let mut est = LastSampleEstimator::new();
        assert!(est.push_sample(sample(1_000_000, 1000)));
        assert_eq!(est.estimate_mbps(), Some(8.0));

        assert!(est.push_sample(sample(250_000, 1000)));
        assert_eq!(est.estimate_mbps(), Some(2.0));
    }

    #[rstest]
    #[case(0, 5000, "zero bytes")]
    #[case(500_000, 0, "zero duration")]
    fn malformed_sample_keeps_previous_estimate(
        #[case] bytes: u64,
        #[case] ms: u64,
        #[case] _description: &str,
    ) {
        let mut est = LastSampleEstimator::new();
        est.push_sample(sample(250_000, 1000));
        let before = est.last_update();

        assert!(!est.push_sample(sample(bytes, ms)));
        assert_eq!(est.estimate_mbps(), Some(2.0));
        assert_eq!(est.last_update(), before);
    }

    #[test]
    fn reset_forgets_estimate() {
        let mut est = AnyEstimator::new(EstimatorKind::LastSample);
        est.push_sample(sample(250_000, 1000));
        est.reset();
        assert_eq!(est.estimate_mbps(), None);
    }

    #[rstest]
    #[case(1, 500_000, 4.0)]
    #[case(2, 500_000, 4.0)]
    #[case(3, 1_000_000, 8.0)]
    fn ewma_settles_on_steady_throughput(
        #[case] count: usize,
        #[case] bytes: u64,
        #[case] expected_mbps: f64,
    ) {
        let mut est = EwmaEstimator::new();
        for _ in 0..count {
            assert!(est.push_sample(sample(bytes, 1000)));
        }

        let estimate = est.estimate_mbps().unwrap();
        assert!(
            (estimate - expected_mbps).abs() < 1e-9,
            "steady {expected_mbps} Mbps read back as {estimate}"
        );
    }

    #[test]
    fn ewma_ignores_zero_duration() {
        let mut est = EwmaEstimator::new();
        assert!(!est.push_sample(sample(100_000, 0)));
        assert_eq!(est.estimate_mbps(), None);
    }

    #[test]
    fn ewma_lags_behind_sudden_drop() {
        let mut est = EwmaEstimator::new();
        for _ in 0..5 {
            est.push_sample(sample(1_000_000, 1000));
        }
        est.push_sample(sample(100_000, 1000));

        let estimate = est.estimate_mbps().unwrap();
        assert!(estimate < 8.0);
        assert!(estimate > 0.8);
    }
}
