use std::time::Duration;

use serde::{Deserialize, Serialize};
use web_time::Instant;

/// Quality requested by the user or commanded to the transport.
///
/// `Auto` is the synthetic ladder entry; `Level` carries a transport level index.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QualitySelection {
    #[default]
    Auto,
    Level(usize),
}

impl QualitySelection {
    #[must_use]
    pub fn level(self) -> Option<usize> {
        match self {
            Self::Auto => None,
            Self::Level(idx) => Some(idx),
        }
    }
}

/// ABR mode selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaybackMode {
    /// Automatic rendition switching.
    #[default]
    Auto,
    /// Rendition pinned by the user.
    Manual,
}

/// Which side adapts the rendition while in Auto mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AutoAuthority {
    /// The decision engine issues explicit level commands; transport-native
    /// auto-level is never enabled.
    #[default]
    Engine,
    /// The transport's own auto-level logic adapts; the engine only observes.
    Transport,
}

/// Bandwidth estimation strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EstimatorKind {
    /// Latest fragment throughput replaces the previous estimate.
    #[default]
    LastSample,
    /// Dual fast/slow EWMA; the lower of the two is reported.
    Ewma,
}

/// Why playback is flagged as network-degraded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DegradedReason {
    /// Measured throughput is below what the pinned rendition needs.
    SlowNetwork,
    /// The transport reported a buffer stall.
    BufferStall,
    /// A fatal network error forced a reload; cleared after a cooldown.
    NetworkRecovery,
}

/// One level as advertised by the parsed manifest, in transport order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestLevel {
    pub width: u32,
    pub height: u32,
    /// Advertised bitrate in bits per second.
    pub bitrate_bps: u64,
}

impl ManifestLevel {
    #[must_use]
    pub fn new(width: u32, height: u32, bitrate_bps: u64) -> Self {
        Self {
            width,
            height,
            bitrate_bps,
        }
    }
}

/// Raw fetch telemetry for one completed fragment.
#[derive(Clone, Copy, Debug)]
pub struct BandwidthSample {
    pub bytes: u64,
    pub elapsed: Duration,
    pub at: Instant,
}

impl BandwidthSample {
    #[must_use]
    pub fn new(bytes: u64, elapsed: Duration, at: Instant) -> Self {
        Self { bytes, elapsed, at }
    }

    /// Instantaneous throughput in megabits per second.
    ///
    /// `None` for zero-length or zero-duration fragments (cache hits, broken timers).
    #[must_use]
    #[expect(clippy::cast_precision_loss)] // byte counts far below 2^52
    pub fn mbps(&self) -> Option<f64> {
        let secs = self.elapsed.as_secs_f64();
        if self.bytes == 0 || secs <= 0.0 {
            return None;
        }
        Some((self.bytes as f64 * 8.0) / secs / 1_000_000.0)
    }
}

/// ABR (Adaptive Bitrate) configuration.
///
/// The thresholds are policy knobs, not protocol values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbrOptions {
    /// Who adapts the rendition in Auto mode.
    pub authority: AutoAuthority,
    /// Look-ahead that counts as a 100% healthy buffer.
    pub buffer_target: Duration,
    /// How long the degraded flag survives a network-error reload.
    pub degraded_cooldown: Duration,
    /// Down-switch candidates must fit in `available * down_target_ratio`.
    pub down_target_ratio: f64,
    /// Down-switch considered when `available < current * down_trigger_ratio`.
    pub down_trigger_ratio: f64,
    /// Bandwidth estimation strategy.
    pub estimator: EstimatorKind,
    /// Period of the Auto-mode evaluation tick.
    pub eval_interval: Duration,
    /// Transport level to start on; defaults to the lowest rung.
    pub initial_level: Option<usize>,
    /// Manual mode flags slow network below `selected * manual_degraded_ratio`.
    pub manual_degraded_ratio: f64,
    /// Minimum interval between automatic switches.
    pub min_switch_interval: Duration,
    /// Up-switch candidates must fit in `available * up_target_ratio`.
    pub up_target_ratio: f64,
    /// Up-switch considered when `available > current * up_trigger_ratio`.
    pub up_trigger_ratio: f64,
}

impl Default for AbrOptions {
    fn default() -> Self {
        Self {
            authority: AutoAuthority::default(),
            buffer_target: Duration::from_secs(10),
            degraded_cooldown: Duration::from_secs(3),
            down_target_ratio: 0.7,
            down_trigger_ratio: 1.5,
            estimator: EstimatorKind::default(),
            eval_interval: Duration::from_secs(8),
            initial_level: None,
            manual_degraded_ratio: 0.8,
            min_switch_interval: Duration::ZERO,
            up_target_ratio: 0.6,
            up_trigger_ratio: 2.5,
        }
    }
}

impl AbrOptions {
    /// Set the Auto-mode authority.
    #[must_use]
    pub fn with_authority(mut self, authority: AutoAuthority) -> Self {
        self.authority = authority;
        self
    }

    /// Set the bandwidth estimation strategy.
    #[must_use]
    pub fn with_estimator(mut self, estimator: EstimatorKind) -> Self {
        self.estimator = estimator;
        self
    }

    /// Set the evaluation tick period.
    #[must_use]
    pub fn with_eval_interval(mut self, interval: Duration) -> Self {
        self.eval_interval = interval;
        self
    }

    /// Set the level to start on.
    #[must_use]
    pub fn with_initial_level(mut self, level: usize) -> Self {
        self.initial_level = Some(level);
        self
    }

    /// Set the degraded cooldown after a network-error reload.
    #[must_use]
    pub fn with_degraded_cooldown(mut self, cooldown: Duration) -> Self {
        self.degraded_cooldown = cooldown;
        self
    }

    /// Check if the engine drives switches in Auto mode.
    #[must_use]
    pub fn engine_driven(&self) -> bool {
        matches!(self.authority, AutoAuthority::Engine)
    }
}
