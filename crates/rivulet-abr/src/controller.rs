use serde::Serialize;
use web_time::Instant;

use crate::{
    estimator::{AnyEstimator, Estimator},
    ladder::QualityLadder,
    types::{AbrOptions, BandwidthSample, DegradedReason, PlaybackMode, QualitySelection},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum AbrReason {
    Initial,
    ManualOverride,
    TransportAuthority,
    UpSwitch,
    DownSwitch,
    MinInterval,
    NoEstimate,
    NoCurrentRendition,
    NoCandidate,
    AlreadyOptimal,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AbrDecision {
    pub target_index: Option<usize>,
    pub reason: AbrReason,
    pub changed: bool,
}

impl AbrDecision {
    fn hold(current: Option<usize>, reason: AbrReason) -> Self {
        Self {
            target_index: current,
            reason,
            changed: false,
        }
    }

    fn switch(target: usize, reason: AbrReason) -> Self {
        Self {
            target_index: Some(target),
            reason,
            changed: true,
        }
    }
}

/// Degraded flag with its cause and, for network recovery, its expiry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Degraded {
    pub reason: DegradedReason,
    pub until: Option<Instant>,
}

#[expect(clippy::cast_precision_loss)] // bitrate precision loss is negligible for ABR
fn bps(value: u64) -> f64 {
    value as f64
}

/// The ABR decision engine.
///
/// Owns the estimator, the ladder of the live resource, the playback mode
/// and the degraded flag. `decide` is pure; `apply` commits a decision.
pub struct AbrController<E: Estimator> {
    cfg: AbrOptions,
    estimator: E,
    ladder: QualityLadder,
    mode: PlaybackMode,
    current: Option<usize>,
    degraded: Option<Degraded>,
    last_switch_at: Option<Instant>,
}

pub type DefaultAbrController = AbrController<AnyEstimator>;

impl<E: Estimator> AbrController<E> {
    pub fn with_estimator(cfg: AbrOptions, estimator: E) -> Self {
        Self {
            cfg,
            estimator,
            ladder: QualityLadder::default(),
            mode: PlaybackMode::Auto,
            current: None,
            degraded: None,
            last_switch_at: None,
        }
    }

    #[must_use]
    pub fn options(&self) -> &AbrOptions {
        &self.cfg
    }

    #[must_use]
    pub fn ladder(&self) -> &QualityLadder {
        &self.ladder
    }

    #[must_use]
    pub fn mode(&self) -> PlaybackMode {
        self.mode
    }

    /// Transport index of the rendition currently in effect.
    #[must_use]
    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    #[must_use]
    pub fn bandwidth_mbps(&self) -> Option<f64> {
        self.estimator.estimate_mbps()
    }

    #[must_use]
    pub fn last_bandwidth_check(&self) -> Option<Instant> {
        self.estimator.last_update()
    }

    #[must_use]
    pub fn last_switch_at(&self) -> Option<Instant> {
        self.last_switch_at
    }

    #[must_use]
    pub fn degraded(&self) -> Option<Degraded> {
        self.degraded
    }

    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }

    /// Install the ladder of a freshly parsed manifest and pick the start rung.
    ///
    /// Returns the starting transport index, if the ladder is non-empty.
    pub fn set_ladder(&mut self, ladder: QualityLadder) -> Option<usize> {
        self.ladder = ladder;
        self.current = self
            .cfg
            .initial_level
            .filter(|idx| self.ladder.contains(*idx))
            .or_else(|| self.ladder.lowest().map(|r| r.index));
        tracing::debug!(
            renditions = self.ladder.len(),
            start = ?self.current,
            "ABR ladder installed"
        );
        self.current
    }

    /// Record a level reported by the transport (native switch or confirmation).
    pub fn observe_level(&mut self, index: usize) -> bool {
        if !self.ladder.contains(index) || self.current == Some(index) {
            return false;
        }
        self.current = Some(index);
        true
    }

    /// Feed fragment telemetry. In Manual mode, flags a network too slow for
    /// the pinned rendition. Returns `false` for rejected samples.
    pub fn push_fragment(&mut self, sample: BandwidthSample) -> bool {
        if !self.estimator.push_sample(sample) {
            tracing::trace!(bytes = sample.bytes, "ABR: fragment telemetry ignored");
            return false;
        }
        if self.mode != PlaybackMode::Manual {
            return true;
        }
        let (Some(mbps), Some(selected_bw)) = (
            sample.mbps(),
            self.current.and_then(|idx| self.ladder.bitrate(idx)),
        ) else {
            return true;
        };
        let available = mbps * 1_000_000.0;
        if available < bps(selected_bw) * self.cfg.manual_degraded_ratio {
            tracing::debug!(available, selected_bw, "ABR: network too slow for pinned rendition");
            self.raise(DegradedReason::SlowNetwork, None);
        }
        true
    }

    pub fn on_buffer_stalled(&mut self) {
        if self.mode == PlaybackMode::Manual {
            self.raise(DegradedReason::BufferStall, None);
        }
    }

    pub fn on_buffer_flushed(&mut self) {
        self.degraded = None;
    }

    /// A fatal network error triggered a reload. Returns the cooldown expiry
    /// when the degraded flag was raised with one.
    ///
    /// A cooldown too long to represent as an `Instant` raises the flag
    /// without an expiry; it then clears only on flush or a new selection.
    pub fn on_network_error(&mut self, now: Instant) -> Option<Instant> {
        if self.mode != PlaybackMode::Manual {
            return None;
        }
        let until = now.checked_add(self.cfg.degraded_cooldown);
        if until.is_none() {
            tracing::warn!(
                cooldown = ?self.cfg.degraded_cooldown,
                "ABR: recovery cooldown out of range, flag has no expiry"
            );
        }
        self.raise(DegradedReason::NetworkRecovery, until);
        until
    }

    /// Clear a network-recovery flag whose cooldown has run out.
    pub fn on_cooldown_elapsed(&mut self, now: Instant) -> bool {
        match self.degraded {
            Some(Degraded {
                reason: DegradedReason::NetworkRecovery,
                until: Some(until),
            }) if now >= until => {
                self.degraded = None;
                true
            }
            _ => false,
        }
    }

    /// Explicit user choice. Returns `false` for a level not on the ladder.
    pub fn select(&mut self, selection: QualitySelection, now: Instant) -> bool {
        match selection {
            QualitySelection::Auto => {
                self.mode = PlaybackMode::Auto;
            }
            QualitySelection::Level(idx) => {
                if !self.ladder.contains(idx) {
                    return false;
                }
                self.mode = PlaybackMode::Manual;
                if self.current != Some(idx) {
                    self.last_switch_at = Some(now);
                }
                self.current = Some(idx);
            }
        }
        self.degraded = None;
        true
    }

    /// Evaluate the Auto-mode switching rules.
    pub fn decide(&self, now: Instant) -> AbrDecision {
        if self.mode == PlaybackMode::Manual {
            return AbrDecision::hold(self.current, AbrReason::ManualOverride);
        }
        if !self.cfg.engine_driven() {
            return AbrDecision::hold(self.current, AbrReason::TransportAuthority);
        }
        let Some(current) = self.current else {
            return AbrDecision::hold(None, AbrReason::NoCurrentRendition);
        };
        let Some(current_bw) = self.ladder.bitrate(current) else {
            return AbrDecision::hold(Some(current), AbrReason::NoCurrentRendition);
        };
        if !self.can_switch_now(now) {
            tracing::debug!(current, "ABR decide: MinInterval not elapsed");
            return AbrDecision::hold(Some(current), AbrReason::MinInterval);
        }
        let Some(mbps) = self.estimator.estimate_mbps() else {
            tracing::debug!(current, "ABR decide: NoEstimate");
            return AbrDecision::hold(Some(current), AbrReason::NoEstimate);
        };

        let available = mbps * 1_000_000.0;
        let current_bw = bps(current_bw);

        tracing::debug!(
            current,
            current_bw,
            available,
            down_trigger = self.cfg.down_trigger_ratio,
            up_trigger = self.cfg.up_trigger_ratio,
            "ABR decide: evaluating"
        );

        // Down-switch path: safest qualifying rung, scanning from the bottom.
        if available < current_bw * self.cfg.down_trigger_ratio {
            let budget = available * self.cfg.down_target_ratio;
            let candidate = self
                .ladder
                .renditions()
                .iter()
                .rev()
                .find(|r| r.index != current && bps(r.bitrate_bps) <= budget);
            return match candidate {
                Some(r) => AbrDecision::switch(r.index, AbrReason::DownSwitch),
                None => AbrDecision::hold(Some(current), AbrReason::NoCandidate),
            };
        }

        // Up-switch path: best strictly-higher rung that fits, scanning from the top.
        if available > current_bw * self.cfg.up_trigger_ratio {
            let budget = available * self.cfg.up_target_ratio;
            let current_pos = self.ladder.position(current).unwrap_or(usize::MAX);
            let candidate = self
                .ladder
                .renditions()
                .iter()
                .take(current_pos)
                .find(|r| bps(r.bitrate_bps) <= budget);
            return match candidate {
                Some(r) => AbrDecision::switch(r.index, AbrReason::UpSwitch),
                None => AbrDecision::hold(Some(current), AbrReason::NoCandidate),
            };
        }

        AbrDecision::hold(Some(current), AbrReason::AlreadyOptimal)
    }

    pub fn apply(&mut self, decision: &AbrDecision, now: Instant) {
        let Some(target) = decision.target_index else {
            return;
        };
        if self.current == Some(target) {
            return;
        }
        self.current = Some(target);
        self.last_switch_at = Some(now);
        if self.mode == PlaybackMode::Auto {
            self.degraded = None;
        }
    }

    fn raise(&mut self, reason: DegradedReason, until: Option<Instant>) {
        self.degraded = Some(Degraded { reason, until });
    }

    fn can_switch_now(&self, now: Instant) -> bool {
        self.last_switch_at
            .is_none_or(|t| now.saturating_duration_since(t) >= self.cfg.min_switch_interval)
    }
}

impl AbrController<AnyEstimator> {
    #[must_use]
    pub fn new(cfg: AbrOptions) -> Self {
        let estimator = AnyEstimator::new(cfg.estimator);
        Self::with_estimator(cfg, estimator)
    }
}
