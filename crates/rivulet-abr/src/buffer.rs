use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A contiguous buffered interval of media time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Duration,
    pub end: Duration,
}

impl TimeRange {
    #[must_use]
    pub fn new(start: Duration, end: Duration) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub fn from_secs(start: f64, end: f64) -> Self {
        Self {
            start: Duration::from_secs_f64(start.max(0.0)),
            end: Duration::from_secs_f64(end.max(0.0)),
        }
    }

    /// Inclusive on both ends: a playhead sitting exactly on `end` is still inside.
    #[must_use]
    pub fn contains(&self, time: Duration) -> bool {
        time >= self.start && time <= self.end
    }
}

/// Media element signals that drive the buffering flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferSignal {
    LoadStart,
    Waiting,
    CanPlay,
    CanPlayThrough,
    Playing,
}

/// Buffer health as a percentage of `target` look-ahead.
///
/// Only the range holding the playhead counts; 0 when none does.
#[must_use]
pub fn health_percent(ranges: &[TimeRange], playhead: Duration, target: Duration) -> f64 {
    let target_secs = target.as_secs_f64();
    if target_secs <= 0.0 {
        return 0.0;
    }
    ranges
        .iter()
        .find(|r| r.contains(playhead))
        .map_or(0.0, |r| {
            let ahead = r.end.saturating_sub(playhead).as_secs_f64();
            ((ahead / target_secs) * 100.0).min(100.0)
        })
}

/// Tracks buffer occupancy and the level-triggered buffering flag.
#[derive(Clone, Debug)]
pub struct BufferMonitor {
    target: Duration,
    health_percent: f64,
    buffering: bool,
    has_played: bool,
    stall_count: u32,
    load_progress_percent: f64,
}

impl BufferMonitor {
    #[must_use]
    pub fn new(target: Duration) -> Self {
        Self {
            target,
            health_percent: 0.0,
            buffering: false,
            has_played: false,
            stall_count: 0,
            load_progress_percent: 0.0,
        }
    }

    /// Recompute health from the element's buffered ranges. Returns the new value.
    pub fn sample(&mut self, ranges: &[TimeRange], playhead: Duration) -> f64 {
        self.health_percent = health_percent(ranges, playhead, self.target);
        self.health_percent
    }

    /// Apply a media signal. Returns `true` when the buffering flag flipped.
    pub fn on_signal(&mut self, signal: BufferSignal) -> bool {
        let was = self.buffering;
        self.buffering = match signal {
            BufferSignal::LoadStart | BufferSignal::Waiting => true,
            BufferSignal::CanPlay | BufferSignal::CanPlayThrough | BufferSignal::Playing => false,
        };
        if signal == BufferSignal::Playing {
            self.has_played = true;
        }
        if signal == BufferSignal::Waiting && !was && self.has_played {
            self.stall_count = self.stall_count.saturating_add(1);
        }
        was != self.buffering
    }

    /// Share of the whole resource downloaded so far, from the last buffered range.
    pub fn update_load_progress(
        &mut self,
        ranges: &[TimeRange],
        duration: Option<Duration>,
    ) -> Option<f64> {
        let total = duration?.as_secs_f64();
        let last = ranges.last()?;
        if total <= 0.0 {
            return None;
        }
        self.load_progress_percent = ((last.end.as_secs_f64() / total) * 100.0).min(100.0);
        Some(self.load_progress_percent)
    }

    #[must_use]
    pub fn health(&self) -> f64 {
        self.health_percent
    }

    #[must_use]
    pub fn is_buffering(&self) -> bool {
        self.buffering
    }

    /// Rebuffering events after playback first started.
    #[must_use]
    pub fn stall_count(&self) -> u32 {
        self.stall_count
    }

    #[must_use]
    pub fn load_progress(&self) -> f64 {
        self.load_progress_percent
    }
}
