use rivulet_abr::{AbrReason, DegradedReason, LadderEntry, PlaybackMode, QualitySelection};
use serde::Serialize;

/// Events emitted by the ABR side of a playback session.
#[derive(Clone, Debug, Serialize)]
pub enum AbrEvent {
    /// Manifest parsed and the quality ladder built.
    LadderReady {
        entries: Vec<LadderEntry>,
        initial_level: Option<usize>,
    },
    /// Rendition in effect changed.
    QualitySwitched {
        from_level: Option<usize>,
        to_level: usize,
        reason: AbrReason,
    },
    /// User picked an entry from the quality menu.
    QualitySelected {
        selection: QualitySelection,
        mode: PlaybackMode,
    },
    /// New bandwidth estimate.
    Bandwidth { mbps: f64 },
    /// Buffer health recomputed.
    BufferHealth { percent: f64 },
    /// Degraded flag raised or cleared.
    NetworkStatusChanged {
        degraded: Option<DegradedReason>,
        bandwidth_mbps: f64,
    },
}
