use rivulet_abr::{LadderEntry, PlaybackMode, Rendition};
use rivulet_events::PlayerStatus;
use serde::Serialize;
use web_time::Instant;

/// Network indicator shown next to the quality menu.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct NetworkStatus {
    pub degraded: bool,
    /// Latest estimate; 0 before the first fragment.
    pub bandwidth_mbps: f64,
}

/// Read-only view of a playback session for the UI layer.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Snapshot {
    pub epoch: u64,
    pub status: PlayerStatus,
    pub mode: PlaybackMode,
    /// Quality menu, Auto entry first.
    pub ladder: Vec<LadderEntry>,
    /// `"Auto"` in Auto mode, otherwise the pinned rendition's label.
    pub current_quality_label: String,
    pub current_rendition: Option<Rendition>,
    pub network: NetworkStatus,
    pub buffer_health_percent: f64,
    pub is_buffering: bool,
    pub stall_count: u32,
    pub load_progress_percent: f64,
    pub position_secs: f64,
    pub duration_secs: Option<f64>,
    /// When the rendition last changed by engine decision or user choice.
    #[serde(skip)]
    pub last_switch_at: Option<Instant>,
    /// When the bandwidth estimate last took a sample.
    #[serde(skip)]
    pub last_bandwidth_check: Option<Instant>,
}
