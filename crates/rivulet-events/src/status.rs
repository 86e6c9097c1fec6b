use rivulet_abr::DegradedReason;
use serde::Serialize;

/// Terminal playback failure shown to the user with a retry affordance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlaybackFailure {
    /// Plain-language message for the user.
    pub message: String,
    /// Diagnostic detail from the transport, if any.
    pub details: Option<String>,
}

impl PlaybackFailure {
    #[must_use]
    pub fn new(message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            message: message.into(),
            details,
        }
    }
}

/// Consolidated player state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail")]
pub enum PlayerStatus {
    /// No resource loaded.
    #[default]
    Idle,
    /// Resource requested, nothing playable yet.
    Loading,
    /// Media is flowing (or ready to flow).
    Playing,
    /// Playhead starved, waiting for data.
    Buffering,
    /// Pinned rendition cannot be sustained by the network.
    Degraded(DegradedReason),
    /// Playback reached the end of the resource.
    Ended,
    /// Unrecoverable error; a new load is required.
    Failed(PlaybackFailure),
}

impl PlayerStatus {
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}
