//! Playback phase transitions and status resolution.

use rivulet_abr::DegradedReason;
use rivulet_events::{PlaybackFailure, PlayerStatus};

use crate::media::MediaEvent;

/// Media-driven part of the player state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlaybackPhase {
    #[default]
    Idle,
    Loading,
    Playing,
    Buffering,
    Ended,
}

impl PlaybackPhase {
    /// Transition table for media element events.
    #[must_use]
    pub fn on_media(self, event: MediaEvent) -> Self {
        use MediaEvent as E;
        use PlaybackPhase as P;

        match (self, event) {
            (_, E::LoadStart) => P::Loading,
            (P::Idle, E::Waiting) => P::Idle,
            (_, E::Waiting) => P::Buffering,
            (_, E::CanPlay | E::CanPlayThrough | E::Playing) => P::Playing,
            (_, E::Ended) => P::Ended,
            (phase, E::LoadedMetadata | E::TimeUpdate | E::Progress) => phase,
        }
    }
}

/// Fold phase, degraded flag and terminal failure into one status.
///
/// Failure dominates, then degradation, then the media phase.
#[must_use]
pub fn resolve(
    phase: PlaybackPhase,
    degraded: Option<DegradedReason>,
    failure: Option<&PlaybackFailure>,
) -> PlayerStatus {
    if let Some(failure) = failure {
        return PlayerStatus::Failed(failure.clone());
    }
    if let Some(reason) = degraded {
        return PlayerStatus::Degraded(reason);
    }
    match phase {
        PlaybackPhase::Idle => PlayerStatus::Idle,
        PlaybackPhase::Loading => PlayerStatus::Loading,
        PlaybackPhase::Playing => PlayerStatus::Playing,
        PlaybackPhase::Buffering => PlayerStatus::Buffering,
        PlaybackPhase::Ended => PlayerStatus::Ended,
    }
}
