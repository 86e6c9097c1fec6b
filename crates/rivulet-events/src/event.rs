#![forbid(unsafe_code)]

use serde::Serialize;

use crate::{AbrEvent, Notification, PlayerEvent};

/// Unified event for the player.
///
/// Hierarchical: each subsystem has its own variant with a sub-enum.
#[derive(Clone, Debug, Serialize)]
pub enum Event {
    /// Adaptive bitrate event.
    Abr(AbrEvent),
    /// Playback event.
    Player(PlayerEvent),
}

impl From<AbrEvent> for Event {
    fn from(e: AbrEvent) -> Self {
        Self::Abr(e)
    }
}

impl From<PlayerEvent> for Event {
    fn from(e: PlayerEvent) -> Self {
        Self::Player(e)
    }
}

impl From<Notification> for Event {
    fn from(n: Notification) -> Self {
        Self::Player(PlayerEvent::Notification(n))
    }
}
