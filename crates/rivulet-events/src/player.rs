use serde::Serialize;

use crate::PlayerStatus;

/// How prominently the UI should render a notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Transient, user-visible message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub severity: Severity,
    pub message: String,
}

impl Notification {
    #[must_use]
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }
}

/// Playback-level events for the UI layer.
#[derive(Clone, Debug, Serialize)]
#[non_exhaustive]
pub enum PlayerEvent {
    /// Consolidated status changed.
    StatusChanged { status: PlayerStatus },
    /// Message to show as a toast.
    Notification(Notification),
    /// Media duration became known.
    DurationChanged { seconds: f64 },
    /// Playhead moved.
    TimeUpdate { position_secs: f64 },
    /// Share of the resource downloaded so far.
    LoadProgress { percent: f64 },
    /// Playback reached the end.
    Ended,
}

impl From<Notification> for PlayerEvent {
    fn from(n: Notification) -> Self {
        Self::Notification(n)
    }
}
