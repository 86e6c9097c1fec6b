#![forbid(unsafe_code)]

use tokio::sync::broadcast;

use crate::Event;

/// Fan-out channel between a playback session and its observers.
///
/// The session publishes ABR and player events; every UI widget, logger or
/// test holds its own receiver. Publishing never blocks and never fails:
/// with nobody listening the event is discarded.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    /// `capacity` is how many events a receiver may fall behind before it
    /// starts losing the oldest ones. Clamped to at least one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Broadcast `event`, lifting sub-events such as `AbrEvent` or
    /// `PlayerEvent` into [`Event`].
    pub fn publish<E: Into<Event>>(&self, event: E) {
        // Err only means no receivers.
        let _ = self.tx.send(event.into());
    }

    /// Receiver for events published from now on.
    ///
    /// A receiver that falls more than `capacity` events behind gets
    /// `RecvError::Lagged` once and then continues from the oldest retained event.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}
