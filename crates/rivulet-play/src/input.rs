//! Inputs flowing into a playback session, tagged with the session epoch.

use tokio::sync::mpsc;

use crate::{media::MediaEvent, transport::TransportEvent};

/// Generation of a playback session.
///
/// Bumped on every load and teardown; inputs carrying an older epoch are
/// discarded so callbacks that outlive their session cannot touch a newer one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionEpoch(u64);

impl SessionEpoch {
    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }

    pub(crate) fn advance(&mut self) -> Self {
        self.0 = self.0.wrapping_add(1);
        *self
    }
}

#[derive(Clone, Debug)]
pub enum SessionInput {
    Transport(TransportEvent),
    Media(MediaEvent),
    /// Auto-mode evaluation tick.
    Tick,
    /// Degraded cooldown after a network-error reload ran out.
    CooldownElapsed,
}

#[derive(Clone, Debug)]
pub struct Envelope {
    pub epoch: SessionEpoch,
    pub input: SessionInput,
}

pub type InputSender = mpsc::UnboundedSender<Envelope>;
pub type InputReceiver = mpsc::UnboundedReceiver<Envelope>;

/// Handle given to the transport client and the media element for reporting events.
#[derive(Clone, Debug)]
pub struct InputSink {
    epoch: SessionEpoch,
    tx: InputSender,
}

impl InputSink {
    pub(crate) fn new(epoch: SessionEpoch, tx: InputSender) -> Self {
        Self { epoch, tx }
    }

    #[must_use]
    pub fn epoch(&self) -> SessionEpoch {
        self.epoch
    }

    /// Report a transport event. Returns `false` once the player is gone.
    pub fn transport(&self, event: TransportEvent) -> bool {
        self.send(SessionInput::Transport(event))
    }

    /// Report a media element event. Returns `false` once the player is gone.
    pub fn media(&self, event: MediaEvent) -> bool {
        self.send(SessionInput::Media(event))
    }

    pub(crate) fn send(&self, input: SessionInput) -> bool {
        self.tx
            .send(Envelope {
                epoch: self.epoch,
                input,
            })
            .is_ok()
    }
}
