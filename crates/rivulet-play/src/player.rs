//! Async front for [`PlaybackSession`]: owns the input pump task.

use std::sync::Arc;

use parking_lot::Mutex;
use rivulet_abr::QualitySelection;
use rivulet_events::{Event, EventBus};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::trace;
use url::Url;
use web_time::Instant;

use crate::{
    config::SessionConfig,
    error::PlayResult,
    input::{InputReceiver, SessionEpoch},
    scheduler::TokioScheduler,
    session::PlaybackSession,
    snapshot::Snapshot,
    transport::TransportFactory,
};

/// Player bound to one media element.
///
/// Transport and element callbacks are queued and applied in order by a
/// background task; the methods here lock the session directly, so their
/// effects are visible as soon as they return.
pub struct Player<F: TransportFactory> {
    session: Arc<Mutex<PlaybackSession<F>>>,
    bus: EventBus,
    cancel: CancellationToken,
}

impl<F: TransportFactory> Player<F> {
    /// Create a player and spawn its input pump.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(cfg: SessionConfig, factory: F, media: F::Media) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = TokioScheduler::new(tx.clone());
        let session = PlaybackSession::new(cfg, factory, media, Box::new(scheduler), tx);
        let bus = session.bus().clone();
        let session = Arc::new(Mutex::new(session));
        let cancel = CancellationToken::new();

        tokio::spawn(pump(Arc::clone(&session), rx, cancel.clone()));

        Self {
            session,
            bus,
            cancel,
        }
    }

    /// Load `url`, replacing whatever was playing.
    ///
    /// # Errors
    ///
    /// See [`PlaybackSession::load`].
    pub fn load(&self, url: Url) -> PlayResult<SessionEpoch> {
        self.session.lock().load(url)
    }

    /// # Errors
    ///
    /// See [`PlaybackSession::select_quality`].
    pub fn select_quality(&self, selection: QualitySelection) -> PlayResult<()> {
        self.session
            .lock()
            .select_quality(selection, Instant::now())
    }

    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.session.lock().snapshot()
    }

    pub fn teardown(&self) {
        self.session.lock().teardown();
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }
}

impl<F: TransportFactory> Drop for Player<F> {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.session.lock().teardown();
    }
}

async fn pump<F: TransportFactory>(
    session: Arc<Mutex<PlaybackSession<F>>>,
    mut rx: InputReceiver,
    cancel: CancellationToken,
) {
    trace!("input pump started");
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            next = rx.recv() => {
                let Some(envelope) = next else { break };
                session.lock().dispatch(envelope, Instant::now());
            }
        }
    }
    trace!("input pump stopped");
}
