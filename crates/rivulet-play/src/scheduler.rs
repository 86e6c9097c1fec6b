//! Timers feeding `Tick` and `CooldownElapsed` inputs into the session queue.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::input::{Envelope, InputSender};

/// Source of delayed and periodic session inputs.
///
/// Every timer is cancelled through the returned token; a cancelled timer
/// never delivers another envelope.
pub trait Scheduler: Send + 'static {
    /// Deliver `envelope` every `period`, first after one full period.
    fn every(&self, period: Duration, envelope: Envelope) -> CancellationToken;

    /// Deliver `envelope` once after `delay`.
    fn after(&self, delay: Duration, envelope: Envelope) -> CancellationToken;
}

/// Scheduler backed by tokio timers on the current runtime.
#[derive(Clone, Debug)]
pub struct TokioScheduler {
    tx: InputSender,
}

impl TokioScheduler {
    #[must_use]
    pub fn new(tx: InputSender) -> Self {
        Self { tx }
    }
}

impl Scheduler for TokioScheduler {
    fn every(&self, period: Duration, envelope: Envelope) -> CancellationToken {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let tx = self.tx.clone();
        let period = period.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    _ = interval.tick() => {
                        if tx.send(envelope.clone()).is_err() {
                            break;
                        }
                    }
                }
            }
            trace!(epoch = envelope.epoch.value(), "periodic timer stopped");
        });
        cancel
    }

    fn after(&self, delay: Duration, envelope: Envelope) -> CancellationToken {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = token.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    let _ = tx.send(envelope);
                }
            }
        });
        cancel
    }
}
