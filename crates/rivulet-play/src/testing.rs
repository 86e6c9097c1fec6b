//! Recording fakes for the transport client, the media element and timers.
//!
//! All fakes share one [`Journal`], so tests can assert on the relative
//! order of commands issued to different collaborators.

use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use rivulet_abr::{QualitySelection, TimeRange};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;
use web_time::Instant;

use crate::{
    config::{SessionConfig, TransportConfig},
    error::{PlayError, PlayResult},
    input::{Envelope, InputReceiver, InputSink, SessionInput},
    media::{MediaElement, MediaEvent},
    scheduler::Scheduler,
    session::PlaybackSession,
    transport::{Transport, TransportEvent, TransportFactory},
};

/// Side effect observed by a fake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    /// Command sent to the transport created `transport`-th.
    Transport {
        transport: usize,
        command: TransportCommand,
    },
    AddListeners,
    /// Listeners removed while `live_timers` timers were still armed.
    RemoveListeners { live_timers: usize },
    Play,
    SetSource(Url),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportCommand {
    LoadSource(Url),
    AttachMedia,
    SetCurrentLevel(QualitySelection),
    StartLoad,
    RecoverMediaError,
    Destroy,
}

/// Timer registered with [`ManualScheduler`].
#[derive(Clone, Debug)]
pub struct ScheduledTimer {
    pub envelope: Envelope,
    /// `Some` for periodic timers.
    pub period: Option<Duration>,
    pub delay: Duration,
    pub token: CancellationToken,
}

#[derive(Debug, Default)]
struct JournalState {
    calls: Vec<Call>,
    timers: Vec<ScheduledTimer>,
}

/// Shared, ordered log of everything the fakes were asked to do.
#[derive(Clone, Debug, Default)]
pub struct Journal(Arc<Mutex<JournalState>>);

impl Journal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, call: Call) {
        self.0.lock().calls.push(call);
    }

    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().calls.clone()
    }

    pub fn clear(&self) {
        self.0.lock().calls.clear();
    }

    /// Commands received by transports, in order, with their transport id.
    #[must_use]
    pub fn transport_commands(&self) -> Vec<(usize, TransportCommand)> {
        self.0
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Transport { transport, command } => Some((*transport, command.clone())),
                _ => None,
            })
            .collect()
    }

    /// Level commands only.
    #[must_use]
    pub fn level_commands(&self) -> Vec<QualitySelection> {
        self.transport_commands()
            .into_iter()
            .filter_map(|(_, c)| match c {
                TransportCommand::SetCurrentLevel(level) => Some(level),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn timers(&self) -> Vec<ScheduledTimer> {
        self.0.lock().timers.clone()
    }

    #[must_use]
    pub fn live_timers(&self) -> usize {
        self.0
            .lock()
            .timers
            .iter()
            .filter(|t| !t.token.is_cancelled())
            .count()
    }

    fn push_timer(&self, timer: ScheduledTimer) {
        self.0.lock().timers.push(timer);
    }
}

/// Scheduler that only records timers; tests fire them by hand.
#[derive(Clone, Debug)]
pub struct ManualScheduler {
    journal: Journal,
}

impl ManualScheduler {
    #[must_use]
    pub fn new(journal: Journal) -> Self {
        Self { journal }
    }

    /// Envelopes of armed timers whose input matches `pred`.
    #[must_use]
    pub fn due(&self, pred: impl Fn(&SessionInput) -> bool) -> Vec<Envelope> {
        self.journal
            .timers()
            .into_iter()
            .filter(|t| !t.token.is_cancelled() && pred(&t.envelope.input))
            .map(|t| t.envelope)
            .collect()
    }
}

impl Scheduler for ManualScheduler {
    fn every(&self, period: Duration, envelope: Envelope) -> CancellationToken {
        let token = CancellationToken::new();
        self.journal.push_timer(ScheduledTimer {
            envelope,
            period: Some(period),
            delay: period,
            token: token.clone(),
        });
        token
    }

    fn after(&self, delay: Duration, envelope: Envelope) -> CancellationToken {
        let token = CancellationToken::new();
        self.journal.push_timer(ScheduledTimer {
            envelope,
            period: None,
            delay,
            token: token.clone(),
        });
        token
    }
}

#[derive(Debug, Default)]
struct MediaState {
    buffered: Vec<TimeRange>,
    current_time: Duration,
    duration: Option<Duration>,
    native_hls: bool,
    reject_play: bool,
    sink: Option<InputSink>,
}

/// Media element handle with scriptable buffered ranges and playhead.
#[derive(Clone, Debug, Default)]
pub struct FakeMediaElement {
    journal: Journal,
    state: Arc<Mutex<MediaState>>,
}

impl FakeMediaElement {
    #[must_use]
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            state: Arc::default(),
        }
    }

    pub fn set_buffered(&self, ranges: Vec<TimeRange>) {
        self.state.lock().buffered = ranges;
    }

    pub fn set_current_time(&self, time: Duration) {
        self.state.lock().current_time = time;
    }

    pub fn set_duration(&self, duration: Option<Duration>) {
        self.state.lock().duration = duration;
    }

    pub fn set_native_hls(&self, native: bool) {
        self.state.lock().native_hls = native;
    }

    pub fn set_reject_play(&self, reject: bool) {
        self.state.lock().reject_play = reject;
    }

    #[must_use]
    pub fn has_listeners(&self) -> bool {
        self.state.lock().sink.is_some()
    }

    /// Fire an element event through the registered listener.
    pub fn emit(&self, event: MediaEvent) -> bool {
        let sink = self.state.lock().sink.clone();
        sink.is_some_and(|s| s.media(event))
    }
}

impl MediaElement for FakeMediaElement {
    fn buffered(&self) -> Vec<TimeRange> {
        self.state.lock().buffered.clone()
    }

    fn current_time(&self) -> Duration {
        self.state.lock().current_time
    }

    fn duration(&self) -> Option<Duration> {
        self.state.lock().duration
    }

    fn play(&self) -> PlayResult<()> {
        self.journal.record(Call::Play);
        if self.state.lock().reject_play {
            return Err(PlayError::PlaybackRejected {
                reason: "user gesture required".to_owned(),
            });
        }
        Ok(())
    }

    fn add_listeners(&self, sink: InputSink) {
        self.journal.record(Call::AddListeners);
        self.state.lock().sink = Some(sink);
    }

    fn remove_listeners(&self) {
        self.journal.record(Call::RemoveListeners {
            live_timers: self.journal.live_timers(),
        });
        self.state.lock().sink = None;
    }

    fn can_play_native_hls(&self) -> bool {
        self.state.lock().native_hls
    }

    fn set_source(&self, url: &Url) {
        self.journal.record(Call::SetSource(url.clone()));
    }
}

/// Transport client that records its commands.
#[derive(Debug)]
pub struct FakeTransport {
    id: usize,
    journal: Journal,
}

impl FakeTransport {
    fn record(&self, command: TransportCommand) {
        self.journal.record(Call::Transport {
            transport: self.id,
            command,
        });
    }
}

impl Transport for FakeTransport {
    type Media = FakeMediaElement;

    fn load_source(&mut self, url: &Url) {
        self.record(TransportCommand::LoadSource(url.clone()));
    }

    fn attach_media(&mut self, _media: &Self::Media) {
        self.record(TransportCommand::AttachMedia);
    }

    fn set_current_level(&mut self, level: QualitySelection) {
        self.record(TransportCommand::SetCurrentLevel(level));
    }

    fn start_load(&mut self) {
        self.record(TransportCommand::StartLoad);
    }

    fn recover_media_error(&mut self) {
        self.record(TransportCommand::RecoverMediaError);
    }

    fn destroy(&mut self) {
        self.record(TransportCommand::Destroy);
    }
}

#[derive(Debug, Default)]
struct FactoryState {
    sinks: Vec<InputSink>,
    configs: Vec<TransportConfig>,
    unsupported: bool,
    fail_create: bool,
}

/// Factory handing out [`FakeTransport`]s and keeping their sinks.
#[derive(Clone, Debug, Default)]
pub struct FakeTransportFactory {
    journal: Journal,
    state: Arc<Mutex<FactoryState>>,
}

impl FakeTransportFactory {
    #[must_use]
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            state: Arc::default(),
        }
    }

    pub fn set_unsupported(&self, unsupported: bool) {
        self.state.lock().unsupported = unsupported;
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.state.lock().fail_create = fail;
    }

    /// Number of transports created so far.
    #[must_use]
    pub fn created(&self) -> usize {
        self.state.lock().sinks.len()
    }

    /// Sink of the transport created `index`-th.
    #[must_use]
    pub fn sink(&self, index: usize) -> Option<InputSink> {
        self.state.lock().sinks.get(index).cloned()
    }

    #[must_use]
    pub fn last_sink(&self) -> Option<InputSink> {
        self.state.lock().sinks.last().cloned()
    }

    #[must_use]
    pub fn last_config(&self) -> Option<TransportConfig> {
        self.state.lock().configs.last().cloned()
    }

    /// Fire a transport event through the newest transport's sink.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.last_sink().is_some_and(|s| s.transport(event))
    }
}

impl TransportFactory for FakeTransportFactory {
    type Media = FakeMediaElement;
    type Transport = FakeTransport;

    fn is_supported(&self) -> bool {
        !self.state.lock().unsupported
    }

    fn create(&self, config: &TransportConfig, sink: InputSink) -> PlayResult<Self::Transport> {
        let mut state = self.state.lock();
        if state.fail_create {
            return Err(PlayError::TransportInit {
                reason: "decoder pipeline unavailable".to_owned(),
            });
        }
        let id = state.sinks.len();
        state.sinks.push(sink);
        state.configs.push(config.clone());
        Ok(FakeTransport {
            id,
            journal: self.journal.clone(),
        })
    }
}

/// A [`PlaybackSession`] wired to fakes, with the input queue drained by hand.
pub struct TestSession {
    pub session: PlaybackSession<FakeTransportFactory>,
    pub journal: Journal,
    pub factory: FakeTransportFactory,
    pub media: FakeMediaElement,
    pub scheduler: ManualScheduler,
    inputs: InputReceiver,
}

impl TestSession {
    #[must_use]
    pub fn new(cfg: SessionConfig) -> Self {
        let journal = Journal::new();
        let factory = FakeTransportFactory::new(journal.clone());
        let media = FakeMediaElement::new(journal.clone());
        let scheduler = ManualScheduler::new(journal.clone());
        let (tx, inputs) = mpsc::unbounded_channel();
        let session = PlaybackSession::new(
            cfg,
            factory.clone(),
            media.clone(),
            Box::new(scheduler.clone()),
            tx,
        );
        Self {
            session,
            journal,
            factory,
            media,
            scheduler,
            inputs,
        }
    }

    /// Apply every queued input. Returns how many were dispatched.
    pub fn pump(&mut self, now: Instant) -> usize {
        let mut applied = 0;
        while let Ok(envelope) = self.inputs.try_recv() {
            self.session.dispatch(envelope, now);
            applied += 1;
        }
        applied
    }

    /// Emit a transport event and apply it.
    pub fn transport(&mut self, event: TransportEvent, now: Instant) {
        self.factory.emit(event);
        self.pump(now);
    }

    /// Emit a media element event and apply it.
    pub fn media_event(&mut self, event: MediaEvent, now: Instant) {
        self.media.emit(event);
        self.pump(now);
    }

    /// Fire every armed evaluation timer once and apply the ticks.
    pub fn tick(&mut self, now: Instant) -> usize {
        let due = self.scheduler.due(|i| matches!(i, SessionInput::Tick));
        let fired = due.len();
        for envelope in due {
            self.session.dispatch(envelope, now);
        }
        fired
    }

    /// Fire armed cooldown timers and apply them.
    pub fn cooldown(&mut self, now: Instant) -> usize {
        let due: Vec<ScheduledTimer> = self
            .journal
            .timers()
            .into_iter()
            .filter(|t| {
                !t.token.is_cancelled() && matches!(t.envelope.input, SessionInput::CooldownElapsed)
            })
            .collect();
        let fired = due.len();
        for timer in due {
            // One-shot: spent once delivered.
            timer.token.cancel();
            self.session.dispatch(timer.envelope, now);
        }
        fired
    }
}
