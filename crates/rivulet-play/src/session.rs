//! Playback session controller.
//!
//! Owns the transport client, the media element listeners, the ABR engine
//! and the buffer monitor of the resource being played. All inputs arrive
//! as [`Envelope`]s through [`PlaybackSession::dispatch`]; inputs from a
//! previous epoch are dropped.

use std::{ops::ControlFlow, time::Duration};

use rivulet_abr::{
    AbrReason, BandwidthSample, BufferMonitor, DefaultAbrController, DegradedReason,
    PlaybackMode, QualityLadder, QualitySelection,
};
use rivulet_events::{
    AbrEvent, EventBus, Notification, PlaybackFailure, PlayerEvent, PlayerStatus, Severity,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use url::Url;
use web_time::Instant;

use crate::{
    config::SessionConfig,
    error::{PlayError, PlayResult},
    input::{Envelope, InputSender, InputSink, SessionEpoch, SessionInput},
    media::{MediaElement, MediaEvent},
    scheduler::Scheduler,
    snapshot::{NetworkStatus, Snapshot},
    status::{self, PlaybackPhase},
    transport::{Transport, TransportErrorKind, TransportEvent, TransportFactory},
};

/// Terminal message shown for every unrecoverable failure.
pub const CANNOT_PLAY_MESSAGE: &str = "This video cannot be played. Please try again.";

const UNSUPPORTED_MESSAGE: &str = "This device cannot play HLS video.";

/// State that lives exactly as long as one loaded resource.
struct LiveSession<T> {
    url: Url,
    /// `None` when the element plays the stream natively.
    transport: Option<T>,
    abr: DefaultAbrController,
    buffer: BufferMonitor,
    phase: PlaybackPhase,
    eval_timer: Option<CancellationToken>,
    cooldown_timer: Option<CancellationToken>,
    duration: Option<Duration>,
    position: Duration,
}

impl<T: Transport> LiveSession<T> {
    fn new(url: Url, transport: Option<T>, cfg: &SessionConfig) -> Self {
        Self {
            url,
            transport,
            abr: DefaultAbrController::new(cfg.abr.clone()),
            buffer: BufferMonitor::new(cfg.abr.buffer_target),
            phase: PlaybackPhase::Loading,
            eval_timer: None,
            cooldown_timer: None,
            duration: None,
            position: Duration::ZERO,
        }
    }

    fn command(&mut self, level: QualitySelection) {
        if let Some(transport) = self.transport.as_mut() {
            transport.set_current_level(level);
        }
    }

    fn arm_eval_timer(&mut self, scheduler: &dyn Scheduler, epoch: SessionEpoch) {
        if self.eval_timer.is_some() || self.transport.is_none() {
            return;
        }
        let period = self.abr.options().eval_interval;
        let token = scheduler.every(
            period,
            Envelope {
                epoch,
                input: SessionInput::Tick,
            },
        );
        trace!(?period, "evaluation timer armed");
        self.eval_timer = Some(token);
    }

    fn disarm_eval_timer(&mut self) {
        if let Some(token) = self.eval_timer.take() {
            token.cancel();
            trace!("evaluation timer cancelled");
        }
    }

    fn cancel_timers(&mut self) {
        self.disarm_eval_timer();
        if let Some(token) = self.cooldown_timer.take() {
            token.cancel();
        }
    }

    fn degraded_reason(&self) -> Option<DegradedReason> {
        self.abr.degraded().map(|d| d.reason)
    }
}

/// Single-owner playback controller for one media element.
pub struct PlaybackSession<F: TransportFactory> {
    cfg: SessionConfig,
    factory: F,
    media: F::Media,
    scheduler: Box<dyn Scheduler>,
    inputs: InputSender,
    bus: EventBus,
    epoch: SessionEpoch,
    live: Option<LiveSession<F::Transport>>,
    failure: Option<PlaybackFailure>,
    status: PlayerStatus,
    network: Option<DegradedReason>,
}

impl<F: TransportFactory> PlaybackSession<F> {
    /// Create an idle session. Transport and element callbacks will be
    /// delivered through `inputs`; timers through `scheduler`.
    pub fn new(
        cfg: SessionConfig,
        factory: F,
        media: F::Media,
        scheduler: Box<dyn Scheduler>,
        inputs: InputSender,
    ) -> Self {
        let bus = EventBus::new(cfg.events_channel_capacity);
        Self {
            cfg,
            factory,
            media,
            scheduler,
            inputs,
            bus,
            epoch: SessionEpoch::default(),
            live: None,
            failure: None,
            status: PlayerStatus::Idle,
            network: None,
        }
    }

    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    #[must_use]
    pub fn epoch(&self) -> SessionEpoch {
        self.epoch
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.live.is_some()
    }

    #[must_use]
    pub fn status(&self) -> &PlayerStatus {
        &self.status
    }

    #[must_use]
    pub fn media(&self) -> &F::Media {
        &self.media
    }

    /// Load a new resource, tearing down the previous one first.
    ///
    /// # Errors
    ///
    /// Returns [`PlayError::TransportInit`] when the factory fails and
    /// [`PlayError::Unsupported`] when neither the transport nor the element
    /// can play HLS. Both also leave the session in the `Failed` state.
    pub fn load(&mut self, url: Url) -> PlayResult<SessionEpoch> {
        self.release();
        self.failure = None;
        let epoch = self.epoch.advance();
        let sink = InputSink::new(epoch, self.inputs.clone());

        if !self.factory.is_supported() {
            if !self.media.can_play_native_hls() {
                let reason = "segmented transport unavailable and no native HLS".to_owned();
                self.fail(UNSUPPORTED_MESSAGE, reason.clone());
                return Err(PlayError::Unsupported { reason });
            }
            info!(epoch = epoch.value(), %url, "transport unsupported, using native HLS");
            self.media.add_listeners(sink);
            self.media.set_source(&url);
            self.live = Some(LiveSession::new(url, None, &self.cfg));
            self.bus.publish(AbrEvent::LadderReady {
                entries: QualityLadder::default().entries(),
                initial_level: None,
            });
            self.refresh_status();
            return Ok(epoch);
        }

        let mut transport = match self.factory.create(&self.cfg.transport, sink.clone()) {
            Ok(transport) => transport,
            Err(e) => {
                self.fail(CANNOT_PLAY_MESSAGE, e.to_string());
                return Err(e);
            }
        };
        self.media.add_listeners(sink);
        transport.load_source(&url);
        transport.attach_media(&self.media);

        info!(epoch = epoch.value(), %url, "resource loaded");
        let mut live = LiveSession::new(url, Some(transport), &self.cfg);
        live.arm_eval_timer(self.scheduler.as_ref(), epoch);
        self.live = Some(live);
        self.refresh_status();
        Ok(epoch)
    }

    /// Release the current resource. Safe to call any number of times.
    pub fn teardown(&mut self) {
        self.release();
        self.failure = None;
        self.refresh_status();
    }

    /// Record a quality choice from the menu.
    ///
    /// The command reaches the transport before this returns; the actual
    /// switch happens at the next fragment boundary.
    ///
    /// # Errors
    ///
    /// [`PlayError::NotLoaded`] without a live resource and
    /// [`PlayError::UnknownRendition`] for a level not on the ladder.
    pub fn select_quality(&mut self, selection: QualitySelection, now: Instant) -> PlayResult<()> {
        let live = self.live.as_mut().ok_or(PlayError::NotLoaded)?;
        if !live.abr.select(selection, now) {
            return Err(PlayError::UnknownRendition(selection));
        }

        match selection {
            QualitySelection::Level(_) => {
                live.disarm_eval_timer();
                live.command(selection);
            }
            QualitySelection::Auto => {
                if !live.abr.options().engine_driven() {
                    live.command(QualitySelection::Auto);
                }
                live.arm_eval_timer(self.scheduler.as_ref(), self.epoch);
            }
        }

        let label = live.abr.ladder().label_for(selection).to_owned();
        let mode = live.abr.mode();
        info!(?selection, %label, "quality selected");
        self.bus.publish(AbrEvent::QualitySelected { selection, mode });
        self.bus.publish(Notification::new(
            Severity::Info,
            format!("Quality set to {label}"),
        ));
        self.refresh_status();
        Ok(())
    }

    /// Apply one input. Inputs from any epoch but the live one are ignored.
    pub fn dispatch(&mut self, envelope: Envelope, now: Instant) {
        if envelope.epoch != self.epoch || self.live.is_none() {
            trace!(
                input_epoch = envelope.epoch.value(),
                epoch = self.epoch.value(),
                "stale input dropped"
            );
            return;
        }

        let flow = match envelope.input {
            SessionInput::Transport(event) => self.on_transport(event, now),
            SessionInput::Media(event) => {
                self.on_media(event);
                ControlFlow::Continue(())
            }
            SessionInput::Tick => {
                self.on_tick(now);
                ControlFlow::Continue(())
            }
            SessionInput::CooldownElapsed => {
                self.on_cooldown(now);
                ControlFlow::Continue(())
            }
        };

        if let ControlFlow::Break(details) = flow {
            self.fail(CANNOT_PLAY_MESSAGE, details);
        }
        self.refresh_status();
    }

    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let Some(live) = self.live.as_ref() else {
            return Snapshot {
                epoch: self.epoch.value(),
                status: self.status.clone(),
                mode: PlaybackMode::Auto,
                ladder: QualityLadder::default().entries(),
                current_quality_label: rivulet_abr::AUTO_LABEL.to_owned(),
                current_rendition: None,
                network: NetworkStatus::default(),
                buffer_health_percent: 0.0,
                is_buffering: false,
                stall_count: 0,
                load_progress_percent: 0.0,
                position_secs: 0.0,
                duration_secs: None,
                last_switch_at: None,
                last_bandwidth_check: None,
            };
        };

        let abr = &live.abr;
        let mode = abr.mode();
        let current_rendition = abr
            .current_index()
            .and_then(|idx| abr.ladder().get(idx))
            .cloned();
        let current_quality_label = match (mode, &current_rendition) {
            (PlaybackMode::Manual, Some(r)) => r.label.clone(),
            _ => rivulet_abr::AUTO_LABEL.to_owned(),
        };

        Snapshot {
            epoch: self.epoch.value(),
            status: self.status.clone(),
            mode,
            ladder: abr.ladder().entries(),
            current_quality_label,
            current_rendition,
            network: NetworkStatus {
                degraded: abr.is_degraded(),
                bandwidth_mbps: abr.bandwidth_mbps().unwrap_or(0.0),
            },
            buffer_health_percent: live.buffer.health(),
            is_buffering: live.buffer.is_buffering(),
            stall_count: live.buffer.stall_count(),
            load_progress_percent: live.buffer.load_progress(),
            position_secs: live.position.as_secs_f64(),
            duration_secs: live.duration.map(|d| d.as_secs_f64()),
            last_switch_at: abr.last_switch_at(),
            last_bandwidth_check: abr.last_bandwidth_check(),
        }
    }

    fn on_transport(&mut self, event: TransportEvent, now: Instant) -> ControlFlow<String> {
        let Some(live) = self.live.as_mut() else {
            return ControlFlow::Continue(());
        };

        match event {
            TransportEvent::ManifestParsed { levels } => {
                if levels.is_empty() {
                    return ControlFlow::Break("manifest lists no levels".to_owned());
                }
                let start = live.abr.set_ladder(QualityLadder::from_levels(&levels));
                if live.abr.options().engine_driven() {
                    if let Some(level) = start {
                        live.command(QualitySelection::Level(level));
                        self.bus.publish(AbrEvent::QualitySwitched {
                            from_level: None,
                            to_level: level,
                            reason: AbrReason::Initial,
                        });
                    }
                } else {
                    live.command(QualitySelection::Auto);
                }
                info!(levels = levels.len(), ?start, url = %live.url, "manifest parsed");
                self.bus.publish(AbrEvent::LadderReady {
                    entries: live.abr.ladder().entries(),
                    initial_level: start,
                });
                if self.cfg.autoplay {
                    if let Err(e) = self.media.play() {
                        warn!(%e, "autoplay rejected");
                    }
                }
            }
            TransportEvent::FragmentLoaded { bytes, elapsed } => {
                let sample = BandwidthSample::new(bytes, elapsed, now);
                if live.abr.push_fragment(sample) {
                    if let Some(mbps) = live.abr.bandwidth_mbps() {
                        trace!(bytes, ?elapsed, mbps, "bandwidth sampled");
                        self.bus.publish(AbrEvent::Bandwidth { mbps });
                    }
                }
            }
            TransportEvent::BufferAppended => {
                let percent = live
                    .buffer
                    .sample(&self.media.buffered(), self.media.current_time());
                self.bus.publish(AbrEvent::BufferHealth { percent });
            }
            TransportEvent::BufferStalled => {
                warn!(mode = ?live.abr.mode(), "buffer stalled");
                live.abr.on_buffer_stalled();
            }
            TransportEvent::BufferFlushed => {
                debug!("buffer flushed");
                live.abr.on_buffer_flushed();
            }
            TransportEvent::LevelSwitched { level } => {
                let from_level = live.abr.current_index();
                if live.abr.observe_level(level) {
                    debug!(?from_level, level, "transport switched level");
                    self.bus.publish(AbrEvent::QualitySwitched {
                        from_level,
                        to_level: level,
                        reason: AbrReason::TransportAuthority,
                    });
                }
            }
            TransportEvent::Error {
                kind,
                fatal,
                details,
            } => {
                if !fatal {
                    debug!(?kind, %details, "non-fatal transport error");
                    return ControlFlow::Continue(());
                }
                match kind {
                    TransportErrorKind::Network => {
                        warn!(%details, "fatal network error, restarting load");
                        if let Some(transport) = live.transport.as_mut() {
                            transport.start_load();
                        }
                        let until = live.abr.on_network_error(now);
                        if let Some(old) = live.cooldown_timer.take() {
                            old.cancel();
                        }
                        if let Some(until) = until {
                            let delay = until.saturating_duration_since(now);
                            live.cooldown_timer = Some(self.scheduler.after(
                                delay,
                                Envelope {
                                    epoch: self.epoch,
                                    input: SessionInput::CooldownElapsed,
                                },
                            ));
                        }
                    }
                    TransportErrorKind::Media => {
                        warn!(%details, "fatal media error, recovering");
                        if let Some(transport) = live.transport.as_mut() {
                            transport.recover_media_error();
                        }
                    }
                    TransportErrorKind::Other => return ControlFlow::Break(details),
                }
            }
        }
        ControlFlow::Continue(())
    }

    fn on_media(&mut self, event: MediaEvent) {
        let Some(live) = self.live.as_mut() else {
            return;
        };
        live.phase = live.phase.on_media(event);

        if let Some(signal) = event.buffer_signal() {
            if live.buffer.on_signal(signal) {
                debug!(buffering = live.buffer.is_buffering(), "buffering changed");
            }
            let percent = live
                .buffer
                .sample(&self.media.buffered(), self.media.current_time());
            self.bus.publish(AbrEvent::BufferHealth { percent });
        }

        match event {
            MediaEvent::LoadedMetadata => {
                live.duration = self.media.duration();
                if let Some(duration) = live.duration {
                    self.bus.publish(PlayerEvent::DurationChanged {
                        seconds: duration.as_secs_f64(),
                    });
                }
            }
            MediaEvent::TimeUpdate => {
                live.position = self.media.current_time();
                self.bus.publish(PlayerEvent::TimeUpdate {
                    position_secs: live.position.as_secs_f64(),
                });
            }
            MediaEvent::Progress => {
                let duration = live.duration.or_else(|| self.media.duration());
                if let Some(percent) = live
                    .buffer
                    .update_load_progress(&self.media.buffered(), duration)
                {
                    self.bus.publish(PlayerEvent::LoadProgress { percent });
                }
            }
            MediaEvent::Ended => {
                info!(url = %live.url, "playback ended");
                self.bus.publish(PlayerEvent::Ended);
            }
            MediaEvent::LoadStart
            | MediaEvent::Waiting
            | MediaEvent::CanPlay
            | MediaEvent::CanPlayThrough
            | MediaEvent::Playing => {}
        }
    }

    fn on_tick(&mut self, now: Instant) {
        let Some(live) = self.live.as_mut() else {
            return;
        };
        if live.abr.mode() != PlaybackMode::Auto {
            return;
        }

        let from_level = live.abr.current_index();
        let decision = live.abr.decide(now);
        let Some(target) = decision.target_index.filter(|_| decision.changed) else {
            debug!(reason = ?decision.reason, "no switch");
            return;
        };
        let reason = decision.reason;

        live.abr.apply(&decision, now);
        live.command(QualitySelection::Level(target));

        let label = live.abr.ladder().label_for(QualitySelection::Level(target));
        let notification = match reason {
            AbrReason::DownSwitch => Notification::new(
                Severity::Warning,
                format!("Switched to {label} due to a slow network"),
            ),
            _ => Notification::new(
                Severity::Info,
                format!("Switched to {label}, bandwidth allows"),
            ),
        };
        info!(?from_level, to_level = target, ?reason, "automatic quality switch");
        self.bus.publish(AbrEvent::QualitySwitched {
            from_level,
            to_level: target,
            reason,
        });
        self.bus.publish(notification);
    }

    fn on_cooldown(&mut self, now: Instant) {
        let Some(live) = self.live.as_mut() else {
            return;
        };
        live.cooldown_timer = None;
        // The timer firing is the deadline; only the newest timer is armed.
        let deadline = live
            .abr
            .degraded()
            .and_then(|d| d.until)
            .map_or(now, |until| until.max(now));
        if live.abr.on_cooldown_elapsed(deadline) {
            debug!("network recovery cooldown elapsed");
        }
    }

    /// Timers, listeners, transport; in that order.
    fn release(&mut self) {
        let Some(mut live) = self.live.take() else {
            return;
        };
        live.cancel_timers();
        self.media.remove_listeners();
        if let Some(mut transport) = live.transport.take() {
            transport.destroy();
        }
        let stale = self.epoch;
        self.epoch.advance();
        debug!(epoch = stale.value(), url = %live.url, "session released");
    }

    fn fail(&mut self, message: &str, details: String) {
        error!(%details, "playback failed");
        self.release();
        self.failure = Some(PlaybackFailure::new(message, Some(details)));
        self.bus.publish(Notification::new(Severity::Error, message));
        self.refresh_status();
    }

    fn refresh_status(&mut self) {
        let (phase, degraded, bandwidth) = match self.live.as_ref() {
            Some(live) => (
                live.phase,
                live.degraded_reason(),
                live.abr.bandwidth_mbps().unwrap_or(0.0),
            ),
            None => (PlaybackPhase::Idle, None, 0.0),
        };

        if degraded != self.network {
            self.network = degraded;
            self.bus.publish(AbrEvent::NetworkStatusChanged {
                degraded,
                bandwidth_mbps: bandwidth,
            });
        }

        let status = status::resolve(phase, degraded, self.failure.as_ref());
        if status != self.status {
            debug!(from = ?self.status, to = ?status, "status changed");
            self.status = status.clone();
            self.bus.publish(PlayerEvent::StatusChanged { status });
        }
    }
}

impl<F: TransportFactory> Drop for PlaybackSession<F> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use rivulet_abr::{AbrOptions, AutoAuthority, ManifestLevel, TimeRange};
    use rivulet_events::Event;
    use rstest::rstest;
    use tokio::sync::broadcast;

    use super::*;
    use crate::testing::{Call, TestSession, TransportCommand};

    fn url() -> Url {
        Url::parse("https://cdn.example.com/v/42/master.m3u8").unwrap()
    }

    fn levels() -> Vec<ManifestLevel> {
        vec![
            ManifestLevel::new(1920, 1080, 5_000_000),
            ManifestLevel::new(1280, 720, 2_500_000),
            ManifestLevel::new(854, 480, 1_000_000),
        ]
    }

    fn loaded(cfg: SessionConfig) -> TestSession {
        let mut t = TestSession::new(cfg);
        t.session.load(url()).unwrap();
        t.transport(
            TransportEvent::ManifestParsed { levels: levels() },
            Instant::now(),
        );
        t
    }

    fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn notifications(events: &[Event]) -> Vec<Notification> {
        events
            .iter()
            .filter_map(|e| match e {
                Event::Player(PlayerEvent::Notification(n)) => Some(n.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn load_wires_listeners_then_transport() {
        let mut t = TestSession::new(SessionConfig::default());
        let epoch = t.session.load(url()).unwrap();

        assert_eq!(epoch, t.session.epoch());
        assert_eq!(
            t.journal.calls(),
            vec![
                Call::AddListeners,
                Call::Transport {
                    transport: 0,
                    command: TransportCommand::LoadSource(url()),
                },
                Call::Transport {
                    transport: 0,
                    command: TransportCommand::AttachMedia,
                },
            ]
        );
        assert_eq!(t.journal.live_timers(), 1);
        assert_eq!(t.journal.timers()[0].period, Some(Duration::from_secs(8)));
        assert_eq!(t.session.status(), &PlayerStatus::Loading);
        assert_eq!(t.factory.last_config(), Some(SessionConfig::default().transport));
    }

    #[test]
    fn manifest_builds_ladder_and_starts_on_lowest_rung() {
        let t = loaded(SessionConfig::default());
        let snap = t.session.snapshot();

        assert_eq!(t.journal.level_commands(), vec![QualitySelection::Level(2)]);
        assert_eq!(snap.ladder.len(), 4);
        assert_eq!(snap.ladder[0].label, "Auto");
        assert_eq!(snap.current_quality_label, "Auto");
        assert_eq!(snap.current_rendition.map(|r| r.label), Some("480p".to_owned()));
    }

    #[test]
    fn slow_network_tick_downgrades_with_warning() {
        let cfg = SessionConfig::default().with_abr(AbrOptions::default().with_initial_level(0));
        let mut t = loaded(cfg);
        let mut rx = t.session.bus().subscribe();
        let now = Instant::now();

        t.transport(
            TransportEvent::FragmentLoaded {
                bytes: 250_000,
                elapsed: Duration::from_secs(1),
            },
            now,
        );
        assert_eq!(t.tick(now), 1);

        assert_eq!(
            t.journal.level_commands(),
            vec![QualitySelection::Level(0), QualitySelection::Level(2)]
        );
        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(
            e,
            Event::Abr(AbrEvent::QualitySwitched {
                from_level: Some(0),
                to_level: 2,
                reason: AbrReason::DownSwitch,
            })
        )));
        let toasts = notifications(&events);
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].severity, Severity::Warning);
        assert!(toasts[0].message.contains("480p"));
    }

    #[test]
    fn snapshot_carries_switch_and_sample_times() {
        let cfg = SessionConfig::default().with_abr(AbrOptions::default().with_initial_level(0));
        let mut t = loaded(cfg);
        let fresh = t.session.snapshot();
        assert_eq!(fresh.last_switch_at, None);
        assert_eq!(fresh.last_bandwidth_check, None);

        let sampled = Instant::now();
        t.transport(
            TransportEvent::FragmentLoaded {
                bytes: 250_000,
                elapsed: Duration::from_secs(1),
            },
            sampled,
        );
        let switched = sampled + Duration::from_secs(8);
        assert_eq!(t.tick(switched), 1);

        let snap = t.session.snapshot();
        assert_eq!(snap.last_bandwidth_check, Some(sampled));
        assert_eq!(snap.last_switch_at, Some(switched));

        let json = serde_json::to_value(&snap).unwrap();
        assert!(json.get("last_switch_at").is_none());
        assert!(json.get("last_bandwidth_check").is_none());
        assert_eq!(json["current_rendition"]["label"], "480p");
    }

    #[test]
    fn manual_selection_silences_ticks() {
        let mut t = loaded(SessionConfig::default());
        let now = Instant::now();
        t.session
            .select_quality(QualitySelection::Level(1), now)
            .unwrap();

        assert_eq!(t.journal.live_timers(), 0);
        t.transport(
            TransportEvent::FragmentLoaded {
                bytes: 10_000_000,
                elapsed: Duration::from_secs(1),
            },
            now,
        );
        assert_eq!(t.tick(now), 0);

        let snap = t.session.snapshot();
        assert_eq!(snap.mode, PlaybackMode::Manual);
        assert_eq!(snap.current_quality_label, "720p");
        assert_eq!(
            t.journal.level_commands().last(),
            Some(&QualitySelection::Level(1))
        );
    }

    #[test]
    fn returning_to_auto_rearms_timer_without_native_abr() {
        let mut t = loaded(SessionConfig::default());
        let now = Instant::now();
        t.session
            .select_quality(QualitySelection::Level(0), now)
            .unwrap();
        t.session.select_quality(QualitySelection::Auto, now).unwrap();

        assert_eq!(t.journal.live_timers(), 1);
        assert!(!t.journal.level_commands().contains(&QualitySelection::Auto));
        assert_eq!(t.session.snapshot().current_quality_label, "Auto");
    }

    #[test]
    fn select_quality_reports_misuse() {
        let mut t = TestSession::new(SessionConfig::default());
        let now = Instant::now();
        assert!(matches!(
            t.session.select_quality(QualitySelection::Level(0), now),
            Err(PlayError::NotLoaded)
        ));

        t.session.load(url()).unwrap();
        t.transport(TransportEvent::ManifestParsed { levels: levels() }, now);
        assert!(matches!(
            t.session.select_quality(QualitySelection::Level(7), now),
            Err(PlayError::UnknownRendition(QualitySelection::Level(7)))
        ));
        assert_eq!(t.session.snapshot().mode, PlaybackMode::Auto);
    }

    #[test]
    fn manual_selection_confirms_with_notification() {
        let mut t = loaded(SessionConfig::default());
        let mut rx = t.session.bus().subscribe();
        t.session
            .select_quality(QualitySelection::Level(1), Instant::now())
            .unwrap();

        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(
            e,
            Event::Abr(AbrEvent::QualitySelected {
                selection: QualitySelection::Level(1),
                mode: PlaybackMode::Manual,
            })
        )));
        assert_eq!(
            notifications(&events),
            vec![Notification::new(Severity::Info, "Quality set to 720p")]
        );
    }

    #[rstest]
    #[case(TransportEvent::BufferStalled, DegradedReason::BufferStall)]
    #[case(
        TransportEvent::FragmentLoaded { bytes: 125_000, elapsed: Duration::from_secs(1) },
        DegradedReason::SlowNetwork
    )]
    fn manual_degradation_until_flush(
        #[case] trigger: TransportEvent,
        #[case] reason: DegradedReason,
    ) {
        let mut t = loaded(SessionConfig::default());
        let now = Instant::now();
        t.session
            .select_quality(QualitySelection::Level(0), now)
            .unwrap();

        t.transport(trigger, now);
        assert_eq!(t.session.status(), &PlayerStatus::Degraded(reason));
        assert!(t.session.snapshot().network.degraded);

        t.transport(TransportEvent::BufferFlushed, now);
        assert_eq!(t.session.status(), &PlayerStatus::Loading);
        assert!(!t.session.snapshot().network.degraded);
    }

    #[test]
    fn auto_mode_stall_is_not_degraded() {
        let mut t = loaded(SessionConfig::default());
        t.transport(TransportEvent::BufferStalled, Instant::now());
        assert!(!t.session.snapshot().network.degraded);
    }

    #[test]
    fn fatal_network_error_restarts_load_and_cools_down() {
        let mut t = loaded(SessionConfig::default());
        let now = Instant::now();
        t.session
            .select_quality(QualitySelection::Level(1), now)
            .unwrap();

        t.transport(
            TransportEvent::Error {
                kind: TransportErrorKind::Network,
                fatal: true,
                details: "manifestLoadError".to_owned(),
            },
            now,
        );
        assert!(
            t.journal
                .transport_commands()
                .contains(&(0, TransportCommand::StartLoad))
        );
        assert_eq!(
            t.session.status(),
            &PlayerStatus::Degraded(DegradedReason::NetworkRecovery)
        );
        let cooldowns: Vec<_> = t
            .journal
            .timers()
            .into_iter()
            .filter(|timer| timer.period.is_none())
            .collect();
        assert_eq!(cooldowns.len(), 1);
        assert_eq!(cooldowns[0].delay, Duration::from_secs(3));

        assert_eq!(t.cooldown(now + Duration::from_secs(3)), 1);
        assert!(!t.session.snapshot().network.degraded);
    }

    #[test]
    fn fatal_network_error_in_auto_mode_only_reloads() {
        let mut t = loaded(SessionConfig::default());
        t.transport(
            TransportEvent::Error {
                kind: TransportErrorKind::Network,
                fatal: true,
                details: "fragLoadError".to_owned(),
            },
            Instant::now(),
        );
        assert!(
            t.journal
                .transport_commands()
                .contains(&(0, TransportCommand::StartLoad))
        );
        assert!(!t.session.snapshot().network.degraded);
        assert_eq!(t.journal.live_timers(), 1);
    }

    #[test]
    fn fatal_media_error_recovers() {
        let mut t = loaded(SessionConfig::default());
        t.transport(
            TransportEvent::Error {
                kind: TransportErrorKind::Media,
                fatal: true,
                details: "bufferAppendError".to_owned(),
            },
            Instant::now(),
        );
        assert!(
            t.journal
                .transport_commands()
                .contains(&(0, TransportCommand::RecoverMediaError))
        );
        assert!(t.session.is_loaded());
    }

    #[test]
    fn non_fatal_error_is_only_logged() {
        let mut t = loaded(SessionConfig::default());
        t.journal.clear();
        t.transport(
            TransportEvent::Error {
                kind: TransportErrorKind::Network,
                fatal: false,
                details: "fragLoadTimeOut".to_owned(),
            },
            Instant::now(),
        );
        assert!(t.journal.calls().is_empty());
    }

    #[test]
    fn unrecoverable_error_tears_down_and_fails() {
        let mut t = loaded(SessionConfig::default());
        let mut rx = t.session.bus().subscribe();
        let now = Instant::now();
        t.transport(
            TransportEvent::Error {
                kind: TransportErrorKind::Other,
                fatal: true,
                details: "internalException".to_owned(),
            },
            now,
        );

        assert!(!t.session.is_loaded());
        assert!(
            t.journal
                .transport_commands()
                .contains(&(0, TransportCommand::Destroy))
        );
        assert_eq!(
            t.session.status(),
            &PlayerStatus::Failed(PlaybackFailure::new(
                CANNOT_PLAY_MESSAGE,
                Some("internalException".to_owned())
            ))
        );
        assert!(!t.media.has_listeners());
        assert_eq!(t.journal.live_timers(), 0);

        let toasts = notifications(&drain(&mut rx));
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].severity, Severity::Error);

        assert!(matches!(
            t.session.select_quality(QualitySelection::Auto, now),
            Err(PlayError::NotLoaded)
        ));
    }

    #[test]
    fn empty_manifest_is_terminal() {
        let mut t = TestSession::new(SessionConfig::default());
        t.session.load(url()).unwrap();
        t.transport(
            TransportEvent::ManifestParsed { levels: Vec::new() },
            Instant::now(),
        );
        assert!(t.session.status().is_failed());
        assert!(!t.session.is_loaded());
    }

    #[test]
    fn retry_after_failure_clears_it() {
        let mut t = loaded(SessionConfig::default());
        t.transport(
            TransportEvent::Error {
                kind: TransportErrorKind::Other,
                fatal: true,
                details: "keyLoadError".to_owned(),
            },
            Instant::now(),
        );
        t.session.load(url()).unwrap();
        assert_eq!(t.session.status(), &PlayerStatus::Loading);
        assert_eq!(t.factory.created(), 2);
    }

    #[test]
    fn transport_authority_delegates_auto_mode() {
        let cfg = SessionConfig::default()
            .with_abr(AbrOptions::default().with_authority(AutoAuthority::Transport));
        let mut t = loaded(cfg);
        let now = Instant::now();

        assert_eq!(t.journal.level_commands(), vec![QualitySelection::Auto]);
        t.transport(TransportEvent::LevelSwitched { level: 0 }, now);
        assert_eq!(
            t.session.snapshot().current_rendition.map(|r| r.index),
            Some(0)
        );

        t.transport(
            TransportEvent::FragmentLoaded {
                bytes: 10_000,
                elapsed: Duration::from_secs(1),
            },
            now,
        );
        t.tick(now);
        assert_eq!(t.journal.level_commands(), vec![QualitySelection::Auto]);

        t.session
            .select_quality(QualitySelection::Level(1), now)
            .unwrap();
        t.session.select_quality(QualitySelection::Auto, now).unwrap();
        assert_eq!(
            t.journal.level_commands(),
            vec![
                QualitySelection::Auto,
                QualitySelection::Level(1),
                QualitySelection::Auto,
            ]
        );
    }

    #[test]
    fn media_events_drive_phase_and_buffering() {
        let mut t = loaded(SessionConfig::default());
        let now = Instant::now();

        t.media_event(MediaEvent::LoadStart, now);
        assert!(t.session.snapshot().is_buffering);
        t.media_event(MediaEvent::Playing, now);
        assert_eq!(t.session.status(), &PlayerStatus::Playing);

        t.media_event(MediaEvent::Waiting, now);
        let snap = t.session.snapshot();
        assert_eq!(snap.status, PlayerStatus::Buffering);
        assert!(snap.is_buffering);
        assert_eq!(snap.stall_count, 1);

        t.media_event(MediaEvent::CanPlay, now);
        assert_eq!(t.session.status(), &PlayerStatus::Playing);
        assert!(!t.session.snapshot().is_buffering);
    }

    #[test]
    fn playback_telemetry_is_tracked() {
        let mut t = loaded(SessionConfig::default());
        let mut rx = t.session.bus().subscribe();
        let now = Instant::now();
        t.media.set_duration(Some(Duration::from_secs(60)));
        t.media.set_current_time(Duration::from_secs(12));
        t.media.set_buffered(vec![TimeRange::from_secs(0.0, 30.0)]);

        t.media_event(MediaEvent::LoadedMetadata, now);
        t.media_event(MediaEvent::TimeUpdate, now);
        t.media_event(MediaEvent::Progress, now);
        t.transport(TransportEvent::BufferAppended, now);

        let snap = t.session.snapshot();
        assert_eq!(snap.duration_secs, Some(60.0));
        assert_eq!(snap.position_secs, 12.0);
        assert_eq!(snap.load_progress_percent, 50.0);
        assert_eq!(snap.buffer_health_percent, 100.0);

        t.media_event(MediaEvent::Ended, now);
        assert_eq!(t.session.status(), &PlayerStatus::Ended);
        assert!(
            drain(&mut rx)
                .iter()
                .any(|e| matches!(e, Event::Player(PlayerEvent::Ended)))
        );
    }

    #[test]
    fn autoplay_failure_is_not_fatal() {
        let mut t = TestSession::new(SessionConfig::default().with_autoplay(true));
        t.media.set_reject_play(true);
        t.session.load(url()).unwrap();
        t.transport(
            TransportEvent::ManifestParsed { levels: levels() },
            Instant::now(),
        );
        assert!(t.journal.calls().contains(&Call::Play));
        assert!(!t.session.status().is_failed());
    }

    #[test]
    fn no_autoplay_by_default() {
        let t = loaded(SessionConfig::default());
        assert!(!t.journal.calls().contains(&Call::Play));
    }

    #[test]
    fn teardown_order_and_idempotence() {
        let mut t = loaded(SessionConfig::default());
        t.journal.clear();

        t.session.teardown();
        assert_eq!(
            t.journal.calls(),
            vec![
                Call::RemoveListeners { live_timers: 0 },
                Call::Transport {
                    transport: 0,
                    command: TransportCommand::Destroy,
                },
            ]
        );
        assert_eq!(t.session.status(), &PlayerStatus::Idle);

        t.session.teardown();
        assert_eq!(t.journal.calls().len(), 2);
    }

    #[test]
    fn drop_releases_transport() {
        let t = loaded(SessionConfig::default());
        let journal = t.journal.clone();
        drop(t);
        assert!(
            journal
                .transport_commands()
                .contains(&(0, TransportCommand::Destroy))
        );
    }
}
