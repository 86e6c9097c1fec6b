//! Async player front driven by the tokio runtime with paused time.
#![expect(
    clippy::unwrap_used,
    reason = "integration test crate, unwraps are acceptable in test code"
)]

use std::time::Duration;

use rivulet_abr::{AbrReason, ManifestLevel, QualitySelection};
use rivulet_events::{AbrEvent, Event, PlayerEvent, PlayerStatus};
use rivulet_play::{
    MediaEvent, Player, SessionConfig, TransportEvent,
    testing::{FakeMediaElement, FakeTransportFactory, Journal},
};
use tokio::sync::broadcast;
use url::Url;

fn setup() -> (Player<FakeTransportFactory>, FakeTransportFactory, FakeMediaElement, Journal) {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("rivulet_play=debug")
        .try_init();
    let journal = Journal::new();
    let factory = FakeTransportFactory::new(journal.clone());
    let media = FakeMediaElement::new(journal.clone());
    let player = Player::new(SessionConfig::default(), factory.clone(), media.clone());
    (player, factory, media, journal)
}

fn url() -> Url {
    Url::parse("https://cdn.example.com/v/7/master.m3u8").unwrap()
}

async fn next_matching(
    rx: &mut broadcast::Receiver<Event>,
    pred: impl Fn(&Event) -> bool,
) -> Event {
    loop {
        let event = rx.recv().await.unwrap();
        if pred(&event) {
            return event;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn pump_applies_queued_inputs_in_order() {
    let (player, factory, media, _journal) = setup();
    let mut rx = player.subscribe();
    player.load(url()).unwrap();

    factory.emit(TransportEvent::ManifestParsed {
        levels: vec![
            ManifestLevel::new(1280, 720, 2_500_000),
            ManifestLevel::new(854, 480, 1_000_000),
        ],
    });
    media.emit(MediaEvent::Playing);

    next_matching(&mut rx, |e| {
        matches!(
            e,
            Event::Player(PlayerEvent::StatusChanged {
                status: PlayerStatus::Playing
            })
        )
    })
    .await;
    assert_eq!(player.snapshot().ladder.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn evaluation_timer_switches_after_interval() {
    let (player, factory, _media, journal) = setup();
    let mut rx = player.subscribe();
    player.load(url()).unwrap();
    factory.emit(TransportEvent::ManifestParsed {
        levels: vec![
            ManifestLevel::new(1920, 1080, 5_000_000),
            ManifestLevel::new(854, 480, 1_000_000),
        ],
    });
    factory.emit(TransportEvent::FragmentLoaded {
        bytes: 1_250_000,
        elapsed: Duration::from_secs(1),
    });

    tokio::time::sleep(Duration::from_secs(9)).await;
    let event = next_matching(&mut rx, |e| {
        matches!(e, Event::Abr(AbrEvent::QualitySwitched { reason: AbrReason::UpSwitch, .. }))
    })
    .await;
    assert!(matches!(
        event,
        Event::Abr(AbrEvent::QualitySwitched { to_level: 0, .. })
    ));
    assert_eq!(
        journal.level_commands(),
        vec![QualitySelection::Level(1), QualitySelection::Level(0)]
    );
}

#[tokio::test(start_paused = true)]
async fn manual_selection_is_visible_immediately() {
    let (player, factory, _media, journal) = setup();
    let mut rx = player.subscribe();
    player.load(url()).unwrap();
    factory.emit(TransportEvent::ManifestParsed {
        levels: vec![
            ManifestLevel::new(1280, 720, 2_500_000),
            ManifestLevel::new(854, 480, 1_000_000),
        ],
    });
    next_matching(&mut rx, |e| matches!(e, Event::Abr(AbrEvent::LadderReady { .. }))).await;

    player.select_quality(QualitySelection::Level(0)).unwrap();
    assert_eq!(player.snapshot().current_quality_label, "720p");
    assert_eq!(
        journal.level_commands().last(),
        Some(&QualitySelection::Level(0))
    );

    // No evaluation tick may override the pinned rendition.
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(journal.level_commands().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn dropping_player_releases_everything() {
    let (player, _factory, media, journal) = setup();
    player.load(url()).unwrap();
    assert!(media.has_listeners());

    drop(player);
    assert!(!media.has_listeners());
    assert!(
        journal
            .transport_commands()
            .contains(&(0, rivulet_play::testing::TransportCommand::Destroy))
    );
}
