use std::time::Duration;

use rivulet_abr::{BufferSignal, TimeRange};
use url::Url;

use crate::{error::PlayResult, input::InputSink};

/// Playback-state events from the media element.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaEvent {
    LoadStart,
    LoadedMetadata,
    Waiting,
    CanPlay,
    CanPlayThrough,
    Playing,
    TimeUpdate,
    Progress,
    Ended,
}

impl MediaEvent {
    /// Signal for the buffer monitor, if this event drives the buffering flag.
    #[must_use]
    pub fn buffer_signal(self) -> Option<BufferSignal> {
        match self {
            Self::LoadStart => Some(BufferSignal::LoadStart),
            Self::Waiting => Some(BufferSignal::Waiting),
            Self::CanPlay => Some(BufferSignal::CanPlay),
            Self::CanPlayThrough => Some(BufferSignal::CanPlayThrough),
            Self::Playing => Some(BufferSignal::Playing),
            Self::LoadedMetadata | Self::TimeUpdate | Self::Progress | Self::Ended => None,
        }
    }
}

/// The platform playback primitive (decode, render, play/pause/seek).
///
/// Methods take `&self`; element implementations are handles to an object
/// owned by the platform.
pub trait MediaElement: Send + 'static {
    fn buffered(&self) -> Vec<TimeRange>;

    fn current_time(&self) -> Duration;

    /// `None` until metadata is loaded, or for live streams.
    fn duration(&self) -> Option<Duration>;

    fn play(&self) -> PlayResult<()>;

    /// Route element events into `sink` until `remove_listeners` is called.
    fn add_listeners(&self, sink: InputSink);

    fn remove_listeners(&self);

    /// Whether the element plays HLS without a transport client.
    fn can_play_native_hls(&self) -> bool {
        false
    }

    /// Hand a source URL straight to the element.
    fn set_source(&self, url: &Url);
}
