use std::time::Duration;

use rivulet_abr::{ManifestLevel, QualitySelection};
use url::Url;

use crate::{config::TransportConfig, error::PlayResult, input::InputSink, media::MediaElement};

/// Error classes reported by the transport client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportErrorKind {
    Network,
    Media,
    Other,
}

/// Events emitted by the segmented-transport client.
#[derive(Clone, Debug)]
pub enum TransportEvent {
    /// Manifest parsed; levels listed in transport index order.
    ManifestParsed { levels: Vec<ManifestLevel> },
    /// One fragment finished downloading.
    FragmentLoaded { bytes: u64, elapsed: Duration },
    /// Media data was appended to the element's buffer.
    BufferAppended,
    /// Playback starved while data was still expected.
    BufferStalled,
    /// Buffer was flushed and refilled; the stall is over.
    BufferFlushed,
    /// The transport started rendering another level.
    LevelSwitched { level: usize },
    Error {
        kind: TransportErrorKind,
        fatal: bool,
        details: String,
    },
}

/// Command side of the segmented-transport client (an HLS library binding).
pub trait Transport: Send + 'static {
    type Media: MediaElement;

    fn load_source(&mut self, url: &Url);

    fn attach_media(&mut self, media: &Self::Media);

    /// Pin a level, or hand level choice to the transport's own logic.
    fn set_current_level(&mut self, level: QualitySelection);

    /// Restart fragment loading after a network failure.
    fn start_load(&mut self);

    fn recover_media_error(&mut self);

    /// Detach from the element and release everything. Called exactly once.
    fn destroy(&mut self);
}

/// Builds one transport client per resource.
pub trait TransportFactory: Send + 'static {
    type Media: MediaElement;
    type Transport: Transport<Media = Self::Media>;

    /// Whether the platform can run the transport client at all.
    fn is_supported(&self) -> bool {
        true
    }

    /// Create a client that reports its events through `sink`.
    fn create(&self, config: &TransportConfig, sink: InputSink) -> PlayResult<Self::Transport>;
}
