#![forbid(unsafe_code)]

//! Playback session control for adaptive HLS streaming.
//!
//! [`PlaybackSession`] wires a segmented-transport client ([`Transport`])
//! and a [`MediaElement`] to the ABR engine from `rivulet-abr`, and reports
//! status, notifications and telemetry through a `rivulet-events` bus.
//! [`Player`] runs a session on the tokio runtime.

mod config;
mod error;
mod input;
mod media;
mod player;
mod scheduler;
mod session;
mod snapshot;
mod status;
mod transport;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use config::{SessionConfig, TransportConfig};
pub use error::{PlayError, PlayResult};
pub use input::{Envelope, InputReceiver, InputSender, InputSink, SessionEpoch, SessionInput};
pub use media::{MediaElement, MediaEvent};
pub use player::Player;
pub use scheduler::{Scheduler, TokioScheduler};
pub use session::{CANNOT_PLAY_MESSAGE, PlaybackSession};
pub use snapshot::{NetworkStatus, Snapshot};
pub use status::{PlaybackPhase, resolve as resolve_status};
pub use transport::{Transport, TransportErrorKind, TransportEvent, TransportFactory};
