use std::time::Duration;

use rivulet_abr::{AbrOptions, QualitySelection};
use serde::{Deserialize, Serialize};

/// Tuning handed to the transport client when it is constructed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Max time a fragment may take before the loader gives up on it.
    pub max_loading_delay: Duration,
    /// Forward buffer the transport tries to keep.
    pub max_buffer_length: Duration,
    /// Forward buffer cap in bytes.
    pub max_buffer_size: u64,
    /// Largest gap in buffered media the transport will jump over.
    pub max_buffer_hole: Duration,
    /// Demux off the main thread when the platform allows it.
    pub enable_worker: bool,
    /// Start fetching the first fragment before media is attached.
    pub start_frag_prefetch: bool,
    /// Never pick a rendition taller than the element.
    pub cap_level_to_player_size: bool,
    /// Level the transport fetches first, before any ABR command arrives.
    pub start_level: QualitySelection,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_loading_delay: Duration::from_secs(4),
            max_buffer_length: Duration::from_secs(30),
            max_buffer_size: 60 * 1000 * 1000,
            max_buffer_hole: Duration::from_millis(500),
            enable_worker: true,
            start_frag_prefetch: true,
            cap_level_to_player_size: true,
            start_level: QualitySelection::Auto,
        }
    }
}

/// Configuration for a playback session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// ABR policy.
    pub abr: AbrOptions,
    /// Request playback as soon as the manifest is parsed.
    pub autoplay: bool,
    /// Capacity of the events broadcast channel.
    pub events_channel_capacity: usize,
    /// Transport client tuning.
    pub transport: TransportConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            abr: AbrOptions::default(),
            autoplay: false,
            events_channel_capacity: 64,
            transport: TransportConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Set ABR options.
    #[must_use]
    pub fn with_abr(mut self, abr: AbrOptions) -> Self {
        self.abr = abr;
        self
    }

    /// Enable or disable autoplay.
    #[must_use]
    pub fn with_autoplay(mut self, autoplay: bool) -> Self {
        self.autoplay = autoplay;
        self
    }

    /// Set transport tuning.
    #[must_use]
    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }
}
