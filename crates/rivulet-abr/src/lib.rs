//! Adaptive Bitrate (ABR) and buffer-health logic for segmented video playback.
//!
//! This crate is transport-agnostic: it consumes fragment telemetry and
//! buffered time ranges, and answers which rendition the player should be on.
//!
//! ## Components
//!
//! - [`QualityLadder`]: renditions of the current resource, best first
//! - [`Estimator`]: bandwidth estimate from fragment fetch telemetry
//! - [`BufferMonitor`]: buffer health and the buffering flag
//! - [`AbrController`]: Auto/Manual mode state machine and switch rules
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//!
//! use rivulet_abr::{AbrController, AbrOptions, BandwidthSample, ManifestLevel, QualityLadder};
//! use web_time::Instant;
//!
//! let ladder = QualityLadder::from_levels(&[
//!     ManifestLevel::new(1920, 1080, 5_000_000),
//!     ManifestLevel::new(1280, 720, 2_500_000),
//!     ManifestLevel::new(854, 480, 1_000_000),
//! ]);
//!
//! let mut controller = AbrController::new(AbrOptions::default().with_initial_level(0));
//! controller.set_ladder(ladder);
//!
//! let now = Instant::now();
//! controller.push_fragment(BandwidthSample::new(250_000, Duration::from_secs(1), now));
//!
//! let decision = controller.decide(now);
//! assert_eq!(decision.target_index, Some(2));
//! ```

#![forbid(unsafe_code)]

mod buffer;
mod controller;
mod estimator;
mod ladder;
mod types;

pub use buffer::{BufferMonitor, BufferSignal, TimeRange, health_percent};
pub use controller::{AbrController, AbrDecision, AbrReason, Degraded, DefaultAbrController};
pub use estimator::{AnyEstimator, Estimator, EwmaEstimator, LastSampleEstimator};
pub use ladder::{AUTO_LABEL, LadderEntry, QualityLadder, Rendition};
pub use types::{
    AbrOptions, AutoAuthority, BandwidthSample, DegradedReason, EstimatorKind, ManifestLevel,
    PlaybackMode, QualitySelection,
};
