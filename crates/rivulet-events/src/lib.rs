#![forbid(unsafe_code)]

//! Event bus and UI-facing events for the rivulet player.

mod abr;
mod bus;
mod event;
mod player;
mod status;

pub use abr::AbrEvent;
pub use bus::EventBus;
pub use event::Event;
pub use player::{Notification, PlayerEvent, Severity};
pub use status::{PlaybackFailure, PlayerStatus};
