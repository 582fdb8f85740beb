//! Application services layer.
//!
//! This module contains the services that bind voice sessions, players and
//! queues together and expose them to callers.

pub mod notices;
pub mod playback_coordinator;
pub mod subscription;

pub use notices::NoticeObserver;
pub use playback_coordinator::{EnqueuedBatch, PlaybackCoordinator, SessionReply};
pub use subscription::Subscription;
