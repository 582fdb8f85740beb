//! Chorus Core - queued media playback over resilient voice sessions.
//!
//! This crate drives ordered playback of externally resolved media over a
//! real-time voice transport. Hosts (chat bots, desktop apps) supply the
//! transport, the audio output and the search/metadata services; the core owns
//! the queue, the player state machine and the reconnection policy.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`media`]: Media items, lifecycle callbacks and resource resolution
//! - [`player`]: Audio player state machine and the output abstraction
//! - [`queue`]: FIFO queue of pending items
//! - [`voice`]: Voice session state machine and reconnection supervisor
//! - [`services`]: Subscriptions and the keyed playback coordinator
//! - [`events`]: Notification channel for playback and session events
//! - [`config`]: Runtime configuration
//! - [`bootstrap`]: Composition root
//! - [`error`]: Centralized error types
//!
//! # Abstraction Traits
//!
//! The crate defines several traits to decouple core logic from the host:
//!
//! - [`VoiceGateway`](voice::VoiceGateway) / [`VoiceConnection`](voice::VoiceConnection): transport sessions
//! - [`AudioOutput`](player::AudioOutput): the player primitive
//! - [`MediaResolver`](media::MediaResolver): query to playable resource
//! - [`SearchProvider`](media::SearchProvider) / [`MetadataProvider`](media::MetadataProvider) /
//!   [`StreamSource`](media::StreamSource): collaborators of the built-in resolver
//! - [`EventEmitter`](events::EventEmitter): emitting notifications
//! - [`TaskSpawner`](runtime::TaskSpawner): spawning background tasks

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod events;
pub mod media;
pub mod player;
pub mod protocol_constants;
pub mod queue;
pub mod runtime;
pub mod services;
pub mod utils;
pub mod voice;

#[cfg(test)]
mod test_fixtures;

// Re-export commonly used types at the crate root
pub use config::{Config, ReconnectConfig};
pub use error::{ChorusError, ChorusResult, ErrorCode, ItemError, SessionError, StreamError};
pub use events::{
    BroadcastEvent, BroadcastEventBridge, EventEmitter, LoggingEventEmitter, NoopEventEmitter,
    PlaybackEvent, SessionEvent,
};
pub use runtime::{TaskSpawner, TokioSpawner};
pub use utils::now_millis;

// Re-export media types
pub use media::{
    MediaItem, MediaObserver, MediaResolver, MetadataProvider, Resource, SearchProvider,
    SourceResolver, StreamSource,
};

// Re-export player and queue types
pub use player::{AudioOutput, PlayerEvent, PlayerEventKind, PlayerEventSink, PlayerState};
pub use queue::QueueSnapshot;

// Re-export voice types
pub use voice::{
    ConnectionState, DestroyCause, DisconnectReason, JoinRequest, SessionKey, StateReporter,
    VoiceConnection, VoiceGateway, VoiceLink,
};

// Re-export service types
pub use services::{EnqueuedBatch, PlaybackCoordinator, SessionReply, Subscription};

// Re-export bootstrap types
pub use bootstrap::{bootstrap_services, bootstrap_with_providers, BootstrappedServices};
