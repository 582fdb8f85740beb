//! Transport primitive consumed by voice sessions.
//!
//! The host's real-time transport (a chat platform voice gateway, a WebRTC peer,
//! ...) implements [`VoiceGateway`] and [`VoiceConnection`] and reports every
//! connectivity change through the [`StateReporter`] it receives at join time.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use super::{ConnectionState, SessionKey};
use crate::error::SessionError;
use crate::player::{AudioOutput, PlayerEventSink};

/// Everything a gateway needs to open a session.
#[derive(Debug, Clone)]
pub struct JoinRequest {
    pub session_key: SessionKey,
    /// Host-specific id of the channel to join.
    pub channel_id: String,
    /// Where the transport reports connectivity changes.
    pub states: StateReporter,
    /// Where the audio output reports playback progress.
    pub player_events: PlayerEventSink,
}

/// Handles returned by a successful join.
pub struct VoiceLink {
    pub connection: Arc<dyn VoiceConnection>,
    pub output: Arc<dyn AudioOutput>,
}

/// Opens transport sessions.
#[async_trait]
pub trait VoiceGateway: Send + Sync {
    /// Joins a channel.
    ///
    /// Returns once the connection object exists; readiness is reported later
    /// through [`JoinRequest::states`].
    async fn join(&self, request: JoinRequest) -> Result<VoiceLink, SessionError>;
}

/// An open transport session.
#[async_trait]
pub trait VoiceConnection: Send + Sync {
    /// Requests a rejoin after a disconnect.
    ///
    /// On success the transport moves back to `Signalling` and reports it.
    /// An error counts as a failed attempt.
    async fn rejoin(&self) -> Result<(), SessionError>;

    /// Tears the transport session down. Best-effort and idempotent.
    fn destroy(&self);
}

/// Write side of a session's connectivity state.
///
/// Cloned freely; every clone writes the same state. Once `Destroyed` has been
/// reported, later reports are ignored.
#[derive(Debug, Clone)]
pub struct StateReporter {
    tx: Arc<watch::Sender<ConnectionState>>,
}

impl Default for StateReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl StateReporter {
    /// Creates a reporter in the `Signalling` state.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ConnectionState::Signalling);
        Self { tx: Arc::new(tx) }
    }

    /// Records a new state. Returns false if the session was already destroyed.
    ///
    /// Repeating the current state still notifies observers, so a second
    /// disconnect is seen as a second disconnect.
    pub fn report(&self, state: ConnectionState) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_destroyed() {
                return false;
            }
            *current = state;
            true
        })
    }

    /// Returns the latest reported state.
    pub fn current(&self) -> ConnectionState {
        *self.tx.borrow()
    }

    /// Returns a receiver that observes every subsequent report.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.tx.subscribe()
    }
}
