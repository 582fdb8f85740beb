//! Voice transport sessions.
//!
//! - [`transport`]: the gateway primitive consumed by the core and the
//!   [`StateReporter`] it uses to report connectivity changes
//! - [`session`]: the [`VoiceSession`] state machine and reconnection supervisor

pub mod session;
pub mod transport;

pub use session::VoiceSession;
pub use transport::{JoinRequest, StateReporter, VoiceConnection, VoiceGateway, VoiceLink};

use std::fmt;

use serde::Serialize;

use crate::error::SessionError;
use crate::protocol_constants::CHANNEL_MOVE_CLOSE_CODE;

/// Key identifying one subscription (typically a guild or room id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for SessionKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a transport session dropped to [`ConnectionState::Disconnected`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum DisconnectReason {
    /// The voice WebSocket closed with the given close code.
    WebSocketClose { code: u16 },
    /// The gateway adapter could not deliver the voice state update.
    AdapterUnavailable,
    /// The voice server endpoint was removed.
    EndpointRemoved,
    /// Disconnected on request.
    Manual,
}

impl DisconnectReason {
    /// Returns true if the close is consistent with the session being moved to
    /// another channel rather than dropped.
    #[must_use]
    pub fn is_channel_move(&self) -> bool {
        matches!(self, Self::WebSocketClose { code } if *code == CHANNEL_MOVE_CLOSE_CODE)
    }
}

/// Connectivity state of a voice session.
///
/// `Signalling -> Connecting -> Ready`; any non-terminal state may drop to
/// `Disconnected`; any state may move to `Destroyed`, which is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "camelCase")]
pub enum ConnectionState {
    Signalling,
    Connecting,
    Ready,
    Disconnected(DisconnectReason),
    Destroyed,
}

impl ConnectionState {
    /// Returns true for the states that arm a readiness timer.
    #[must_use]
    pub fn is_handshaking(&self) -> bool {
        matches!(self, Self::Signalling | Self::Connecting)
    }

    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        matches!(self, Self::Destroyed)
    }

    /// Returns the state as a short string identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Signalling => "signalling",
            Self::Connecting => "connecting",
            Self::Ready => "ready",
            Self::Disconnected(_) => "disconnected",
            Self::Destroyed => "destroyed",
        }
    }
}

/// Why a voice session was destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DestroyCause {
    /// A caller asked the session to leave.
    Left,
    /// The session did not become ready within the readiness window.
    ConnectionTimeout,
    /// A channel-move close did not recover in time.
    SessionRemoved,
    /// The rejoin ceiling was reached.
    RejoinExhausted,
    /// The transport reported destruction on its own.
    Transport,
    /// The process is shutting down.
    Shutdown,
}

impl DestroyCause {
    /// Maps session-fatal causes to their error; deliberate teardown has none.
    #[must_use]
    pub fn as_error(&self) -> Option<SessionError> {
        match self {
            Self::ConnectionTimeout => Some(SessionError::ConnectionTimeout),
            Self::SessionRemoved => Some(SessionError::SessionRemoved),
            Self::RejoinExhausted => Some(SessionError::RejoinExhausted),
            Self::Left | Self::Transport | Self::Shutdown => None,
        }
    }
}
