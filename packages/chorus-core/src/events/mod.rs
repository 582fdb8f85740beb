//! Notification channel.
//!
//! This module provides:
//! - [`EventEmitter`] trait for domain services to emit events
//! - [`BroadcastEventBridge`] for fan-out to any number of subscribers
//! - Event types for playback notices and session lifecycle
//!
//! Rendering the notices (chat messages, UI toasts) is the host's job; the core
//! only says what happened and for how long a notice should stay visible.

mod bridge;
mod emitter;

pub use bridge::BroadcastEventBridge;
pub use emitter::{EventEmitter, LoggingEventEmitter, NoopEventEmitter};

use serde::Serialize;

use crate::voice::{ConnectionState, DestroyCause, SessionKey};

/// Events broadcast to notification consumers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "category", rename_all = "camelCase")]
pub enum BroadcastEvent {
    /// Media item lifecycle notices.
    Playback(PlaybackEvent),

    /// Voice session lifecycle.
    Session(SessionEvent),
}

/// Notices driven by media item lifecycle callbacks.
///
/// Notices are keyed by `item_id`: a later notice for the same item replaces
/// the earlier one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum PlaybackEvent {
    /// An item started playing.
    NowPlaying {
        session_key: SessionKey,
        item_id: String,
        title: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        image: Option<String>,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// An item finished. The notice should disappear after `expires_after_ms`.
    PreviouslyPlayed {
        session_key: SessionKey,
        item_id: String,
        title: String,
        expires_after_ms: u64,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// Any pending notice for the item should be removed.
    NoticeCleared {
        session_key: SessionKey,
        item_id: String,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// An item failed to resolve or play.
    PlaybackFailed {
        session_key: SessionKey,
        item_id: String,
        title: String,
        /// Machine-readable error code.
        code: String,
        /// Human-readable error message.
        error: String,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
}

/// Voice session lifecycle events.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SessionEvent {
    /// The connection changed state.
    StateChanged {
        session_key: SessionKey,
        state: ConnectionState,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// A rejoin was scheduled.
    Rejoining {
        session_key: SessionKey,
        /// One-based attempt number.
        attempt: u32,
        delay_ms: u64,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// The session was destroyed and its subscription torn down.
    Destroyed {
        session_key: SessionKey,
        cause: DestroyCause,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// One-shot notice announced before a process shutdown tears the session down.
    ShutdownNotice {
        session_key: SessionKey,
        message: String,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
}

impl PlaybackEvent {
    /// Returns the session this notice belongs to.
    #[must_use]
    pub fn session_key(&self) -> &SessionKey {
        match self {
            Self::NowPlaying { session_key, .. }
            | Self::PreviouslyPlayed { session_key, .. }
            | Self::NoticeCleared { session_key, .. }
            | Self::PlaybackFailed { session_key, .. } => session_key,
        }
    }
}

impl From<PlaybackEvent> for BroadcastEvent {
    fn from(event: PlaybackEvent) -> Self {
        BroadcastEvent::Playback(event)
    }
}

impl From<SessionEvent> for BroadcastEvent {
    fn from(event: SessionEvent) -> Self {
        BroadcastEvent::Session(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playback_event_serializes_camel_case() {
        let event = BroadcastEvent::from(PlaybackEvent::PreviouslyPlayed {
            session_key: SessionKey::from("guild-1"),
            item_id: "item-1".into(),
            title: "Song".into(),
            expires_after_ms: 15_000,
            timestamp: 1,
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["category"], "playback");
        assert_eq!(json["type"], "previouslyPlayed");
        assert_eq!(json["sessionKey"], "guild-1");
        assert_eq!(json["expiresAfterMs"], 15_000);
    }

    #[test]
    fn now_playing_omits_missing_image() {
        let event = PlaybackEvent::NowPlaying {
            session_key: SessionKey::from("guild-1"),
            item_id: "item-1".into(),
            title: "Song".into(),
            image: None,
            timestamp: 1,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("image").is_none());
    }
}
