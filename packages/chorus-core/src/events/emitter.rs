//! Event emitter abstraction for decoupling services from transport.
//!
//! Services depend on the [`EventEmitter`] trait rather than concrete broadcast
//! channels, enabling testing and alternative transport implementations.

use super::{PlaybackEvent, SessionEvent};

/// Trait for emitting domain events without knowledge of transport.
///
/// Implementations must not block and must not call back into the emitting
/// service; events may be emitted while a subscription is mid-transition.
pub trait EventEmitter: Send + Sync {
    /// Emits a playback notice (now playing, previously played, failure).
    fn emit_playback(&self, event: PlaybackEvent);

    /// Emits a voice session lifecycle event.
    fn emit_session(&self, event: SessionEvent);
}

/// No-op emitter for tests or hosts that ignore notifications.
pub struct NoopEventEmitter;

impl EventEmitter for NoopEventEmitter {
    fn emit_playback(&self, _event: PlaybackEvent) {}

    fn emit_session(&self, _event: SessionEvent) {}
}

/// Logging emitter for debugging and development.
///
/// Logs all events at debug level.
pub struct LoggingEventEmitter;

impl EventEmitter for LoggingEventEmitter {
    fn emit_playback(&self, event: PlaybackEvent) {
        tracing::debug!(?event, "playback_event");
    }

    fn emit_session(&self, event: SessionEvent) {
        tracing::debug!(?event, "session_event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::{ConnectionState, SessionKey};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Test emitter that counts events.
    struct CountingEventEmitter {
        playback_count: AtomicUsize,
        session_count: AtomicUsize,
    }

    impl CountingEventEmitter {
        fn new() -> Self {
            Self {
                playback_count: AtomicUsize::new(0),
                session_count: AtomicUsize::new(0),
            }
        }
    }

    impl EventEmitter for CountingEventEmitter {
        fn emit_playback(&self, _event: PlaybackEvent) {
            self.playback_count.fetch_add(1, Ordering::SeqCst);
        }

        fn emit_session(&self, _event: SessionEvent) {
            self.session_count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn counting_emitter_tracks_events() {
        let emitter = Arc::new(CountingEventEmitter::new());
        let key = SessionKey::from("guild-1");

        emitter.emit_playback(PlaybackEvent::NoticeCleared {
            session_key: key.clone(),
            item_id: "a".into(),
            timestamp: 0,
        });
        emitter.emit_session(SessionEvent::StateChanged {
            session_key: key.clone(),
            state: ConnectionState::Ready,
            timestamp: 0,
        });
        emitter.emit_session(SessionEvent::StateChanged {
            session_key: key,
            state: ConnectionState::Destroyed,
            timestamp: 0,
        });

        assert_eq!(emitter.playback_count.load(Ordering::SeqCst), 1);
        assert_eq!(emitter.session_count.load(Ordering::SeqCst), 2);
    }
}
