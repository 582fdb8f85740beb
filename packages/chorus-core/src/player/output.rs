//! Player primitive abstraction.
//!
//! The host's audio pipeline implements [`AudioOutput`] and reports progress back
//! through a [`PlayerEventSink`]. Commands are synchronous; completion is not.

use tokio::sync::mpsc;

use crate::media::Resource;

/// Host audio output for one voice session.
///
/// Methods are called while the owning subscription holds its state lock, so they
/// must return promptly and must not call back into the subscription. Playback
/// progress is reported asynchronously through the [`PlayerEventSink`] handed to
/// the gateway at join time.
pub trait AudioOutput: Send + Sync {
    /// Starts playing a resource. The output owns it until playback ends.
    fn play(&self, resource: Resource);

    /// Pauses the current resource. Returns false if the output refused.
    fn pause(&self) -> bool;

    /// Resumes a paused resource. Returns false if the output refused.
    fn resume(&self) -> bool;

    /// Stops and releases the current resource, if any.
    fn stop(&self);
}

/// What happened to the track identified by [`PlayerEvent::track_id`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEventKind {
    /// Audio is flowing (first frame after buffering, or after resume).
    Playing,
    /// The resource reached its natural end.
    Finished,
    /// Decoding or transport failed mid-playback.
    Failed(String),
}

/// Playback progress reported by an [`AudioOutput`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerEvent {
    /// Id of the [`crate::media::MediaItem`] the event refers to.
    pub track_id: String,
    pub kind: PlayerEventKind,
}

/// Channel an output uses to report [`PlayerEvent`]s.
#[derive(Debug, Clone)]
pub struct PlayerEventSink {
    tx: mpsc::UnboundedSender<PlayerEvent>,
}

impl PlayerEventSink {
    /// Creates a sink and the receiver the subscription pumps.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PlayerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Reports an event. Events sent after the subscription is gone are dropped.
    pub fn send(&self, track_id: impl Into<String>, kind: PlayerEventKind) {
        let event = PlayerEvent {
            track_id: track_id.into(),
            kind,
        };
        if self.tx.send(event).is_err() {
            log::trace!("[Player] Event dropped, subscription is gone");
        }
    }

    pub fn playing(&self, track_id: impl Into<String>) {
        self.send(track_id, PlayerEventKind::Playing);
    }

    pub fn finished(&self, track_id: impl Into<String>) {
        self.send(track_id, PlayerEventKind::Finished);
    }

    pub fn failed(&self, track_id: impl Into<String>, error: impl Into<String>) {
        self.send(track_id, PlayerEventKind::Failed(error.into()));
    }
}
