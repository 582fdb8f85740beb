//! Audio player state machine.
//!
//! ```text
//!  Idle ──play──▶ Buffering ──Playing──▶ Playing ◀──resume/pause──▶ Paused
//!   ▲                │                      │                          │
//!   └──── Finished / Failed / stop ─────────┴──────────────────────────┘
//! ```
//!
//! [`AudioPlayer`] is a plain state machine: it is not internally locked and is
//! owned by a subscription's state. Transitions that need lifecycle callbacks or
//! a queue drain are returned as [`PlayerTransition`]s so the caller can act on
//! them after releasing its lock.

mod output;

pub use output::{AudioOutput, PlayerEvent, PlayerEventKind, PlayerEventSink};

use std::sync::Arc;

use serde::Serialize;

use crate::error::ItemError;
use crate::media::{MediaItem, Resource};

/// State of the playback slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PlayerState {
    #[default]
    Idle,
    Buffering,
    Playing,
    Paused,
}

/// Side effects produced by a player transition.
#[derive(Debug)]
pub enum PlayerTransition {
    /// The item entered active playback: fire `on_start`.
    Started(Arc<MediaItem>),
    /// The item left the player without error: fire `on_finish`, then drain.
    Ended(Arc<MediaItem>),
    /// The item failed mid-playback: fire `on_error`, then drain.
    Failed(Arc<MediaItem>, ItemError),
}

/// Holds at most one active resource and tracks its playback state.
pub struct AudioPlayer {
    output: Arc<dyn AudioOutput>,
    state: PlayerState,
    current: Option<Arc<MediaItem>>,
}

impl AudioPlayer {
    pub fn new(output: Arc<dyn AudioOutput>) -> Self {
        Self {
            output,
            state: PlayerState::Idle,
            current: None,
        }
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    /// The item currently occupying the slot.
    pub fn current(&self) -> Option<&Arc<MediaItem>> {
        self.current.as_ref()
    }

    /// Assigns a resource to an idle player and moves to Buffering.
    ///
    /// # Errors
    ///
    /// Returns the resource unchanged if the player is not idle.
    pub fn play(&mut self, resource: Resource) -> Result<(), Resource> {
        if self.state != PlayerState::Idle {
            return Err(resource);
        }
        self.current = Some(Arc::clone(resource.item()));
        self.state = PlayerState::Buffering;
        self.output.play(resource);
        Ok(())
    }

    /// Pauses active playback. Returns whether the state changed.
    pub fn pause(&mut self) -> bool {
        if self.state != PlayerState::Playing || !self.output.pause() {
            return false;
        }
        self.state = PlayerState::Paused;
        true
    }

    /// Resumes paused playback. Returns whether the state changed.
    pub fn resume(&mut self) -> bool {
        if self.state != PlayerState::Paused || !self.output.resume() {
            return false;
        }
        self.state = PlayerState::Playing;
        true
    }

    /// Stops whatever is in the slot and returns to Idle.
    pub fn stop(&mut self) -> Option<PlayerTransition> {
        if self.state == PlayerState::Idle {
            return None;
        }
        self.output.stop();
        self.state = PlayerState::Idle;
        self.current.take().map(PlayerTransition::Ended)
    }

    /// Applies an event reported by the output.
    ///
    /// Events for any track other than the current one are stale and ignored.
    pub fn handle_event(&mut self, event: PlayerEvent) -> Option<PlayerTransition> {
        let current = self.current.as_ref()?;
        if current.id() != event.track_id {
            log::debug!(
                "[Player] Ignoring stale {:?} for track {}",
                event.kind,
                event.track_id
            );
            return None;
        }

        match (self.state, event.kind) {
            (PlayerState::Buffering, PlayerEventKind::Playing) => {
                self.state = PlayerState::Playing;
                Some(PlayerTransition::Started(Arc::clone(current)))
            }
            (PlayerState::Paused, PlayerEventKind::Playing) => {
                self.state = PlayerState::Playing;
                None
            }
            (PlayerState::Idle, _) | (PlayerState::Playing, PlayerEventKind::Playing) => None,
            (_, PlayerEventKind::Finished) => {
                self.state = PlayerState::Idle;
                self.current.take().map(PlayerTransition::Ended)
            }
            (_, PlayerEventKind::Failed(message)) => {
                self.state = PlayerState::Idle;
                self.current
                    .take()
                    .map(|item| PlayerTransition::Failed(item, ItemError::Playback(message)))
            }
        }
    }
}
