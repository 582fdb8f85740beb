//! One session key's playback: a voice session, a player and a queue.
//!
//! All mutable state sits behind a single mutex that is never held across an
//! await. Lifecycle callbacks and drains triggered by a transition are collected
//! under the lock and run after it is released.
//!
//! Drain protocol:
//! 1. Under the lock, take the head item if the queue lock is free, the player
//!    is idle and the queue is not empty; mark the lock as draining with a fresh
//!    cancellation token.
//! 2. Resolve outside the lock.
//! 3. Back under the lock, a cancelled token means the item was dropped by a
//!    stop or teardown: release the resource, leave the lock alone, do not
//!    drain again. Otherwise hand the resource to the player and free the lock.
//!    A failed resolution fires `on_error` and drains the next item.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::media::{MediaItem, MediaResolver};
use crate::player::{AudioOutput, AudioPlayer, PlayerEvent, PlayerState, PlayerTransition};
use crate::queue::{PlaybackQueue, QueueSnapshot};
use crate::runtime::{TaskSpawner, TokioSpawner};
use crate::voice::{SessionKey, VoiceSession};

/// Mutual exclusion for queue draining.
#[derive(Debug)]
enum QueueLock {
    Free,
    /// A resolution is in flight for `item`.
    Draining {
        item: Arc<MediaItem>,
        token: CancellationToken,
    },
    /// Permanently locked by a forced stop.
    Sealed,
}

struct SubscriptionState {
    queue: PlaybackQueue,
    player: AudioPlayer,
    lock: QueueLock,
}

impl SubscriptionState {
    /// True if an item is in the player or being resolved for it.
    fn has_current(&self) -> bool {
        self.player.state() != PlayerState::Idle
            || matches!(self.lock, QueueLock::Draining { .. })
    }

    /// Drops the current item, if any.
    ///
    /// Returns the transition for a stopped player, or the cancelled item whose
    /// resolution was in flight.
    fn drop_current(&mut self) -> Option<Dropped> {
        if let Some(transition) = self.player.stop() {
            return Some(Dropped::Stopped(transition));
        }
        match std::mem::replace(&mut self.lock, QueueLock::Free) {
            QueueLock::Draining { item, token } => {
                token.cancel();
                Some(Dropped::Cancelled(item))
            }
            other => {
                self.lock = other;
                None
            }
        }
    }
}

/// An item removed by skip or stop.
enum Dropped {
    Stopped(PlayerTransition),
    Cancelled(Arc<MediaItem>),
}

/// Effects collected under the lock, applied after it is released.
#[derive(Default)]
struct Effects {
    transition: Option<PlayerTransition>,
    cancelled: Vec<Arc<MediaItem>>,
    removed: usize,
}

impl Effects {
    fn record(&mut self, dropped: Dropped) {
        self.removed += 1;
        match dropped {
            Dropped::Stopped(transition) => self.transition = Some(transition),
            Dropped::Cancelled(item) => self.cancelled.push(item),
        }
    }

    fn cancel_items(&mut self, items: Vec<Arc<MediaItem>>) {
        self.removed += items.len();
        self.cancelled.extend(items);
    }

    /// Fires callbacks. Dropped items that never started get none.
    fn apply(self) -> usize {
        for item in &self.cancelled {
            item.cancel();
        }
        if let Some(transition) = self.transition {
            fire(transition);
        }
        self.removed
    }
}

/// Runs the lifecycle callback for a player transition.
fn fire(transition: PlayerTransition) {
    match transition {
        PlayerTransition::Started(item) => {
            log::info!("[Subscription] Now playing '{}'", item.display_title());
            item.notify_start();
        }
        PlayerTransition::Ended(item) => {
            item.notify_finish();
        }
        PlayerTransition::Failed(item, error) => {
            log::warn!(
                "[Subscription] Playback of '{}' failed: {}",
                item.display_title(),
                error
            );
            item.notify_error(&error);
        }
    }
}

/// Binds one voice session, one player and one queue under a session key.
pub struct Subscription {
    key: SessionKey,
    session: Arc<VoiceSession>,
    resolver: Arc<dyn MediaResolver>,
    spawner: TokioSpawner,
    state: Mutex<SubscriptionState>,
    /// Parent of every drain token; cancelled on teardown.
    cancel: CancellationToken,
}

impl Subscription {
    pub fn new(
        key: SessionKey,
        session: Arc<VoiceSession>,
        output: Arc<dyn AudioOutput>,
        resolver: Arc<dyn MediaResolver>,
        spawner: TokioSpawner,
        cancel: CancellationToken,
    ) -> Arc<Self> {
        Arc::new(Self {
            key,
            session,
            resolver,
            spawner,
            state: Mutex::new(SubscriptionState {
                queue: PlaybackQueue::new(),
                player: AudioPlayer::new(output),
                lock: QueueLock::Free,
            }),
            cancel,
        })
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    pub fn session(&self) -> &Arc<VoiceSession> {
        &self.session
    }

    pub fn player_state(&self) -> PlayerState {
        self.state.lock().player.state()
    }

    /// True once a forced stop has permanently blocked draining.
    pub fn is_sealed(&self) -> bool {
        matches!(self.state.lock().lock, QueueLock::Sealed)
    }

    /// Starts pumping player events until the subscription is torn down.
    pub fn start(self: &Arc<Self>, mut events: mpsc::UnboundedReceiver<PlayerEvent>) {
        let subscription = Arc::clone(self);
        self.spawner.spawn(async move {
            loop {
                tokio::select! {
                    _ = subscription.cancel.cancelled() => break,
                    event = events.recv() => match event {
                        Some(event) => subscription.handle_player_event(event),
                        None => break,
                    },
                }
            }
            log::debug!("[Subscription] Player event pump for {} stopped", subscription.key);
        });
    }

    /// Applies a player event, firing callbacks and draining as needed.
    pub fn handle_player_event(self: &Arc<Self>, event: PlayerEvent) {
        let transition = self.state.lock().player.handle_event(event);
        let Some(transition) = transition else {
            return;
        };
        let advance = !matches!(transition, PlayerTransition::Started(_));
        fire(transition);
        if advance {
            self.drain();
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queue operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Appends an item and starts draining.
    ///
    /// Returns the item's position: 0 if nothing was playing or resolving and
    /// the queue was empty, otherwise the number of items ahead of it.
    pub fn enqueue(self: &Arc<Self>, item: Arc<MediaItem>) -> usize {
        let position = {
            let mut state = self.state.lock();
            let ahead = usize::from(state.has_current());
            state.queue.push_back(item) + ahead
        };
        self.drain();
        position
    }

    /// Appends a batch in the given order. Returns the first item's position.
    pub fn enqueue_all(self: &Arc<Self>, items: Vec<Arc<MediaItem>>) -> usize {
        let position = {
            let mut state = self.state.lock();
            let position = state.queue.len() + usize::from(state.has_current());
            for item in items {
                state.queue.push_back(item);
            }
            position
        };
        self.drain();
        position
    }

    /// Drops the first `count` available items (current first, then pending).
    ///
    /// Returns how many were dropped. Draining continues with what remains.
    pub fn skip(self: &Arc<Self>, count: usize) -> usize {
        if count == 0 {
            return 0;
        }
        let effects = {
            let mut state = self.state.lock();
            let mut effects = Effects::default();
            if let Some(dropped) = state.drop_current() {
                effects.record(dropped);
            }
            let pending = state.queue.drain_front(count - effects.removed);
            effects.cancel_items(pending);
            effects
        };
        let removed = effects.apply();
        log::info!("[Subscription] Skipped {} item(s) on {}", removed, self.key);
        self.drain();
        removed
    }

    /// Clears the current item and the queue. Returns how many were removed.
    ///
    /// With `force` the queue lock is sealed so nothing drains again.
    pub fn stop(&self, force: bool) -> usize {
        let effects = {
            let mut state = self.state.lock();
            let mut effects = Effects::default();
            if let Some(dropped) = state.drop_current() {
                effects.record(dropped);
            }
            let pending = state.queue.clear();
            effects.cancel_items(pending);
            if force {
                state.lock = QueueLock::Sealed;
            }
            effects
        };
        let removed = effects.apply();
        log::info!(
            "[Subscription] Stopped {} ({} item(s) removed{})",
            self.key,
            removed,
            if force { ", sealed" } else { "" }
        );
        removed
    }

    pub fn pause(&self) -> bool {
        self.state.lock().player.pause()
    }

    pub fn resume(&self) -> bool {
        self.state.lock().player.resume()
    }

    /// Current item and up to `limit` pending titles.
    pub fn snapshot(&self, limit: usize) -> QueueSnapshot {
        let state = self.state.lock();
        let now_playing = state
            .player
            .current()
            .map(|item| item.display_title())
            .or_else(|| match &state.lock {
                QueueLock::Draining { item, .. } => Some(item.display_title()),
                _ => None,
            });
        QueueSnapshot {
            now_playing,
            upcoming: state.queue.titles(limit),
            total_pending: state.queue.len(),
        }
    }

    /// Force-stops and cancels all background work. Idempotent.
    pub fn teardown(&self) {
        self.stop(true);
        self.cancel.cancel();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Drain
    // ─────────────────────────────────────────────────────────────────────────

    /// Starts resolving the head item if nothing else is in progress.
    fn drain(self: &Arc<Self>) {
        let (item, token) = {
            let mut state = self.state.lock();
            if !matches!(state.lock, QueueLock::Free) {
                log::debug!("[Subscription] Drain skipped on {}: queue locked", self.key);
                return;
            }
            if state.player.state() != PlayerState::Idle {
                return;
            }
            let Some(item) = state.queue.pop_front() else {
                return;
            };
            let token = self.cancel.child_token();
            state.lock = QueueLock::Draining {
                item: Arc::clone(&item),
                token: token.clone(),
            };
            (item, token)
        };

        let subscription = Arc::clone(self);
        self.spawner.spawn(async move {
            subscription.resolve_head(item, token).await;
        });
    }

    async fn resolve_head(self: Arc<Self>, item: Arc<MediaItem>, token: CancellationToken) {
        let resolved = self.resolver.resolve(&item).await;

        match resolved {
            Ok(resource) => {
                let rejected = {
                    let mut state = self.state.lock();
                    if token.is_cancelled() {
                        Some(resource)
                    } else {
                        state.lock = QueueLock::Free;
                        state.player.play(resource).err()
                    }
                };
                if let Some(resource) = rejected {
                    log::debug!(
                        "[Subscription] Releasing '{}' on {}: no longer wanted",
                        item.display_title(),
                        self.key
                    );
                    resource.release();
                }
            }
            Err(e) => {
                if token.is_cancelled() {
                    return;
                }
                log::warn!(
                    "[Subscription] Could not resolve '{}': {}",
                    item.display_title(),
                    e
                );
                item.notify_error(&e);
                {
                    let mut state = self.state.lock();
                    if token.is_cancelled() {
                        return;
                    }
                    state.lock = QueueLock::Free;
                }
                self.drain();
            }
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("session", &self.session.state())
            .field("player", &self.player_state())
            .finish_non_exhaustive()
    }
}
