//! Keyed registry of subscriptions and the caller-facing entry points.
//!
//! Responsibilities:
//! - Join voice channels and register one subscription per session key
//! - Route queue and player commands to the right subscription
//! - Remove subscriptions when their voice session is destroyed
//! - Announce and tear down every session on shutdown
//!
//! Every command against a key without a subscription answers
//! [`SessionReply::NotActive`] instead of failing.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::notices::NoticeObserver;
use super::subscription::Subscription;
use crate::config::Config;
use crate::error::{ChorusResult, SessionError};
use crate::events::{EventEmitter, SessionEvent};
use crate::media::{MediaItem, MediaResolver};
use crate::player::PlayerEventSink;
use crate::queue::QueueSnapshot;
use crate::runtime::TokioSpawner;
use crate::utils::now_millis;
use crate::voice::{
    ConnectionState, DestroyCause, JoinRequest, SessionKey, StateReporter, VoiceGateway,
    VoiceSession,
};

/// Answer to a command addressed to a session key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "camelCase")]
pub enum SessionReply<T> {
    /// A subscription exists and produced this result.
    Active(T),
    /// No subscription is registered for the key.
    NotActive,
}

impl<T> SessionReply<T> {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }

    /// Returns the result if the session was active.
    pub fn active(self) -> Option<T> {
        match self {
            Self::Active(value) => Some(value),
            Self::NotActive => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> SessionReply<U> {
        match self {
            Self::Active(value) => SessionReply::Active(f(value)),
            Self::NotActive => SessionReply::NotActive,
        }
    }
}

impl<T> From<Option<T>> for SessionReply<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::NotActive, Self::Active)
    }
}

/// Result of enqueueing a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueuedBatch {
    /// Position of the first item of the batch.
    pub first_position: usize,
    pub count: usize,
}

/// Service owning every active subscription.
pub struct PlaybackCoordinator {
    gateway: Arc<dyn VoiceGateway>,
    resolver: Arc<dyn MediaResolver>,
    emitter: Arc<dyn EventEmitter>,
    spawner: TokioSpawner,
    config: Config,
    subscriptions: Arc<DashMap<SessionKey, Arc<Subscription>>>,
    /// Parent of every subscription's token.
    cancel: CancellationToken,
}

impl PlaybackCoordinator {
    pub fn new(
        gateway: Arc<dyn VoiceGateway>,
        resolver: Arc<dyn MediaResolver>,
        emitter: Arc<dyn EventEmitter>,
        spawner: TokioSpawner,
        config: Config,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            gateway,
            resolver,
            emitter,
            spawner,
            config,
            subscriptions: Arc::new(DashMap::new()),
            cancel,
        }
    }

    /// Returns the subscription registered for `key`.
    pub fn get(&self, key: &SessionKey) -> Option<Arc<Subscription>> {
        self.subscriptions
            .get(key)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Keys of every active subscription, sorted.
    pub fn active_sessions(&self) -> Vec<SessionKey> {
        let mut keys: Vec<_> = self
            .subscriptions
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn session_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn session_state(&self, key: &SessionKey) -> SessionReply<ConnectionState> {
        self.get(key).map(|sub| sub.session().state()).into()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Join / Leave
    // ─────────────────────────────────────────────────────────────────────────

    /// Joins `channel_id` for `key` and waits for the session to become ready.
    ///
    /// Returns the existing subscription if one is registered. If a concurrent
    /// join registered first, this join's connection is destroyed and the
    /// winner is returned.
    ///
    /// # Errors
    ///
    /// - `SessionError::JoinFailed` if the gateway refuses
    /// - `SessionError::ConnectionTimeout` if the session is not ready in time
    /// - the session-fatal error that destroyed the session while waiting
    pub async fn join(&self, key: SessionKey, channel_id: &str) -> ChorusResult<Arc<Subscription>> {
        if let Some(existing) = self.get(&key) {
            return Ok(existing);
        }

        let reporter = StateReporter::new();
        let (player_events, player_rx) = PlayerEventSink::channel();
        let link = self
            .gateway
            .join(JoinRequest {
                session_key: key.clone(),
                channel_id: channel_id.to_string(),
                states: reporter.clone(),
                player_events,
            })
            .await?;

        let subscription = match self.subscriptions.entry(key.clone()) {
            Entry::Occupied(entry) => {
                log::info!("[Coordinator] Concurrent join for {}, keeping the first", key);
                let winner = Arc::clone(entry.get());
                drop(entry);
                link.connection.destroy();
                return Ok(winner);
            }
            Entry::Vacant(entry) => {
                let cancel = self.cancel.child_token();
                let session = VoiceSession::new(
                    key.clone(),
                    link.connection,
                    reporter,
                    self.config.reconnect.clone(),
                    Arc::clone(&self.emitter),
                    cancel.clone(),
                );
                let subscription = Subscription::new(
                    key.clone(),
                    session,
                    link.output,
                    Arc::clone(&self.resolver),
                    self.spawner.clone(),
                    cancel,
                );
                // Hook first: a leave or shutdown can see the entry as soon as it lands.
                self.install_removal_hook(&subscription);
                entry.insert(Arc::clone(&subscription));
                subscription
            }
        };

        subscription.start(player_rx);
        subscription.session().start(&self.spawner);
        log::info!("[Coordinator] Joined {} (channel {})", key, channel_id);

        let session = subscription.session();
        let window = self.config.reconnect.ready_timeout();
        let settled = session
            .wait_for(window, |s| {
                matches!(s, ConnectionState::Ready | ConnectionState::Destroyed)
            })
            .await;

        match settled {
            Some(ConnectionState::Ready) => Ok(subscription),
            Some(_) => {
                let error = session
                    .destroy_cause()
                    .and_then(|cause| cause.as_error())
                    .unwrap_or(SessionError::ConnectionTimeout);
                Err(error.into())
            }
            None => {
                session.destroy(DestroyCause::ConnectionTimeout);
                Err(SessionError::ConnectionTimeout.into())
            }
        }
    }

    /// Tears `subscription` down and unregisters it when its session is destroyed.
    fn install_removal_hook(&self, subscription: &Arc<Subscription>) {
        let registry = Arc::clone(&self.subscriptions);
        let weak = Arc::downgrade(subscription);
        subscription.session().on_destroyed(move |cause| {
            let Some(subscription) = weak.upgrade() else {
                return;
            };
            subscription.teardown();
            let key = subscription.key();
            registry.remove_if(key, |_, registered| Arc::ptr_eq(registered, &subscription));
            log::info!("[Coordinator] Removed {} ({:?})", key, cause);
        });
    }

    /// Destroys `subscription`'s session and makes sure it is torn down and
    /// unregistered, whether or not the destroy hook ran.
    fn retire(&self, subscription: &Arc<Subscription>, cause: DestroyCause) {
        subscription.session().destroy(cause);
        subscription.teardown();
        self.subscriptions.remove_if(subscription.key(), |_, registered| {
            Arc::ptr_eq(registered, subscription)
        });
    }

    /// Destroys the session for `key` and removes its subscription.
    pub fn leave(&self, key: &SessionKey) -> SessionReply<()> {
        let Some(subscription) = self.get(key) else {
            return SessionReply::NotActive;
        };
        log::info!("[Coordinator] Leaving {}", key);
        self.retire(&subscription, DestroyCause::Left);
        SessionReply::Active(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queue commands
    // ─────────────────────────────────────────────────────────────────────────

    /// Enqueues a query with the default notice callbacks.
    ///
    /// Returns the zero-based position; 0 means playback starts right away.
    pub fn enqueue(
        &self,
        key: &SessionKey,
        query: &str,
        title: Option<&str>,
        image: Option<&str>,
    ) -> SessionReply<usize> {
        let Some(subscription) = self.get(key) else {
            return SessionReply::NotActive;
        };
        let item = MediaItem::new(query)
            .with_details(title, image)
            .with_observer(self.notice_observer(key));
        SessionReply::Active(subscription.enqueue(Arc::new(item)))
    }

    /// Enqueues an item carrying its own callbacks.
    pub fn enqueue_item(&self, key: &SessionKey, item: MediaItem) -> SessionReply<usize> {
        self.get(key)
            .map(|subscription| subscription.enqueue(Arc::new(item)))
            .into()
    }

    /// Enqueues an already-ordered batch, preserving its order.
    pub fn enqueue_all(&self, key: &SessionKey, items: Vec<MediaItem>) -> SessionReply<EnqueuedBatch> {
        let Some(subscription) = self.get(key) else {
            return SessionReply::NotActive;
        };
        let count = items.len();
        let items = items.into_iter().map(Arc::new).collect();
        let first_position = subscription.enqueue_all(items);
        SessionReply::Active(EnqueuedBatch {
            first_position,
            count,
        })
    }

    /// Skips `count` items, counting the current one first.
    pub fn skip(&self, key: &SessionKey, count: usize) -> SessionReply<usize> {
        self.get(key).map(|sub| sub.skip(count)).into()
    }

    /// Clears the current item and the queue, keeping the session connected.
    pub fn stop(&self, key: &SessionKey) -> SessionReply<usize> {
        self.get(key).map(|sub| sub.stop(false)).into()
    }

    pub fn pause(&self, key: &SessionKey) -> SessionReply<bool> {
        self.get(key).map(|sub| sub.pause()).into()
    }

    pub fn resume(&self, key: &SessionKey) -> SessionReply<bool> {
        self.get(key).map(|sub| sub.resume()).into()
    }

    /// Current title and up to the configured number of pending titles.
    pub fn queue_snapshot(&self, key: &SessionKey) -> SessionReply<QueueSnapshot> {
        let limit = self.config.queue_snapshot_limit;
        self.get(key).map(|sub| sub.snapshot(limit)).into()
    }

    /// Builds the default callbacks for items enqueued on `key`.
    pub fn notice_observer(&self, key: &SessionKey) -> Arc<NoticeObserver> {
        Arc::new(NoticeObserver::new(
            key.clone(),
            Arc::clone(&self.emitter),
            self.config.finished_notice_ttl(),
        ))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Shutdown
    // ─────────────────────────────────────────────────────────────────────────

    /// Announces `notice` once per active session, then tears every session down.
    ///
    /// Returns the number of sessions torn down.
    pub fn shutdown(&self, notice: &str) -> usize {
        let subscriptions: Vec<_> = self
            .subscriptions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        for subscription in &subscriptions {
            self.emitter.emit_session(SessionEvent::ShutdownNotice {
                session_key: subscription.key().clone(),
                message: notice.to_string(),
                timestamp: now_millis(),
            });
            self.retire(subscription, DestroyCause::Shutdown);
        }

        if !subscriptions.is_empty() {
            log::info!(
                "[Coordinator] Shut down {} session(s)",
                subscriptions.len()
            );
        }
        subscriptions.len()
    }
}
