//! Voice session state machine and reconnection supervisor.
//!
//! A [`VoiceSession`] watches the state its transport reports and reacts to
//! each transition:
//!
//! - `Signalling`/`Connecting`: arm a readiness timer (at most one at a time).
//!   If the session is not `Ready` within the window it is destroyed.
//! - `Ready`: reset the rejoin counter.
//! - `Disconnected`: a channel-move close gets a short window to start
//!   connecting again; anything else is rejoined with linear backoff until the
//!   attempt ceiling is reached. A state change during the backoff cancels the
//!   pending rejoin and is handled like any other transition.
//! - `Destroyed`: tear down exactly once and run the destroy hook.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::transport::{StateReporter, VoiceConnection};
use super::{ConnectionState, DestroyCause, DisconnectReason, SessionKey};
use crate::config::ReconnectConfig;
use crate::events::{EventEmitter, SessionEvent};
use crate::runtime::{TaskSpawner, TokioSpawner};
use crate::utils::now_millis;

type DestroyHook = Box<dyn FnOnce(DestroyCause) + Send>;

/// What the supervisor does after handling a disconnect.
enum DisconnectOutcome {
    /// Re-evaluate the current state immediately.
    Recheck,
    /// A rejoin was requested; wait for the transport to report progress.
    Rejoined,
    /// The transport moved on by itself; handle the new state as a fresh one.
    Changed,
    Destroy(DestroyCause),
    Cancelled,
}

/// Clears the readiness flag when the timer task exits, however it exits.
struct ReadyLockGuard<'a>(&'a AtomicBool);

impl Drop for ReadyLockGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Connectivity supervisor for one transport session.
pub struct VoiceSession {
    key: SessionKey,
    connection: Arc<dyn VoiceConnection>,
    reporter: StateReporter,
    policy: ReconnectConfig,
    emitter: Arc<dyn EventEmitter>,
    rejoin_attempts: AtomicU32,
    /// Set while a readiness timer is armed.
    ready_lock: AtomicBool,
    destroyed: AtomicBool,
    cause: Mutex<Option<DestroyCause>>,
    on_destroyed: Mutex<Option<DestroyHook>>,
    cancel: CancellationToken,
}

impl VoiceSession {
    /// Creates a session around an open connection.
    ///
    /// `cancel` stops the supervisor and any armed timer; it is cancelled when
    /// the session is destroyed.
    pub fn new(
        key: SessionKey,
        connection: Arc<dyn VoiceConnection>,
        reporter: StateReporter,
        policy: ReconnectConfig,
        emitter: Arc<dyn EventEmitter>,
        cancel: CancellationToken,
    ) -> Arc<Self> {
        Arc::new(Self {
            key,
            connection,
            reporter,
            policy,
            emitter,
            rejoin_attempts: AtomicU32::new(0),
            ready_lock: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
            cause: Mutex::new(None),
            on_destroyed: Mutex::new(None),
            cancel,
        })
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    /// Latest state reported by the transport.
    pub fn state(&self) -> ConnectionState {
        self.reporter.current()
    }

    /// Rejoin requests made since the session was last `Ready`.
    pub fn rejoin_attempts(&self) -> u32 {
        self.rejoin_attempts.load(Ordering::Acquire)
    }

    pub fn is_ready_timer_armed(&self) -> bool {
        self.ready_lock.load(Ordering::Acquire)
    }

    /// Why the session was destroyed, once it has been.
    pub fn destroy_cause(&self) -> Option<DestroyCause> {
        *self.cause.lock()
    }

    /// Registers the callback run once when the session is destroyed.
    ///
    /// Replaces any earlier hook that has not run yet.
    pub fn on_destroyed<F>(&self, hook: F)
    where
        F: FnOnce(DestroyCause) + Send + 'static,
    {
        *self.on_destroyed.lock() = Some(Box::new(hook));
    }

    /// Starts the supervisor task.
    pub fn start(self: &Arc<Self>, spawner: &TokioSpawner) {
        let session = Arc::clone(self);
        let task_spawner = spawner.clone();
        spawner.spawn(async move {
            session.supervise(task_spawner).await;
        });
    }

    /// Destroys the session. Returns false if it was already destroyed.
    ///
    /// Reports `Destroyed`, tears down the transport, stops the supervisor and
    /// runs the destroy hook. Only the first call has any effect.
    pub fn destroy(&self, cause: DestroyCause) -> bool {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return false;
        }
        *self.cause.lock() = Some(cause);
        log::info!("[VoiceSession] Destroying {} ({:?})", self.key, cause);

        self.reporter.report(ConnectionState::Destroyed);
        self.connection.destroy();
        self.cancel.cancel();

        self.emitter.emit_session(SessionEvent::Destroyed {
            session_key: self.key.clone(),
            cause,
            timestamp: now_millis(),
        });

        let hook = self.on_destroyed.lock().take();
        if let Some(hook) = hook {
            hook(cause);
        }
        true
    }

    /// Waits up to `window` for a state matching `predicate`.
    ///
    /// The current state is checked first. Returns `None` on timeout.
    pub async fn wait_for<F>(&self, window: Duration, predicate: F) -> Option<ConnectionState>
    where
        F: FnMut(&ConnectionState) -> bool,
    {
        let mut rx = self.reporter.subscribe();
        wait_for_state(&mut rx, window, predicate).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Supervisor
    // ─────────────────────────────────────────────────────────────────────────

    async fn supervise(self: Arc<Self>, spawner: TokioSpawner) {
        let mut rx = self.reporter.subscribe();
        // The current state has not been handled yet.
        let mut recheck = true;
        let mut fresh = true;

        loop {
            if !recheck {
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
                fresh = true;
            }
            recheck = false;

            let state = *rx.borrow_and_update();
            if fresh {
                log::debug!("[VoiceSession] {} -> {}", self.key, state.as_str());
                self.emitter.emit_session(SessionEvent::StateChanged {
                    session_key: self.key.clone(),
                    state,
                    timestamp: now_millis(),
                });
            }
            fresh = false;

            match state {
                ConnectionState::Signalling | ConnectionState::Connecting => {
                    self.arm_ready_timer(&spawner);
                }
                ConnectionState::Ready => {
                    let previous = self.rejoin_attempts.swap(0, Ordering::AcqRel);
                    if previous > 0 {
                        log::info!(
                            "[VoiceSession] {} recovered after {} rejoin attempt(s)",
                            self.key,
                            previous
                        );
                    }
                }
                ConnectionState::Disconnected(reason) => {
                    match self.handle_disconnect(reason, &mut rx).await {
                        DisconnectOutcome::Recheck => recheck = true,
                        DisconnectOutcome::Rejoined => {}
                        DisconnectOutcome::Changed => {
                            recheck = true;
                            fresh = true;
                        }
                        DisconnectOutcome::Destroy(cause) => {
                            self.destroy(cause);
                            break;
                        }
                        DisconnectOutcome::Cancelled => break,
                    }
                }
                ConnectionState::Destroyed => {
                    self.destroy(DestroyCause::Transport);
                    break;
                }
            }
        }

        log::debug!("[VoiceSession] Supervisor for {} stopped", self.key);
    }

    async fn handle_disconnect(
        &self,
        reason: DisconnectReason,
        rx: &mut watch::Receiver<ConnectionState>,
    ) -> DisconnectOutcome {
        if reason.is_channel_move() {
            let window = self.policy.move_recovery_window();
            log::info!(
                "[VoiceSession] {} closed by channel move, waiting {:?} to reconnect",
                self.key,
                window
            );
            let recovered = tokio::select! {
                _ = self.cancel.cancelled() => return DisconnectOutcome::Cancelled,
                state = wait_for_state(rx, window, |s| {
                    matches!(
                        s,
                        ConnectionState::Connecting | ConnectionState::Ready | ConnectionState::Destroyed
                    )
                }) => state,
            };
            return match recovered {
                Some(_) => DisconnectOutcome::Recheck,
                None => {
                    log::warn!("[VoiceSession] {} did not reconnect after move", self.key);
                    DisconnectOutcome::Destroy(DestroyCause::SessionRemoved)
                }
            };
        }

        let attempts = self.rejoin_attempts.load(Ordering::Acquire);
        if attempts >= self.policy.max_rejoin_attempts {
            log::warn!(
                "[VoiceSession] {} gave up after {} rejoin attempts",
                self.key,
                attempts
            );
            return DisconnectOutcome::Destroy(DestroyCause::RejoinExhausted);
        }

        let delay = self.policy.backoff(attempts);
        log::info!(
            "[VoiceSession] {} disconnected ({:?}), rejoin {}/{} in {:?}",
            self.key,
            reason,
            attempts + 1,
            self.policy.max_rejoin_attempts,
            delay
        );
        self.emitter.emit_session(SessionEvent::Rejoining {
            session_key: self.key.clone(),
            attempt: attempts + 1,
            delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            timestamp: now_millis(),
        });

        // Any state other than another disconnect ends the backoff without a rejoin.
        let deadline = Instant::now() + delay;
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return DisconnectOutcome::Cancelled,
                _ = tokio::time::sleep_until(deadline) => break,
                changed = rx.changed() => {
                    if changed.is_err() {
                        return DisconnectOutcome::Cancelled;
                    }
                    let state = *rx.borrow_and_update();
                    if !matches!(state, ConnectionState::Disconnected(_)) {
                        log::info!(
                            "[VoiceSession] {} moved to {} during backoff, skipping rejoin",
                            self.key,
                            state.as_str()
                        );
                        return DisconnectOutcome::Changed;
                    }
                }
            }
        }

        self.rejoin_attempts.fetch_add(1, Ordering::AcqRel);
        match self.connection.rejoin().await {
            Ok(()) => DisconnectOutcome::Rejoined,
            Err(e) if e.is_fatal() => {
                log::warn!("[VoiceSession] {} rejoin refused: {}", self.key, e);
                DisconnectOutcome::Destroy(DestroyCause::SessionRemoved)
            }
            Err(e) => {
                log::warn!("[VoiceSession] {} rejoin failed: {}", self.key, e);
                DisconnectOutcome::Recheck
            }
        }
    }

    fn arm_ready_timer(self: &Arc<Self>, spawner: &TokioSpawner) {
        if self
            .ready_lock
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log::debug!("[VoiceSession] Readiness timer already armed for {}", self.key);
            return;
        }

        let session = Arc::clone(self);
        let task_spawner = spawner.clone();
        let mut rx = self.reporter.subscribe();
        spawner.spawn(async move {
            let armed = ReadyLockGuard(&session.ready_lock);
            let window = session.policy.ready_timeout();

            // Ends early on Disconnected; the disconnect policy owns recovery.
            let settled = tokio::select! {
                _ = session.cancel.cancelled() => return,
                state = wait_for_state(&mut rx, window, |s| !s.is_handshaking()) => state,
            };

            if settled.is_none() && !session.state().is_destroyed() {
                log::warn!(
                    "[VoiceSession] {} not ready after {:?}",
                    session.key,
                    window
                );
                session.destroy(DestroyCause::ConnectionTimeout);
                return;
            }

            drop(armed);
            session.rearm_if_handshaking(&task_spawner);
        });
    }

    /// Arms a new timer if a handshake started while the previous timer was
    /// still holding the lock.
    fn rearm_if_handshaking(self: &Arc<Self>, spawner: &TokioSpawner) {
        if self.state().is_handshaking() && !self.cancel.is_cancelled() {
            self.arm_ready_timer(spawner);
        }
    }
}

/// Waits up to `window` for the watched state to satisfy `predicate`.
async fn wait_for_state<F>(
    rx: &mut watch::Receiver<ConnectionState>,
    window: Duration,
    predicate: F,
) -> Option<ConnectionState>
where
    F: FnMut(&ConnectionState) -> bool,
{
    match tokio::time::timeout(window, rx.wait_for(predicate)).await {
        Ok(Ok(state)) => Some(*state),
        _ => None,
    }
}
