//! Fixed protocol constants and policy defaults.
//!
//! The reconnection values are the session policy: a fixed attempt ceiling with
//! linear backoff and flat readiness/move windows. They seed [`crate::config::Config`]
//! defaults; the close code is defined by the voice gateway protocol.

// ─────────────────────────────────────────────────────────────────────────────
// Voice Gateway
// ─────────────────────────────────────────────────────────────────────────────

/// WebSocket close code sent when the session was moved to another channel
/// (or the bot was disconnected from it).
pub const CHANNEL_MOVE_CLOSE_CODE: u16 = 4014;

// ─────────────────────────────────────────────────────────────────────────────
// Reconnection Policy
// ─────────────────────────────────────────────────────────────────────────────

/// Maximum consecutive rejoin requests before the session is destroyed.
pub const MAX_REJOIN_ATTEMPTS: u32 = 5;

/// Linear backoff step: attempt `n` (zero-based) waits `(n + 1) * step`.
pub const REJOIN_BACKOFF_STEP_MS: u64 = 5_000;

/// How long a moved session may take to start connecting again.
pub const MOVE_RECOVERY_WINDOW_MS: u64 = 5_000;

/// How long a connecting session may take to become ready.
pub const READY_TIMEOUT_MS: u64 = 20_000;

// ─────────────────────────────────────────────────────────────────────────────
// Notifications
// ─────────────────────────────────────────────────────────────────────────────

/// Lifetime of a "previously played" notice before the channel removes it.
pub const FINISHED_NOTICE_TTL_SECS: u64 = 15;

/// Default number of pending titles returned by a queue snapshot.
pub const QUEUE_SNAPSHOT_LIMIT: usize = 10;

/// Capacity of the broadcast channel for notification events.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

// ─────────────────────────────────────────────────────────────────────────────
// HTTP
// ─────────────────────────────────────────────────────────────────────────────

/// Connect timeout for the shared HTTP client. Streams have no total timeout.
pub const HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;
