//! Centralized error types for the Chorus core library.
//!
//! Errors are split by blast radius:
//! - [`ItemError`]: a single media item failed; the queue moves on.
//! - [`SessionError`]: the voice session is gone; the subscription is torn down.
//! - [`StreamError`]: a collaborator (search, metadata, stream) failed. These never
//!   escape the resolution boundary; they are folded into [`ItemError`].
//!
//! [`ChorusError`] wraps all of them for the few operations that can fail as a whole
//! (joining, configuration loading).

use serde::Serialize;
use thiserror::Error;

/// Trait for error types that provide machine-readable error codes.
///
/// Implement this trait to provide consistent error codes across different
/// error conversion paths.
pub trait ErrorCode {
    /// Returns a machine-readable error code.
    fn code(&self) -> &'static str;
}

/// Failure of a single media item (resolution or playback).
///
/// Always recoverable: reported through the item's `on_error` callback and the
/// drain loop advances to the next item.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum ItemError {
    /// The query is a URL, but not one we know how to play.
    #[error("Unsupported source: {0}")]
    UnsupportedSource(String),

    /// Search, metadata lookup, stream open or probe failed.
    #[error("Resolution failed: {0}")]
    ResolutionFailure(String),

    /// The player reported an error mid-playback.
    #[error("Playback error: {0}")]
    Playback(String),
}

impl ErrorCode for ItemError {
    fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedSource(_) => "unsupported_source",
            Self::ResolutionFailure(_) => "resolution_failure",
            Self::Playback(_) => "playback_error",
        }
    }
}

/// Failure of a voice session.
///
/// The fatal variants end the owning subscription: full teardown, registry
/// removal, no further retries.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum SessionError {
    /// The session did not become ready within the readiness window.
    #[error("Voice connection did not become ready in time")]
    ConnectionTimeout,

    /// The session was closed and did not come back (removed or kicked).
    #[error("Voice session was removed")]
    SessionRemoved,

    /// All rejoin attempts were used without reaching ready.
    #[error("Voice session rejoin attempts exhausted")]
    RejoinExhausted,

    /// The gateway refused to open a connection.
    #[error("Failed to join voice channel: {0}")]
    JoinFailed(String),

    /// The transport rejected a rejoin request.
    ///
    /// Counted as a failed attempt; never fatal on its own.
    #[error("Rejoin request failed: {0}")]
    RejoinFailed(String),
}

impl SessionError {
    /// Returns true if this error ends the subscription.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::RejoinFailed(_))
    }
}

impl ErrorCode for SessionError {
    fn code(&self) -> &'static str {
        match self {
            Self::ConnectionTimeout => "connection_timeout",
            Self::SessionRemoved => "session_removed",
            Self::RejoinExhausted => "rejoin_exhausted",
            Self::JoinFailed(_) => "join_failed",
            Self::RejoinFailed(_) => "rejoin_failed",
        }
    }
}

/// Errors from media collaborators (search, metadata, stream I/O).
#[derive(Debug, Error)]
pub enum StreamError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP request returned a non-success status.
    #[error("HTTP error status {0}")]
    HttpStatus(u16),

    /// The stream's content type is not a codec we can decode.
    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),

    /// The stream was already released.
    #[error("Stream closed")]
    Closed,

    /// Any other I/O failure reported by a collaborator.
    #[error("I/O error: {0}")]
    Io(String),
}

impl ErrorCode for StreamError {
    fn code(&self) -> &'static str {
        match self {
            Self::Http(_) => "http_request_failed",
            Self::HttpStatus(_) => "http_error_status",
            Self::UnsupportedContentType(_) => "unsupported_content_type",
            Self::Closed => "stream_closed",
            Self::Io(_) => "io_error",
        }
    }
}

impl From<StreamError> for ItemError {
    fn from(err: StreamError) -> Self {
        Self::ResolutionFailure(err.to_string())
    }
}

/// Application-wide error type.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum ChorusError {
    /// A media item failed.
    #[error(transparent)]
    Item(ItemError),

    /// A voice session failed.
    #[error(transparent)]
    Session(SessionError),

    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ChorusError {
    /// Returns a machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Item(e) => e.code(),
            Self::Session(e) => e.code(),
            Self::Configuration(_) => "configuration_error",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl From<ItemError> for ChorusError {
    fn from(err: ItemError) -> Self {
        Self::Item(err)
    }
}

impl From<SessionError> for ChorusError {
    fn from(err: SessionError) -> Self {
        Self::Session(err)
    }
}

/// Convenient Result alias for application-wide operations.
pub type ChorusResult<T> = Result<T, ChorusError>;
