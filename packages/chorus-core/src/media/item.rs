//! Media items and their one-shot lifecycle callbacks.
//!
//! A [`MediaItem`] carries three fixed callback slots (an [`MediaObserver`]) and a
//! tagged [`ItemPhase`]. Every callback is gated by an atomic phase transition, so
//! each fires at most once and `on_finish`/`on_error` exclude each other.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::sanitize::sanitize_text;
use crate::error::ItemError;

/// Lifecycle callbacks for a media item.
///
/// Each method is invoked at most once per item. Implementations must not block
/// and must not call back into the subscription that owns the item.
pub trait MediaObserver: Send + Sync {
    /// The item's resource entered active playback.
    fn on_start(&self, _item: &MediaItem) {}

    /// Playback ended (naturally or by an explicit stop).
    fn on_finish(&self, _item: &MediaItem) {}

    /// Resolution or playback failed.
    fn on_error(&self, _item: &MediaItem, _error: &ItemError) {}
}

/// Observer that ignores every callback.
pub struct NoopObserver;

impl MediaObserver for NoopObserver {}

/// Where a media item is in its lifecycle.
///
/// Transitions only move forward: `Pending -> Started -> Finished | Failed`,
/// `Pending -> Finished | Failed | Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ItemPhase {
    /// Queued or resolving; nothing has fired.
    Pending = 0,
    /// `on_start` fired.
    Started = 1,
    /// `on_finish` fired. Terminal.
    Finished = 2,
    /// `on_error` fired. Terminal.
    Failed = 3,
    /// Dropped before playback began; no callback will ever fire. Terminal.
    Cancelled = 4,
}

impl ItemPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Pending,
            1 => Self::Started,
            2 => Self::Finished,
            3 => Self::Failed,
            _ => Self::Cancelled,
        }
    }

    /// Returns true once no further callback can fire.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed | Self::Cancelled)
    }
}

#[derive(Debug, Default)]
struct ItemDetails {
    title: Option<String>,
    image: Option<String>,
}

/// A queued playback request plus display metadata and lifecycle callbacks.
pub struct MediaItem {
    id: String,
    query: String,
    details: RwLock<ItemDetails>,
    phase: AtomicU8,
    observer: Arc<dyn MediaObserver>,
}

impl MediaItem {
    /// Creates an item for a search query or a direct URL.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            query: query.into().trim().to_string(),
            details: RwLock::new(ItemDetails::default()),
            phase: AtomicU8::new(ItemPhase::Pending as u8),
            observer: Arc::new(NoopObserver),
        }
    }

    /// Sets caller-provided display metadata. Text is sanitized.
    #[must_use]
    pub fn with_details(self, title: Option<&str>, image: Option<&str>) -> Self {
        self.fill_details(title, image);
        self
    }

    /// Replaces the lifecycle callbacks.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn MediaObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Unique identifier, used to key notices and to match player events.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The original query or URL.
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn title(&self) -> Option<String> {
        self.details.read().title.clone()
    }

    pub fn image(&self) -> Option<String> {
        self.details.read().image.clone()
    }

    /// Title for display, falling back to the query.
    pub fn display_title(&self) -> String {
        self.title().unwrap_or_else(|| self.query.clone())
    }

    /// Returns true if the title or image is still unknown.
    pub fn needs_details(&self) -> bool {
        let details = self.details.read();
        details.title.is_none() || details.image.is_none()
    }

    /// Fills in missing metadata. Known values are never overwritten.
    ///
    /// Titles are sanitized; values that sanitize to nothing are ignored.
    pub fn fill_details(&self, title: Option<&str>, image: Option<&str>) {
        let mut details = self.details.write();
        if details.title.is_none() {
            details.title = title.map(sanitize_text).filter(|t| !t.is_empty());
        }
        if details.image.is_none() {
            details.image = image
                .map(str::trim)
                .filter(|i| !i.is_empty())
                .map(str::to_string);
        }
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> ItemPhase {
        ItemPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Moves to `to` if the current phase is one of `from`.
    fn advance(&self, from: &[ItemPhase], to: ItemPhase) -> bool {
        self.phase
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                from.contains(&ItemPhase::from_u8(current))
                    .then_some(to as u8)
            })
            .is_ok()
    }

    /// Fires `on_start` if nothing has fired yet. Returns whether it fired.
    pub fn notify_start(&self) -> bool {
        let fired = self.advance(&[ItemPhase::Pending], ItemPhase::Started);
        if fired {
            self.observer.on_start(self);
        }
        fired
    }

    /// Fires `on_finish` unless the item already finished, failed or was cancelled.
    pub fn notify_finish(&self) -> bool {
        let fired = self.advance(
            &[ItemPhase::Pending, ItemPhase::Started],
            ItemPhase::Finished,
        );
        if fired {
            self.observer.on_finish(self);
        }
        fired
    }

    /// Fires `on_error` unless the item already finished, failed or was cancelled.
    pub fn notify_error(&self, error: &ItemError) -> bool {
        let fired = self.advance(&[ItemPhase::Pending, ItemPhase::Started], ItemPhase::Failed);
        if fired {
            self.observer.on_error(self, error);
        }
        fired
    }

    /// Marks a not-yet-started item as dropped so no callback can fire later.
    pub fn cancel(&self) -> bool {
        self.advance(&[ItemPhase::Pending], ItemPhase::Cancelled)
    }
}

impl fmt::Debug for MediaItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaItem")
            .field("id", &self.id)
            .field("query", &self.query)
            .field("title", &self.title())
            .field("phase", &self.phase())
            .finish()
    }
}
