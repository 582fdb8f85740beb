//! Pending media items for one subscription.
//!
//! The queue is strictly FIFO: items are appended at the tail, drained from the
//! head, and never reordered. Shuffling is the caller's job before enqueueing.

use std::collections::VecDeque;
use std::sync::Arc;

use serde::Serialize;

use crate::media::MediaItem;

/// Ordered pending items.
#[derive(Debug, Default)]
pub struct PlaybackQueue {
    items: VecDeque<Arc<MediaItem>>,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an item and returns its index in the queue.
    pub fn push_back(&mut self, item: Arc<MediaItem>) -> usize {
        self.items.push_back(item);
        self.items.len() - 1
    }

    pub fn pop_front(&mut self) -> Option<Arc<MediaItem>> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Removes up to `count` items from the head, in order.
    pub fn drain_front(&mut self, count: usize) -> Vec<Arc<MediaItem>> {
        let count = count.min(self.items.len());
        self.items.drain(..count).collect()
    }

    /// Removes every item, in order.
    pub fn clear(&mut self) -> Vec<Arc<MediaItem>> {
        self.items.drain(..).collect()
    }

    /// Display titles of the first `limit` items.
    pub fn titles(&self, limit: usize) -> Vec<String> {
        self.items
            .iter()
            .take(limit)
            .map(|item| item.display_title())
            .collect()
    }
}

/// Point-in-time view of a subscription's playback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    /// Title of the item in the player or being resolved for it.
    pub now_playing: Option<String>,
    /// Up to the snapshot limit of pending titles, in play order.
    pub upcoming: Vec<String>,
    /// Pending items in total, including those not listed.
    pub total_pending: usize,
}

impl QueueSnapshot {
    /// Pending items beyond the listed ones.
    pub fn hidden(&self) -> usize {
        self.total_pending.saturating_sub(self.upcoming.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(query: &str) -> Arc<MediaItem> {
        Arc::new(MediaItem::new(query))
    }

    #[test]
    fn preserves_insertion_order() {
        let mut queue = PlaybackQueue::new();
        assert_eq!(queue.push_back(item("a")), 0);
        assert_eq!(queue.push_back(item("b")), 1);
        assert_eq!(queue.push_back(item("c")), 2);

        let order: Vec<_> = std::iter::from_fn(|| queue.pop_front())
            .map(|i| i.query().to_string())
            .collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn drain_front_is_bounded_by_length() {
        let mut queue = PlaybackQueue::new();
        queue.push_back(item("a"));
        queue.push_back(item("b"));

        assert_eq!(queue.drain_front(1).len(), 1);
        assert_eq!(queue.drain_front(5).len(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn titles_prefer_metadata_and_respect_limit() {
        let mut queue = PlaybackQueue::new();
        queue.push_back(Arc::new(MediaItem::new("a").with_details(Some("Song A"), None)));
        queue.push_back(item("b"));
        queue.push_back(item("c"));

        assert_eq!(queue.titles(2), vec!["Song A", "b"]);
    }

    #[test]
    fn snapshot_counts_hidden_items() {
        let snapshot = QueueSnapshot {
            now_playing: Some("x".into()),
            upcoming: vec!["a".into(), "b".into()],
            total_pending: 5,
        };
        assert_eq!(snapshot.hidden(), 3);
    }
}
