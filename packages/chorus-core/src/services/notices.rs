//! Default lifecycle callbacks: turn item transitions into playback notices.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{ErrorCode, ItemError};
use crate::events::{EventEmitter, PlaybackEvent};
use crate::media::{MediaItem, MediaObserver};
use crate::utils::now_millis;
use crate::voice::SessionKey;

/// Emits "now playing", "previously played" and failure notices for a session.
pub struct NoticeObserver {
    session_key: SessionKey,
    emitter: Arc<dyn EventEmitter>,
    finished_ttl: Duration,
}

impl NoticeObserver {
    pub fn new(
        session_key: SessionKey,
        emitter: Arc<dyn EventEmitter>,
        finished_ttl: Duration,
    ) -> Self {
        Self {
            session_key,
            emitter,
            finished_ttl,
        }
    }
}

impl MediaObserver for NoticeObserver {
    fn on_start(&self, item: &MediaItem) {
        self.emitter.emit_playback(PlaybackEvent::NowPlaying {
            session_key: self.session_key.clone(),
            item_id: item.id().to_string(),
            title: item.display_title(),
            image: item.image(),
            timestamp: now_millis(),
        });
    }

    fn on_finish(&self, item: &MediaItem) {
        self.emitter.emit_playback(PlaybackEvent::PreviouslyPlayed {
            session_key: self.session_key.clone(),
            item_id: item.id().to_string(),
            title: item.display_title(),
            expires_after_ms: u64::try_from(self.finished_ttl.as_millis()).unwrap_or(u64::MAX),
            timestamp: now_millis(),
        });
    }

    fn on_error(&self, item: &MediaItem, error: &ItemError) {
        let timestamp = now_millis();
        self.emitter.emit_playback(PlaybackEvent::NoticeCleared {
            session_key: self.session_key.clone(),
            item_id: item.id().to_string(),
            timestamp,
        });
        self.emitter.emit_playback(PlaybackEvent::PlaybackFailed {
            session_key: self.session_key.clone(),
            item_id: item.id().to_string(),
            title: item.display_title(),
            code: error.code().to_string(),
            error: error.to_string(),
            timestamp,
        });
    }
}
