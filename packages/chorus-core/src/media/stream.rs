//! Media streams and playable resources.
//!
//! A [`StreamSource`] opens a [`MediaStream`] for a URL; probing the stream yields
//! [`ProbeInfo`] with decode parameters. The pair, tagged with its [`MediaItem`],
//! becomes a [`Resource`] that is handed to the player.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::Client;

use super::item::MediaItem;
use super::source::SourceKind;
use crate::error::StreamError;

/// Audio codec of an opened stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    Mp3,
    Aac,
    Opus,
    Vorbis,
    Flac,
    Wav,
    WebM,
}

impl AudioCodec {
    /// Maps a `Content-Type` header value to a codec.
    ///
    /// Parameters are honoured where they change the codec (`audio/ogg; codecs=opus`).
    #[must_use]
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let lowered = content_type.to_ascii_lowercase();
        let mut parts = lowered.split(';').map(str::trim);
        let mime = parts.next().unwrap_or_default();
        let has_opus_param = parts.any(|p| p.starts_with("codecs=") && p.contains("opus"));

        match mime {
            "audio/mpeg" | "audio/mp3" => Some(Self::Mp3),
            "audio/aac" | "audio/aacp" | "audio/mp4" | "audio/x-m4a" => Some(Self::Aac),
            "audio/opus" => Some(Self::Opus),
            "audio/ogg" | "application/ogg" if has_opus_param => Some(Self::Opus),
            "audio/ogg" | "application/ogg" => Some(Self::Vorbis),
            "audio/flac" | "audio/x-flac" => Some(Self::Flac),
            "audio/wav" | "audio/wave" | "audio/x-wav" => Some(Self::Wav),
            "audio/webm" | "video/webm" => Some(Self::WebM),
            _ => None,
        }
    }

    /// Returns the codec as a short string identifier (e.g., "mp3", "opus").
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Aac => "aac",
            Self::Opus => "opus",
            Self::Vorbis => "vorbis",
            Self::Flac => "flac",
            Self::Wav => "wav",
            Self::WebM => "webm",
        }
    }
}

/// Decode parameters discovered by probing a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeInfo {
    pub codec: AudioCodec,
    /// Total length in bytes, when the source announces it.
    pub content_length: Option<u64>,
}

/// An opened, not-yet-decoded media stream.
///
/// Owned by exactly one party at a time: the resolver while probing, then the
/// [`Resource`] handed to the player.
#[async_trait]
pub trait MediaStream: Send {
    /// Determines decode parameters.
    async fn probe(&mut self) -> Result<ProbeInfo, StreamError>;

    /// Reads the next chunk of encoded audio; `None` at end of stream.
    async fn read_chunk(&mut self) -> Result<Option<Bytes>, StreamError>;

    /// Terminates the stream and any process or connection behind it.
    ///
    /// Best-effort and idempotent; must never panic.
    fn kill(&mut self);
}

/// Opens media streams for playable URLs.
#[async_trait]
pub trait StreamSource: Send + Sync {
    async fn open(&self, url: &str, kind: SourceKind)
        -> Result<Box<dyn MediaStream>, StreamError>;
}

/// A probed stream tagged with the item it plays.
pub struct Resource {
    item: Arc<MediaItem>,
    probe: ProbeInfo,
    stream: Box<dyn MediaStream>,
}

impl Resource {
    pub fn new(item: Arc<MediaItem>, probe: ProbeInfo, stream: Box<dyn MediaStream>) -> Self {
        Self {
            item,
            probe,
            stream,
        }
    }

    /// The item this resource plays; used to invoke its lifecycle callbacks.
    pub fn item(&self) -> &Arc<MediaItem> {
        &self.item
    }

    pub fn probe(&self) -> &ProbeInfo {
        &self.probe
    }

    pub fn stream_mut(&mut self) -> &mut dyn MediaStream {
        self.stream.as_mut()
    }

    /// Splits the resource for an output that drives the stream itself.
    pub fn into_parts(self) -> (Arc<MediaItem>, ProbeInfo, Box<dyn MediaStream>) {
        (self.item, self.probe, self.stream)
    }

    /// Kills the underlying stream without playing it.
    pub fn release(mut self) {
        self.stream.kill();
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("item", &self.item.id())
            .field("probe", &self.probe)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP Source
// ─────────────────────────────────────────────────────────────────────────────

/// [`StreamSource`] for plain HTTP(S) audio files.
///
/// Site-specific sources (YouTube, SoundCloud) need an extractor and are supplied
/// by the host; this source refuses them.
#[derive(Clone)]
pub struct HttpStreamSource {
    client: Client,
}

impl HttpStreamSource {
    /// Creates a source using a shared HTTP client for connection pooling.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StreamSource for HttpStreamSource {
    async fn open(
        &self,
        url: &str,
        kind: SourceKind,
    ) -> Result<Box<dyn MediaStream>, StreamError> {
        if kind != SourceKind::DirectAudio {
            return Err(StreamError::Io(format!(
                "{} sources require an extractor",
                kind.as_str()
            )));
        }

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(StreamError::HttpStatus(response.status().as_u16()));
        }

        log::debug!("[HttpSource] Opened {}", url);
        Ok(Box::new(HttpMediaStream {
            response: Some(response),
        }))
    }
}

/// An in-flight HTTP response body.
struct HttpMediaStream {
    response: Option<reqwest::Response>,
}

#[async_trait]
impl MediaStream for HttpMediaStream {
    async fn probe(&mut self) -> Result<ProbeInfo, StreamError> {
        let response = self.response.as_ref().ok_or(StreamError::Closed)?;
        let headers = response.headers();

        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        let codec = AudioCodec::from_content_type(content_type)
            .ok_or_else(|| StreamError::UnsupportedContentType(content_type.to_string()))?;
        let content_length = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());

        Ok(ProbeInfo {
            codec,
            content_length,
        })
    }

    async fn read_chunk(&mut self) -> Result<Option<Bytes>, StreamError> {
        let response = self.response.as_mut().ok_or(StreamError::Closed)?;
        Ok(response.chunk().await?)
    }

    fn kill(&mut self) {
        // Dropping the response closes the connection.
        self.response = None;
    }
}
