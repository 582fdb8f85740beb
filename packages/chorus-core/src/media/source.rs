//! Query classification: direct URL vs. search text, and which URLs we can play.

use reqwest::Url;

/// Audio file extensions accepted for direct HTTP sources.
const DIRECT_AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a", "aac", "ogg", "opus", "flac", "wav", "webm"];

/// Kind of a directly playable source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// A single YouTube video (watch, shorts or youtu.be link).
    YouTubeVideo,
    /// A single SoundCloud track.
    SoundCloudTrack,
    /// A plain HTTP(S) audio file.
    DirectAudio,
}

impl SourceKind {
    /// Detects the kind of a URL, or `None` if it is not a single playable track.
    ///
    /// Collection URLs (playlists, albums, sets) are rejected: they are expanded
    /// into individual items before they reach the queue.
    #[must_use]
    pub fn detect(url: &Url) -> Option<Self> {
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        let host = url.host_str()?.to_ascii_lowercase();
        let host = host
            .strip_prefix("www.")
            .or_else(|| host.strip_prefix("m."))
            .unwrap_or(&host);
        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();

        match host {
            "youtube.com" | "music.youtube.com" => match segments.as_slice() {
                ["watch"] => url
                    .query_pairs()
                    .any(|(k, v)| k == "v" && !v.is_empty())
                    .then_some(Self::YouTubeVideo),
                ["shorts", _] => Some(Self::YouTubeVideo),
                _ => None,
            },
            "youtu.be" => (segments.len() == 1).then_some(Self::YouTubeVideo),
            "soundcloud.com" => match segments.as_slice() {
                [_, track] if *track != "sets" && *track != "tracks" => {
                    Some(Self::SoundCloudTrack)
                }
                _ => None,
            },
            _ => {
                let last = segments.last()?;
                let (_, ext) = last.rsplit_once('.')?;
                DIRECT_AUDIO_EXTENSIONS
                    .contains(&ext.to_ascii_lowercase().as_str())
                    .then_some(Self::DirectAudio)
            }
        }
    }

    /// Returns the kind as a short string identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::YouTubeVideo => "youtube_video",
            Self::SoundCloudTrack => "soundcloud_track",
            Self::DirectAudio => "direct_audio",
        }
    }
}

/// How a raw query should be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryKind {
    /// The query is a URL and must be played directly.
    Url(Url),
    /// The query is free text for the search collaborator.
    Search(String),
}

impl QueryKind {
    /// Classifies a query. Only strings with an explicit `scheme://` count as URLs.
    #[must_use]
    pub fn classify(query: &str) -> Self {
        let query = query.trim();
        if query.contains("://") && !query.contains(char::is_whitespace) {
            if let Ok(url) = Url::parse(query) {
                return Self::Url(url);
            }
        }
        Self::Search(query.to_string())
    }
}
