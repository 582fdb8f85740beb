//! Resource resolution: turning a queued item into a probed, playable stream.

use std::sync::Arc;

use async_trait::async_trait;

use super::item::MediaItem;
use super::source::{QueryKind, SourceKind};
use super::stream::{Resource, StreamSource};
use crate::error::{ItemError, StreamError};

/// Resolves media items into playable resources.
///
/// Implementations must not fire any of the item's lifecycle callbacks; the
/// subscription does that once the outcome is known.
#[async_trait]
pub trait MediaResolver: Send + Sync {
    async fn resolve(&self, item: &Arc<MediaItem>) -> Result<Resource, ItemError>;
}

/// Best match for a free-text query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    /// Canonical URL of the matched track.
    pub url: String,
    pub title: Option<String>,
    pub image: Option<String>,
}

/// Display metadata for a canonical URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackMetadata {
    pub title: Option<String>,
    pub image: Option<String>,
}

/// Search-by-query collaborator.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Returns the best match, or `None` if nothing matched.
    async fn search(&self, query: &str) -> Result<Option<SearchHit>, StreamError>;
}

/// Metadata lookup collaborator.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn lookup(&self, url: &str) -> Result<Option<TrackMetadata>, StreamError>;
}

/// Default resolver composed from search, metadata and stream collaborators.
///
/// Steps:
/// 1. Direct URLs must be a supported [`SourceKind`]; free text goes to search.
/// 2. Missing title/image trigger a metadata lookup.
/// 3. The stream is opened and probed; a failed probe kills the stream.
pub struct SourceResolver {
    search: Arc<dyn SearchProvider>,
    metadata: Arc<dyn MetadataProvider>,
    streams: Arc<dyn StreamSource>,
}

impl SourceResolver {
    pub fn new(
        search: Arc<dyn SearchProvider>,
        metadata: Arc<dyn MetadataProvider>,
        streams: Arc<dyn StreamSource>,
    ) -> Self {
        Self {
            search,
            metadata,
            streams,
        }
    }

    /// Finds the canonical URL and source kind for an item.
    async fn locate(&self, item: &MediaItem) -> Result<(String, SourceKind), ItemError> {
        match QueryKind::classify(item.query()) {
            QueryKind::Url(url) => {
                let kind = SourceKind::detect(&url)
                    .ok_or_else(|| ItemError::UnsupportedSource(url.to_string()))?;
                Ok((url.to_string(), kind))
            }
            QueryKind::Search(text) => {
                let hit = self.search.search(&text).await?.ok_or_else(|| {
                    ItemError::ResolutionFailure(format!("No results for '{}'", text))
                })?;
                item.fill_details(hit.title.as_deref(), hit.image.as_deref());

                let kind = reqwest::Url::parse(&hit.url)
                    .ok()
                    .as_ref()
                    .and_then(SourceKind::detect)
                    .ok_or_else(|| {
                        ItemError::ResolutionFailure(format!(
                            "Search returned an unplayable URL: {}",
                            hit.url
                        ))
                    })?;
                Ok((hit.url, kind))
            }
        }
    }
}

#[async_trait]
impl MediaResolver for SourceResolver {
    async fn resolve(&self, item: &Arc<MediaItem>) -> Result<Resource, ItemError> {
        let (url, kind) = self.locate(item).await?;

        if item.needs_details() {
            if let Some(meta) = self.metadata.lookup(&url).await? {
                item.fill_details(meta.title.as_deref(), meta.image.as_deref());
            }
        }

        let mut stream = self.streams.open(&url, kind).await?;
        match stream.probe().await {
            Ok(probe) => {
                log::info!(
                    "[Resolver] Resolved '{}' -> {} ({}, {})",
                    item.query(),
                    url,
                    kind.as_str(),
                    probe.codec.as_str()
                );
                Ok(Resource::new(Arc::clone(item), probe, stream))
            }
            Err(e) => {
                stream.kill();
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{FakeMetadata, FakeSearch, FakeStreamSource};

    fn resolver(
        search: FakeSearch,
        metadata: FakeMetadata,
        streams: Arc<FakeStreamSource>,
    ) -> SourceResolver {
        SourceResolver::new(Arc::new(search), Arc::new(metadata), streams)
    }

    #[tokio::test]
    async fn direct_url_of_unknown_kind_is_unsupported() {
        let streams = Arc::new(FakeStreamSource::default());
        let resolver = resolver(FakeSearch::empty(), FakeMetadata::empty(), streams.clone());
        let item = Arc::new(MediaItem::new("https://example.com/page.html"));

        let err = resolver.resolve(&item).await.unwrap_err();

        assert!(matches!(err, ItemError::UnsupportedSource(_)));
        assert_eq!(streams.opened(), 0);
    }

    #[tokio::test]
    async fn search_without_match_is_resolution_failure() {
        let resolver = resolver(
            FakeSearch::empty(),
            FakeMetadata::empty(),
            Arc::new(FakeStreamSource::default()),
        );
        let item = Arc::new(MediaItem::new("nothing matches this"));

        let err = resolver.resolve(&item).await.unwrap_err();
        assert!(matches!(err, ItemError::ResolutionFailure(_)));
    }

    #[tokio::test]
    async fn search_hit_fills_sanitized_details() {
        let resolver = resolver(
            FakeSearch::hit(SearchHit {
                url: "https://youtu.be/abc".into(),
                title: Some("<b>Never</b> Gonna".into()),
                image: Some("https://img/abc.jpg".into()),
            }),
            FakeMetadata::empty(),
            Arc::new(FakeStreamSource::default()),
        );
        let item = Arc::new(MediaItem::new("never gonna"));

        let resource = resolver.resolve(&item).await.unwrap();

        assert_eq!(item.title().as_deref(), Some("Never Gonna"));
        assert_eq!(item.image().as_deref(), Some("https://img/abc.jpg"));
        assert_eq!(resource.item().id(), item.id());
    }

    #[tokio::test]
    async fn metadata_lookup_fills_missing_fields() {
        let metadata = FakeMetadata::with(TrackMetadata {
            title: Some("Direct Track".into()),
            image: None,
        });
        let resolver = resolver(
            FakeSearch::empty(),
            metadata,
            Arc::new(FakeStreamSource::default()),
        );
        let item = Arc::new(MediaItem::new("https://cdn.example.com/track.mp3"));

        resolver.resolve(&item).await.unwrap();

        assert_eq!(item.title().as_deref(), Some("Direct Track"));
    }

    #[tokio::test]
    async fn failed_probe_kills_stream() {
        let streams = Arc::new(FakeStreamSource::failing_probe());
        let resolver = resolver(FakeSearch::empty(), FakeMetadata::empty(), streams.clone());
        let item = Arc::new(MediaItem::new("https://cdn.example.com/track.mp3"));

        let err = resolver.resolve(&item).await.unwrap_err();

        assert!(matches!(err, ItemError::ResolutionFailure(_)));
        assert_eq!(streams.opened(), 1);
        assert_eq!(streams.killed(), 1);
    }
}
