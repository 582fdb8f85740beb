//! Media items and resource resolution.
//!
//! - [`item`]: queued requests with one-shot lifecycle callbacks
//! - [`source`]: URL vs. search classification and supported source kinds
//! - [`resolver`]: the resolution pipeline and its collaborator traits
//! - [`stream`]: opened streams, probe results and playable resources
//! - [`sanitize`]: markup stripping for display text

pub mod item;
pub mod resolver;
pub mod sanitize;
pub mod source;
pub mod stream;

pub use item::{ItemPhase, MediaItem, MediaObserver, NoopObserver};
pub use resolver::{
    MediaResolver, MetadataProvider, SearchHit, SearchProvider, SourceResolver, TrackMetadata,
};
pub use sanitize::sanitize_text;
pub use source::{QueryKind, SourceKind};
pub use stream::{
    AudioCodec, HttpStreamSource, MediaStream, ProbeInfo, Resource, StreamSource,
};
