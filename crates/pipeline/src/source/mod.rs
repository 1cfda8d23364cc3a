//! The content source behind the pipeline.
//!
//! Implementations do the actual site access; the pipeline only relies on the
//! typed contract below and the failure semantics of [`SourceError`].

pub mod http;

use {
    async_trait::async_trait,
    bytes::Bytes,
    futures::stream::BoxStream,
};

use crate::{
    error::{SourceError, SourceResult},
    types::{Candidate, Metadata, RawLink},
};

pub use http::HttpSource;

/// Streamed asset body.
pub type AssetStream = BoxStream<'static, Result<Bytes, SourceError>>;

#[async_trait]
pub trait Source: Send + Sync {
    /// Candidates matching `query`. An empty list means no match.
    async fn search(&self, query: &str) -> SourceResult<Vec<Candidate>>;

    /// Descriptive fields for a candidate; missing fields stay `None`.
    async fn fetch_metadata(&self, locator: &str) -> SourceResult<Metadata>;

    /// Links listed for a candidate, in source order.
    async fn extract_links(&self, locator: &str) -> SourceResult<Vec<RawLink>>;

    /// Turn a listed link into a direct-fetch locator.
    async fn resolve_link(&self, link: &RawLink) -> SourceResult<String> {
        Ok(link.locator.clone())
    }

    async fn fetch_asset(&self, locator: &str) -> SourceResult<AssetStream>;
}
