//! `reqwest`-backed source speaking a small JSON API.
//!
//! Endpoints, relative to `base_url`:
//! - `GET /search?q=`       → `{"results": [Candidate]}`
//! - `GET /metadata?locator=` → `Metadata`
//! - `GET /links?locator=`  → `{"links": [RawLink]}`
//! - `GET /resolve?locator=` → `{"locator": "..."}` (only for non-direct links)
//!
//! Assets are fetched from the resolved locator itself. The API key only goes
//! to URLs under `base_url`.

use std::time::Duration;

use {
    async_trait::async_trait,
    futures::{StreamExt, TryStreamExt},
    reqwest::Client,
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, de::DeserializeOwned},
    tracing::debug,
};

use reelbot_config::SourceConfig;

use crate::{
    error::{SourceError, SourceResult},
    source::{AssetStream, Source},
    types::{Candidate, Metadata, RawLink},
};

pub struct HttpSource {
    client: Client,
    base_url: String,
    api_key: Option<Secret<String>>,
    /// Deadline for a whole JSON call, and for an asset's response headers.
    request_timeout: Duration,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Candidate>,
}

#[derive(Deserialize)]
struct LinksResponse {
    #[serde(default)]
    links: Vec<RawLink>,
}

#[derive(Deserialize)]
struct ResolveResponse {
    locator: String,
}

impl HttpSource {
    pub fn new(config: &SourceConfig) -> SourceResult<Self> {
        Self::with_timeout(config, config.request_timeout())
    }

    /// No client-wide timeout: it would also cap how long an asset body may stream.
    pub fn with_timeout(config: &SourceConfig, timeout: Duration) -> SourceResult<Self> {
        let client = Client::builder().connect_timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            request_timeout: timeout,
        })
    }

    fn is_source_url(&self, url: &str) -> bool {
        !self.base_url.is_empty()
            && url
                .strip_prefix(self.base_url.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with(['/', '?']))
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let req = self.client.get(url);
        match &self.api_key {
            Some(key) if self.is_source_url(url) => req.bearer_auth(key.expose_secret()),
            _ => req,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> SourceResult<T> {
        let url = format!("{}{path}", self.base_url);
        debug!(%url, "source request");
        let resp = self
            .request(&url)
            .query(query)
            .timeout(self.request_timeout)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url,
                status: status.as_u16(),
            });
        }
        let body = resp.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl Source for HttpSource {
    async fn search(&self, query: &str) -> SourceResult<Vec<Candidate>> {
        let resp: SearchResponse = self.get_json("/search", &[("q", query)]).await?;
        Ok(resp.results)
    }

    async fn fetch_metadata(&self, locator: &str) -> SourceResult<Metadata> {
        self.get_json("/metadata", &[("locator", locator)]).await
    }

    async fn extract_links(&self, locator: &str) -> SourceResult<Vec<RawLink>> {
        let resp: LinksResponse = self.get_json("/links", &[("locator", locator)]).await?;
        Ok(resp.links)
    }

    async fn resolve_link(&self, link: &RawLink) -> SourceResult<String> {
        let locator = if link.direct {
            link.locator.clone()
        } else {
            let resp: ResolveResponse = self
                .get_json("/resolve", &[("locator", link.locator.as_str())])
                .await?;
            resp.locator
        };
        Ok(direct_download_url(&locator))
    }

    async fn fetch_asset(&self, locator: &str) -> SourceResult<AssetStream> {
        let resp = tokio::time::timeout(self.request_timeout, self.request(locator).send())
            .await
            .map_err(|_| SourceError::Timeout {
                url: locator.to_string(),
                after: self.request_timeout,
            })??;
        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url: locator.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(resp.bytes_stream().map_err(SourceError::from).boxed())
    }
}

/// Rewrite known share-page URLs to their direct-download form.
#[must_use]
pub fn direct_download_url(locator: &str) -> String {
    const PIXELDRAIN_SHARE: &str = "pixeldrain.com/u/";
    if let Some((prefix, rest)) = locator.split_once(PIXELDRAIN_SHARE) {
        let id = rest.split(['?', '#', '/']).next().unwrap_or_default();
        if !id.is_empty() {
            return format!("{prefix}pixeldrain.com/api/file/{id}?download");
        }
    }
    locator.to_string()
}
