//! The four retrieval stages: search → metadata → link extraction → acquire and deliver.

use std::sync::Arc;

use {
    futures::{StreamExt, future::join_all},
    tokio::io::AsyncWriteExt,
    tracing::{debug, info, warn},
};

use {
    reelbot_channels::ChannelOutbound,
    reelbot_common::types::MediaSource,
    reelbot_config::{DeliveryMode, PipelineConfig},
};

use crate::{
    asset::{AcquiredAsset, human_size},
    error::{PipelineError, Result, Stage},
    quality::{normalize, rank_links},
    source::Source,
    types::{Candidate, Metadata, QualityLink, RawLink},
};

const VIDEO_MIMETYPE: &str = "video/mp4";

/// What to deliver and to whom, for [`Pipeline::acquire_and_deliver`].
#[derive(Debug, Clone, Copy)]
pub struct DeliveryRequest<'a> {
    pub to: &'a str,
    pub title: &'a str,
    pub rating: Option<&'a str>,
    pub link: &'a QualityLink,
}

/// Confirmation of a completed delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    pub filename: String,
    pub bytes: u64,
}

pub struct Pipeline {
    source: Arc<dyn Source>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(source: Arc<dyn Source>, config: PipelineConfig) -> Self {
        Self { source, config }
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run a search, keeping at most `result_limit()` candidates with a usable locator.
    pub async fn search(&self, query: &str) -> Result<Vec<Candidate>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(PipelineError::NoResults {
                stage: Stage::Search,
            });
        }

        let found = self
            .source
            .search(query)
            .await
            .map_err(|e| PipelineError::unavailable(Stage::Search, e))?;
        let total = found.len();
        let candidates: Vec<Candidate> = found
            .into_iter()
            .filter(|c| !c.locator.trim().is_empty())
            .take(self.config.result_limit())
            .collect();

        debug!(query, total, kept = candidates.len(), "search finished");
        if candidates.is_empty() {
            return Err(PipelineError::NoResults {
                stage: Stage::Search,
            });
        }
        Ok(candidates)
    }

    pub async fn metadata(&self, candidate: &Candidate) -> Result<Metadata> {
        self.source
            .fetch_metadata(&candidate.locator)
            .await
            .map_err(|e| PipelineError::unavailable(Stage::Metadata, e))
    }

    /// List, resolve, and rank the links for a candidate.
    ///
    /// Each resolution runs under `link_timeout`; failures and timeouts drop that
    /// link only. The result is deduplicated by tier and sorted best-first.
    pub async fn extract_links(&self, candidate: &Candidate) -> Result<Vec<QualityLink>> {
        let raw = self
            .source
            .extract_links(&candidate.locator)
            .await
            .map_err(|e| PipelineError::unavailable(Stage::ExtractLinks, e))?;

        let listed = raw.len();
        let usable: Vec<RawLink> = raw
            .into_iter()
            .filter(|link| {
                let excluded = link
                    .server
                    .as_deref()
                    .is_some_and(|s| self.config.is_excluded_server(s));
                if excluded {
                    debug!(server = ?link.server, label = %link.label, "skipping excluded server");
                }
                !excluded
            })
            .collect();

        let resolved = join_all(usable.iter().map(|link| self.resolve(link))).await;
        let links = rank_links(resolved.into_iter().flatten());

        debug!(
            title = %candidate.title,
            listed,
            kept = links.len(),
            "links extracted"
        );
        if links.is_empty() {
            return Err(PipelineError::NoResults {
                stage: Stage::ExtractLinks,
            });
        }
        Ok(links)
    }

    async fn resolve(&self, link: &RawLink) -> Option<QualityLink> {
        let timeout = self.config.link_timeout();
        let locator = match tokio::time::timeout(timeout, self.source.resolve_link(link)).await {
            Ok(Ok(locator)) if !locator.trim().is_empty() => locator,
            Ok(Ok(_)) => {
                warn!(label = %link.label, "link resolved to an empty locator, skipping");
                return None;
            },
            Ok(Err(e)) => {
                warn!(label = %link.label, error = %e, "link resolution failed, skipping");
                return None;
            },
            Err(_) => {
                warn!(label = %link.label, ?timeout, "link resolution timed out, skipping");
                return None;
            },
        };

        Some(QualityLink {
            locator,
            tier: normalize(&link.label),
            label: link.label.clone(),
            server: link.server.clone(),
            size: link.size.clone(),
        })
    }

    /// Create the temp file an acquisition will write into.
    pub fn allocate_asset(&self) -> Result<AcquiredAsset> {
        AcquiredAsset::allocate(&self.config.temp_dir())
            .map_err(|e| PipelineError::acquisition("creating temp file", e))
    }

    /// Fetch `request.link` into `asset` and hand it to `outbound`.
    ///
    /// `asset` is released before returning, whatever the outcome.
    pub async fn acquire_and_deliver(
        &self,
        asset: AcquiredAsset,
        request: DeliveryRequest<'_>,
        outbound: &dyn ChannelOutbound,
    ) -> Result<Delivered> {
        let outcome = self.fetch_and_send(&asset, request, outbound).await;
        asset.release();
        outcome
    }

    async fn fetch_and_send(
        &self,
        asset: &AcquiredAsset,
        request: DeliveryRequest<'_>,
        outbound: &dyn ChannelOutbound,
    ) -> Result<Delivered> {
        let bytes = self.fetch_into(asset, &request.link.locator).await?;

        let filename = delivery_filename(request.title, request.link);
        let caption = delivery_caption(&request, bytes);
        let media = MediaSource::Path(asset.path_buf());
        let sent = match self.config.delivery {
            DeliveryMode::Document => {
                outbound
                    .send_document(request.to, &media, &filename, VIDEO_MIMETYPE, &caption)
                    .await
            },
            DeliveryMode::Video => outbound.send_video(request.to, &media, &caption).await,
        };
        sent.map_err(|e| PipelineError::acquisition("delivering asset", e))?;

        info!(
            to = request.to,
            filename = %filename,
            size = %human_size(bytes),
            "asset delivered"
        );
        Ok(Delivered { filename, bytes })
    }

    async fn fetch_into(&self, asset: &AcquiredAsset, locator: &str) -> Result<u64> {
        let limit = self.config.max_asset_bytes;
        let mut stream = self
            .source
            .fetch_asset(locator)
            .await
            .map_err(|e| PipelineError::acquisition("starting download", e))?;
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(asset.path())
            .await
            .map_err(|e| PipelineError::acquisition("opening temp file", e))?;

        // Bounded per chunk: a long download is fine as long as it keeps moving.
        let idle = self.config.read_timeout();
        let mut received: u64 = 0;
        loop {
            let next = tokio::time::timeout(idle, stream.next()).await.map_err(|e| {
                warn!(received, ?idle, "asset download stalled");
                PipelineError::acquisition("waiting for next chunk", e)
            })?;
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk.map_err(|e| PipelineError::acquisition("reading chunk", e))?;
            received += chunk.len() as u64;
            if received > limit {
                warn!(received, limit, "asset exceeds size ceiling, aborting download");
                return Err(PipelineError::AssetTooLarge { received, limit });
            }
            file.write_all(&chunk)
                .await
                .map_err(|e| PipelineError::acquisition("writing chunk", e))?;
        }
        file.flush()
            .await
            .map_err(|e| PipelineError::acquisition("flushing temp file", e))?;

        debug!(locator, size = received, "asset downloaded");
        Ok(received)
    }
}

/// `<title>-<tier>.mp4`, with path separators stripped from the title.
#[must_use]
pub fn delivery_filename(title: &str, link: &QualityLink) -> String {
    let safe: String = title
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect();
    let safe = if safe.is_empty() {
        "download"
    } else {
        safe.as_str()
    };
    format!("{safe}-{}.mp4", link.tier)
}

fn delivery_caption(request: &DeliveryRequest<'_>, bytes: u64) -> String {
    let link = request.link;
    let mut caption = format!("✅ *{}*\n💾 Quality: {}", request.title, link.tier);
    if !link.label.trim().is_empty() && link.label.trim() != link.tier.as_str() {
        caption.push_str(&format!(" ({})", link.label.trim()));
    }
    caption.push_str(&format!("\n📦 Size: {}", human_size(bytes)));
    if let Some(rating) = request.rating {
        caption.push_str(&format!("\n⭐ Rating: {rating}"));
    }
    if let Some(server) = &link.server {
        caption.push_str(&format!("\n🔗 Server: {server}"));
    }
    caption
}

#[cfg(test)]
mod tests {
    use std::{path::Path, time::Duration};

    use {
        async_trait::async_trait,
        bytes::Bytes,
        reelbot_channels::{CapturingOutbound, SentMessage},
    };

    use super::*;
    use crate::{
        error::{SourceError, SourceResult},
        quality::Tier,
        source::AssetStream,
    };

    /// Scripted source: canned answers, optional per-link delays.
    #[derive(Default)]
    struct FakeSource {
        candidates: Vec<Candidate>,
        fail_search: bool,
        metadata: Option<Metadata>,
        links: Vec<RawLink>,
        slow_links: Vec<String>,
        asset_chunks: Vec<usize>,
        /// Stop sending after the chunks above without ending the body.
        stall: bool,
    }

    #[async_trait]
    impl Source for FakeSource {
        async fn search(&self, _query: &str) -> SourceResult<Vec<Candidate>> {
            if self.fail_search {
                return Err(SourceError::message("connection refused"));
            }
            Ok(self.candidates.clone())
        }

        async fn fetch_metadata(&self, _locator: &str) -> SourceResult<Metadata> {
            self.metadata
                .clone()
                .ok_or_else(|| SourceError::message("unreachable"))
        }

        async fn extract_links(&self, _locator: &str) -> SourceResult<Vec<RawLink>> {
            Ok(self.links.clone())
        }

        async fn resolve_link(&self, link: &RawLink) -> SourceResult<String> {
            if self.slow_links.contains(&link.locator) {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            if link.locator == "broken" {
                return Err(SourceError::message("404"));
            }
            Ok(link.locator.clone())
        }

        async fn fetch_asset(&self, _locator: &str) -> SourceResult<AssetStream> {
            let chunks: Vec<SourceResult<Bytes>> = self
                .asset_chunks
                .iter()
                .map(|n| Ok(Bytes::from(vec![0u8; *n])))
                .collect();
            let body = futures::stream::iter(chunks);
            if self.stall {
                Ok(body.chain(futures::stream::pending()).boxed())
            } else {
                Ok(body.boxed())
            }
        }
    }

    fn candidate(i: usize) -> Candidate {
        Candidate {
            title: format!("Movie {i}"),
            locator: format!("movie/{i}"),
            thumbnail: None,
            hints: Default::default(),
        }
    }

    fn raw(locator: &str, label: &str, server: Option<&str>) -> RawLink {
        RawLink {
            locator: locator.into(),
            label: label.into(),
            server: server.map(Into::into),
            size: Some("1.2 GB".into()),
            direct: true,
        }
    }

    fn config(temp_dir: &Path) -> PipelineConfig {
        PipelineConfig {
            temp_dir: Some(temp_dir.to_path_buf()),
            link_timeout_secs: 1,
            ..Default::default()
        }
    }

    fn pipeline(source: FakeSource, config: PipelineConfig) -> Pipeline {
        Pipeline::new(Arc::new(source), config)
    }

    fn dir_is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn search_caps_results_and_drops_empty_locators() {
        let mut candidates: Vec<Candidate> = (1..=15).map(candidate).collect();
        candidates[0].locator = "  ".into();
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(
            FakeSource {
                candidates,
                ..Default::default()
            },
            config(dir.path()),
        );

        let found = p.search("movie").await.unwrap();
        assert_eq!(found.len(), 10);
        assert!(found.iter().all(|c| !c.locator.is_empty()));
        assert_eq!(found[0].title, "Movie 2");
    }

    #[tokio::test]
    async fn search_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        let empty = pipeline(FakeSource::default(), config(dir.path()));
        assert!(matches!(
            empty.search("no_such_movie_xyz").await,
            Err(PipelineError::NoResults {
                stage: Stage::Search
            })
        ));
        assert!(matches!(
            empty.search("   ").await,
            Err(PipelineError::NoResults { .. })
        ));

        let down = pipeline(
            FakeSource {
                fail_search: true,
                ..Default::default()
            },
            config(dir.path()),
        );
        assert!(matches!(
            down.search("test").await,
            Err(PipelineError::SourceUnavailable {
                stage: Stage::Search,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn metadata_failure_is_source_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(FakeSource::default(), config(dir.path()));
        assert!(matches!(
            p.metadata(&candidate(1)).await,
            Err(PipelineError::SourceUnavailable {
                stage: Stage::Metadata,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn extract_links_ranks_dedups_and_skips_failures() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(
            FakeSource {
                links: vec![
                    raw("a", "SD 480p", Some("Pixeldrain")),
                    raw("tg", "FHD 1080p", Some("Telegram")),
                    raw("b", "HD 720p", Some("Pixeldrain")),
                    raw("broken", "4K", None),
                    raw("slow", "UHD", None),
                    raw("c", "1080p", Some("Mega")),
                    raw("d", "720p", Some("Mega")),
                ],
                slow_links: vec!["slow".into()],
                ..Default::default()
            },
            config(dir.path()),
        );

        let links = p.extract_links(&candidate(1)).await.unwrap();
        let summary: Vec<(Tier, &str)> = links
            .iter()
            .map(|l| (l.tier, l.locator.as_str()))
            .collect();
        assert_eq!(summary, vec![
            (Tier::Fhd1080p, "c"),
            (Tier::Hd720p, "b"),
            (Tier::Sd480p, "a"),
        ]);
    }

    #[tokio::test]
    async fn extract_links_empty_is_no_results() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(
            FakeSource {
                links: vec![raw("tg", "720p", Some("telegram"))],
                ..Default::default()
            },
            config(dir.path()),
        );
        assert!(matches!(
            p.extract_links(&candidate(1)).await,
            Err(PipelineError::NoResults {
                stage: Stage::ExtractLinks
            })
        ));
    }

    fn quality_link() -> QualityLink {
        QualityLink {
            locator: "https://cdn/x.mp4".into(),
            tier: Tier::Hd720p,
            label: "HD 720p".into(),
            server: Some("Pixeldrain".into()),
            size: None,
        }
    }

    #[tokio::test]
    async fn acquire_and_deliver_sends_document_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(
            FakeSource {
                asset_chunks: vec![1024, 1024, 512],
                ..Default::default()
            },
            config(dir.path()),
        );
        let out = CapturingOutbound::new();
        let link = quality_link();

        let asset = p.allocate_asset().unwrap();
        let delivered = p
            .acquire_and_deliver(
                asset,
                DeliveryRequest {
                    to: "u1",
                    title: "Avatar: The Way of Water",
                    rating: Some("7.6"),
                    link: &link,
                },
                &out,
            )
            .await
            .unwrap();

        assert_eq!(delivered.bytes, 2560);
        assert_eq!(delivered.filename, "Avatar_ The Way of Water-720p.mp4");
        match &out.sent()[0] {
            SentMessage::Document {
                mimetype,
                caption,
                file_len,
                ..
            } => {
                assert_eq!(mimetype, "video/mp4");
                assert_eq!(*file_len, Some(2560));
                assert!(caption.contains("720p (HD 720p)"));
                assert!(caption.contains("Rating: 7.6"));
            },
            other => panic!("unexpected message: {other:?}"),
        }
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn oversized_asset_is_rejected_and_released() {
        let dir = tempfile::tempdir().unwrap();
        let mb = 1024 * 1024;
        let p = pipeline(
            FakeSource {
                asset_chunks: vec![5 * mb; 4],
                ..Default::default()
            },
            PipelineConfig {
                max_asset_bytes: 15 * mb as u64,
                ..config(dir.path())
            },
        );
        let out = CapturingOutbound::new();
        let link = quality_link();

        let asset = p.allocate_asset().unwrap();
        let err = p
            .acquire_and_deliver(
                asset,
                DeliveryRequest {
                    to: "u1",
                    title: "Big",
                    rating: None,
                    link: &link,
                },
                &out,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::AssetTooLarge { limit, .. } if limit == 15 * mb as u64));
        assert!(out.sent().is_empty());
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn delivery_failure_still_releases() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(
            FakeSource {
                asset_chunks: vec![10],
                ..Default::default()
            },
            PipelineConfig {
                delivery: DeliveryMode::Video,
                ..config(dir.path())
            },
        );
        let out = CapturingOutbound::new();
        out.fail_media(true);
        let link = quality_link();

        let asset = p.allocate_asset().unwrap();
        let err = p
            .acquire_and_deliver(
                asset,
                DeliveryRequest {
                    to: "u1",
                    title: "Clip",
                    rating: None,
                    link: &link,
                },
                &out,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::AcquisitionFailed { .. }));
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_download_times_out_and_releases() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(
            FakeSource {
                asset_chunks: vec![1024],
                stall: true,
                ..Default::default()
            },
            PipelineConfig {
                read_timeout_secs: 30,
                ..config(dir.path())
            },
        );
        let out = CapturingOutbound::new();
        let link = quality_link();

        let asset = p.allocate_asset().unwrap();
        let err = p
            .acquire_and_deliver(
                asset,
                DeliveryRequest {
                    to: "u1",
                    title: "Stuck",
                    rating: None,
                    link: &link,
                },
                &out,
            )
            .await
            .unwrap_err();

        assert!(
            matches!(&err, PipelineError::AcquisitionFailed { context, .. } if context == "waiting for next chunk")
        );
        assert!(out.sent().is_empty());
        assert!(dir_is_empty(dir.path()));
    }

    #[test]
    fn filename_falls_back_for_blank_title() {
        assert_eq!(delivery_filename("  ", &quality_link()), "download-720p.mp4");
    }
}
