//! The movie retrieval workflow: search, pick a result, pick a quality, receive the file.
//!
//! Each step is one handler invocation. Between steps the sender's progress
//! lives in their [`SessionRecord`]; any failure ends the workflow and removes it.

use std::{sync::Arc, time::Duration};

use {
    async_trait::async_trait,
    tokio::time::MissedTickBehavior,
    tracing::{debug, info, warn},
};

use {
    reelbot_common::{now_ms, types::MediaSource},
    reelbot_pipeline::{
        DeliveryRequest, Pipeline, PipelineError, Stage, parse_selection, select,
    },
    reelbot_sessions::{SessionRecord, SessionStage},
};

use crate::{
    error::Result,
    format,
    help::HelpCommand,
    router::{CommandContext, CommandRouter, CommandSpec, Continuation, KeywordCommand},
};

const EMPTY_QUERY: &str = "❌ Please provide a movie name.";
const DOWNLOADING: &str = "⏳ Downloading your movie, please wait...";

/// How often a running acquisition refreshes its session so the sweeper leaves
/// its temp file alone. Must stay well below the session TTL.
pub const ACQUISITION_KEEPALIVE: Duration = Duration::from_secs(30);

/// Register the search command, both continuations, and `help` on `router`.
pub fn install(router: &mut CommandRouter, pipeline: Arc<Pipeline>) -> Result<()> {
    router.register_command(Arc::new(SearchCommand::new(Arc::clone(&pipeline))))?;
    router.register_continuation(Arc::new(SelectionContinuation::new(Arc::clone(&pipeline))));
    router.register_continuation(Arc::new(QualityContinuation::new(pipeline)));

    let help = HelpCommand::new(router.display_prefix(), router.command_specs());
    router.register_command(Arc::new(help))
}

/// Reply with `err`'s user message after dropping the sender's session.
async fn end_workflow(ctx: &CommandContext, err: &PipelineError) -> anyhow::Result<()> {
    ctx.sessions.remove(&ctx.sender_id);
    ctx.reply(&err.user_message()).await
}

/// Send `text` as an image caption when a thumbnail is available, as plain text otherwise.
async fn reply_with_thumbnail(
    ctx: &CommandContext,
    thumbnail: Option<&str>,
    text: &str,
) -> anyhow::Result<()> {
    match thumbnail.map(str::trim).filter(|t| !t.is_empty()) {
        Some(url) => {
            ctx.outbound
                .send_image(&ctx.sender_id, &MediaSource::url(url), text)
                .await?;
            Ok(())
        },
        None => ctx.reply(text).await,
    }
}

/// `.search <query>` (aliases `movie`, `film`).
pub struct SearchCommand {
    pipeline: Arc<Pipeline>,
}

impl SearchCommand {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl KeywordCommand for SearchCommand {
    fn spec(&self) -> CommandSpec {
        CommandSpec {
            name: "search",
            aliases: &["movie", "film"],
            description: "Search for a movie and download it",
        }
    }

    async fn run(&self, ctx: &CommandContext) -> anyhow::Result<()> {
        let query = ctx.args.trim();
        if query.is_empty() {
            return ctx.reply(EMPTY_QUERY).await;
        }

        let candidates = match self.pipeline.search(query).await {
            Ok(candidates) => candidates,
            Err(e) => {
                info!(sender_id = %ctx.sender_id, query, error = %e, "search ended the workflow");
                return ctx.reply(&e.user_message()).await;
            },
        };

        info!(sender_id = %ctx.sender_id, query, count = candidates.len(), "search results");
        let text = format::candidate_list(query, &candidates);
        let thumbnail = candidates.first().and_then(|c| c.thumbnail.clone());
        // Stored before replying so a fast answer finds it.
        ctx.sessions.put(
            &ctx.sender_id,
            SessionRecord::awaiting_selection(candidates, now_ms()),
        );
        reply_with_thumbnail(ctx, thumbnail.as_deref(), &text).await
    }
}

/// Numbered reply to a search result list.
pub struct SelectionContinuation {
    pipeline: Arc<Pipeline>,
}

impl SelectionContinuation {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl Continuation for SelectionContinuation {
    fn stage(&self) -> SessionStage {
        SessionStage::AwaitingSelection
    }

    async fn run(&self, ctx: &CommandContext, record: SessionRecord) -> anyhow::Result<()> {
        let Some(index) = parse_selection(&ctx.text) else {
            return Ok(());
        };
        let candidate = match select(&record.candidates, index) {
            Ok(candidate) => candidate.clone(),
            Err(e) => return end_workflow(ctx, &e).await,
        };
        debug!(sender_id = %ctx.sender_id, index, title = %candidate.title, "candidate selected");

        let (metadata, links) = tokio::join!(
            self.pipeline.metadata(&candidate),
            self.pipeline.extract_links(&candidate)
        );
        let metadata = match metadata {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(sender_id = %ctx.sender_id, title = %candidate.title, error = %e, "metadata stage failed");
                return end_workflow(ctx, &e).await;
            },
        };
        let links = match links {
            Ok(links) => links,
            Err(e) => {
                warn!(sender_id = %ctx.sender_id, title = %candidate.title, error = %e, "link stage failed");
                return end_workflow(ctx, &e).await;
            },
        };

        let text = format::quality_list(&candidate.title, &metadata, &links);
        let thumbnail = metadata
            .thumbnail
            .clone()
            .or_else(|| candidate.thumbnail.clone());
        let Some(next) = record.with_quality_choices(candidate, metadata, links, now_ms()) else {
            let empty = PipelineError::NoResults {
                stage: Stage::ExtractLinks,
            };
            return end_workflow(ctx, &empty).await;
        };
        ctx.sessions.put(&ctx.sender_id, next);
        reply_with_thumbnail(ctx, thumbnail.as_deref(), &text).await
    }
}

/// Numbered reply to a quality list; runs the acquisition.
pub struct QualityContinuation {
    pipeline: Arc<Pipeline>,
}

impl QualityContinuation {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl Continuation for QualityContinuation {
    fn stage(&self) -> SessionStage {
        SessionStage::AwaitingQuality
    }

    /// Replies are ignored while an acquisition for this session is running.
    fn accepts(&self, text: &str, record: &SessionRecord) -> bool {
        record.asset.is_none() && parse_selection(text).is_some()
    }

    async fn run(&self, ctx: &CommandContext, mut record: SessionRecord) -> anyhow::Result<()> {
        let Some(index) = parse_selection(&ctx.text) else {
            return Ok(());
        };
        let link = match select(record.links(), index) {
            Ok(link) => link.clone(),
            Err(e) => return end_workflow(ctx, &e).await,
        };
        let fallback = record.selected().map_or("", |c| c.title.as_str()).to_string();
        let title = record
            .metadata()
            .map_or(fallback.as_str(), |m| m.title_or(&fallback))
            .to_string();
        let rating = record
            .metadata()
            .and_then(|m| m.rating.clone())
            .filter(|r| !r.trim().is_empty());

        ctx.reply(DOWNLOADING).await?;

        let asset = match self.pipeline.allocate_asset() {
            Ok(asset) => asset,
            Err(e) => {
                warn!(sender_id = %ctx.sender_id, error = %e, "could not allocate temp file");
                return end_workflow(ctx, &e).await;
            },
        };
        let asset_path = asset.path_buf();
        record.asset = Some(asset_path.clone());
        record.touch(now_ms());
        ctx.sessions.put(&ctx.sender_id, record);

        info!(sender_id = %ctx.sender_id, title = %title, tier = %link.tier, "acquisition started");
        let acquisition = self.pipeline.acquire_and_deliver(
            asset,
            DeliveryRequest {
                to: &ctx.sender_id,
                title: &title,
                rating: rating.as_deref(),
                link: &link,
            },
            ctx.outbound.as_ref(),
        );
        tokio::pin!(acquisition);
        let mut keepalive = tokio::time::interval(ACQUISITION_KEEPALIVE);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
        keepalive.tick().await;
        let outcome = loop {
            tokio::select! {
                outcome = &mut acquisition => break outcome,
                _ = keepalive.tick() => {
                    ctx.sessions.update(&ctx.sender_id, &mut |r| {
                        if r.asset.as_deref() == Some(asset_path.as_path()) {
                            r.touch(now_ms());
                        }
                    });
                },
            }
        };

        // Only our own record; a newer search may have replaced it meanwhile.
        if ctx
            .sessions
            .get(&ctx.sender_id)
            .is_some_and(|r| r.asset.as_deref() == Some(asset_path.as_path()))
        {
            ctx.sessions.remove(&ctx.sender_id);
        }

        match outcome {
            Ok(delivered) => {
                info!(
                    sender_id = %ctx.sender_id,
                    filename = %delivered.filename,
                    bytes = delivered.bytes,
                    "workflow completed"
                );
                Ok(())
            },
            Err(e) => {
                warn!(sender_id = %ctx.sender_id, error = %e, "acquisition failed");
                ctx.reply(&e.user_message()).await
            },
        }
    }
}
