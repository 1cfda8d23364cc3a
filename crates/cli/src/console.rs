//! Stdin/stdout transport for running the bot locally.
//!
//! Each input line is one inbound message, `sender: text` or just `text`
//! (sender `console`). Replies are printed; delivered files are optionally
//! copied into an output directory.

use std::{path::PathBuf, sync::Arc};

use {
    async_trait::async_trait,
    tokio::{
        io::{AsyncBufReadExt, BufReader},
        task::JoinSet,
    },
    tracing::{debug, info, warn},
};

use {
    reelbot_auto_reply::CommandRouter,
    reelbot_channels::{ChannelOutbound, Error, InboundEvent, Result},
    reelbot_common::types::MediaSource,
};

pub const DEFAULT_SENDER: &str = "console";

/// Split a console line into an inbound event.
pub fn parse_line(line: &str) -> Option<InboundEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match line.split_once(':') {
        Some((sender, text))
            if !sender.is_empty() && !sender.contains(char::is_whitespace) && !text.trim().is_empty() =>
        {
            Some(InboundEvent::new(sender, text.trim()))
        },
        _ => Some(InboundEvent::new(DEFAULT_SENDER, line)),
    }
}

/// Prints every outbound message to stdout.
#[derive(Default)]
pub struct ConsoleOutbound {
    output_dir: Option<PathBuf>,
}

impl ConsoleOutbound {
    pub fn new(output_dir: Option<PathBuf>) -> Self {
        Self { output_dir }
    }

    /// Copy a delivered file out of its temp location before it is released.
    async fn keep(&self, media: &MediaSource, filename: &str) -> reelbot_common::Result<Option<PathBuf>> {
        let (Some(dir), MediaSource::Path(path)) = (&self.output_dir, media) else {
            return Ok(None);
        };
        tokio::fs::create_dir_all(dir).await?;
        let dest = dir.join(filename);
        tokio::fs::copy(path, &dest).await?;
        Ok(Some(dest))
    }

    async fn location(&self, media: &MediaSource, filename: &str) -> Result<String> {
        match self.keep(media, filename).await {
            Ok(Some(saved)) => Ok(saved.display().to_string()),
            Ok(None) => Ok(media.to_string()),
            Err(e) => Err(Error::external("saving delivered file", e)),
        }
    }
}

#[async_trait]
impl ChannelOutbound for ConsoleOutbound {
    async fn send_text(&self, to: &str, text: &str) -> Result<()> {
        println!("→ {to}\n{text}\n");
        Ok(())
    }

    async fn send_image(&self, to: &str, image: &MediaSource, caption: &str) -> Result<()> {
        println!("→ {to} [image {image}]\n{caption}\n");
        Ok(())
    }

    async fn send_document(
        &self,
        to: &str,
        document: &MediaSource,
        filename: &str,
        mimetype: &str,
        caption: &str,
    ) -> Result<()> {
        let location = self.location(document, filename).await?;
        println!("→ {to} [document {filename} ({mimetype}) at {location}]\n{caption}\n");
        Ok(())
    }

    async fn send_video(&self, to: &str, video: &MediaSource, caption: &str) -> Result<()> {
        let name = match video {
            MediaSource::Path(path) => path
                .file_name()
                .map_or_else(|| "video".to_string(), |n| n.to_string_lossy().into_owned()),
            MediaSource::Url(_) => "video".to_string(),
        };
        let location = self.location(video, &name).await?;
        println!("→ {to} [video at {location}]\n{caption}\n");
        Ok(())
    }
}

/// Feed stdin lines to `router` until EOF or Ctrl-C.
///
/// Every event runs in its own task. On EOF in-flight handlers are awaited; on
/// Ctrl-C they are aborted.
pub async fn serve(router: Arc<CommandRouter>) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tasks = JoinSet::new();

    info!("reading messages from stdin (\"sender: text\" or \"text\")");
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    debug!(in_flight = tasks.len(), "stdin closed");
                    break;
                };
                let Some(event) = parse_line(&line) else {
                    continue;
                };
                let router = Arc::clone(&router);
                tasks.spawn(async move {
                    let outcome = router.dispatch(&event).await;
                    debug!(sender_id = %event.sender_id, ?outcome, "event handled");
                });
            },
            _ = tokio::signal::ctrl_c() => {
                info!(in_flight = tasks.len(), "interrupted, aborting in-flight handlers");
                tasks.abort_all();
                break;
            },
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = joined {
                    warn!(error = %e, "handler task failed");
                }
            },
        }
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined
            && !e.is_cancelled()
        {
            warn!(error = %e, "handler task failed");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sender_prefix() {
        let event = parse_line("94770000000: .movie avatar").unwrap();
        assert_eq!(event.sender_id, "94770000000");
        assert_eq!(event.text, ".movie avatar");
    }

    #[test]
    fn bare_lines_use_console_sender() {
        let event = parse_line(".movie avatar: the way of water").unwrap();
        assert_eq!(event.sender_id, DEFAULT_SENDER);
        assert_eq!(event.text, ".movie avatar: the way of water");

        assert_eq!(parse_line("2").unwrap().sender_id, DEFAULT_SENDER);
        assert!(parse_line("   ").is_none());
    }

    #[tokio::test]
    async fn document_is_copied_to_output_dir() {
        let temp = tempfile::tempdir().unwrap();
        let src = temp.path().join("reelbot-1.part");
        std::fs::write(&src, b"movie").unwrap();
        let out_dir = temp.path().join("out");

        let outbound = ConsoleOutbound::new(Some(out_dir.clone()));
        outbound
            .send_document(
                "u1",
                &MediaSource::Path(src),
                "Movie-720p.mp4",
                "video/mp4",
                "caption",
            )
            .await
            .unwrap();
        assert_eq!(std::fs::read(out_dir.join("Movie-720p.mp4")).unwrap(), b"movie");
    }
}
