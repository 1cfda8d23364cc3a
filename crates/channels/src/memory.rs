//! In-memory outbound that records every send. No transport — for tests and dry runs.

use std::sync::{
    Mutex,
    atomic::{AtomicBool, Ordering},
};

use {async_trait::async_trait, reelbot_common::types::MediaSource};

use crate::{ChannelOutbound, Error, Result};

/// One recorded outbound payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentMessage {
    Text {
        to: String,
        text: String,
    },
    Image {
        to: String,
        image: MediaSource,
        caption: String,
    },
    Document {
        to: String,
        document: MediaSource,
        filename: String,
        mimetype: String,
        caption: String,
        /// Size of the file on disk at send time, for [`MediaSource::Path`].
        file_len: Option<u64>,
    },
    Video {
        to: String,
        video: MediaSource,
        caption: String,
        file_len: Option<u64>,
    },
}

impl SentMessage {
    /// Text body or caption of the message.
    #[must_use]
    pub fn body(&self) -> &str {
        match self {
            Self::Text { text, .. } => text,
            Self::Image { caption, .. }
            | Self::Document { caption, .. }
            | Self::Video { caption, .. } => caption,
        }
    }

    #[must_use]
    pub fn recipient(&self) -> &str {
        match self {
            Self::Text { to, .. }
            | Self::Image { to, .. }
            | Self::Document { to, .. }
            | Self::Video { to, .. } => to,
        }
    }
}

#[derive(Default)]
pub struct CapturingOutbound {
    sent: Mutex<Vec<SentMessage>>,
    fail_media: AtomicBool,
}

impl CapturingOutbound {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make document and video sends fail with [`Error::Rejected`].
    pub fn fail_media(&self, fail: bool) {
        self.fail_media.store(fail, Ordering::SeqCst);
    }

    #[must_use]
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Bodies and captions of everything sent so far, in order.
    #[must_use]
    pub fn bodies(&self) -> Vec<String> {
        self.sent().iter().map(|m| m.body().to_string()).collect()
    }

    #[must_use]
    pub fn last_body(&self) -> Option<String> {
        self.sent().last().map(|m| m.body().to_string())
    }

    fn record(&self, message: SentMessage) {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message);
    }

    fn check_media(&self) -> Result<()> {
        if self.fail_media.load(Ordering::SeqCst) {
            return Err(Error::rejected("media sends disabled"));
        }
        Ok(())
    }
}

fn file_len(source: &MediaSource) -> Option<u64> {
    match source {
        MediaSource::Path(path) => std::fs::metadata(path).ok().map(|m| m.len()),
        MediaSource::Url(_) => None,
    }
}

#[async_trait]
impl ChannelOutbound for CapturingOutbound {
    async fn send_text(&self, to: &str, text: &str) -> Result<()> {
        self.record(SentMessage::Text {
            to: to.into(),
            text: text.into(),
        });
        Ok(())
    }

    async fn send_image(&self, to: &str, image: &MediaSource, caption: &str) -> Result<()> {
        self.record(SentMessage::Image {
            to: to.into(),
            image: image.clone(),
            caption: caption.into(),
        });
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
        self.check_media()?;
        self.record(SentMessage::Document {
            to: to.into(),
            document: document.clone(),
            filename: filename.into(),
            mimetype: mimetype.into(),
            caption: caption.into(),
            file_len: file_len(document),
        });
        Ok(())
    }

    async fn send_video(&self, to: &str, video: &MediaSource, caption: &str) -> Result<()> {
        self.check_media()?;
        self.record(SentMessage::Video {
            to: to.into(),
            video: video.clone(),
            caption: caption.into(),
            file_len: file_len(video),
        });
        Ok(())
    }
}
