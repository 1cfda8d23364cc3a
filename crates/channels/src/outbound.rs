use {async_trait::async_trait, reelbot_common::types::MediaSource};

use crate::Result;

/// Send messages back to a user on the originating channel.
///
/// Every method resolves once the transport has accepted (or rejected) the
/// payload. For [`MediaSource::Path`] the file only has to exist until the
/// returned future completes.
#[async_trait]
pub trait ChannelOutbound: Send + Sync {
    async fn send_text(&self, to: &str, text: &str) -> Result<()>;

    async fn send_image(&self, to: &str, image: &MediaSource, caption: &str) -> Result<()>;

    async fn send_document(
        &self,
        to: &str,
        document: &MediaSource,
        filename: &str,
        mimetype: &str,
        caption: &str,
    ) -> Result<()>;

    async fn send_video(&self, to: &str, video: &MediaSource, caption: &str) -> Result<()>;
}
