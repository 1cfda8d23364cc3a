//! Payload types shared between the pipeline and the channel layer.

use std::{fmt, path::PathBuf};

use serde::{Deserialize, Serialize};

/// Where a media payload can be read from when handing it to a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MediaSource {
    /// Remote URL the channel fetches itself.
    Url(String),
    /// Local file owned by the caller for the duration of the send.
    Path(PathBuf),
}

impl MediaSource {
    #[must_use]
    pub fn url(url: impl Into<String>) -> Self {
        Self::Url(url.into())
    }
}

impl fmt::Display for MediaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => f.write_str(url),
            Self::Path(path) => write!(f, "{}", path.display()),
        }
    }
}
