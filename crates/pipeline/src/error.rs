use std::{error::Error as StdError, fmt, time::Duration};

use crate::asset::human_size;

/// Pipeline stage, used to attribute failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Search,
    Metadata,
    ExtractLinks,
    AcquireAndDeliver,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Search => "search",
            Self::Metadata => "metadata",
            Self::ExtractLinks => "extract_links",
            Self::AcquireAndDeliver => "acquire_and_deliver",
        })
    }
}

/// Errors raised by a [`Source`](crate::source::Source) implementation.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("{url} timed out after {after:?}")]
    Timeout { url: String, after: Duration },

    #[error("{0}")]
    Message(String),
}

impl SourceError {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

/// Stage outcomes that end the user's workflow.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Search or link extraction came back empty.
    #[error("{stage}: no results")]
    NoResults { stage: Stage },

    #[error("{stage}: source unavailable: {source}")]
    SourceUnavailable {
        stage: Stage,
        #[source]
        source: SourceError,
    },

    #[error("selection {index} out of range 1..={len}")]
    InvalidSelection { index: usize, len: usize },

    #[error("asset exceeds limit: received {received} bytes, limit {limit}")]
    AssetTooLarge { received: u64, limit: u64 },

    #[error("acquisition failed: {context}: {source}")]
    AcquisitionFailed {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl PipelineError {
    #[must_use]
    pub fn unavailable(stage: Stage, source: SourceError) -> Self {
        Self::SourceUnavailable { stage, source }
    }

    #[must_use]
    pub fn acquisition(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::AcquisitionFailed {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// The single message shown to the user when this error ends a workflow.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NoResults {
                stage: Stage::ExtractLinks,
            } => "❌ No download links found.".into(),
            Self::NoResults { .. } => "❌ No results found.".into(),
            Self::SourceUnavailable {
                stage: Stage::Search,
                ..
            } => "❌ Sorry, something went wrong while searching.".into(),
            Self::SourceUnavailable { .. } => "❌ Failed to fetch details or qualities.".into(),
            Self::InvalidSelection { .. } => "❌ Invalid selection.".into(),
            Self::AssetTooLarge { limit, .. } => format!(
                "❌ File is too large to send (limit {}).",
                human_size(*limit)
            ),
            Self::AcquisitionFailed { .. } => "❌ Failed to fetch or send the file.".into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
pub type SourceResult<T> = std::result::Result<T, SourceError>;
