use std::error::Error as StdError;

/// Crate-wide result type for channel operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed errors a [`ChannelOutbound`](crate::ChannelOutbound) can report.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The transport refused the payload (too large, bad media, blocked peer).
    #[error("channel rejected payload: {message}")]
    Rejected { message: String },

    /// Transport is not connected or not configured.
    #[error("channel unavailable: {message}")]
    Unavailable { message: String },

    /// Wrapped source error from the transport.
    #[error("channel send failed: {context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl Error {
    #[must_use]
    pub fn rejected(message: impl std::fmt::Display) -> Self {
        Self::Rejected {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn unavailable(message: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }
}
