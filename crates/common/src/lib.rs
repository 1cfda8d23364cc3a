//! Shared types, error definitions, and utilities used across all reelbot crates.

pub mod error;
pub mod types;

pub use error::{Error, FromMessage, Result};

/// Milliseconds since the Unix epoch, saturating to zero on a skewed clock.
#[must_use]
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
