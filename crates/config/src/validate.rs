//! Semantic checks on a loaded configuration.

use crate::schema::{MAX_RESULTS_CAP, ReelbotConfig, SourceKind};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "sessions.ttl_secs"
    pub path: &'static str,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]: {}", self.severity, self.path, self.message)
    }
}

/// Check `config` for values the runtime can't work with.
#[must_use]
pub fn validate(config: &ReelbotConfig) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    let mut push = |severity, path, message: &str| {
        out.push(Diagnostic {
            severity,
            path,
            message: message.to_string(),
        });
    };

    if config.sessions.ttl_secs == 0 {
        push(
            Severity::Error,
            "sessions.ttl_secs",
            "must be greater than zero",
        );
    }
    if config.sessions.sweep_interval_secs == 0 {
        push(
            Severity::Error,
            "sessions.sweep_interval_secs",
            "must be greater than zero",
        );
    }
    if config.pipeline.max_results == 0 {
        push(
            Severity::Error,
            "pipeline.max_results",
            "must be at least 1",
        );
    } else if config.pipeline.max_results > MAX_RESULTS_CAP {
        push(
            Severity::Warning,
            "pipeline.max_results",
            &format!("capped at {MAX_RESULTS_CAP}"),
        );
    }
    if config.pipeline.link_timeout_secs == 0 {
        push(
            Severity::Error,
            "pipeline.link_timeout_secs",
            "must be greater than zero",
        );
    }
    if config.pipeline.read_timeout_secs == 0 {
        push(
            Severity::Error,
            "pipeline.read_timeout_secs",
            "must be greater than zero",
        );
    }
    if config.pipeline.max_asset_bytes == 0 {
        push(
            Severity::Error,
            "pipeline.max_asset_bytes",
            "must be greater than zero",
        );
    }
    if config.source.kind == SourceKind::Http && config.source.base_url.trim().is_empty() {
        push(
            Severity::Error,
            "source.base_url",
            "required for the http source",
        );
    }
    if config.source.request_timeout_secs == 0 {
        push(
            Severity::Error,
            "source.request_timeout_secs",
            "must be greater than zero",
        );
    }

    out
}
