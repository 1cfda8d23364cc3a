//! Config schema: bot routing, session lifetime, pipeline limits, and source access.

use std::{path::PathBuf, time::Duration};

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Upper bound on how many search candidates are offered in one numbered list.
pub const MAX_RESULTS_CAP: usize = 10;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReelbotConfig {
    pub bot: BotConfig,
    pub sessions: SessionsConfig,
    pub pipeline: PipelineConfig,
    pub source: SourceConfig,
}

/// Inbound command handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// A keyword command must start with one of these (".movie", "/movie").
    /// Empty accepts bare keywords.
    pub command_prefixes: Vec<String>,
    /// Run handlers for the same sender one at a time.
    pub serialize_per_user: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            command_prefixes: vec![".".into(), "/".into(), "!".into()],
            serialize_per_user: false,
        }
    }
}

/// Pending-workflow lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    pub ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 600,
            sweep_interval_secs: 300,
        }
    }
}

impl SessionsConfig {
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// How an acquired asset is handed to the channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    #[default]
    Document,
    Video,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Search results offered to the user (never more than [`MAX_RESULTS_CAP`]).
    pub max_results: usize,
    /// Bound on each individual link resolution.
    pub link_timeout_secs: u64,
    /// Longest wait for the next chunk of an asset download.
    pub read_timeout_secs: u64,
    /// Transport size ceiling for a delivered asset.
    pub max_asset_bytes: u64,
    /// Where acquisition temp files are written. System temp dir when unset.
    pub temp_dir: Option<PathBuf>,
    /// Raw links served from these servers are dropped (case-insensitive).
    pub excluded_servers: Vec<String>,
    pub delivery: DeliveryMode,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_results: MAX_RESULTS_CAP,
            link_timeout_secs: 20,
            read_timeout_secs: 60,
            max_asset_bytes: 2 * 1024 * 1024 * 1024,
            temp_dir: None,
            excluded_servers: vec!["telegram".into()],
            delivery: DeliveryMode::Document,
        }
    }
}

impl PipelineConfig {
    /// Configured result count clamped to `1..=MAX_RESULTS_CAP`.
    #[must_use]
    pub fn result_limit(&self) -> usize {
        self.max_results.clamp(1, MAX_RESULTS_CAP)
    }

    #[must_use]
    pub fn link_timeout(&self) -> Duration {
        Duration::from_secs(self.link_timeout_secs)
    }

    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    #[must_use]
    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    #[must_use]
    pub fn is_excluded_server(&self, server: &str) -> bool {
        self.excluded_servers
            .iter()
            .any(|s| s.eq_ignore_ascii_case(server.trim()))
    }
}

/// Which content source implementation backs the pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    #[default]
    Http,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    /// Base URL of the JSON content API.
    pub base_url: String,
    /// Sent as a bearer token when set.
    #[serde(
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub api_key: Option<Secret<String>>,
    pub request_timeout_secs: u64,
}

impl std::fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceConfig")
            .field("kind", &self.kind)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Http,
            base_url: String::new(),
            api_key: None,
            request_timeout_secs: 30,
        }
    }
}

impl SourceConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_str(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}
