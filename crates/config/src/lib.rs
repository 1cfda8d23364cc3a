//! Configuration loading, env substitution, and validation.
//!
//! Config files: `reelbot.toml`, `reelbot.yaml`, or `reelbot.json`
//! Searched in `./` then `~/.config/reelbot/`.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-fallback}` substitution in the raw text.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{config_dir, discover_and_load, find_config_file, load_config},
    schema::{
        BotConfig, DeliveryMode, PipelineConfig, ReelbotConfig, SessionsConfig, SourceConfig,
        SourceKind,
    },
    validate::{Diagnostic, Severity, validate},
};
