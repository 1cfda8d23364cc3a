use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{
    error::{Context, Error, Result},
    env_subst::substitute_env,
    schema::ReelbotConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "reelbot.toml",
    "reelbot.yaml",
    "reelbot.yml",
    "reelbot.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<ReelbotConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&substitute_env(&raw), path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./reelbot.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/reelbot/reelbot.{toml,yaml,yml,json}` (user-global)
///
/// Returns `ReelbotConfig::default()` if no config file is found or it fails to parse.
pub fn discover_and_load() -> ReelbotConfig {
    let Some(path) = find_config_file() else {
        debug!("no config file found, using defaults");
        return ReelbotConfig::default();
    };

    debug!(path = %path.display(), "loading config");
    match load_config(&path) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            ReelbotConfig::default()
        },
    }
}

/// Returns the user-global config directory (`~/.config/reelbot/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "reelbot").map(|d| d.config_dir().to_path_buf())
}

/// First config file found in the standard locations, if any.
pub fn find_config_file() -> Option<PathBuf> {
    let local = CONFIG_FILENAMES.iter().map(PathBuf::from);
    let global = config_dir()
        .into_iter()
        .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name)));
    local.chain(global).find(|p| p.exists())
}

fn parse_config(raw: &str, path: &Path) -> Result<ReelbotConfig> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .with_context(|| format!("config path has no extension: {}", path.display()))?;

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        other => Err(Error::UnsupportedFormat {
            extension: other.to_string(),
        }),
    }
}
