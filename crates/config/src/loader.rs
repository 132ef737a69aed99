use std::{
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use {
    secrecy::SecretString,
    tracing::{debug, warn},
};

use crate::{env_subst::substitute_env, schema::BotchConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["botch.toml", "botch.yaml", "botch.yml", "botch.json"];

/// Environment variables that override file values.
pub const ENV_GATEWAY_URL: &str = "GATEWAY_URL";
pub const ENV_GATEWAY_TOKEN: &str = "GATEWAY_TOKEN";
pub const ENV_IDENTITY_PATH: &str = "BOTCH_IDENTITY_PATH";

/// Override for the config directory, set via `set_config_dir()`.
static CONFIG_DIR_OVERRIDE: Mutex<Option<PathBuf>> = Mutex::new(None);

/// Set a custom config directory. When set, config discovery only looks in
/// this directory (project-local and user-global paths are skipped).
pub fn set_config_dir(path: PathBuf) {
    *CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(PoisonError::into_inner) = Some(path);
}

/// Clear the config directory override, restoring default discovery.
pub fn clear_config_dir() {
    *CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(PoisonError::into_inner) = None;
}

fn config_dir_override() -> Option<PathBuf> {
    CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<BotchConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations, then apply environment
/// overrides.
///
/// Search order:
/// 1. `./botch.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/botch/botch.{toml,yaml,yml,json}` (user-global)
///
/// Falls back to `BotchConfig::default()` when no file is found or the file
/// fails to parse.
pub fn discover_and_load() -> BotchConfig {
    let mut config = match find_config_file() {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                BotchConfig::default()
            })
        },
        None => {
            debug!("no config file found, using defaults");
            BotchConfig::default()
        },
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config
}

/// Overlay `GATEWAY_URL`, `GATEWAY_TOKEN` and `BOTCH_IDENTITY_PATH` onto `config`.
///
/// Empty values are ignored.
pub fn apply_env_overrides(config: &mut BotchConfig, lookup: impl Fn(&str) -> Option<String>) {
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(url) = get(ENV_GATEWAY_URL) {
        config.gateway.url = url;
    }
    if let Some(token) = get(ENV_GATEWAY_TOKEN) {
        config.gateway.token = Some(SecretString::new(token));
    }
    if let Some(path) = get(ENV_IDENTITY_PATH) {
        config.gateway.identity_path = Some(PathBuf::from(path));
    }
}

/// Find the first config file in standard locations.
///
/// When a config dir override is set, only that directory is searched.
fn find_config_file() -> Option<PathBuf> {
    if let Some(dir) = config_dir_override() {
        return first_existing(&dir);
    }

    // Project-local
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    user_config_dir().and_then(|dir| first_existing(&dir))
}

fn first_existing(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the config directory: override, or `~/.config/botch/`.
pub fn config_dir() -> Option<PathBuf> {
    config_dir_override().or_else(user_config_dir)
}

fn user_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().join(".config").join("botch"))
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<BotchConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}
