use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

use tracing::{debug, warn};

use crate::{env_subst::substitute_env, schema::ChanlinkConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "chanlink.toml",
    "chanlink.yaml",
    "chanlink.yml",
    "chanlink.json",
];

pub const CONFIG_DIR_ENV: &str = "CHANLINK_CONFIG_DIR";
pub const DATA_DIR_ENV: &str = "CHANLINK_DATA_DIR";

static CONFIG_DIR_OVERRIDE: Mutex<Option<PathBuf>> = Mutex::new(None);
static DATA_DIR_OVERRIDE: Mutex<Option<PathBuf>> = Mutex::new(None);

fn read_override(slot: &Mutex<Option<PathBuf>>) -> Option<PathBuf> {
    slot.lock().unwrap_or_else(|e| e.into_inner()).clone()
}

fn write_override(slot: &Mutex<Option<PathBuf>>, value: Option<PathBuf>) {
    *slot.lock().unwrap_or_else(|e| e.into_inner()) = value;
}

/// Force the user-global config directory for this process.
pub fn set_config_dir(path: impl Into<PathBuf>) {
    write_override(&CONFIG_DIR_OVERRIDE, Some(path.into()));
}

pub fn clear_config_dir() {
    write_override(&CONFIG_DIR_OVERRIDE, None);
}

/// Force the data directory (database location) for this process.
pub fn set_data_dir(path: impl Into<PathBuf>) {
    write_override(&DATA_DIR_OVERRIDE, Some(path.into()));
}

pub fn clear_data_dir() {
    write_override(&DATA_DIR_OVERRIDE, None);
}

/// Apply `CHANLINK_CONFIG_DIR` / `CHANLINK_DATA_DIR` when set and non-empty.
pub fn apply_env_overrides() {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|v| !v.is_empty()) {
        set_config_dir(PathBuf::from(dir));
    }
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
        set_data_dir(PathBuf::from(dir));
    }
}

/// Returns the user-global config directory (`~/.config/chanlink/`).
pub fn config_dir() -> Option<PathBuf> {
    if let Some(dir) = read_override(&CONFIG_DIR_OVERRIDE) {
        return Some(dir);
    }
    directories::ProjectDirs::from("", "", "chanlink").map(|d| d.config_dir().to_path_buf())
}

/// Returns the data directory, falling back to the working directory.
pub fn data_dir() -> PathBuf {
    if let Some(dir) = read_override(&DATA_DIR_OVERRIDE) {
        return dir;
    }
    directories::ProjectDirs::from("", "", "chanlink")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<ChanlinkConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./chanlink.{toml,yaml,yml,json}` (project-local)
/// 2. `<config_dir>/chanlink.{toml,yaml,yml,json}` (user-global)
///
/// Returns `ChanlinkConfig::default()` if no config file is found.
pub fn discover_and_load() -> ChanlinkConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    ChanlinkConfig::default()
}

/// Find the first config file in standard locations.
pub(crate) fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<ChanlinkConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}
