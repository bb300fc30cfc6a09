use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::DEFAULT_IMPORTANCE;

pub const HOME_ENV: &str = "THREADS_HOME";
pub const DATA_FILE: &str = "threads.json";
pub const CONFIG_FILE: &str = "config.toml";
pub const DEFAULT_NEXT_COUNT: usize = 5;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThreadsConfig {
    /// File name of the data document inside the threads home.
    pub data_file: Option<String>,
    /// Importance assigned to new threads when none is given.
    pub default_importance: Option<u8>,
    /// How many recommendations `next` prints by default.
    pub next_count: Option<usize>,
}

pub fn resolve_user_home_dir() -> Option<PathBuf> {
    if let Ok(home) = std::env::var("HOME") {
        let trimmed = home.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    if let Ok(profile) = std::env::var("USERPROFILE") {
        let trimmed = profile.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    None
}

/// THREADS_HOME wins when set and non-empty; otherwise `~/.threads`.
pub fn threads_home_from(env_value: Option<&str>, user_home: Option<&Path>) -> Option<PathBuf> {
    if let Some(value) = env_value {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    user_home.map(|home| home.join(".threads"))
}

pub fn resolve_threads_home() -> Option<PathBuf> {
    let env_value = std::env::var(HOME_ENV).ok();
    threads_home_from(env_value.as_deref(), resolve_user_home_dir().as_deref())
}

pub fn config_path(home: &Path) -> PathBuf {
    home.join(CONFIG_FILE)
}

/// Missing or malformed config reads as absent. A broken config file must
/// never block access to the data file.
pub fn load_config(home: &Path) -> Option<ThreadsConfig> {
    let path = config_path(home);
    if !path.is_file() {
        return None;
    }
    let text = fs::read_to_string(&path).ok()?;
    match toml::from_str::<ThreadsConfig>(&text) {
        Ok(config) => Some(config),
        Err(err) => {
            debug!(path = %path.display(), error = %err, "ignoring malformed config");
            None
        }
    }
}

pub fn data_file_name(config: Option<&ThreadsConfig>) -> String {
    config
        .and_then(|config| config.data_file.clone())
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| DATA_FILE.to_string())
}

/// Out-of-range values fall back to the built-in default.
pub fn default_importance(config: Option<&ThreadsConfig>) -> u8 {
    config
        .and_then(|config| config.default_importance)
        .filter(|value| (1..=5).contains(value))
        .unwrap_or(DEFAULT_IMPORTANCE)
}

pub fn next_count(config: Option<&ThreadsConfig>) -> usize {
    config
        .and_then(|config| config.next_count)
        .filter(|count| *count > 0)
        .unwrap_or(DEFAULT_NEXT_COUNT)
}
