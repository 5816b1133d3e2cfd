use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::system::history::DEFAULT_CAPACITY;
use crate::system::mounts::DEFAULT_EXCLUDED_FS_TYPES;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub collector: CollectorConfig,
    pub mounts: MountsConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub refresh_rate_ms: u64,
    pub history_capacity: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            refresh_rate_ms: 2000,
            history_capacity: DEFAULT_CAPACITY,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub proc_root: PathBuf,
    pub passwd_path: PathBuf,
    pub worker_threads: usize,
    pub pass_deadline_ms: u64,
    pub classify_resources: bool,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        CollectorConfig {
            proc_root: PathBuf::from("/proc"),
            passwd_path: PathBuf::from("/etc/passwd"),
            worker_threads: 4,
            pass_deadline_ms: 1500,
            classify_resources: false,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MountsConfig {
    pub helper_path: PathBuf,
    pub helper_timeout_ms: u64,
    pub excluded_fs_types: Vec<String>,
}

impl Default for MountsConfig {
    fn default() -> Self {
        MountsConfig {
            helper_path: PathBuf::from("procsnap-df"),
            helper_timeout_ms: 2000,
            excluded_fs_types: DEFAULT_EXCLUDED_FS_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("procsnap").join("config.toml"))
}

pub fn load_config() -> Config {
    match config_path() {
        Some(path) if path.exists() => load_config_from_path(&path),
        _ => Config::default(),
    }
}

pub fn load_config_from_path(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(contents) => toml::from_str(&contents).unwrap_or_else(|err| {
            tracing::warn!(path = %path.display(), error = %err, "invalid config, using defaults");
            Config::default()
        }),
        Err(_) => Config::default(),
    }
}
