//! Persistent client settings stored as TOML in the app root.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app_dirs::AppDirError;

mod defaults;
mod io;

pub use io::{CONFIG_FILE_NAME, config_path, load_from, load_or_default, save, save_to_path};

/// Errors from loading or saving the config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to resolve config directory: {0}")]
    AppDir(#[from] AppDirError),
    #[error("Unable to create config directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config at {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config to TOML at {path}: {source}")]
    SerializeToml {
        path: PathBuf,
        source: toml::ser::Error,
    },
}

/// Top-level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "defaults::base_url")]
    pub base_url: String,
    /// Where generated synthetic files are written; the app downloads dir when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_dir: Option<PathBuf>,
    #[serde(default)]
    pub timers: TimerSettings,
    #[serde(default)]
    pub log_stream: LogStreamSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            download_dir: None,
            timers: TimerSettings::default(),
            log_stream: LogStreamSettings::default(),
        }
    }
}

impl AppConfig {
    /// Clamp out-of-range values loaded from disk.
    pub fn normalized(mut self) -> Self {
        let trimmed = self.base_url.trim().trim_end_matches('/');
        self.base_url = if trimmed.is_empty() {
            defaults::base_url()
        } else {
            trimmed.to_string()
        };
        self.timers = self.timers.normalized();
        self.log_stream.max_entries = self.log_stream.max_entries.max(1);
        self
    }
}

/// Timer periods in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSettings {
    #[serde(default = "defaults::poll_ms")]
    pub poll_ms: u64,
    #[serde(default = "defaults::log_tick_ms")]
    pub log_tick_ms: u64,
    #[serde(default = "defaults::carousel_rotate_ms")]
    pub carousel_rotate_ms: u64,
    #[serde(default = "defaults::carousel_swap_ms")]
    pub carousel_swap_ms: u64,
    #[serde(default = "defaults::pipeline_tick_ms")]
    pub pipeline_tick_ms: u64,
    #[serde(default = "defaults::earth_initial_delay_ms")]
    pub earth_initial_delay_ms: u64,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            poll_ms: defaults::poll_ms(),
            log_tick_ms: defaults::log_tick_ms(),
            carousel_rotate_ms: defaults::carousel_rotate_ms(),
            carousel_swap_ms: defaults::carousel_swap_ms(),
            pipeline_tick_ms: defaults::pipeline_tick_ms(),
            earth_initial_delay_ms: defaults::earth_initial_delay_ms(),
        }
    }
}

impl TimerSettings {
    /// Raise repeating intervals to a 100 ms floor; the swap delay never outlasts a rotation.
    pub fn normalized(self) -> Self {
        let floor = |value: u64| value.max(defaults::MIN_INTERVAL_MS);
        Self {
            poll_ms: floor(self.poll_ms),
            log_tick_ms: floor(self.log_tick_ms),
            carousel_rotate_ms: floor(self.carousel_rotate_ms),
            carousel_swap_ms: self.carousel_swap_ms.min(self.carousel_rotate_ms.max(1)),
            pipeline_tick_ms: floor(self.pipeline_tick_ms),
            earth_initial_delay_ms: self.earth_initial_delay_ms,
        }
    }

    pub fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }

    pub fn log_tick(&self) -> Duration {
        Duration::from_millis(self.log_tick_ms)
    }

    pub fn carousel_rotate(&self) -> Duration {
        Duration::from_millis(self.carousel_rotate_ms)
    }

    pub fn carousel_swap(&self) -> Duration {
        Duration::from_millis(self.carousel_swap_ms)
    }

    pub fn pipeline_tick(&self) -> Duration {
        Duration::from_millis(self.pipeline_tick_ms)
    }

    pub fn earth_initial_delay(&self) -> Duration {
        Duration::from_millis(self.earth_initial_delay_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogStreamSettings {
    #[serde(default = "defaults::max_entries")]
    pub max_entries: usize,
}

impl Default for LogStreamSettings {
    fn default() -> Self {
        Self {
            max_entries: defaults::max_entries(),
        }
    }
}
