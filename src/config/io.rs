use std::io::Write;
use std::path::{Path, PathBuf};

use crate::app_dirs;

use super::{AppConfig, ConfigError};

pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Resolve the configuration file path, ensuring the parent directory exists.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    Ok(app_dirs::app_root_dir()?.join(CONFIG_FILE_NAME))
}

/// Load configuration from disk, returning defaults if missing.
pub fn load_or_default() -> Result<AppConfig, ConfigError> {
    load_from(&config_path()?)
}

pub fn load_from(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No config file, using defaults");
        return Ok(AppConfig::default());
    }
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: AppConfig = toml::from_str(&text).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(config.normalized())
}

/// Persist configuration to the app root, overwriting any previous contents.
pub fn save(config: &AppConfig) -> Result<(), ConfigError> {
    save_to_path(config, &config_path()?)
}

/// Save configuration to a specific path, creating parent directories as needed.
pub fn save_to_path(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let data = toml::to_string_pretty(config).map_err(|source| ConfigError::SerializeToml {
        path: path.to_path_buf(),
        source,
    })?;
    atomic_write(path, data.as_bytes())
}

/// Write through a uniquely named sibling temp file, then rename over `path`.
fn atomic_write(path: &Path, data: &[u8]) -> Result<(), ConfigError> {
    use rand::TryRngCore;
    let write_error = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = path
        .parent()
        .ok_or_else(|| write_error(std::io::Error::other("config path has no parent directory")))?;
    let file_name = path
        .file_name()
        .ok_or_else(|| write_error(std::io::Error::other("config path has no file name")))?;

    let mut last_err = None;
    for _ in 0..5 {
        let mut bytes = [0u8; 6];
        rand::rngs::OsRng.try_fill_bytes(&mut bytes).map_err(|source| {
            write_error(std::io::Error::other(format!(
                "failed to generate temporary file suffix: {source}"
            )))
        })?;
        let suffix: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
        let tmp_path = dir.join(format!("{}.tmp-{suffix}", file_name.to_string_lossy()));

        let mut file = match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)
        {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                last_err = Some(err);
                continue;
            }
            Err(source) => {
                return Err(ConfigError::Write {
                    path: tmp_path,
                    source,
                });
            }
        };
        let written = file.write_all(data).and_then(|()| file.sync_all());
        drop(file);
        if let Err(source) = written.and_then(|()| std::fs::rename(&tmp_path, path)) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(write_error(source));
        }
        tracing::info!(path = %path.display(), "Config saved");
        return Ok(());
    }

    Err(write_error(std::io::Error::new(
        std::io::ErrorKind::AlreadyExists,
        format!(
            "failed to create temporary file: {}",
            last_err
                .map(|err| err.to_string())
                .unwrap_or_else(|| "unknown error".into())
        ),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_dirs::ConfigBaseGuard;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.timers.poll_ms, 15_000);
        assert_eq!(config.log_stream.max_entries, 50);
    }

    #[test]
    fn round_trips_through_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);
        let mut config = AppConfig {
            base_url: "https://dash.example".into(),
            download_dir: Some(PathBuf::from("synth")),
            ..AppConfig::default()
        };
        config.timers.poll_ms = 5_000;
        save_to_path(&config, &path).unwrap();
        assert_eq!(load_from(&path).unwrap(), config);
        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().contains(".tmp-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn normalizes_bad_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            "base_url = \"  http://host:9000/ \"\n\
             [timers]\npoll_ms = 0\ncarousel_rotate_ms = 300\ncarousel_swap_ms = 900\n\
             [log_stream]\nmax_entries = 0\n",
        )
        .unwrap();
        let config = load_from(&path).unwrap();
        assert_eq!(config.base_url, "http://host:9000");
        assert_eq!(config.timers.poll_ms, 100);
        assert_eq!(config.timers.log_tick_ms, 800);
        assert_eq!(config.timers.carousel_swap_ms, 300);
        assert_eq!(config.log_stream.max_entries, 1);
    }

    #[test]
    fn rejects_malformed_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "base_url = [").unwrap();
        assert!(matches!(load_from(&path), Err(ConfigError::ParseToml { .. })));
    }

    #[test]
    fn save_uses_app_root() {
        let dir = tempdir().unwrap();
        let _guard = ConfigBaseGuard::set(dir.path().to_path_buf());
        save(&AppConfig::default()).unwrap();
        assert!(
            dir.path()
                .join(crate::app_dirs::APP_DIR_NAME)
                .join(CONFIG_FILE_NAME)
                .is_file()
        );
        assert_eq!(load_or_default().unwrap(), AppConfig::default());
    }
}
