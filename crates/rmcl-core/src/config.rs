//! On-disk JSON config: the device/user token pair plus XDG path resolution.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create config directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// `<config>/rmcl/config.json`'s contents.
///
/// Unknown keys round-trip through `extra` so a hand-edited config file
/// is never truncated by a save from this process, matching the original
/// `Config(dict)` subclass's dict-like persistence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub devicetoken: Option<String>,

    #[serde(default)]
    pub usertoken: Option<String>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Config {
    /// `<XDG config home>/rmcl/config.json`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rmcl")
            .join("config.json")
    }

    /// Loads the config at `path`, failing if the file is missing or
    /// malformed.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads the config at `path`, returning an empty `Config` if the file
    /// does not exist yet (first run, before any token has been obtained).
    pub fn load_or_default(path: &Path) -> Result<Config, ConfigError> {
        if path.exists() {
            Config::load(path)
        } else {
            Ok(Config::default())
        }
    }

    /// Writes the config back to `path`, creating parent directories as
    /// needed. Called after every token-lifecycle mutation.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let text = serde_json::to_string_pretty(self).expect("Config serialization is infallible");
        std::fs::write(path, text).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_or_default_returns_empty_config_when_missing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let cfg = Config::load_or_default(&path).unwrap();
        assert!(cfg.devicetoken.is_none());
        assert!(cfg.usertoken.is_none());
    }

    #[test]
    fn save_then_load_round_trips_tokens() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut cfg = Config::default();
        cfg.devicetoken = Some("dtok".to_string());
        cfg.usertoken = Some("utok".to_string());
        cfg.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.devicetoken.as_deref(), Some("dtok"));
        assert_eq!(loaded.usertoken.as_deref(), Some("utok"));
    }

    #[test]
    fn unknown_keys_survive_a_save_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"devicetoken": "d", "futurefield": "keep-me"}"#).unwrap();

        let mut cfg = Config::load(&path).unwrap();
        cfg.usertoken = Some("u".to_string());
        cfg.save(&path).unwrap();

        let reloaded = Config::load(&path).unwrap();
        assert_eq!(
            reloaded.extra.get("futurefield"),
            Some(&serde_json::json!("keep-me"))
        );
    }

    #[test]
    fn load_fails_on_malformed_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            Config::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
