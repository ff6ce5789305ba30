//! Runtime configuration.
//!
//! Layers, lowest first: built-in defaults, `config.json` in the data
//! directory, `TASKFLOW_*` environment variables, command-line flags.

use std::env;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::cache::{CacheOptions, DEFAULT_TTL};
use crate::error::{Error, Result};
use crate::poller::DEFAULT_INTERVAL;

pub const DEFAULT_API_URL: &str = "http://localhost:3000";
pub const CONFIG_FILE: &str = "config.json";
pub const STATE_FILE: &str = "state.json";
pub const LOG_FILE: &str = "taskflow.log";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_url: String,
    /// Serve requests from a json-server style file instead of `api_url`.
    pub mock_db: Option<PathBuf>,
    pub cache_enabled: bool,
    pub cache_ttl: Duration,
    pub poll_interval: Duration,
    pub data_dir: PathBuf,
}

/// Shape of `config.json`. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct FileConfig {
    api_url: Option<String>,
    mock_db: Option<PathBuf>,
    cache_enabled: Option<bool>,
    cache_ttl_secs: Option<u64>,
    poll_interval_secs: Option<u64>,
}

/// Command-line overrides.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub api_url: Option<String>,
    pub mock_db: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
}

impl Config {
    pub fn defaults(data_dir: PathBuf) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            mock_db: None,
            cache_enabled: true,
            cache_ttl: DEFAULT_TTL,
            poll_interval: DEFAULT_INTERVAL,
            data_dir,
        }
    }

    pub fn load(overrides: &Overrides) -> Result<Self> {
        let data_dir = overrides.data_dir.clone().unwrap_or_else(default_data_dir);
        fs::create_dir_all(&data_dir).map_err(|e| {
            Error::Config(format!("cannot create data directory {}: {e}", data_dir.display()))
        })?;

        let mut config = Self::defaults(data_dir);
        config.apply_file(&config.data_dir.join(CONFIG_FILE))?;
        config.apply_env(|key| env::var(key).ok());
        config.apply_overrides(overrides);
        debug!(?config, "configuration loaded");
        Ok(config)
    }

    fn apply_file(&mut self, path: &Path) -> Result<()> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => {
                info!("{} not found, using defaults", path.display());
                return Ok(());
            }
        };
        let file: FileConfig = serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        if let Some(url) = file.api_url {
            self.api_url = url;
        }
        if let Some(db) = file.mock_db {
            self.mock_db = Some(db);
        }
        if let Some(enabled) = file.cache_enabled {
            self.cache_enabled = enabled;
        }
        if let Some(secs) = file.cache_ttl_secs {
            self.cache_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = file.poll_interval_secs {
            self.poll_interval = Duration::from_secs(secs);
        }
        Ok(())
    }

    /// Environment lookups go through `var` so tests don't touch the
    /// process environment.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("TASKFLOW_API_URL") {
            self.api_url = url;
        }
        if let Some(secs) = parse_var::<u64>(&var, "TASKFLOW_CACHE_TTL") {
            self.cache_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(&var, "TASKFLOW_POLL_INTERVAL") {
            self.poll_interval = Duration::from_secs(secs.max(1));
        }
    }

    fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(url) = &overrides.api_url {
            self.api_url = url.clone();
        }
        if let Some(db) = &overrides.mock_db {
            self.mock_db = Some(db.clone());
        }
    }

    pub fn cache_options(&self) -> CacheOptions {
        CacheOptions { enabled: self.cache_enabled, ttl: self.cache_ttl }
    }

    pub fn state_path(&self) -> PathBuf {
        self.data_dir.join(STATE_FILE)
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join(LOG_FILE)
    }
}

/// `~/.taskflow`, or `./.taskflow` when `HOME` is unset.
pub fn default_data_dir() -> PathBuf {
    let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".taskflow")
}

fn parse_var<T: FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T::Err: Display,
{
    let raw = var(key)?;
    raw.trim()
        .parse()
        .map_err(|e| warn!("Invalid {key} value {raw:?}: {e}, ignoring"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let c = Config::defaults(PathBuf::from("/tmp/x"));
        assert_eq!(c.api_url, "http://localhost:3000");
        assert_eq!(c.cache_ttl, Duration::from_secs(300));
        assert_eq!(c.poll_interval, Duration::from_secs(5));
        assert!(c.cache_enabled);
        assert_eq!(c.state_path(), PathBuf::from("/tmp/x/state.json"));
    }

    #[test]
    fn test_layers_apply_in_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{"apiUrl": "http://file:1", "cacheTtlSecs": 60, "cacheEnabled": false}"#,
        )
        .unwrap();

        let mut c = Config::defaults(dir.path().to_path_buf());
        c.apply_file(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(c.api_url, "http://file:1");
        assert!(!c.cache_enabled);

        let env: HashMap<&str, &str> =
            [("TASKFLOW_API_URL", "http://env:2"), ("TASKFLOW_POLL_INTERVAL", "9")].into();
        c.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(c.api_url, "http://env:2");
        assert_eq!(c.cache_ttl, Duration::from_secs(60));
        assert_eq!(c.poll_interval, Duration::from_secs(9));

        c.apply_overrides(&Overrides { api_url: Some("http://flag:3".into()), ..Overrides::default() });
        assert_eq!(c.api_url, "http://flag:3");
    }

    #[test]
    fn test_bad_env_value_is_ignored() {
        let mut c = Config::defaults(PathBuf::from("."));
        c.apply_env(|k| (k == "TASKFLOW_CACHE_TTL").then(|| "soon".to_string()));
        assert_eq!(c.cache_ttl, DEFAULT_TTL);
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "{").unwrap();
        let mut c = Config::defaults(dir.path().to_path_buf());
        assert!(matches!(c.apply_file(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_load_creates_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("nested");
        let c = Config::load(&Overrides {
            data_dir: Some(data_dir.clone()),
            mock_db: Some(dir.path().join("db.json")),
            ..Overrides::default()
        })
        .unwrap();
        assert!(data_dir.is_dir());
        assert_eq!(c.mock_db, Some(dir.path().join("db.json")));
    }
}
