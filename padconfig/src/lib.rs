//! # PadBoard Configuration Module
//!
//! This crate provides the two kinds of configuration PadBoard works with:
//! - application settings (backend URL, timeouts, logging), loaded from YAML
//!   files merged over an embedded default and overridable from the environment
//! - board configurations (grid layout and sound buttons), see [`board`]
//!
//! It also ships the board generator used by `padboard generate`, see
//! [`generate`].
//!
//! ## Usage
//!
//! ```no_run
//! use padconfig::Config;
//!
//! let config = Config::load_config("")?;
//! let base_url = config.get_base_url();
//! let timeout = config.get_http_timeout();
//!
//! config.set_value(&["host", "base_url"], "http://10.0.0.2:8080".into())?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{anyhow, Result};
use dirs::home_dir;
use serde_yaml::{Mapping, Number, Value};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tracing::{info, warn};

pub mod board;
pub mod generate;
pub mod snippets;

pub use board::{BoardConfig, BoardSource, ButtonSpec, Layout, MAX_CELLS};

// Shipped defaults, see padboard.yaml
const DEFAULT_CONFIG: &str = include_str!("padboard.yaml");

const ENV_CONFIG_DIR: &str = "PADBOARD_CONFIG";
const ENV_PREFIX: &str = "PADBOARD_CONFIG__";

// Fallbacks when a key is missing or has the wrong type
const DEFAULT_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_HTTP_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_PLAYING_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_STATUS_DURATION_MS: u64 = 2_800;
const DEFAULT_TICK_RATE_MS: u64 = 200;
const DEFAULT_LOG_MIN_LEVEL: &str = "info";

/// Macro to generate getter/setter for millisecond durations with default
macro_rules! impl_duration_ms_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Duration {
            let millis = match self.get_value($path) {
                Ok(Value::Number(n)) if n.is_u64() => n.as_u64().unwrap_or($default),
                Ok(Value::String(s)) => s.trim().parse::<u64>().unwrap_or_else(|_| {
                    tracing::warn!(
                        path = %$path.join("."),
                        value = %s,
                        "Invalid duration, using default {}ms",
                        $default
                    );
                    $default
                }),
                _ => $default,
            };
            Duration::from_millis(millis)
        }

        pub fn $setter(&self, value: Duration) -> Result<()> {
            let n = Number::from(value.as_millis() as u64);
            self.set_value($path, Value::Number(n))
        }
    };
}

/// Macro to generate getter/setter for optional string values
macro_rules! impl_optional_string_config {
    ($getter:ident, $setter:ident, $path:expr) => {
        pub fn $getter(&self) -> Option<String> {
            match self.get_value($path) {
                Ok(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
                _ => None,
            }
        }

        pub fn $setter(&self, value: Option<String>) -> Result<()> {
            self.set_value($path, Value::String(value.unwrap_or_default()))
        }
    };
}

/// Settings manager for PadBoard
///
/// The settings tree is the embedded `padboard.yaml`, merged with
/// `config.yaml` from the configuration directory, with keys lower-cased and
/// `PADBOARD_CONFIG__SECTION__KEY=value` environment variables applied last.
#[derive(Debug)]
pub struct Config {
    config_dir: String,
    path: String,
    data: Mutex<Value>,
}

impl Clone for Config {
    fn clone(&self) -> Self {
        let data = self.lock().clone();
        Self {
            config_dir: self.config_dir.clone(),
            path: self.path.clone(),
            data: Mutex::new(data),
        }
    }
}

impl Config {
    fn find_config_dir(directory: &str) -> String {
        if !directory.is_empty() {
            return directory.to_string();
        }

        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var = ENV_CONFIG_DIR, path = %env_path, "Trying to load config from env");
            return env_path;
        }

        if Path::new(".padboard").exists() {
            return ".padboard".to_string();
        }

        if let Some(home) = home_dir() {
            let home_config = home.join(".padboard");
            if home_config.exists() {
                return home_config.to_string_lossy().to_string();
            }
        }

        ".padboard".to_string()
    }

    fn validate_config_dir(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }

        if !path.is_dir() {
            return Err(anyhow!("{} is not a directory", path.display()));
        }

        let test_file = path.join(".write_test");
        fs::write(&test_file, b"test")?;
        fs::remove_file(&test_file)?;

        fs::read_dir(path)?;

        Ok(())
    }

    /// Resolves the settings directory: `directory` when not empty, then
    /// `$PADBOARD_CONFIG`, then `./.padboard`, then `~/.padboard`.
    ///
    /// The directory is created when missing and must be writable.
    pub fn config_dir(directory: &str) -> Result<String> {
        let dir_path = Self::find_config_dir(directory);
        Self::validate_config_dir(Path::new(&dir_path))?;
        Ok(dir_path)
    }

    /// Loads the settings found in `directory` (see [`Config::config_dir`]).
    ///
    /// `config.yaml` is layered over the shipped defaults, environment
    /// overrides are applied on top, and the result is written back so the
    /// file always lists every known key.
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::config_dir(directory)?;
        info!(config_dir = %config_dir, "Using config directory");

        let config_file_path = Path::new(&config_dir).join("config.yaml");
        let path = config_file_path.to_string_lossy().to_string();

        let mut default_value = Self::lower_keys_value(serde_yaml::from_str(DEFAULT_CONFIG)?);

        let yaml_data = if let Ok(data) = fs::read(&path) {
            info!(config_file = %path, "Loaded config file");
            data
        } else {
            info!(config_file = %path, "Config file not found, using default embedded config");
            DEFAULT_CONFIG.as_bytes().to_vec()
        };

        let external_value = Self::lower_keys_value(serde_yaml::from_slice(&yaml_data)?);
        if external_value.is_mapping() {
            merge_yaml(&mut default_value, &external_value);
        } else {
            warn!(config_file = %path, "Config file is not a mapping, ignoring it");
        }
        let mut config_value = default_value;

        Self::apply_env_overrides(&mut config_value);

        let config = Config {
            config_dir,
            path,
            data: Mutex::new(config_value),
        };

        config.save()?;
        Ok(config)
    }

    fn lock(&self) -> MutexGuard<'_, Value> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Directory holding `config.yaml`
    pub fn directory(&self) -> &str {
        &self.config_dir
    }

    /// Writes the settings back to `config.yaml`
    pub fn save(&self) -> Result<()> {
        let yaml = serde_yaml::to_string(&*self.lock())?;
        fs::write(&self.path, yaml)?;
        Ok(())
    }

    /// Stores `value` under `path` (e.g. `&["host", "base_url"]`), creating
    /// intermediate sections, then saves.
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        {
            let mut data = self.lock();
            Self::set_value_internal(&mut data, path, value)?;
        }
        self.save()
    }

    fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
        if path.is_empty() {
            *data = value;
            return Ok(());
        }
        if let Value::Mapping(map) = data {
            let key_value = Value::String(path[0].to_lowercase());
            if path.len() == 1 {
                map.insert(key_value, value);
            } else {
                let entry = map
                    .entry(key_value)
                    .or_insert(Value::Mapping(Mapping::new()));
                Self::set_value_internal(entry, &path[1..], value)?;
            }
            Ok(())
        } else {
            Err(anyhow!("Current node is not a map"))
        }
    }

    /// Value stored under `path`, or an error when a key is missing
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let data = self.lock();
        Self::get_value_internal(&data, path)
    }

    fn get_value_internal(data: &Value, path: &[&str]) -> Result<Value> {
        let mut current = data;
        for (i, key) in path.iter().enumerate() {
            if let Value::Mapping(map) = current {
                match map.get(&Value::String(key.to_lowercase())) {
                    Some(next) => current = next,
                    None => return Err(anyhow!("Path {} does not exist", path[..=i].join("."))),
                }
            } else {
                return Err(anyhow!("Path {} is not a mapping", path[..i].join(".")));
            }
        }
        Ok(current.clone())
    }

    fn apply_env_overrides(config: &mut Value) {
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                let key_path = stripped.split("__").collect::<Vec<_>>();
                let yaml_value = Self::convert_env_value(&value);
                let _ = Self::set_value_internal(config, &key_path, yaml_value);
            }
        }
    }

    fn convert_env_value(value: &str) -> Value {
        if let Ok(parsed) = serde_yaml::from_str::<Value>(value) {
            return parsed;
        }
        Value::String(value.to_string())
    }

    fn lower_keys_value(value: Value) -> Value {
        match value {
            Value::Mapping(map) => {
                let mut new_map = Mapping::new();
                for (k, v) in map {
                    let new_key = match k {
                        Value::String(s) => Value::String(s.to_lowercase()),
                        other => other,
                    };
                    new_map.insert(new_key, Self::lower_keys_value(v));
                }
                Value::Mapping(new_map)
            }
            Value::Sequence(seq) => {
                Value::Sequence(seq.into_iter().map(Self::lower_keys_value).collect())
            }
            _ => value,
        }
    }

    /// Gets the base URL of the soundboard backend
    ///
    /// Trailing slashes are removed. Falls back to `http://localhost:8080`.
    pub fn get_base_url(&self) -> String {
        match self.get_value(&["host", "base_url"]) {
            Ok(Value::String(s)) if !s.trim().is_empty() => {
                s.trim().trim_end_matches('/').to_string()
            }
            Ok(_) => {
                tracing::warn!("Base URL is not a string or empty, using {DEFAULT_BASE_URL}");
                DEFAULT_BASE_URL.to_string()
            }
            Err(err) => {
                tracing::warn!("Failed to get base URL: {err}, using {DEFAULT_BASE_URL}");
                DEFAULT_BASE_URL.to_string()
            }
        }
    }

    impl_duration_ms_config!(
        get_http_timeout,
        set_http_timeout,
        &["host", "http_timeout_ms"],
        DEFAULT_HTTP_TIMEOUT_MS
    );

    impl_duration_ms_config!(
        get_playing_timeout,
        set_playing_timeout,
        &["board", "playing_timeout_ms"],
        DEFAULT_PLAYING_TIMEOUT_MS
    );

    impl_duration_ms_config!(
        get_status_duration,
        set_status_duration,
        &["board", "status_duration_ms"],
        DEFAULT_STATUS_DURATION_MS
    );

    impl_duration_ms_config!(
        get_tick_rate,
        set_tick_rate,
        &["ui", "tick_rate_ms"],
        DEFAULT_TICK_RATE_MS
    );

    impl_optional_string_config!(get_log_file, set_log_file, &["logger", "file"]);

    impl_optional_string_config!(get_board_path_value, set_board_path_value, &["board", "path"]);

    /// Board file configured in the settings, resolved against the config directory
    pub fn get_board_path(&self) -> Option<PathBuf> {
        let raw = self.get_board_path_value()?;
        let path = PathBuf::from(raw);
        if path.is_absolute() {
            Some(path)
        } else {
            Some(Path::new(&self.config_dir).join(path))
        }
    }

    /// Minimum log level used when `RUST_LOG` is not set
    pub fn get_log_min_level(&self) -> String {
        match self.get_value(&["logger", "min_level"]) {
            Ok(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            _ => DEFAULT_LOG_MIN_LEVEL.to_string(),
        }
    }

    pub fn set_log_min_level(&self, level: String) -> Result<()> {
        self.set_value(&["logger", "min_level"], Value::String(level))
    }
}

/// Layers `external` over `default`.
///
/// Mappings are merged key by key; scalars and sequences from `external`
/// replace the default ones.
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (d, e) => *d = e.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_in(dir: &tempfile::TempDir) -> Config {
        Config::load_config(dir.path().to_str().unwrap()).unwrap()
    }

    #[test]
    fn test_defaults_from_embedded_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_in(&dir);

        assert_eq!(config.get_base_url(), "http://localhost:8080");
        assert_eq!(config.get_http_timeout(), Duration::from_secs(5));
        assert_eq!(config.get_playing_timeout(), Duration::from_secs(10));
        assert_eq!(config.get_status_duration(), Duration::from_millis(2800));
        assert_eq!(config.get_log_min_level(), "info");
        assert_eq!(config.get_log_file(), None);
        assert_eq!(config.get_board_path(), None);
        assert!(dir.path().join("config.yaml").exists());
    }

    #[test]
    fn test_external_file_is_merged() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.yaml"),
            "HOST:\n  Base_URL: \"http://pads.local:9000/\"\nboard:\n  path: \"board.json\"\n",
        )
        .unwrap();

        let config = load_in(&dir);
        assert_eq!(config.get_base_url(), "http://pads.local:9000");
        assert_eq!(config.get_http_timeout(), Duration::from_secs(5));
        assert_eq!(config.get_board_path(), Some(dir.path().join("board.json")));
    }

    #[test]
    fn test_set_value_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_in(&dir);
        config
            .set_playing_timeout(Duration::from_millis(1500))
            .unwrap();
        config.set_log_file(Some("pads.log".to_string())).unwrap();

        let reloaded = load_in(&dir);
        assert_eq!(reloaded.get_playing_timeout(), Duration::from_millis(1500));
        assert_eq!(reloaded.get_log_file().as_deref(), Some("pads.log"));
    }

    #[test]
    fn test_empty_or_scalar_file_keeps_defaults() {
        for content in ["", "~\n", "- a\n- b\n", "just text\n"] {
            let dir = tempfile::tempdir().unwrap();
            fs::write(dir.path().join("config.yaml"), content).unwrap();

            let config = load_in(&dir);
            assert_eq!(config.get_base_url(), "http://localhost:8080", "{content:?}");
            config
                .set_playing_timeout(Duration::from_millis(700))
                .unwrap();

            let reloaded = load_in(&dir);
            assert_eq!(reloaded.get_playing_timeout(), Duration::from_millis(700));
            assert_eq!(reloaded.get_http_timeout(), Duration::from_secs(5));
        }
    }

    #[test]
    fn test_invalid_duration_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_in(&dir);
        config
            .set_value(&["board", "status_duration_ms"], Value::String("soon".into()))
            .unwrap();
        assert_eq!(config.get_status_duration(), Duration::from_millis(2800));
    }

    #[test]
    fn test_get_value_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_in(&dir);
        let err = config.get_value(&["host", "nope"]).unwrap_err();
        assert!(err.to_string().contains("host.nope"));
    }

    #[test]
    fn test_merge_yaml_replaces_scalars() {
        let mut base: Value = serde_yaml::from_str("a:\n  b: 1\n  c: 2\n").unwrap();
        let ext: Value = serde_yaml::from_str("a:\n  c: 3\n  d: 4\n").unwrap();
        merge_yaml(&mut base, &ext);
        let expected: Value = serde_yaml::from_str("a:\n  b: 1\n  c: 3\n  d: 4\n").unwrap();
        assert_eq!(base, expected);
    }
}
