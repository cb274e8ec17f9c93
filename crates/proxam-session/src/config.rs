//! Configuration loading: defaults, TOML file, environment overrides.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fallback::FallbackConfig;

/// Application name, used for directory discovery and the env prefix.
pub const APP_NAME: &str = "proxam";

/// Default identity service address.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] config::ConfigError),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("expanding path {path}: {reason}")]
    PathExpansion { path: String, reason: String },

    #[error("unable to determine {0} directory")]
    MissingDirectory(&'static str),

    #[error("serializing default config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Client configuration for the session subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Base URL of the identity service.
    pub server_url: String,
    pub http: HttpConfig,
    pub fallback: FallbackConfig,
    pub paths: PathsConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            http: HttpConfig::default(),
            fallback: FallbackConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Request timeout in seconds. A timed-out auth call is treated as a
    /// transport failure, never left hanging.
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Override for the persisted session file. Supports `~` and
    /// environment expansion. Defaults to `session.json` under the
    /// state directory.
    pub session_file: Option<String>,
}

impl SessionConfig {
    /// Load configuration the standard way: built-in defaults, then the
    /// config file (if it exists), then `PROXAM_*` environment overrides
    /// with `__` as the section separator.
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match config_file {
            Some(path) => path.to_path_buf(),
            None => default_config_file()?,
        };
        Self::load_from(&path)
    }

    pub fn load_from(config_file: &Path) -> Result<Self, ConfigError> {
        let prefix = env_prefix();
        let built = Config::builder()
            .set_default("server_url", DEFAULT_SERVER_URL)?
            .set_default("http.timeout_secs", 10_i64)?
            .set_default("fallback.enabled", true)?
            .add_source(
                File::from(config_file)
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(Environment::with_prefix(prefix.as_str()).separator("__"))
            .build()?;

        let config: SessionConfig = built.try_deserialize()?;
        Ok(config)
    }

    /// Resolve the persisted session file: the configured override (with
    /// expansion applied) or the default under the state directory.
    pub fn session_file(&self) -> Result<PathBuf, ConfigError> {
        match &self.paths.session_file {
            Some(text) => expand_str_path(text),
            None => Ok(default_state_dir()?.join("session.json")),
        }
    }
}

/// Write a default configuration file, creating parent directories.
pub fn write_default_config(path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let config = SessionConfig::default();
    let toml = toml::to_string_pretty(&config)?;
    let mut body = default_config_header(path);
    body.push_str(&toml);
    fs::write(path, body)?;
    Ok(())
}

fn default_config_header(path: &Path) -> String {
    let mut buffer = String::new();
    buffer.push_str("# Configuration for ");
    buffer.push_str(APP_NAME);
    buffer.push('\n');
    buffer.push_str("# File: ");
    buffer.push_str(&path.display().to_string());
    buffer.push('\n');
    buffer.push('\n');
    buffer
}

pub fn expand_str_path(text: &str) -> Result<PathBuf, ConfigError> {
    let expanded = shellexpand::full(text).map_err(|err| ConfigError::PathExpansion {
        path: text.to_string(),
        reason: err.to_string(),
    })?;
    Ok(PathBuf::from(expanded.to_string()))
}

pub fn default_config_file() -> Result<PathBuf, ConfigError> {
    Ok(default_config_dir()?.join("config.toml"))
}

pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
    if let Some(dir) = env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        let mut path = PathBuf::from(dir);
        path.push(APP_NAME);
        return Ok(path);
    }

    if let Some(mut dir) = dirs::config_dir() {
        dir.push(APP_NAME);
        return Ok(dir);
    }

    dirs::home_dir()
        .map(|home| home.join(".config").join(APP_NAME))
        .ok_or(ConfigError::MissingDirectory("configuration"))
}

pub fn default_state_dir() -> Result<PathBuf, ConfigError> {
    if let Some(dir) = env::var_os("XDG_STATE_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir).join(APP_NAME));
    }

    if let Some(mut dir) = dirs::state_dir() {
        dir.push(APP_NAME);
        return Ok(dir);
    }

    dirs::home_dir()
        .map(|home| home.join(".local").join("state").join(APP_NAME))
        .ok_or(ConfigError::MissingDirectory("state"))
}

pub fn env_prefix() -> String {
    APP_NAME
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}
