use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const APP_DIR_NAME: &str = "appshelf";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to encode config: {0}")]
    Encode(#[from] toml::ser::Error),
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache_db_path: PathBuf,
    #[serde(skip)]
    pub config_path: PathBuf,
    /// Directories scanned for `.desktop` files by the desktop-entry inventory.
    pub application_dirs: Vec<PathBuf>,
    /// Enabled flag given to newly discovered apps.
    #[serde(rename = "defEnable")]
    pub default_enable: bool,
}

impl Default for Config {
    fn default() -> Self {
        let base = stable_app_data_dir();
        Self {
            cache_db_path: base.join("apps.sqlite3"),
            config_path: base.join("config.toml"),
            application_dirs: default_application_dirs(),
            default_enable: true,
        }
    }
}

pub fn stable_app_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR_NAME)
}

fn default_application_dirs() -> Vec<PathBuf> {
    let mut out = Vec::new();
    if let Some(data) = dirs::data_dir() {
        out.push(data.join("applications"));
    }
    out.push(PathBuf::from("/usr/local/share/applications"));
    out.push(PathBuf::from("/usr/share/applications"));
    out
}

pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.cache_db_path.as_os_str().is_empty() {
        return Err(ConfigError::Invalid("cache_db_path is required".into()));
    }

    if cfg.config_path.as_os_str().is_empty() {
        return Err(ConfigError::Invalid("config_path is required".into()));
    }

    Ok(())
}

/// Loads the config at `path` (or the default location). A missing file yields
/// defaults bound to that path.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let config_path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| Config::default().config_path);

    let mut cfg = match std::fs::read_to_string(&config_path) {
        Ok(raw) => toml::from_str::<Config>(&raw).map_err(|source| ConfigError::Parse {
            path: config_path.clone(),
            source,
        })?,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Config::default(),
        Err(source) => {
            return Err(ConfigError::Read {
                path: config_path,
                source,
            })
        }
    };
    cfg.config_path = config_path;
    validate(&cfg)?;
    Ok(cfg)
}

pub fn save(cfg: &Config) -> Result<(), ConfigError> {
    validate(cfg)?;
    let encoded = toml::to_string_pretty(cfg)?;
    let write_err = |source| ConfigError::Write {
        path: cfg.config_path.clone(),
        source,
    };
    if let Some(parent) = cfg.config_path.parent() {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    std::fs::write(&cfg.config_path, encoded).map_err(write_err)
}
