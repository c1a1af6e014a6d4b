use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::store::{DEFAULT_TABLE, validate_table_name};

pub const DEFAULT_API_BASE: &str = "https://api.twitter.com";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub handle: String,
    #[serde(default = "default_table")]
    pub table: String,
    pub db_path: Option<String>,
    pub credentials_path: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub sync: SyncSettings,
}

/// Pagination and pacing knobs. Defaults follow the v1.1 timeline limits:
/// 200 posts per page, 15 requests per 15 minute window.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SyncSettings {
    pub max_page_size: u32,
    pub rate_limit: u32,
    pub rate_window_mins: u64,
    pub request_delay_secs: u64,
    pub request_timeout_secs: u64,
    pub exclude_replies: bool,
    pub include_retweets: bool,
    pub trim_user: bool,
    pub max_retries: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            max_page_size: 200,
            rate_limit: 15,
            rate_window_mins: 15,
            request_delay_secs: 0,
            request_timeout_secs: 30,
            exclude_replies: true,
            include_retweets: false,
            trim_user: true,
            max_retries: 3,
        }
    }
}

impl SyncSettings {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.rate_window_mins * 60)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_secs(self.request_delay_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_table() -> String {
    DEFAULT_TABLE.to_string()
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or_else(|| Error::config("no config dir available"))?
        .join("timeline_store"))
}

pub fn config_path() -> Result<PathBuf> {
    let mut p = config_dir()?;
    fs::create_dir_all(&p)?;
    p.push("config.toml");
    Ok(p)
}

pub fn default_db_path() -> Result<PathBuf> {
    let mut p = config_dir()?;
    fs::create_dir_all(&p)?;
    p.push("timeline.db");
    Ok(p)
}

/// Load the config at `path`, or the default location when `None`.
/// A missing file is replaced by a template and reported as an error.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config_path()?,
    };
    if !path.exists() {
        let sample = Config {
            handle: "your_handle".to_string(),
            table: default_table(),
            db_path: None,
            credentials_path: None,
            api_base: default_api_base(),
            sync: SyncSettings::default(),
        };
        let tom = toml::to_string_pretty(&sample)
            .map_err(|e| Error::config(format!("cannot render template: {e}")))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, tom)?;
        return Err(Error::config(format!(
            "created template config at {}, edit it and run again",
            path.display()
        )));
    }
    let s = fs::read_to_string(&path)?;
    parse_config(&s)
}

pub fn parse_config(s: &str) -> Result<Config> {
    let cfg: Config =
        toml::from_str(s).map_err(|e| Error::config(format!("malformed config: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.handle.trim().is_empty() {
            return Err(Error::config("handle not set in config"));
        }
        validate_table_name(&self.table)?;
        if self.sync.max_page_size == 0 {
            return Err(Error::config("sync.max_page_size must be positive"));
        }
        if self.sync.rate_limit == 0 {
            return Err(Error::config("sync.rate_limit must be positive"));
        }
        Ok(())
    }

    pub fn resolve_db_path(&self) -> Result<PathBuf> {
        if let Some(p) = &self.db_path {
            Ok(PathBuf::from(p))
        } else {
            default_db_path()
        }
    }

    pub fn resolve_credentials_path(&self) -> Result<PathBuf> {
        if let Some(p) = &self.credentials_path {
            Ok(PathBuf::from(p))
        } else {
            Ok(config_dir()?.join("creds").join(format!("{}.json", self.handle)))
        }
    }
}
