use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Production backend.
pub const DEFAULT_API_URL: &str = "https://api.doctorbondhu.com/api/v1";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  pub api: ApiConfig,
  pub cache: CacheConfig,
  pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ApiConfig {
  /// Base URL every endpoint path is appended to
  pub url: String,
  pub timeout_secs: u64,
  /// Append `_t=<unix millis>` to every request
  pub cache_buster: bool,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      url: DEFAULT_API_URL.to_string(),
      timeout_secs: 10,
      cache_buster: true,
    }
  }
}

/// Tuning for the cache layer.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
  /// Seconds before a fresh entry is refetched on read. `None` keeps entries
  /// fresh until invalidated.
  pub stale_secs: Option<u64>,
  /// Seconds an unsubscribed entry survives without being read
  pub keep_unused_secs: u64,
  /// Serve hits immediately but refetch in the background
  pub refetch_on_hit: bool,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      stale_secs: Some(300),
      keep_unused_secs: 60,
      refetch_on_hit: false,
    }
  }
}

impl CacheConfig {
  pub fn with_stale_secs(mut self, stale_secs: Option<u64>) -> Self {
    self.stale_secs = stale_secs;
    self
  }

  pub fn with_keep_unused_secs(mut self, keep_unused_secs: u64) -> Self {
    self.keep_unused_secs = keep_unused_secs;
    self
  }

  pub fn with_refetch_on_hit(mut self, refetch_on_hit: bool) -> Self {
    self.refetch_on_hit = refetch_on_hit;
    self
  }

  /// `None` means entries never go stale by age, including windows too large
  /// to represent.
  pub fn stale_time(&self) -> Option<chrono::TimeDelta> {
    let secs = i64::try_from(self.stale_secs?).ok()?;
    chrono::TimeDelta::try_seconds(secs)
  }

  pub fn keep_unused_for(&self) -> Duration {
    Duration::from_secs(self.keep_unused_secs)
  }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogConfig {
  /// Filter directive used when RUST_LOG is unset
  pub level: String,
  /// Write logs to this file instead of stderr
  pub file: Option<PathBuf>,
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      level: "info".to_string(),
      file: None,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./clinic-cache.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/clinic-cache/config.yaml
  ///
  /// Without a file the defaults are used. `CLINIC_API_URL` overrides the
  /// configured base URL either way.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };
    config.apply_overrides(std::env::var("CLINIC_API_URL").ok());
    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("clinic-cache.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("clinic-cache").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    // An empty file parses as null
    if contents.trim().is_empty() {
      return Ok(Config::default());
    }

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  fn apply_overrides(&mut self, api_url: Option<String>) {
    if let Some(url) = api_url.filter(|u| !u.trim().is_empty()) {
      self.api.url = url.trim().to_string();
    }
  }

  /// Override the base URL (command line flag).
  pub fn with_api_url(mut self, url: Option<String>) -> Self {
    self.apply_overrides(url);
    self
  }
}
