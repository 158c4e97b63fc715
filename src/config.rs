use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use chrono::Duration;

use crate::table::PAGE_SIZES;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub tables: TablesConfig,
  /// Custom title for header (defaults to the API host if not set)
  pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  pub url: String,
  #[serde(default = "default_timeout_ms")]
  pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Seconds an entry with no subscribers survives before eviction
  #[serde(default = "default_eviction_grace_secs")]
  pub eviction_grace_secs: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      eviction_grace_secs: default_eviction_grace_secs(),
    }
  }
}

impl CacheConfig {
  pub fn eviction_grace(&self) -> Duration {
    i64::try_from(self.eviction_grace_secs)
      .ok()
      .and_then(Duration::try_seconds)
      .unwrap_or(Duration::MAX)
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TablesConfig {
  #[serde(default = "default_page_size")]
  pub page_size: usize,
}

impl Default for TablesConfig {
  fn default() -> Self {
    Self {
      page_size: default_page_size(),
    }
  }
}

fn default_timeout_ms() -> u64 {
  15_000
}

fn default_eviction_grace_secs() -> u64 {
  60
}

fn default_page_size() -> usize {
  10
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./storedesk.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/storedesk/config.yaml
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

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/storedesk/config.yaml\n\
                 See config.example.yaml for the format."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("storedesk.yaml");
    if local.exists() {
      return Some(local);
    }

    dirs::config_dir()
      .map(|dir| dir.join("storedesk").join("config.yaml"))
      .filter(|path| path.exists())
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Invalid config file {}: {}", path.display(), e))
  }

  pub(crate) fn parse(contents: &str) -> Result<Self> {
    let config: Config =
      serde_yaml::from_str(contents).map_err(|e| eyre!("Failed to parse: {}", e))?;

    url::Url::parse(&config.api.url)
      .map_err(|e| eyre!("api.url '{}' is not a valid URL: {}", config.api.url, e))?;
    if i64::try_from(config.cache.eviction_grace_secs)
      .ok()
      .and_then(Duration::try_seconds)
      .is_none()
    {
      return Err(eyre!(
        "cache.eviction_grace_secs is out of range: {}",
        config.cache.eviction_grace_secs
      ));
    }
    if !PAGE_SIZES.contains(&config.tables.page_size) {
      return Err(eyre!(
        "tables.page_size must be one of {:?}, got {}",
        PAGE_SIZES,
        config.tables.page_size
      ));
    }

    Ok(config)
  }

  /// Header title: the configured one, or the API host.
  pub fn display_title(&self) -> String {
    if let Some(title) = &self.title {
      return title.clone();
    }
    url::Url::parse(&self.api.url)
      .ok()
      .and_then(|u| u.host_str().map(str::to_string))
      .unwrap_or_else(|| self.api.url.clone())
  }
}
