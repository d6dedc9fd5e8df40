use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub storage: StorageConfig,
  #[serde(default)]
  pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  #[serde(default = "default_base_url")]
  pub base_url: String,
  /// Upper bound for every remote call, in seconds
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
  /// Path template for the "notify others" call, e.g. "/stories/{id}/notify".
  /// Notification is skipped when unset.
  pub notify_path: Option<String>,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: default_base_url(),
      timeout_secs: default_timeout_secs(),
      notify_path: None,
    }
  }
}

fn default_base_url() -> String {
  "https://story-api.dicoding.dev/v1".to_string()
}

fn default_timeout_secs() -> u64 {
  30
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  #[serde(default = "default_name_prefix")]
  pub name_prefix: String,
  /// Bumping this retires every other cache generation on activation
  #[serde(default = "default_cache_version")]
  pub version: String,
  /// Origin the static manifest paths are resolved against
  #[serde(default = "default_origin")]
  pub origin: String,
  #[serde(default = "default_static_manifest")]
  pub static_manifest: Vec<String>,
  #[serde(default = "default_offline_page")]
  pub offline_page: String,
}

impl CacheConfig {
  /// Name of the generation this configuration makes current.
  pub fn generation(&self) -> String {
    format!("{}-{}", self.name_prefix, self.version)
  }
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      name_prefix: default_name_prefix(),
      version: default_cache_version(),
      origin: default_origin(),
      static_manifest: default_static_manifest(),
      offline_page: default_offline_page(),
    }
  }
}

fn default_name_prefix() -> String {
  "story-app-cache".to_string()
}

fn default_cache_version() -> String {
  "v2".to_string()
}

fn default_origin() -> String {
  "http://localhost:9000".to_string()
}

fn default_static_manifest() -> Vec<String> {
  [
    "/",
    "/index.html",
    "/offline.html",
    "/styles/styles.css",
    "/scripts/index.js",
    "/scripts/pages/app.js",
    "/images/logo.png",
    "/favicon.png",
  ]
  .into_iter()
  .map(String::from)
  .collect()
}

fn default_offline_page() -> String {
  "/offline.html".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
  /// Database location (default: $XDG_DATA_HOME/storysync/storysync.db)
  pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
  /// Directory for the rolling log file used by the terminal UI
  pub directory: Option<PathBuf>,
  /// Default filter when RUST_LOG is not set
  #[serde(default = "default_log_level")]
  pub level: String,
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      directory: None,
      level: default_log_level(),
    }
  }
}

fn default_log_level() -> String {
  "info".to_string()
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./storysync.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/storysync/config.yaml
  ///
  /// Falls back to built-in defaults when no file is found, so the local
  /// store and outbox work without any setup.
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
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("storysync.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("storysync").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
    // An empty file deserializes to null rather than an empty mapping
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(contents)
  }

  /// Get the story API token from environment variables.
  ///
  /// Checks STORYSYNC_TOKEN first, then STORY_API_TOKEN as fallback.
  /// Local-only operations work without one.
  pub fn api_token() -> Option<String> {
    std::env::var("STORYSYNC_TOKEN")
      .or_else(|_| std::env::var("STORY_API_TOKEN"))
      .ok()
      .filter(|t| !t.trim().is_empty())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_file_uses_defaults() {
    let config = Config::parse("").unwrap();
    assert_eq!(config.api.base_url, "https://story-api.dicoding.dev/v1");
    assert_eq!(config.cache.generation(), "story-app-cache-v2");
    assert_eq!(config.cache.static_manifest.len(), 8);
  }

  #[test]
  fn test_partial_sections() {
    let yaml = r#"
api:
  timeout_secs: 5
  notify_path: /stories/{id}/notify
cache:
  version: v3
  static_manifest: ["/", "/offline.html"]
"#;
    let config = Config::parse(yaml).unwrap();
    assert_eq!(config.api.timeout_secs, 5);
    assert_eq!(config.api.base_url, default_base_url());
    assert_eq!(config.api.notify_path.as_deref(), Some("/stories/{id}/notify"));
    assert_eq!(config.cache.generation(), "story-app-cache-v3");
    assert_eq!(config.cache.static_manifest, vec!["/", "/offline.html"]);
    assert_eq!(config.cache.offline_page, "/offline.html");
    assert_eq!(config.logging.level, "info");
  }

  #[test]
  fn test_missing_explicit_path_is_an_error() {
    let result = Config::load(Some(Path::new("/nonexistent/storysync.yaml")));
    assert!(result.is_err());
  }
}
