use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Application name used for config and data directory paths
const APP_NAME: &str = "beidou-sw";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Origin the front-end is served from; relative request paths resolve against it
  pub origin: String,
  /// Backend used by the question preloader
  pub api_base: String,
  /// Generation tag appended to every cache namespace name
  pub generation: String,
  /// Prefix shared by every namespace this worker owns
  pub namespace_prefix: String,
  /// Upper bound on any single network fetch
  pub fetch_timeout_secs: u64,
  /// Question records requested per subject when preloading
  pub preload_batch_size: usize,
  /// Records served from a cached question set when the request has no `limit`
  pub default_question_count: usize,
  /// Paths fetched at install time; every one must succeed
  pub static_manifest: Vec<String>,
  /// API path prefixes served network-first with cache fallback
  pub cacheable_api: Vec<String>,
  /// Subjects covered by `PRELOAD_QUIZ` with subject `all`
  pub subjects: Vec<String>,
  /// Override for the cache database location
  pub database_path: Option<PathBuf>,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      origin: "http://localhost:8080".to_string(),
      api_base: "https://beidou-edu-server-1.onrender.com".to_string(),
      generation: "v2".to_string(),
      namespace_prefix: "beidou".to_string(),
      fetch_timeout_secs: 15,
      preload_batch_size: 50,
      default_question_count: 10,
      static_manifest: [
        "/",
        "/index.html",
        "/auth.html",
        "/dashboard.html",
        "/quiz_ui.html",
        "/wrong_book.html",
        "/report.html",
        "/achievements.html",
        "/leaderboard.html",
        "/xtf_starmap.html",
        "/xtf_flashcard.html",
        "/learning_path.html",
        "/class.html",
        "/class_students.html",
        "/courses.html",
        "/course_learn.html",
        "/cert_exam.html",
        "/status.html",
        "/manifest.json",
        "/icons/icon-192.png",
        "/icons/icon-512.png",
      ]
      .iter()
      .map(|s| s.to_string())
      .collect(),
      cacheable_api: [
        "/api/quiz/subjects",
        "/api/quiz/stats",
        "/api/achievements",
        "/api/courses",
      ]
      .iter()
      .map(|s| s.to_string())
      .collect(),
      subjects: [
        "數學", "物理", "化學", "生物", "地科", "國文", "英文", "歷史", "地理", "公民",
      ]
      .iter()
      .map(|s| s.to_string())
      .collect(),
      database_path: None,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./beidou-sw.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/beidou-sw/config.yaml
  ///
  /// Falls back to the built-in defaults when no file is found.
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
    let local = PathBuf::from("beidou-sw.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join(APP_NAME).join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
  }

  /// Location of the cache database.
  pub fn database_path(&self) -> Result<PathBuf> {
    if let Some(ref path) = self.database_path {
      return Ok(path.clone());
    }

    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join(APP_NAME).join("cache.db"))
  }
}

/// Namespace names for one generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespaces {
  pub static_assets: String,
  pub quiz: String,
  pub api: String,
}

/// Immutable settings shared by every worker component.
///
/// Computed once from [`Config`] at startup so the generation tag and the
/// namespace names never drift between components.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
  pub origin: Url,
  pub api_base: Url,
  pub generation: String,
  pub prefix: String,
  pub namespaces: Namespaces,
  pub fetch_timeout: Duration,
  pub preload_batch_size: usize,
  pub default_question_count: usize,
  pub static_manifest: Vec<String>,
  pub cacheable_api: Vec<String>,
  pub subjects: Vec<String>,
}

/// Path prefix that marks a request as an API call
pub const API_PREFIX: &str = "/api";

/// Endpoint served by the question-set cache
pub const RANDOM_QUESTIONS_PATH: &str = "/api/quiz/random";

/// Document served to offline navigations that miss the cache
pub const OFFLINE_SHELL_PATH: &str = "/index.html";

impl WorkerConfig {
  pub fn from_config(config: &Config) -> Result<Self> {
    let origin = Url::parse(&config.origin)
      .map_err(|e| eyre!("Invalid origin '{}': {}", config.origin, e))?;
    let api_base = Url::parse(&config.api_base)
      .map_err(|e| eyre!("Invalid api_base '{}': {}", config.api_base, e))?;

    if config.generation.is_empty() {
      return Err(eyre!("Generation tag must not be empty"));
    }

    let name = |kind: &str| {
      format!(
        "{}-{}-{}",
        config.namespace_prefix, kind, config.generation
      )
    };

    Ok(Self {
      origin,
      api_base,
      generation: config.generation.clone(),
      prefix: config.namespace_prefix.clone(),
      namespaces: Namespaces {
        static_assets: name("static"),
        quiz: name("quiz"),
        api: name("api"),
      },
      fetch_timeout: Duration::from_secs(config.fetch_timeout_secs),
      preload_batch_size: config.preload_batch_size,
      default_question_count: config.default_question_count,
      static_manifest: config.static_manifest.clone(),
      cacheable_api: config.cacheable_api.clone(),
      subjects: config.subjects.clone(),
    })
  }

  /// Resolve a possibly relative path against the origin.
  pub fn resolve(&self, input: &str) -> Result<Url> {
    self
      .origin
      .join(input)
      .map_err(|e| eyre!("Invalid request url '{}': {}", input, e))
  }

  /// Whether a namespace belongs to this worker but to another generation.
  pub fn is_stale_namespace(&self, name: &str) -> bool {
    name.starts_with(&format!("{}-", self.prefix))
      && !name.ends_with(&format!("-{}", self.generation))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults_match_worker_constants() {
    let config = Config::default();
    assert_eq!(config.static_manifest.len(), 21);
    assert_eq!(config.cacheable_api.len(), 4);
    assert_eq!(config.subjects.len(), 10);
    assert_eq!(config.preload_batch_size, 50);
  }

  #[test]
  fn test_partial_yaml_keeps_defaults() {
    let config = Config::from_yaml("generation: v3\nnamespace_prefix: demo\n").unwrap();
    assert_eq!(config.generation, "v3");
    assert_eq!(config.namespace_prefix, "demo");
    assert_eq!(config.default_question_count, 10);
  }

  #[test]
  fn test_namespace_names_carry_generation() {
    let worker = WorkerConfig::from_config(&Config::default()).unwrap();
    assert_eq!(worker.namespaces.static_assets, "beidou-static-v2");
    assert_eq!(worker.namespaces.quiz, "beidou-quiz-v2");
    assert_eq!(worker.namespaces.api, "beidou-api-v2");
  }

  #[test]
  fn test_stale_namespace_detection() {
    let worker = WorkerConfig::from_config(&Config::default()).unwrap();
    assert!(worker.is_stale_namespace("beidou-static-v1"));
    assert!(!worker.is_stale_namespace("beidou-static-v2"));
    assert!(!worker.is_stale_namespace("other-static-v1"));
  }

  #[test]
  fn test_resolve_relative_path() {
    let worker = WorkerConfig::from_config(&Config::default()).unwrap();
    let url = worker.resolve("/index.html").unwrap();
    assert_eq!(url.as_str(), "http://localhost:8080/index.html");
  }

  #[test]
  fn test_empty_generation_rejected() {
    let config = Config {
      generation: String::new(),
      ..Config::default()
    };
    assert!(WorkerConfig::from_config(&config).is_err());
  }
}
