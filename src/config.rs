//! Configuration for medcheck.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (MEDCHECK_HOME, MEDCHECK_VALIDATOR_URL)
//! 2. Config file (.medcheck/config.yaml)
//! 3. Defaults (~/.medcheck, public terminology endpoint)
//!
//! Config file discovery:
//! - Searches current directory and parents for .medcheck/config.yaml
//! - Paths in config file are relative to the config file's parent directory

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::cache::CacheSettings;
use crate::core::ResolverSettings;
use crate::matchers::BreakerSettings;

/// Default terminology endpoint (snowstorm-style concept search)
const DEFAULT_VALIDATOR_URL: &str = "https://browser.ihtsdotools.org/snowstorm/snomed-ct/MAIN";

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<std::result::Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub validator: Option<ValidatorConfig>,
    #[serde(default)]
    pub cache: Option<CacheConfig>,
    #[serde(default)]
    pub suggestions: Option<SuggestionConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Engine state directory (relative to config file)
    pub home: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidatorConfig {
    pub base_url: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub failure_threshold: Option<u32>,
    pub window_seconds: Option<u64>,
    pub cooldown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub classification_ttl_seconds: Option<i64>,
    pub validator_ttl_seconds: Option<i64>,
    pub suggestion_ttl_seconds: Option<i64>,
    pub capacity: Option<usize>,
    pub sweep_interval_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SuggestionConfig {
    pub max_suggestions: Option<usize>,
    pub similarity_floor: Option<f64>,
    pub validator_limit: Option<usize>,
}

/// Resolved configuration with absolute paths and concrete settings
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to medcheck home (caches, dynamic list)
    pub home: PathBuf,
    /// Terminology endpoint base URL
    pub validator_url: String,
    /// Per-call validator timeout
    pub validator_timeout: Duration,
    /// Circuit breaker settings for the validator
    pub breaker: BreakerSettings,
    /// Cache TTLs and capacity
    pub cache: CacheSettings,
    /// How often the background sweeper runs
    pub sweep_interval: Duration,
    /// Suggestion merge settings
    pub resolver: ResolverSettings,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl ResolvedConfig {
    /// Path of the user-confirmed dynamic list file
    pub fn dynamic_list_path(&self) -> PathBuf {
        self.home.join("dynamic_terms.json")
    }

    /// Directory holding the durable cache snapshots
    pub fn cache_dir(&self) -> PathBuf {
        self.home.join("cache")
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".medcheck").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

fn apply_config_file(config: &ConfigFile, defaults: &mut ResolvedConfig) {
    if let Some(ref validator) = config.validator {
        if let Some(ref url) = validator.base_url {
            defaults.validator_url = url.clone();
        }
        if let Some(secs) = validator.timeout_seconds {
            defaults.validator_timeout = Duration::from_secs(secs);
        }
        if let Some(threshold) = validator.failure_threshold {
            defaults.breaker.failure_threshold = threshold;
        }
        if let Some(secs) = validator.window_seconds {
            defaults.breaker.window = Duration::from_secs(secs);
        }
        if let Some(secs) = validator.cooldown_seconds {
            defaults.breaker.cooldown = Duration::from_secs(secs);
        }
    }

    if let Some(ref cache) = config.cache {
        if let Some(secs) = cache.classification_ttl_seconds {
            defaults.cache.classification_ttl_secs = secs;
        }
        if let Some(secs) = cache.validator_ttl_seconds {
            defaults.cache.validator_ttl_secs = secs;
        }
        if let Some(secs) = cache.suggestion_ttl_seconds {
            defaults.cache.suggestion_ttl_secs = secs;
        }
        if let Some(capacity) = cache.capacity {
            defaults.cache.capacity = capacity;
        }
        if let Some(secs) = cache.sweep_interval_seconds {
            defaults.sweep_interval = Duration::from_secs(secs);
        }
    }

    if let Some(ref suggestions) = config.suggestions {
        if let Some(max) = suggestions.max_suggestions {
            defaults.resolver.max_suggestions = max;
        }
        if let Some(floor) = suggestions.similarity_floor {
            defaults.resolver.similarity_floor = floor;
        }
        if let Some(limit) = suggestions.validator_limit {
            defaults.resolver.validator_limit = limit;
        }
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".medcheck");

    let config_file = find_config_file();

    let mut resolved = ResolvedConfig {
        home: default_home.clone(),
        validator_url: DEFAULT_VALIDATOR_URL.to_string(),
        validator_timeout: Duration::from_secs(5),
        breaker: BreakerSettings::default(),
        cache: CacheSettings::default(),
        sweep_interval: Duration::from_secs(300),
        resolver: ResolverSettings::default(),
        config_file: config_file.clone(),
    };

    if let Some(ref config_path) = config_file {
        let config = load_config_file(config_path)?;

        if let Some(ref home_path) = config.paths.home {
            // home is relative to the .medcheck/ directory
            let medcheck_dir = config_path.parent().unwrap_or(Path::new("."));
            resolved.home = resolve_path(medcheck_dir, home_path);
        }

        apply_config_file(&config, &mut resolved);
    }

    // Environment variables outrank the config file
    if let Ok(env_home) = std::env::var("MEDCHECK_HOME") {
        resolved.home = PathBuf::from(env_home);
    }
    if let Ok(env_url) = std::env::var("MEDCHECK_VALIDATOR_URL") {
        resolved.validator_url = env_url;
    }

    Ok(resolved)
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

/// Get the medcheck home directory (engine state).
pub fn medcheck_home() -> Result<PathBuf> {
    Ok(config()?.home.clone())
}
