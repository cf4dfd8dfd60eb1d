//! Configuration loading and resolution
//!
//! Configuration file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`SG_CONFIG`)
//! 3. Platform config file (`<config_dir>/street-gender/config.toml`)
//! 4. Compiled defaults (fallback)
//!
//! A missing file is not an error: the run continues with defaults and a
//! warning. A file that exists but cannot be parsed is an error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "SG_CONFIG";

const CONFIG_DIR_NAME: &str = "street-gender";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Top-level configuration loaded from TOML
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TomlConfig {
    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Name/gender sources, merged in declaration order (later wins)
    #[serde(default)]
    pub sources: Vec<SourceConfig>,

    /// Override table replacing the built-in one (optional)
    #[serde(default)]
    pub overrides_path: Option<PathBuf>,

    #[serde(default)]
    pub fallback: FallbackConfig,

    #[serde(default)]
    pub batch: BatchConfig,

    /// Accept a run without any name source (override table only)
    #[serde(default)]
    pub allow_override_only: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Layout of a name/gender source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// INSEE national first-name file (`sexe;preusuel;annais;nombre`)
    Insee,
    /// NRS Scotland baby names (`sex,FirstForename,number`, sex `B`/`G`)
    Nrs,
    /// Curated `name,gender` list without frequencies
    Curated,
}

impl SourceFormat {
    /// Duplicate policy used when a source does not configure one
    ///
    /// INSEE lists a name once per sex, so the most frequent row decides.
    /// NRS and curated lists keep their first row.
    pub fn default_duplicates(self) -> DuplicatePolicy {
        match self {
            SourceFormat::Insee => DuplicatePolicy::MostFrequent,
            SourceFormat::Nrs | SourceFormat::Curated => DuplicatePolicy::KeepFirst,
        }
    }
}

/// Which record decides when a source lists the same name more than once
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Highest frequency wins, first record on ties
    #[default]
    MostFrequent,
    /// First record above the threshold wins
    KeepFirst,
}

/// One name/gender source
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    /// Label used in logs and entry provenance
    pub label: String,
    pub path: PathBuf,
    pub format: SourceFormat,
    /// Minimum occurrence count for a name to be kept (none = keep all)
    #[serde(default)]
    pub min_frequency: Option<u64>,
    /// Duplicate policy (default depends on `format`)
    #[serde(default)]
    pub duplicates: Option<DuplicatePolicy>,
}

impl SourceConfig {
    pub fn duplicate_policy(&self) -> DuplicatePolicy {
        self.duplicates
            .unwrap_or_else(|| self.format.default_duplicates())
    }
}

/// External knowledge fallback configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FallbackConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Search languages, tried in order (primary first)
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,

    /// Number of top search results scanned per language
    #[serde(default = "default_result_limit")]
    pub result_limit: usize,

    /// Minimum delay between two outbound queries, shared by all workers
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,

    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,

    /// Endpoint template; `{lang}` is replaced by the search language
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl FallbackConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            languages: default_languages(),
            result_limit: default_result_limit(),
            min_interval_ms: default_min_interval_ms(),
            query_timeout_secs: default_query_timeout_secs(),
            endpoint: None,
        }
    }
}

/// Batch execution configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchConfig {
    /// Maximum number of names classified concurrently
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Persisted memo of classified names (optional)
    #[serde(default)]
    pub cache_path: Option<PathBuf>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            cache_path: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_languages() -> Vec<String> {
    vec!["en".to_string(), "fr".to_string()]
}

fn default_result_limit() -> usize {
    3
}

fn default_min_interval_ms() -> u64 {
    500
}

fn default_query_timeout_secs() -> u64 {
    10
}

fn default_concurrency() -> usize {
    4
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Reject values no run could work with
    pub fn validate(&self) -> Result<()> {
        if self.batch.concurrency == 0 {
            return Err(Error::Config("batch.concurrency must be at least 1".to_string()));
        }
        if self.fallback.enabled && self.fallback.languages.is_empty() {
            return Err(Error::Config(
                "fallback.languages must name at least one language".to_string(),
            ));
        }
        if self.fallback.result_limit == 0 {
            return Err(Error::Config("fallback.result_limit must be at least 1".to_string()));
        }
        if let Some(endpoint) = &self.fallback.endpoint {
            if !endpoint.contains("{lang}") {
                warn!("fallback.endpoint has no {{lang}} placeholder; all languages hit the same endpoint");
            }
        }
        Ok(())
    }
}

/// Resolves which configuration file to load
pub struct ConfigResolver {
    cli_path: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(cli_path: Option<PathBuf>) -> Self {
        Self { cli_path }
    }

    /// Locate the configuration file following the priority order
    ///
    /// Returns `None` when no candidate exists (compiled defaults apply).
    pub fn locate(&self) -> Option<PathBuf> {
        // Priority 1: Command-line argument
        if let Some(path) = &self.cli_path {
            return Some(path.clone());
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        // Priority 3: Platform config file
        dirs::config_dir()
            .map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
            .filter(|p| p.exists())
    }

    /// Load the resolved configuration, falling back to defaults
    pub fn resolve(&self) -> Result<TomlConfig> {
        match self.locate() {
            Some(path) if path.exists() => {
                let config = TomlConfig::load(&path)?;
                info!("Configuration loaded from {}", path.display());
                Ok(config)
            }
            Some(path) => {
                warn!(
                    "Configuration file {} not found, using compiled defaults",
                    path.display()
                );
                Ok(TomlConfig::default())
            }
            None => {
                info!("No configuration file found, using compiled defaults");
                Ok(TomlConfig::default())
            }
        }
    }
}
