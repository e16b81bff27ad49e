use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EngramConfig {
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub query: QueryConfig,
    pub maintenance: MaintenanceConfig,
    pub consolidation: ConsolidationConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// Root of the on-disk layout: records/, index.json, stats.json.
    pub data_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct QueryConfig {
    pub default_limit: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MaintenanceConfig {
    /// Exponential decay constant, in days of idle time.
    pub half_life_days: f64,
    /// Weight of the log-scaled access-count reinforcement term.
    pub access_weight: f64,
    /// Minimum score change worth a record rewrite.
    pub decay_epsilon: f64,
    /// Default age for the archive pass when the caller gives none.
    pub archive_age_days: u64,
    /// Archive only below this relevance…
    pub archive_relevance_floor: f64,
    /// …and below this access count. The criteria are conjunctive.
    pub archive_access_floor: u32,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ConsolidationConfig {
    /// Weighted-similarity threshold above which two memories merge.
    pub similarity_threshold: f64,
}

impl Default for EngramConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            storage: StorageConfig::default(),
            query: QueryConfig::default(),
            maintenance: MaintenanceConfig::default(),
            consolidation: ConsolidationConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = default_engram_dir()
            .join("memories")
            .to_string_lossy()
            .into_owned();
        Self { data_dir }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { default_limit: 20 }
    }
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            half_life_days: 30.0,
            access_weight: 0.1,
            decay_epsilon: 0.01,
            archive_age_days: 90,
            archive_relevance_floor: 0.3,
            archive_access_floor: 5,
        }
    }
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.5,
        }
    }
}

/// Returns `~/.engram/`
pub fn default_engram_dir() -> PathBuf {
    dirs::home_dir()
        .expect("home directory must exist")
        .join(".engram")
}

/// Returns the default config file path: `~/.engram/config.toml`
pub fn default_config_path() -> PathBuf {
    default_engram_dir().join("config.toml")
}

impl EngramConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            EngramConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (ENGRAM_DATA_DIR, ENGRAM_LOG_LEVEL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("ENGRAM_DATA_DIR") {
            self.storage.data_dir = val;
        }
        if let Ok(val) = std::env::var("ENGRAM_LOG_LEVEL") {
            self.logging.level = val;
        }
    }
}

impl StorageConfig {
    /// Resolve the data directory, expanding `~` if needed.
    pub fn resolved_data_dir(&self) -> PathBuf {
        expand_tilde(&self.data_dir)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .expect("home directory must exist")
            .join(rest)
    } else {
        PathBuf::from(path)
    }
}
