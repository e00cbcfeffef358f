use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};

use crate::{
    forecast::{DEFAULT_FORECAST_URL, DEFAULT_TIMEZONE},
    geocode::{DEFAULT_NOMINATIM_URL, DEFAULT_USER_AGENT},
    model::VariableSpec,
    transport::retry::{DEFAULT_ATTEMPTS, DEFAULT_BACKOFF_FACTOR, DEFAULT_MAX_BACKOFF, RetryPolicy},
};

const DEFAULT_EXPIRE_AFTER_SECS: u64 = 3600;
const DEFAULT_DATABASE: &str = "weather_data.db";
const CACHE_FILE: &str = "http_cache.sqlite";

/// Geocoder endpoint and client identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodingConfig {
    pub base_url: String,
    pub user_agent: String,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_NOMINATIM_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Forecast endpoint, timezone and requested variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub base_url: String,
    pub timezone: String,
    pub current: Vec<String>,
    pub hourly: Vec<String>,
    pub daily: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        let variables = VariableSpec::default();
        Self {
            base_url: DEFAULT_FORECAST_URL.to_string(),
            timezone: DEFAULT_TIMEZONE.to_string(),
            current: variables.current,
            hourly: variables.hourly,
            daily: variables.daily,
            request_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache database; defaults to the platform cache directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Zero disables the cache.
    pub expire_after_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { path: None, expire_after_secs: DEFAULT_EXPIRE_AFTER_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub attempts: u32,
    pub backoff_factor: f64,
    pub max_backoff_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            max_backoff_secs: DEFAULT_MAX_BACKOFF.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite file receiving the output tables.
    pub database: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { database: PathBuf::from(DEFAULT_DATABASE) }
    }
}

/// Top-level configuration stored on disk.
///
/// Every section is optional; missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub geocoding: GeocodingConfig,
    pub forecast: ForecastConfig,
    pub cache: CacheConfig,
    pub retry: RetryConfig,
    pub storage: StorageConfig,
}

impl Config {
    /// Load config from disk, or return defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, use defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_file_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }

    /// Where the HTTP response cache lives.
    pub fn cache_path(&self) -> Result<PathBuf> {
        match &self.cache.path {
            Some(path) => Ok(path.clone()),
            None => Ok(project_dirs()?.cache_dir().join(CACHE_FILE)),
        }
    }

    pub fn variables(&self) -> VariableSpec {
        VariableSpec {
            current: self.forecast.current.clone(),
            hourly: self.forecast.hourly.clone(),
            daily: self.forecast.daily.clone(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retry.attempts,
            backoff_factor: self.retry.backoff_factor,
            max_backoff: Duration::from_secs(self.retry.max_backoff_secs),
        }
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("dev", "meteo", "meteo")
        .ok_or_else(|| anyhow!("Could not determine platform config directory"))
}
