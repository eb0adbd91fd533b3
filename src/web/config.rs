use chrono::Duration;
use serde::{Deserialize, Deserializer};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::catalog::Satellite;
use crate::scheduler::ScheduleLimits;
use crate::station::Station;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub web: WebConfig,
    pub storage: StorageConfig,
    pub tle: TleConfig,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    #[serde(default)]
    pub stations: Vec<Station>,
    #[serde(default)]
    pub satellites: Vec<Satellite>,
    #[serde(default)]
    pub api_keys: Vec<ApiKey>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub base_folder: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TleConfig {
    pub directory: PathBuf,
    #[serde(default = "default_tle_refresh", deserialize_with = "std_duration")]
    pub refresh: std::time::Duration,
}

fn default_tle_refresh() -> std::time::Duration {
    std::time::Duration::from_secs(6 * 3600)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulingConfig {
    /// Earliest a new observation may start, counted from now.
    #[serde(deserialize_with = "chrono_duration")]
    pub min_start_lead: Duration,
    /// Longest single observation.
    #[serde(deserialize_with = "chrono_duration")]
    pub max_range: Duration,
    /// A station is offline once its last heartbeat is this old.
    #[serde(deserialize_with = "chrono_duration")]
    pub station_heartbeat: Duration,
    /// How far ahead the station pass list looks.
    #[serde(deserialize_with = "chrono_duration")]
    pub upcoming_end: Duration,
    /// Unvetted observations that ended longer ago than this are removed.
    #[serde(deserialize_with = "chrono_duration")]
    pub observation_old_range: Duration,
    #[serde(deserialize_with = "std_duration")]
    pub cleanup_interval: std::time::Duration,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            min_start_lead: Duration::minutes(15),
            max_range: Duration::minutes(480),
            station_heartbeat: Duration::minutes(60),
            upcoming_end: Duration::hours(12),
            observation_old_range: Duration::days(30),
            cleanup_interval: std::time::Duration::from_secs(3600),
        }
    }
}

impl SchedulingConfig {
    pub fn limits(&self) -> ScheduleLimits {
        ScheduleLimits {
            min_start_lead: self.min_start_lead,
            max_range: self.max_range,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiKey {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub moderator: bool,
    #[serde(default)]
    pub superuser: bool,
}

fn std_duration<'de, D>(deserializer: D) -> Result<std::time::Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    humantime::parse_duration(s.trim()).map_err(serde::de::Error::custom)
}

fn chrono_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let d = std_duration(deserializer)?;
    Duration::from_std(d).map_err(serde::de::Error::custom)
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut ids = HashSet::new();
        for station in &self.stations {
            if !ids.insert(station.id) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate station id {}",
                    station.id
                )));
            }
            station.location.validate().map_err(|e| {
                ConfigError::Invalid(format!("station {}: {}", station.id, e))
            })?;
        }

        let mut norad_ids = HashSet::new();
        for satellite in &self.satellites {
            if !norad_ids.insert(satellite.norad_id) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate satellite {}",
                    satellite.norad_id
                )));
            }
        }

        let mut keys = HashSet::new();
        if let Some(dup) = self.api_keys.iter().find(|k| !keys.insert(k.key.as_str())) {
            return Err(ConfigError::Invalid(format!(
                "API key of {} is not unique",
                dup.name
            )));
        }

        let scheduling = &self.scheduling;
        if scheduling.max_range <= Duration::zero()
            || scheduling.station_heartbeat <= Duration::zero()
        {
            return Err(ConfigError::Invalid(
                "max_range and station_heartbeat must be positive".to_string(),
            ));
        }
        if self.tle.refresh.is_zero() || scheduling.cleanup_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "tle.refresh and cleanup_interval must be positive".to_string(),
            ));
        }

        Ok(())
    }

    pub fn find_api_key(&self, key: &str) -> Option<&ApiKey> {
        self.api_keys.iter().find(|k| k.key == key)
    }
}
