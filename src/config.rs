use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use jiff::{civil::Time, tz::TimeZone};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::classify::CompletionClass;

pub const DEFAULT_CACHE_KEY: &str = "@user_projects_cache";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config from '{path}': {source}")]
    LoadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config '{path}': {source}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unknown time zone '{name}': {source}")]
    UnknownTimeZone {
        name: String,
        #[source]
        source: jiff::Error,
    },

    #[error("Invalid default end time '{value}' (expected HH:MM): {source}")]
    InvalidEndTime {
        value: String,
        #[source]
        source: jiff::Error,
    },

    #[error("Reminder lead time must be positive, got {0} minutes")]
    InvalidLeadTime(i64),

    #[error("Refresh interval must be at least one second")]
    InvalidRefreshInterval,
}

/// What happens to the phases when a project is marked as done
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionCascade {
    /// Phases keep their own completion state
    #[default]
    LeavePhases,
    /// Every open phase is completed along with the project
    CompletePhases,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// IANA name of the zone project dates are entered in. System zone when unset.
    pub timezone: Option<String>,
    pub reminder_lead_minutes: i64,
    /// Show 99% instead of 100% until the project itself is marked as done
    pub clamp_unconfirmed_completion: bool,
    pub completion_cascade: CompletionCascade,
    /// Class given to completed items with no usable completion time
    pub missing_completed_at: CompletionClass,
    /// Time used for end dates entered without a time of day
    pub default_end_time: String,
    pub refresh_interval_secs: u64,
    pub background_min_interval_secs: u64,
    pub cache_key: String,
    pub completion_reward_points: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timezone: None,
            reminder_lead_minutes: 15,
            clamp_unconfirmed_completion: true,
            completion_cascade: CompletionCascade::default(),
            missing_completed_at: CompletionClass::OnTime,
            default_end_time: String::from("23:59"),
            refresh_interval_secs: 60 * 60,
            background_min_interval_secs: 15 * 60,
            cache_key: String::from(DEFAULT_CACHE_KEY),
            completion_reward_points: 3,
        }
    }
}

impl Config {
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lms")
            .join("config.json")
    }

    /// A missing file yields the defaults
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).map_err(|e| ConfigError::ParseFailed {
                path: path.to_path_buf(),
                source: e,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Config::default()),
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    pub fn time_zone(&self) -> Result<TimeZone, ConfigError> {
        match &self.timezone {
            Some(name) => TimeZone::get(name).map_err(|e| ConfigError::UnknownTimeZone {
                name: name.clone(),
                source: e,
            }),
            None => Ok(TimeZone::system()),
        }
    }

    pub fn end_of_day(&self) -> Result<Time, ConfigError> {
        let value = self.default_end_time.trim();
        value
            .parse::<Time>()
            .or_else(|_| Time::strptime("%H:%M", value))
            .map_err(|e| ConfigError::InvalidEndTime {
                value: self.default_end_time.clone(),
                source: e,
            })
    }

    pub fn lead_minutes(&self) -> Result<i64, ConfigError> {
        if self.reminder_lead_minutes <= 0 {
            return Err(ConfigError::InvalidLeadTime(self.reminder_lead_minutes));
        }
        Ok(self.reminder_lead_minutes)
    }

    pub fn refresh_interval(&self) -> Result<Duration, ConfigError> {
        if self.refresh_interval_secs == 0 {
            return Err(ConfigError::InvalidRefreshInterval);
        }
        Ok(Duration::from_secs(self.refresh_interval_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::time;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.reminder_lead_minutes, 15);
        assert_eq!(config.cache_key, DEFAULT_CACHE_KEY);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"timezone": "Europe/Madrid", "completion_cascade": "complete_phases", "missing_completed_at": "late"}"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.timezone.as_deref(), Some("Europe/Madrid"));
        assert_eq!(config.completion_cascade, CompletionCascade::CompletePhases);
        assert_eq!(config.missing_completed_at, CompletionClass::Late);
        assert_eq!(config.refresh_interval_secs, 3600);
    }

    #[test]
    fn test_invalid_json_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ nope").unwrap();
        assert!(matches!(
            Config::load(&path),
            Err(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn test_end_of_day_parsing() {
        let config = Config::default();
        assert_eq!(config.end_of_day().unwrap(), time(23, 59, 0, 0));

        let config = Config {
            default_end_time: String::from("late"),
            ..Config::default()
        };
        assert!(matches!(
            config.end_of_day(),
            Err(ConfigError::InvalidEndTime { .. })
        ));
    }

    #[test]
    fn test_unknown_time_zone() {
        let config = Config {
            timezone: Some(String::from("Mars/Olympus")),
            ..Config::default()
        };
        assert!(matches!(
            config.time_zone(),
            Err(ConfigError::UnknownTimeZone { .. })
        ));
    }

    #[test]
    fn test_lead_time_must_be_positive() {
        let config = Config {
            reminder_lead_minutes: 0,
            ..Config::default()
        };
        assert!(matches!(
            config.lead_minutes(),
            Err(ConfigError::InvalidLeadTime(0))
        ));
    }

    #[test]
    fn test_refresh_interval_must_not_be_zero() {
        let config = Config {
            refresh_interval_secs: 0,
            ..Config::default()
        };
        assert!(matches!(
            config.refresh_interval(),
            Err(ConfigError::InvalidRefreshInterval)
        ));
        assert_eq!(
            Config::default().refresh_interval().unwrap(),
            Duration::from_secs(3600)
        );
    }
}
