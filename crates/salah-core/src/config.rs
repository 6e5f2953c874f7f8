//! `config.toml` for the host app and the widget refresh loop.
//!
//! Everything here is machine-local tuning. User-facing prayer settings live
//! in the shared settings store instead.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;

/// Suite identifier of the shared settings namespace.
pub const DEFAULT_SUITE_NAME: &str = "group.bd.com.islamicguidence.PrayerTimeiOS";

/// Dhaka, Bangladesh.
pub const DEFAULT_FALLBACK_LATITUDE: f64 = 23.777176;
pub const DEFAULT_FALLBACK_LONGITUDE: f64 = 90.399452;

const APP_DIR: &str = "salah-times";
const CONFIG_FILE: &str = "config.toml";

/// One finding from [`Config::validate`], keyed by its TOML path
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Errors block startup; warnings are only logged
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

fn issue(field: impl Into<String>, message: impl Into<String>) -> ValidationIssue {
    ValidationIssue {
        field: field.into(),
        message: message.into(),
    }
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(issue(field, message));
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(issue(field, message));
    }

    /// All errors joined with `; `, empty when valid
    pub fn error_summary(&self) -> String {
        let parts: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        parts.join("; ")
    }
}

/// Every section and field is optional in the file; gaps take defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Shared settings storage
    pub storage: StorageConfig,

    /// Location fallback
    pub location: LocationConfig,

    /// Geocoding service
    pub geocoding: GeocodingConfig,

    /// Widget timeline schedule and reload policy
    pub timeline: TimelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Suite identifier naming the shared settings namespace
    pub suite_name: String,

    /// Directory holding the shared store (defaults to the platform data dir)
    pub data_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            suite_name: DEFAULT_SUITE_NAME.to_string(),
            data_dir: None,
        }
    }
}

impl StorageConfig {
    /// Path of the shared settings database for this suite.
    pub fn store_path(&self) -> PathBuf {
        let dir = self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR)
        });
        dir.join(format!("{}.sqlite", self.suite_name))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    /// Used when the location setting is "Auto" and nothing has been saved
    pub fallback_latitude: f64,
    pub fallback_longitude: f64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            fallback_latitude: DEFAULT_FALLBACK_LATITUDE,
            fallback_longitude: DEFAULT_FALLBACK_LONGITUDE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodingConfig {
    /// Nominatim-compatible endpoint
    pub base_url: String,

    /// User agent sent with every request (Nominatim requires one)
    pub user_agent: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Minimum seconds between reverse-geocoding network calls
    pub rate_limit_secs: u64,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: format!("SalahTimes/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: 10,
            rate_limit_secs: 60,
        }
    }
}

/// When the widget host should ask for a fresh timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReloadPolicyKind {
    /// After a fixed interval (`reload_after_minutes`)
    #[default]
    After,
    /// Once the last produced entry has been reached
    AtEnd,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Minutes between consecutive entries
    pub step_minutes: u32,

    /// Span covered by one timeline, in minutes
    pub window_minutes: u32,

    /// Reload policy handed to the refresh loop
    pub reload_policy: ReloadPolicyKind,

    /// Interval used by the `after` policy
    pub reload_after_minutes: u32,

    /// Countdown ring span in hours
    pub countdown_window_hours: u32,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            step_minutes: 5,
            window_minutes: 30,
            reload_policy: ReloadPolicyKind::After,
            reload_after_minutes: 1,
            countdown_window_hours: 5,
        }
    }
}

impl TimelineConfig {
    /// Hourly entries across a day.
    pub fn hourly() -> Self {
        Self {
            step_minutes: 60,
            window_minutes: 24 * 60,
            reload_policy: ReloadPolicyKind::AtEnd,
            ..Self::default()
        }
    }
}

impl Config {
    /// Read `salah-times/config.toml` under the platform config dir, writing
    /// defaults on first run
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            tracing::info!("No config at {}, writing defaults", config_path.display());
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config = toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: config_path.display().to_string(),
            message: e.to_string(),
        })?;
        Ok(config)
    }

    /// [`Config::load`] followed by [`Config::validate`]; fails on errors and
    /// logs warnings.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()).into());
        }
        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.storage.suite_name.trim().is_empty() {
            result.add_error("storage.suite_name", "Suite name must not be empty");
        } else if self.storage.suite_name.contains(&['/', '\\'][..]) {
            result.add_error(
                "storage.suite_name",
                "Suite name must not contain path separators",
            );
        }

        let lat = self.location.fallback_latitude;
        let lon = self.location.fallback_longitude;
        if !(-90.0..=90.0).contains(&lat) {
            result.add_error(
                "location.fallback_latitude",
                format!("Latitude out of range: {}", lat),
            );
        }
        if !(-180.0..=180.0).contains(&lon) {
            result.add_error(
                "location.fallback_longitude",
                format!("Longitude out of range: {}", lon),
            );
        }

        self.validate_url(&self.geocoding.base_url, "geocoding.base_url", &mut result);

        if self.geocoding.timeout_secs == 0 {
            result.add_error("geocoding.timeout_secs", "Timeout must be greater than 0");
        }
        if self.geocoding.rate_limit_secs == 0 {
            result.add_warning(
                "geocoding.rate_limit_secs",
                "Rate limit disabled; every cache miss hits the geocoder",
            );
        }

        if self.timeline.step_minutes == 0 {
            result.add_error("timeline.step_minutes", "Step must be greater than 0");
        } else if self.timeline.window_minutes < self.timeline.step_minutes {
            result.add_warning(
                "timeline.window_minutes",
                "Window is shorter than one step; timelines will hold a single entry",
            );
        }
        if self.timeline.window_minutes > 7 * 24 * 60 {
            result.add_warning(
                "timeline.window_minutes",
                "Timeline window is more than a week",
            );
        }
        if self.timeline.reload_policy == ReloadPolicyKind::After
            && self.timeline.reload_after_minutes == 0
        {
            result.add_error(
                "timeline.reload_after_minutes",
                "Reload interval must be greater than 0",
            );
        }
        if self.timeline.countdown_window_hours == 0 {
            result.add_error(
                "timeline.countdown_window_hours",
                "Countdown window must be greater than 0",
            );
        }

        result
    }

    /// Nominatim must be reachable over http(s) at a real host
    fn validate_url(&self, raw: &str, field: &str, result: &mut ValidationResult) {
        let url = match Url::parse(raw) {
            Ok(url) => url,
            Err(e) => {
                result.add_error(field, format!("Invalid URL: {}", e));
                return;
            }
        };
        if !matches!(url.scheme(), "http" | "https") {
            result.add_error(
                field,
                format!("URL must use http or https scheme, got: {}", url.scheme()),
            );
        }
        if url.host().is_none() {
            result.add_error(field, "URL must have a host");
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(dir) = config_path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, contents)
            .with_context(|| format!("Failed to write {}", config_path.display()))
    }

    fn config_path() -> Result<PathBuf> {
        let dir = dirs::config_dir().context("No platform config directory")?;
        Ok(dir.join(APP_DIR).join(CONFIG_FILE))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn test_valid_default_config() {
        let config = Config::default();
        let result = config.validate();
        assert!(result.is_valid(), "Default config should be valid: {:?}", result.errors);
    }

    #[test]
    fn test_invalid_geocoder_url() {
        let mut config = Config::default();
        config.geocoding.base_url = "not-a-url".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "geocoding.base_url"));
    }

    #[test]
    fn test_invalid_url_scheme() {
        let mut config = Config::default();
        config.geocoding.base_url = "ftp://nominatim.example".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.message.contains("http or https")));
    }

    #[test]
    fn test_fallback_out_of_range() {
        let mut config = Config::default();
        config.location.fallback_latitude = 123.0;
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result
            .errors
            .iter()
            .any(|e| e.field == "location.fallback_latitude"));
    }

    #[test]
    fn test_zero_step_is_error() {
        let mut config = Config::default();
        config.timeline.step_minutes = 0;
        let result = config.validate();
        assert!(!result.is_valid());
    }

    #[test]
    fn test_disabled_rate_limit_is_warning() {
        let mut config = Config::default();
        config.geocoding.rate_limit_secs = 0;
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result
            .warnings
            .iter()
            .any(|w| w.field == "geocoding.rate_limit_secs"));
    }

    #[test]
    fn test_hourly_schedule_is_valid() {
        let config = Config {
            timeline: TimelineConfig::hourly(),
            ..Config::default()
        };
        assert!(config.validate().is_valid());
        assert_eq!(config.timeline.reload_policy, ReloadPolicyKind::AtEnd);
    }

    #[test]
    fn test_store_path_uses_suite_name() {
        let storage = StorageConfig {
            suite_name: "group.test".to_string(),
            data_dir: Some(PathBuf::from("/tmp/salah")),
        };
        assert_eq!(
            storage.store_path(),
            PathBuf::from("/tmp/salah/group.test.sqlite")
        );
    }

    #[test]
    fn test_load_creates_default_then_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let created = Config::load_from(&path).unwrap();
        assert!(path.exists());

        let mut changed = created.clone();
        changed.timeline.step_minutes = 15;
        changed.geocoding.rate_limit_secs = 120;
        changed.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.timeline.step_minutes, 15);
        assert_eq!(loaded.geocoding.rate_limit_secs, 120);
        assert_eq!(loaded.storage.suite_name, DEFAULT_SUITE_NAME);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.timeline.step_minutes, 5);
        assert_eq!(config.geocoding.rate_limit_secs, 60);
        assert_eq!(config.location.fallback_latitude, DEFAULT_FALLBACK_LATITUDE);
    }

    #[test]
    fn test_partial_section_fills_remaining_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[geocoding]\nrate_limit_secs = 120\n\n[timeline]\nreload_policy = \"at_end\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.geocoding.rate_limit_secs, 120);
        assert_eq!(config.geocoding.timeout_secs, 10);
        assert_eq!(config.geocoding.base_url, GeocodingConfig::default().base_url);
        assert_eq!(config.timeline.reload_policy, ReloadPolicyKind::AtEnd);
        assert_eq!(config.timeline.step_minutes, 5);
        assert_eq!(config.storage.suite_name, DEFAULT_SUITE_NAME);
        assert!(config.validate().is_valid());
    }

    #[test]
    fn test_error_summary_joins_issues() {
        let mut result = ValidationResult::default();
        assert_eq!(result.error_summary(), "");
        result.add_error("timeline.step_minutes", "Step must be greater than 0");
        result.add_error("geocoding.base_url", "URL must have a host");
        assert_eq!(
            result.error_summary(),
            "timeline.step_minutes: Step must be greater than 0; geocoding.base_url: URL must have a host"
        );
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "timeline = [not toml").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::Parse { .. })
        ));
    }
}
