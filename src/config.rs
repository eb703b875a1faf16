//! Configuration management for Gatehouse.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{LimiterError, Result};
use crate::ratelimit::{Limit, LimiterSettings, TimeWindow, DEFAULT_INTERVAL};

/// Serializable limiter configuration.
///
/// ```yaml
/// limit: 100
/// window: minute
/// gradual_recovery: true
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimiterConfig {
    /// Maximum admissions per window; absent means no ceiling
    #[serde(default)]
    pub limit: Option<u64>,

    /// Decay interval in milliseconds
    #[serde(default)]
    pub interval_ms: Option<u64>,

    /// Named decay interval, alternative to `interval_ms`
    #[serde(default)]
    pub window: Option<TimeWindow>,

    /// Free capacity one unit at a time instead of resetting per window
    #[serde(default)]
    pub gradual_recovery: bool,
}

impl LimiterConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading limiter configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// The decay interval this configuration selects.
    pub fn interval(&self) -> Result<Duration> {
        match (self.interval_ms, self.window) {
            (Some(_), Some(_)) => Err(LimiterError::Config(
                "set either interval_ms or window, not both".to_string(),
            )),
            (Some(ms), None) => Ok(Duration::from_millis(ms)),
            (None, Some(window)) => Ok(window.duration()),
            (None, None) => Ok(DEFAULT_INTERVAL),
        }
    }

    /// Check that the configuration describes a constructible limiter.
    pub fn validate(&self) -> Result<()> {
        LimiterSettings::try_from(self)?.validate().map(|_| ())
    }
}

impl TryFrom<&LimiterConfig> for LimiterSettings {
    type Error = LimiterError;

    fn try_from(config: &LimiterConfig) -> Result<Self> {
        Ok(Self {
            limit: Limit::from(config.limit),
            interval: config.interval()?,
            gradual_recovery: config.gradual_recovery,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = LimiterConfig::from_yaml("{}").unwrap();
        let settings = LimiterSettings::try_from(&config).unwrap();

        assert_eq!(settings, LimiterSettings::default());
        assert_eq!(settings.limit, Limit::Infinite);
        assert_eq!(settings.interval, Duration::from_secs(3600));
        assert!(!settings.gradual_recovery);
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
limit: 100
interval_ms: 250
gradual_recovery: true
"#;
        let config = LimiterConfig::from_yaml(yaml).unwrap();
        let settings = LimiterSettings::try_from(&config).unwrap();

        assert_eq!(settings.limit, Limit::new(100));
        assert_eq!(settings.interval, Duration::from_millis(250));
        assert!(settings.gradual_recovery);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_named_window() {
        let config = LimiterConfig::from_yaml("limit: 10\nwindow: minute\n").unwrap();

        assert_eq!(config.interval().unwrap(), Duration::from_secs(60));
    }

    #[test]
    fn test_interval_and_window_conflict() {
        let config = LimiterConfig::from_yaml("interval_ms: 10\nwindow: second\n").unwrap();

        assert!(matches!(config.interval(), Err(LimiterError::Config(_))));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = LimiterConfig::from_yaml("limt: 10\n");
        assert!(matches!(result, Err(LimiterError::Yaml(_))));
    }

    #[test]
    fn test_gradual_without_limit_invalid() {
        let config = LimiterConfig::from_yaml("gradual_recovery: true\n").unwrap();
        assert!(matches!(config.validate(), Err(LimiterError::Config(_))));
    }

    #[test]
    fn test_zero_interval_invalid() {
        let config = LimiterConfig::from_yaml("limit: 5\ninterval_ms: 0\n").unwrap();
        assert!(matches!(config.validate(), Err(LimiterError::Config(_))));
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!(
            "gatehouse-config-{}.yaml",
            std::process::id()
        ));
        std::fs::write(&path, "limit: 3\nwindow: second\n").unwrap();

        let config = LimiterConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.limit, Some(3));
        assert_eq!(config.window, Some(TimeWindow::Second));
    }

    #[test]
    fn test_from_missing_file() {
        let result = LimiterConfig::from_file("/nonexistent/gatehouse.yaml");
        assert!(matches!(result, Err(LimiterError::Io(_))));
    }
}
