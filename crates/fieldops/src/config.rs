//! Configuration management for fieldops.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::Location;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "fieldops";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "fieldops.db";

/// Default prefix prepended to every collection key.
pub const DEFAULT_KEY_PREFIX: &str = "@fieldops:";

/// Default check-in admission radius in meters.
pub const DEFAULT_CHECK_IN_RADIUS_METERS: f64 = 50.0;

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `FIELDOPS_`, sections split on `__`)
/// 2. TOML config file at `~/.config/fieldops/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Geolocation configuration.
    pub geolocation: GeolocationConfig,
    /// Analytics configuration.
    pub analytics: AnalyticsConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/fieldops/fieldops.db`
    pub database_path: Option<PathBuf>,
    /// Prefix for collection keys in the key/value store.
    pub key_prefix: String,
}

/// Geolocation-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeolocationConfig {
    /// Maximum distance from a doctor's registered location at which a
    /// check-in is admitted.
    pub check_in_radius_meters: f64,
    /// Fixed position reported on hosts without a location sensor.
    pub simulated_location: Option<Location>,
}

/// Analytics-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Admin id stamped onto generated roundups.
    pub admin_id: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None, // Will be resolved to default at runtime
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        Self {
            check_in_radius_meters: DEFAULT_CHECK_IN_RADIUS_METERS,
            simulated_location: None,
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            admin_id: "admin".to_string(),
        }
    }
}

impl Config {
    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("FIELDOPS_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.storage.key_prefix.is_empty() {
            return Err(Error::ConfigValidation {
                message: "key_prefix must not be empty".to_string(),
            });
        }

        let radius = self.geolocation.check_in_radius_meters;
        if !radius.is_finite() || radius <= 0.0 {
            return Err(Error::ConfigValidation {
                message: format!("check_in_radius_meters must be positive, got {radius}"),
            });
        }

        if let Some(location) = self.geolocation.simulated_location {
            if !location.is_valid() {
                return Err(Error::ConfigValidation {
                    message: format!("simulated_location out of range: {location}"),
                });
            }
        }

        if self.analytics.admin_id.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "admin_id must not be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.storage.key_prefix, DEFAULT_KEY_PREFIX);
        assert!(config.storage.database_path.is_none());
        assert!((config.geolocation.check_in_radius_meters - 50.0).abs() < f64::EPSILON);
        assert!(config.geolocation.simulated_location.is_none());
        assert_eq!(config.analytics.admin_id, "admin");
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_empty_key_prefix() {
        let mut config = Config::default();
        config.storage.key_prefix = String::new();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("key_prefix"));
    }

    #[test]
    fn test_validate_non_positive_radius() {
        let mut config = Config::default();
        config.geolocation.check_in_radius_meters = 0.0;
        assert!(config.validate().is_err());

        config.geolocation.check_in_radius_meters = -5.0;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("check_in_radius_meters"));

        config.geolocation.check_in_radius_meters = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_simulated_location_range() {
        let mut config = Config::default();
        config.geolocation.simulated_location = Some(Location::new(28.6139, 77.209));
        assert!(config.validate().is_ok());

        config.geolocation.simulated_location = Some(Location::new(120.0, 77.209));
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("simulated_location"));
    }

    #[test]
    fn test_validate_blank_admin_id() {
        let mut config = Config::default();
        config.analytics.admin_id = "   ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_database_path_default() {
        let config = Config::default();
        assert!(config
            .database_path()
            .to_string_lossy()
            .contains("fieldops.db"));
    }

    #[test]
    fn test_database_path_custom() {
        let mut config = Config::default();
        config.storage.database_path = Some(PathBuf::from("/custom/path/db.sqlite"));

        assert_eq!(
            config.database_path(),
            PathBuf::from("/custom/path/db.sqlite")
        );
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("fieldops"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_toml_file() {
        let path = std::env::temp_dir().join(format!(
            "fieldops_config_test_{}.toml",
            std::process::id()
        ));
        std::fs::write(
            &path,
            r#"
[storage]
key_prefix = "@test:"

[geolocation]
check_in_radius_meters = 120.0
simulated_location = { lat = 28.6139, lng = 77.209 }

[analytics]
admin_id = "ops-lead"
"#,
        )
        .unwrap();

        let config = Config::load_from(Some(path.clone())).unwrap();
        assert_eq!(config.storage.key_prefix, "@test:");
        assert!((config.geolocation.check_in_radius_meters - 120.0).abs() < f64::EPSILON);
        assert_eq!(
            config.geolocation.simulated_location,
            Some(Location::new(28.6139, 77.209))
        );
        assert_eq!(config.analytics.admin_id, "ops-lead");

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_load_rejects_invalid_file_values() {
        let path = std::env::temp_dir().join(format!(
            "fieldops_config_invalid_{}.toml",
            std::process::id()
        ));
        std::fs::write(&path, "[geolocation]\ncheck_in_radius_meters = -1.0\n").unwrap();

        let result = Config::load_from(Some(path.clone()));
        assert!(matches!(result, Err(Error::ConfigValidation { .. })));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_config_serialize() {
        let json = serde_json::to_string(&Config::default()).unwrap();
        assert!(json.contains("key_prefix"));
        assert!(json.contains("check_in_radius_meters"));
        assert!(json.contains("admin_id"));
    }
}
