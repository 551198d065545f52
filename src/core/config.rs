use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

pub const API_KEY_ENV: &str = "EXRATE_API_KEY";
pub const DEFAULT_BASE_URL: &str = "https://test-api.tbcbank.ge";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig {
            base_url: default_base_url(),
            api_key: None,
        }
    }
}

impl ProviderConfig {
    /// Key from the environment wins over the config file; blank keys count as missing.
    pub fn resolve_api_key(&self) -> Option<String> {
        std::env::var(API_KEY_ENV)
            .ok()
            .or_else(|| self.api_key.clone())
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
    }
}

/// Timing policy of the rate cache. All values are in seconds.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    pub refresh_interval_secs: u64,
    pub staleness_threshold_secs: u64,
    pub freshness_threshold_secs: u64,
    pub initial_refresh_timeout_secs: u64,
    pub background_fetch_timeout_secs: u64,
    pub sync_refresh_timeout_secs: u64,
    pub direct_convert_timeout_secs: u64,
    pub direct_convert: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            refresh_interval_secs: 4 * 60 * 60,
            staleness_threshold_secs: 2 * 60 * 60,
            freshness_threshold_secs: 60 * 60,
            initial_refresh_timeout_secs: 60,
            background_fetch_timeout_secs: 60,
            sync_refresh_timeout_secs: 5,
            direct_convert_timeout_secs: 2,
            direct_convert: true,
        }
    }
}

impl CacheConfig {
    /// Rejects values the cache task cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.refresh_interval_secs == 0 {
            anyhow::bail!("cache.refresh_interval_secs must be greater than zero");
        }
        let limits = [
            ("refresh_interval_secs", self.refresh_interval_secs),
            ("staleness_threshold_secs", self.staleness_threshold_secs),
            ("freshness_threshold_secs", self.freshness_threshold_secs),
            ("initial_refresh_timeout_secs", self.initial_refresh_timeout_secs),
            ("background_fetch_timeout_secs", self.background_fetch_timeout_secs),
            ("sync_refresh_timeout_secs", self.sync_refresh_timeout_secs),
            ("direct_convert_timeout_secs", self.direct_convert_timeout_secs),
        ];
        for (key, secs) in limits {
            if secs > MAX_CONFIG_SECS {
                anyhow::bail!("cache.{key} is {secs}, the maximum is {MAX_CONFIG_SECS}");
            }
        }
        Ok(())
    }

    /// A zero interval falls back to the default period.
    pub fn refresh_interval(&self) -> Duration {
        match self.refresh_interval_secs {
            0 => Self::default().refresh_interval(),
            secs => std_secs(secs),
        }
    }

    pub fn staleness_threshold(&self) -> chrono::Duration {
        chrono_secs(self.staleness_threshold_secs)
    }

    pub fn freshness_threshold(&self) -> chrono::Duration {
        chrono_secs(self.freshness_threshold_secs)
    }

    /// Zero disables the deadline.
    pub fn initial_refresh_timeout(&self) -> Option<Duration> {
        optional_secs(self.initial_refresh_timeout_secs)
    }

    pub fn background_fetch_timeout(&self) -> Duration {
        std_secs(self.background_fetch_timeout_secs)
    }

    pub fn sync_refresh_timeout(&self) -> Option<Duration> {
        optional_secs(self.sync_refresh_timeout_secs)
    }

    pub fn direct_convert_timeout(&self) -> Duration {
        std_secs(self.direct_convert_timeout_secs)
    }
}

/// Upper bound for every `cache.*` seconds value: ten years.
pub const MAX_CONFIG_SECS: u64 = 10 * 365 * 24 * 60 * 60;

fn std_secs(secs: u64) -> Duration {
    Duration::from_secs(secs.min(MAX_CONFIG_SECS))
}

fn chrono_secs(secs: u64) -> chrono::Duration {
    i64::try_from(secs.min(MAX_CONFIG_SECS))
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX)
}

/// Maps a seconds count to a deadline, treating zero as "no deadline".
pub fn optional_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| std_secs(secs))
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!("No config at {}, using defaults", config_path.display());
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("ge", "exrate", "exrate")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config
            .cache
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
provider:
  base_url: "http://example.com/tbc"
  api_key: "secret"
cache:
  refresh_interval_secs: 600
  direct_convert: false
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.provider.base_url, "http://example.com/tbc");
        assert_eq!(config.provider.api_key.as_deref(), Some("secret"));
        assert_eq!(config.cache.refresh_interval(), Duration::from_secs(600));
        assert!(!config.cache.direct_convert);
        // Unspecified keys fall back to defaults
        assert_eq!(config.cache.staleness_threshold_secs, 2 * 60 * 60);
        assert_eq!(config.cache.freshness_threshold(), chrono::Duration::hours(1));
        assert_eq!(
            config.cache.direct_convert_timeout(),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = serde_yaml::from_str("{}").expect("Failed to deserialize");
        assert_eq!(config.provider.base_url, DEFAULT_BASE_URL);
        assert!(config.provider.api_key.is_none());
        assert!(config.cache.direct_convert);
        assert_eq!(
            config.cache.sync_refresh_timeout(),
            Some(Duration::from_secs(5))
        );
    }

    #[test]
    fn test_zero_timeout_means_no_deadline() {
        assert_eq!(optional_secs(0), None);
        assert_eq!(optional_secs(3), Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_zero_refresh_interval_is_rejected_on_load() {
        let temp_file = tempfile::NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "cache:\n  refresh_interval_secs: 0\n").unwrap();

        let err = AppConfig::load_from_path(temp_file.path()).unwrap_err();
        assert!(err.to_string().contains("Invalid config file"));
        assert!(format!("{err:#}").contains("refresh_interval_secs must be greater than zero"));
    }

    #[test]
    fn test_out_of_range_seconds_are_rejected_on_load() {
        let temp_file = tempfile::NamedTempFile::new().unwrap();
        fs::write(
            temp_file.path(),
            "cache:\n  staleness_threshold_secs: 18446744073709551615\n",
        )
        .unwrap();

        let err = AppConfig::load_from_path(temp_file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("cache.staleness_threshold_secs"));
    }

    #[test]
    fn test_unvalidated_values_stay_usable() {
        let config = CacheConfig {
            refresh_interval_secs: 0,
            staleness_threshold_secs: u64::MAX,
            freshness_threshold_secs: 1 << 63,
            background_fetch_timeout_secs: u64::MAX,
            ..CacheConfig::default()
        };
        assert!(config.validate().is_err());

        assert_eq!(config.refresh_interval(), Duration::from_secs(4 * 60 * 60));
        let max = chrono::Duration::seconds(i64::try_from(MAX_CONFIG_SECS).unwrap());
        assert_eq!(config.staleness_threshold(), max);
        assert_eq!(config.freshness_threshold(), max);
        assert_eq!(
            config.background_fetch_timeout(),
            Duration::from_secs(MAX_CONFIG_SECS)
        );
    }

    #[test]
    fn test_default_cache_config_is_valid() {
        assert!(CacheConfig::default().validate().is_ok());
    }

    #[test]
    fn test_blank_api_key_is_missing() {
        let provider = ProviderConfig {
            base_url: default_base_url(),
            api_key: Some("   ".to_string()),
        };
        // Only meaningful when the environment does not override the key
        if std::env::var(API_KEY_ENV).is_err() {
            assert_eq!(provider.resolve_api_key(), None);
        }
    }
}
