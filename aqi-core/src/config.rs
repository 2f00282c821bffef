use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::PathBuf, time::Duration};

use crate::{
    cache::DEFAULT_MAX_AGE, dataset::DatasetPaths, impact::WeatherImpactRules,
    provider::{DEFAULT_TIMEOUT, ProviderId},
};

/// Configuration for a single provider (e.g., API key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: String,
}

/// Reading cache settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub disabled: bool,
    /// Defaults to the platform cache directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age_secs: Option<u64>,
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Air-quality provider used for live lookups, e.g. "waqi" or "iqair".
    pub default_provider: Option<String>,

    /// Example TOML:
    /// [providers.waqi]
    /// api_key = "..."
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub dataset: DatasetPaths,

    /// Overrides for the weather-impact heuristic.
    #[serde(default)]
    pub impact: WeatherImpactRules,
}

impl Config {
    /// Return the default provider as a strongly-typed ProviderId.
    pub fn default_provider_id(&self) -> Result<ProviderId> {
        let s = self.default_provider.as_ref().ok_or_else(|| {
            anyhow!(
                "No default provider configured.\n\
                 Hint: run `aqi configure <provider>` (e.g. `aqi configure waqi`) first."
            )
        })?;

        ProviderId::try_from(s.as_str())
    }

    pub fn has_provider(&self, id: ProviderId) -> bool {
        self.providers.contains_key(id.as_str())
    }

    /// Store default provider as string. Weather-only providers are refused.
    pub fn set_default_provider(&mut self, id: ProviderId) -> Result<()> {
        if !id.is_air_quality() {
            return Err(anyhow!("'{id}' cannot be the default air-quality provider"));
        }
        self.default_provider = Some(id.as_str().to_string());
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout_secs.map_or(DEFAULT_TIMEOUT, Duration::from_secs)
    }

    pub fn cache_max_age(&self) -> Duration {
        self.cache.max_age_secs.map_or(DEFAULT_MAX_AGE, Duration::from_secs)
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
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
        let dirs = ProjectDirs::from("dev", "aqi", "aqi-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Set/replace a provider API key. The first air-quality provider
    /// configured becomes the default.
    pub fn upsert_provider_api_key(&mut self, provider_id: ProviderId, api_key: String) {
        self.providers.insert(provider_id.as_str().to_string(), ProviderConfig { api_key });

        if self.default_provider.is_none() && provider_id.is_air_quality() {
            self.default_provider = Some(provider_id.to_string());
        }
    }

    /// Returns API key for a provider, if present.
    pub fn provider_api_key(&self, provider_id: ProviderId) -> Option<&str> {
        self.providers.get(provider_id.as_str()).map(|cfg| cfg.api_key.as_str())
    }

    pub fn is_provider_configured(&self, provider_id: ProviderId) -> bool {
        self.provider_api_key(provider_id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderId;

    #[test]
    fn default_provider_id_errors_when_not_set() {
        let cfg = Config::default();
        let err = cfg.default_provider_id().unwrap_err();

        assert!(err.to_string().contains("No default provider configured"));
    }

    #[test]
    fn set_api_key_and_default_for_provider() {
        let mut cfg = Config::default();

        cfg.upsert_provider_api_key(ProviderId::Waqi, "WAQI_TOKEN".into());

        let default = cfg.default_provider_id().expect("default provider must exist");
        assert_eq!(default, ProviderId::Waqi);

        let key = cfg.provider_api_key(ProviderId::Waqi);
        assert_eq!(key, Some("WAQI_TOKEN"));
        assert!(cfg.is_provider_configured(ProviderId::Waqi));
    }

    #[test]
    fn weather_key_does_not_become_default() {
        let mut cfg = Config::default();

        cfg.upsert_provider_api_key(ProviderId::OpenWeather, "OW_KEY".into());
        assert!(cfg.default_provider.is_none());
        assert!(cfg.has_provider(ProviderId::OpenWeather));
        assert!(cfg.set_default_provider(ProviderId::OpenWeather).is_err());
    }

    #[test]
    fn upsert_does_not_override_existing_default() {
        let mut cfg = Config::default();

        cfg.upsert_provider_api_key(ProviderId::Waqi, "WAQI_TOKEN".into());
        cfg.upsert_provider_api_key(ProviderId::IqAir, "IQ_KEY".into());

        let default = cfg.default_provider_id().expect("default provider must exist");

        assert_eq!(default, ProviderId::Waqi);
        assert!(cfg.is_provider_configured(ProviderId::Waqi));
        assert!(cfg.is_provider_configured(ProviderId::IqAir));
    }

    #[test]
    fn set_default_provider_overrides_default() {
        let mut cfg = Config::default();

        cfg.upsert_provider_api_key(ProviderId::Waqi, "WAQI_TOKEN".into());
        cfg.upsert_provider_api_key(ProviderId::IqAir, "IQ_KEY".into());

        cfg.set_default_provider(ProviderId::IqAir).unwrap();

        let default = cfg.default_provider_id().expect("default provider must exist");
        assert_eq!(default, ProviderId::IqAir);
    }

    #[test]
    fn defaults_apply_when_fields_are_absent() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.timeout(), Duration::from_secs(8));
        assert_eq!(cfg.cache_max_age(), Duration::from_secs(3600));
        assert_eq!(cfg.impact, WeatherImpactRules::default());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::Waqi, "TOKEN".into());
        cfg.timeout_secs = Some(3);
        cfg.dataset.cities = Some(PathBuf::from("/data/cities.csv"));
        cfg.impact.humid_impact = 4.5;
        cfg.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.provider_api_key(ProviderId::Waqi), Some("TOKEN"));
        assert_eq!(loaded.timeout(), Duration::from_secs(3));
        assert_eq!(loaded.dataset, cfg.dataset);
        assert_eq!(loaded.impact.humid_impact, 4.5);
    }

    #[test]
    fn missing_file_is_an_empty_config() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert!(cfg.providers.is_empty());
    }
}
