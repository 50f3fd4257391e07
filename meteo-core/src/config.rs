use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

use crate::client::{
    cities::DEFAULT_CITIES_BASE_URL,
    weather::{DEFAULT_WEATHER_BASE_URL, WEATHER_CACHE_TTL},
};

fn default_weather_base_url() -> String {
    DEFAULT_WEATHER_BASE_URL.to_string()
}

fn default_cities_base_url() -> String {
    DEFAULT_CITIES_BASE_URL.to_string()
}

fn default_weather_cache_ttl_secs() -> u64 {
    WEATHER_CACHE_TTL.as_secs()
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
/// weather_base_url = "https://api.openweathermap.org/data/2.5"
/// cities_base_url = "http://localhost:3000"
/// weather_cache_ttl_secs = 600
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Weather provider API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_weather_base_url")]
    pub weather_base_url: String,

    #[serde(default = "default_cities_base_url")]
    pub cities_base_url: String,

    #[serde(default = "default_weather_cache_ttl_secs")]
    pub weather_cache_ttl_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            weather_base_url: default_weather_base_url(),
            cities_base_url: default_cities_base_url(),
            weather_cache_ttl_secs: default_weather_cache_ttl_secs(),
        }
    }
}

impl Config {
    /// Load config from disk, or return the default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            // First run: no config file.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "meteo", "meteo-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// The weather API key, or an error telling the user how to set one.
    pub fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                anyhow!(
                    "No API key configured for the weather provider.\n\
                     Hint: run `meteo configure` and enter your OpenWeather API key."
                )
            })
    }

    pub fn set_api_key(&mut self, api_key: String) {
        self.api_key = Some(api_key);
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_errors_when_not_set() {
        let cfg = Config::default();
        let err = cfg.api_key().unwrap_err();

        assert!(err.to_string().contains("No API key configured"));
        assert!(!cfg.has_api_key());
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let mut cfg = Config::default();
        cfg.set_api_key("   ".into());

        assert!(cfg.api_key().is_err());
    }

    #[test]
    fn set_api_key_is_returned() {
        let mut cfg = Config::default();
        cfg.set_api_key("OPEN_KEY".into());

        assert_eq!(cfg.api_key().unwrap(), "OPEN_KEY");
        assert!(cfg.has_api_key());
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let cfg = Config::from_toml("api_key = \"K\"\n").unwrap();

        assert_eq!(cfg.api_key.as_deref(), Some("K"));
        assert_eq!(cfg.weather_base_url, DEFAULT_WEATHER_BASE_URL);
        assert_eq!(cfg.cities_base_url, DEFAULT_CITIES_BASE_URL);
        assert_eq!(cfg.weather_cache_ttl_secs, 600);
    }

    #[test]
    fn toml_roundtrip_keeps_custom_endpoints() {
        let mut cfg = Config {
            cities_base_url: "http://127.0.0.1:4000".into(),
            weather_cache_ttl_secs: 60,
            ..Config::default()
        };
        cfg.set_api_key("K".into());

        let text = toml::to_string_pretty(&cfg).unwrap();
        assert_eq!(Config::from_toml(&text).unwrap(), cfg);
    }

    #[test]
    fn empty_file_is_default_config() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn config_path_ends_with_file_name() {
        if let Ok(path) = Config::config_file_path() {
            assert!(path.ends_with("config.toml"));
        }
    }
}
