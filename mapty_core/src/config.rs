//! Configuration file support for Mapty.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/mapty/config.toml`.

use crate::{Coords, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Settings read from `config.toml`; every section is optional
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub map: MapConfig,

    #[serde(default)]
    pub lookups: LookupConfig,

    #[serde(default)]
    pub geocoding: GeocodingConfig,

    #[serde(default)]
    pub notices: NoticeConfig,
}

/// Where the workout log lives
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Map view configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MapConfig {
    /// Start position used when no device position is available
    #[serde(default)]
    pub home: Option<Coords>,

    #[serde(default = "default_zoom")]
    pub zoom: u8,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            home: None,
            zoom: default_zoom(),
        }
    }
}

/// Weather and geocoding endpoints
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LookupConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_weather_url")]
    pub weather_url: String,

    #[serde(default = "default_geocode_url")]
    pub geocode_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            weather_url: default_weather_url(),
            geocode_url: default_geocode_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Country-code rewriting for geocoder output
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GeocodingConfig {
    #[serde(default = "crate::lookup::default_region_overrides")]
    pub region_overrides: BTreeMap<String, String>,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            region_overrides: crate::lookup::default_region_overrides(),
        }
    }
}

/// Transient notification settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NoticeConfig {
    #[serde(default = "default_notice_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for NoticeConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_notice_ttl_secs(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("mapty")
}

fn default_zoom() -> u8 {
    13
}

fn default_true() -> bool {
    true
}

fn default_weather_url() -> String {
    "https://api.open-meteo.com/v1/forecast".into()
}

fn default_geocode_url() -> String {
    "https://api.bigdatacloud.net/data/reverse-geocode-client".into()
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_notice_ttl_secs() -> u64 {
    5
}

impl Config {
    /// Read `config.toml` from the user config dir, or fall back to defaults
    pub fn load() -> Result<Self> {
        let path = Self::default_config_path();
        if !path.exists() {
            tracing::info!("No config at {:?}; using built-in defaults", path);
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Parse and validate a config file. Missing sections take defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&raw)?;
        config.validate()?;
        tracing::info!("Using config {:?}", path);
        Ok(config)
    }

    /// `<config dir>/mapty/config.toml`
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mapty")
            .join("config.toml")
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Write the config as pretty TOML, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let rendered = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("cannot render config: {}", e)))?;
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, rendered)?;
        tracing::info!("Wrote config to {:?}", path);
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.lookups.timeout_secs == 0 {
            return Err(Error::Config("lookups.timeout_secs must be at least 1".into()));
        }
        if let Some(home) = self.map.home {
            if !home.in_range() {
                return Err(Error::Config(format!("map.home is not a valid position: {}", home)));
            }
        }
        Ok(())
    }
}
