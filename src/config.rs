//! Client configuration loaded from `~/.config/espn-player/config.toml`.
//!
//! Everything the client core needs is carried by an explicit [`Config`]
//! handed to [`EspnPlayer::new`](crate::EspnPlayer::new); nothing is read
//! from ambient global state after construction.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::bitrate::BitratePolicy;
use crate::error::{Error, Result};

/// Backup channel used when an event does not name one.
pub const DEFAULT_CHANNEL: &str = "espn3";

const PLAYER_BASE: &str = "https://www.espnplayer.com";
const GEO_BASE: &str = "http://neulion.go.com/espngeo";

/// Base URLs of the two backends. Paths below them are fixed.
///
/// Not part of the TOML file; only code (tests) overrides these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// ESPN Player site: login and catalog.
    pub player_base: String,
    /// NeuLion geo service: pkan issuance and session negotiation.
    pub geo_base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            player_base: PLAYER_BASE.to_string(),
            geo_base: GEO_BASE.to_string(),
        }
    }
}

impl Endpoints {
    pub fn authenticate(&self) -> String {
        format!("{}/secure/authenticate", self.player_base)
    }

    pub fn categories(&self) -> String {
        format!("{}/category/espnplayer", self.player_base)
    }

    pub fn schedule(&self) -> String {
        format!("{}/schedule", self.player_base)
    }

    pub fn channels(&self) -> String {
        format!("{}/channels", self.player_base)
    }

    pub fn pkan(&self) -> String {
        format!("{}/dgetpkan", self.geo_base)
    }

    pub fn start_session(&self) -> String {
        format!("{}/startSession", self.geo_base)
    }
}

/// Bitrate setting as written in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BitrateSetting {
    #[default]
    Highest,
    Limit,
    Ask,
}

/// Client configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub username: Option<String>,
    pub password: Option<String>,
    /// Log full response bodies.
    pub debug: bool,
    /// Holds the credential and cookie files.
    pub profile_dir: PathBuf,
    pub default_channel: String,
    pub bitrate: BitrateSetting,
    /// Cap in kbps, used when `bitrate = "limit"`.
    pub max_bitrate: Option<u64>,
    #[serde(skip)]
    pub endpoints: Endpoints,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            debug: false,
            profile_dir: default_profile_dir(),
            default_channel: DEFAULT_CHANNEL.to_string(),
            bitrate: BitrateSetting::default(),
            max_bitrate: None,
            endpoints: Endpoints::default(),
        }
    }
}

impl Config {
    /// Load from the default location. A missing file yields defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    /// Load from `path`. A missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("invalid TOML in {}: {e}", path.display())))
    }

    #[must_use]
    pub fn with_profile_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.profile_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Resolve the configured bitrate setting into a policy.
    pub fn bitrate_policy(&self) -> Result<BitratePolicy> {
        match self.bitrate {
            BitrateSetting::Highest => Ok(BitratePolicy::Highest),
            BitrateSetting::Ask => Ok(BitratePolicy::Ask),
            BitrateSetting::Limit => self
                .max_bitrate
                .map(BitratePolicy::Limit)
                .ok_or_else(|| Error::Config("bitrate = \"limit\" needs max_bitrate".to_string())),
        }
    }

    pub fn credentials_file(&self) -> PathBuf {
        self.profile_dir.join("credentials")
    }

    pub fn cookie_file(&self) -> PathBuf {
        self.profile_dir.join("cookie_file")
    }
}

/// Return the path to the config file.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("espn-player")
        .join("config.toml")
}

fn default_profile_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("espn-player")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_empty_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.default_channel, "espn3");
        assert_eq!(config.bitrate, BitrateSetting::Highest);
        assert!(!config.debug);
        assert_eq!(config.endpoints, Endpoints::default());
    }

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
username = "fan@example.com"
password = "hunter2"
debug = true
profile_dir = "/tmp/espn"
default_channel = "espn1"
bitrate = "limit"
max_bitrate = 2000
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.username.as_deref(), Some("fan@example.com"));
        assert_eq!(config.profile_dir, PathBuf::from("/tmp/espn"));
        assert_eq!(config.cookie_file(), PathBuf::from("/tmp/espn/cookie_file"));
        assert_eq!(config.bitrate_policy().unwrap(), BitratePolicy::Limit(2000));
    }

    #[test]
    fn limit_without_cap_is_rejected() {
        let config: Config = toml::from_str("bitrate = \"limit\"").unwrap();
        assert!(matches!(config.bitrate_policy(), Err(Error::Config(_))));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.default_channel, DEFAULT_CHANNEL);
    }

    #[test]
    fn endpoint_paths_are_fixed() {
        let endpoints = Endpoints {
            player_base: "http://127.0.0.1:1".to_string(),
            geo_base: "http://127.0.0.1:1/espngeo".to_string(),
        };
        assert_eq!(endpoints.authenticate(), "http://127.0.0.1:1/secure/authenticate");
        assert_eq!(endpoints.start_session(), "http://127.0.0.1:1/espngeo/startSession");
    }
}
