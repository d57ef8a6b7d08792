/// Configuration management
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ENV_CLIENT_ID: &str = "SPOTIFY_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "SPOTIFY_CLIENT_SECRET";
pub const ENV_REDIRECT_URI: &str = "SPOTIFY_REDIRECT_URI";
pub const ENV_PLAYLIST_ID: &str = "SPOTIFY_PLAYLIST_ID";

// Sample credentials only. Real deployments must override these through the
// environment or config.toml.
const SAMPLE_CLIENT_ID: &str = "974425ac66744974a11a42a9c9c9608f";
const SAMPLE_CLIENT_SECRET: &str = "879bec48ef484cd1926625b5634cda17";
const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8989/callback";
const PLACEHOLDER_PLAYLIST_ID: &str = "YOUR_PLAYLIST_ID_HERE";

/// Scopes needed to stream and control playback
pub const DEFAULT_SCOPES: &[&str] = &[
    "streaming",
    "user-read-email",
    "user-read-private",
    "user-library-read",
    "user-library-modify",
    "user-read-playback-state",
    "user-modify-playback-state",
    "user-read-currently-playing",
    "playlist-read-private",
    "playlist-read-collaborative",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to determine {0} directory")]
    NoDirectory(&'static str),
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("configuration i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub general: GeneralConfig,
    pub spotify: SpotifyConfig,
}

/// General application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Directory for stored tokens and the log file
    pub data_dir: Option<String>,
    /// Log level (error, warn, info, debug, trace)
    pub log_level: String,
    /// Deck theme name (vintage, dark, light)
    pub theme: String,
    /// Deck redraw rate in frames per second
    pub frame_rate: u32,
    /// How often the Web API backend polls player state
    pub poll_interval_ms: u64,
}

/// Spotify application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotifyConfig {
    /// Spotify Client ID (OAuth application)
    pub client_id: String,
    /// Spotify Client Secret (OAuth application)
    pub client_secret: String,
    /// Redirect URI registered with the application
    pub redirect_uri: String,
    /// Playlist started when play is pressed with nothing loaded
    pub playlist_id: String,
    /// Device name announced by the player
    pub player_name: String,
    /// Initial player volume (0.0 - 1.0)
    pub volume: f32,
    pub scopes: Vec<String>,
}

impl SpotifyConfig {
    /// Whether the playlist id is still the shipped placeholder
    pub fn has_playlist(&self) -> bool {
        !self.playlist_id.is_empty() && self.playlist_id != PLACEHOLDER_PLAYLIST_ID
    }

    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            log_level: "info".to_string(),
            theme: "vintage".to_string(),
            frame_rate: 30,
            poll_interval_ms: 1000,
        }
    }
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: SAMPLE_CLIENT_ID.to_string(),
            client_secret: SAMPLE_CLIENT_SECRET.to_string(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            playlist_id: PLACEHOLDER_PLAYLIST_ID.to_string(),
            player_name: "Mixtape Player".to_string(),
            volume: 0.5,
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            spotify: SpotifyConfig::default(),
        }
    }
}

fn env_override(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

impl Config {
    /// Load configuration from the default location, layered with the environment
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_dir()?.join("config.toml");
        Self::load_from(&path)
    }

    /// Load configuration from `path` (optional), layered over defaults and
    /// under the `SPOTIFY_*` environment overrides
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let defaults = toml::to_string(&Config::default())?;

        let settings = config::Config::builder()
            .add_source(config::File::from_str(&defaults, config::FileFormat::Toml))
            .add_source(
                config::File::new(&path.to_string_lossy(), config::FileFormat::Toml)
                    .required(false),
            )
            .set_override_option("spotify.client_id", env_override(ENV_CLIENT_ID))?
            .set_override_option("spotify.client_secret", env_override(ENV_CLIENT_SECRET))?
            .set_override_option("spotify.redirect_uri", env_override(ENV_REDIRECT_URI))?
            .set_override_option("spotify.playlist_id", env_override(ENV_PLAYLIST_ID))?
            .build()?;

        let config: Config = settings.try_deserialize()?;
        tracing::debug!("Configuration loaded (file: {:?})", path);
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_dir()?.join("config.toml");
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get configuration directory path
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        let dir = dirs::config_dir()
            .ok_or(ConfigError::NoDirectory("config"))?
            .join("mixtape-player");
        Ok(dir)
    }

    /// Get data directory, honouring `general.data_dir`
    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        if let Some(ref custom_dir) = self.general.data_dir {
            Ok(PathBuf::from(custom_dir))
        } else {
            Ok(dirs::data_dir()
                .ok_or(ConfigError::NoDirectory("data"))?
                .join("mixtape-player"))
        }
    }
}
