/// Mixtape Player - cassette deck for Spotify with a simulated beat
pub mod auth;
pub mod beat;
pub mod config;
pub mod models;
pub mod playback;
pub mod store;
#[cfg(feature = "cli")]
pub mod ui;

#[cfg(test)]
mod test_support;

pub use auth::{AuthClient, AuthError, CallbackListener, CallbackOutcome, Endpoints};
pub use beat::{estimate_tempo, BeatSimulator};
pub use config::{Config, ConfigError, SpotifyConfig};
pub use models::{AuthTokens, PlaybackState, PlayerStatePayload, Track, TrackInfo};
pub use playback::{
    ConnectionState, DemoSdk, PlayAction, PlaybackController, PlaybackError, PlaybackSdk,
    WebApiSdk,
};
pub use store::{StoreError, TokenStore};
