/// Core data models shared by the auth flow, the playback controller and the deck
use serde::{Deserialize, Serialize};

/// Placeholder label shown when no track is loaded
pub const IDLE_TITLE: &str = "Ready to play your mixtape";
/// Placeholder subtitle shown when no track is loaded
pub const IDLE_ARTIST: &str = "Connect to Spotify to begin";

/// OAuth token pair persisted between runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// Artist credit on a track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    pub name: String,
}

/// Track as reported by the vendor player.
///
/// Tracks are replaced wholesale on every state change and never edited in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<Artist>,
    #[serde(default)]
    pub duration_ms: u64,
}

impl Track {
    pub fn new(name: impl Into<String>, artists: &[&str], duration_ms: u64) -> Self {
        Self {
            id: None,
            name: name.into(),
            artists: artists
                .iter()
                .map(|a| Artist {
                    name: (*a).to_string(),
                })
                .collect(),
            duration_ms,
        }
    }

    /// Name of the first credited artist, if any
    pub fn primary_artist(&self) -> Option<&str> {
        self.artists.first().map(|a| a.name.as_str())
    }

    /// Display projection used by the deck label
    pub fn info(&self) -> TrackInfo {
        TrackInfo {
            title: if self.name.is_empty() {
                "Unknown Track".to_string()
            } else {
                self.name.clone()
            },
            artist: self
                .primary_artist()
                .filter(|a| !a.is_empty())
                .unwrap_or("Unknown Artist")
                .to_string(),
        }
    }
}

/// Title/artist pair rendered on the cassette label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    pub title: String,
    pub artist: String,
}

impl TrackInfo {
    pub fn idle() -> Self {
        Self {
            title: IDLE_TITLE.to_string(),
            artist: IDLE_ARTIST.to_string(),
        }
    }

    pub fn for_track(track: Option<&Track>) -> Self {
        track.map(Track::info).unwrap_or_else(Self::idle)
    }
}

/// Playback state mirrored from the latest player callback
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackState {
    pub is_playing: bool,
    pub current_track: Option<Track>,
}

impl PlaybackState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Track window of a player state payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackWindow {
    pub current_track: Track,
}

/// Payload delivered with a `player_state_changed` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStatePayload {
    pub paused: bool,
    pub track_window: TrackWindow,
}

impl PlayerStatePayload {
    pub fn new(track: Track, paused: bool) -> Self {
        Self {
            paused,
            track_window: TrackWindow {
                current_track: track,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_deserializes_minimal_track() {
        let json = r#"{
            "track_window": {"current_track": {"name": "X", "artists": [{"name": "Y"}]}},
            "paused": false
        }"#;
        let payload: PlayerStatePayload = serde_json::from_str(json).unwrap();
        assert!(!payload.paused);
        assert_eq!(payload.track_window.current_track.name, "X");
        assert_eq!(payload.track_window.current_track.primary_artist(), Some("Y"));
        assert_eq!(payload.track_window.current_track.duration_ms, 0);
    }

    #[test]
    fn test_track_info_fallbacks() {
        let track = Track::new("", &[], 1000);
        let info = track.info();
        assert_eq!(info.title, "Unknown Track");
        assert_eq!(info.artist, "Unknown Artist");

        assert_eq!(TrackInfo::for_track(None), TrackInfo::idle());
    }
}
