pub mod app;
pub mod components;
pub mod pages;
pub mod theme;

pub use app::DeckApp;
pub use theme::Theme;

use crate::beat::BeatSimulator;
use crate::models::TrackInfo;
use crate::playback::{ConnectionState, PlaybackController};
use std::f64::consts::TAU;
use std::time::Duration;

/// Time for one full turn of the reels while playing
pub const REEL_TURN: Duration = Duration::from_secs(2);

/// Reel radius multiplier for the current beat intensity
pub fn reel_scale(intensity: f32) -> f64 {
    1.0 + intensity.clamp(0.0, 1.0) as f64 * 0.1
}

/// Height of a visualizer bar for the current beat intensity
pub fn bar_height(base: u64, intensity: f32) -> u64 {
    (base as f64 * (1.0 + intensity.clamp(0.0, 1.0) as f64)).round() as u64
}

/// Spoke angle of the reels; only moves while playing
#[derive(Debug, Clone, Copy, Default)]
pub struct ReelClock {
    angle: f64,
}

impl ReelClock {
    pub fn advance(&mut self, elapsed: Duration, playing: bool) {
        if playing {
            let turns = elapsed.as_secs_f64() / REEL_TURN.as_secs_f64();
            self.angle = (self.angle + turns * TAU) % TAU;
        }
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }
}

/// Everything one frame of the deck needs, captured up front
#[derive(Debug, Clone, PartialEq)]
pub struct DeckView {
    pub state: ConnectionState,
    pub track: TrackInfo,
    pub is_playing: bool,
    pub authenticated: bool,
    pub intensity: f32,
    pub tempo: Option<u32>,
    pub reel_angle: f64,
    pub error: Option<String>,
    pub notice: Option<String>,
    pub demo: bool,
}

impl Default for DeckView {
    fn default() -> Self {
        Self {
            state: ConnectionState::Unauthenticated,
            track: TrackInfo::idle(),
            is_playing: false,
            authenticated: false,
            intensity: 0.0,
            tempo: None,
            reel_angle: 0.0,
            error: None,
            notice: None,
            demo: false,
        }
    }
}

impl DeckView {
    pub fn capture(
        controller: &PlaybackController,
        beat: &BeatSimulator,
        reels: &ReelClock,
    ) -> Self {
        Self {
            state: controller.state(),
            track: controller.track_info(),
            is_playing: controller.playback().is_playing,
            authenticated: controller.is_authenticated(),
            intensity: beat.intensity(),
            tempo: beat.tempo(),
            reel_angle: reels.angle(),
            error: controller.error().map(str::to_string),
            notice: None,
            demo: false,
        }
    }
}
