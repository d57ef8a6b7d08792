//! Simulated beat for the reel animation.
//!
//! There is no audio analysis here. A tempo is guessed from track metadata and
//! a 4/4 accent pattern is played against it. All timing runs through a single
//! [`BeatSimulator::tick`] call per rendered frame, so the per-beat accent and
//! the per-frame decay never race each other.

use crate::models::Track;
use std::time::Duration;

/// Tempo used when there is nothing to estimate from
pub const DEFAULT_TEMPO: u32 = 120;

/// Per-frame multiplicative decay
pub const FRAME_DECAY: f32 = 0.95;
/// Intensities below this snap to zero
pub const SILENCE_FLOOR: f32 = 0.01;
/// Fraction of intensity left once an accent is released
pub const RELEASE_FACTOR: f32 = 0.3;
/// Delay between an accent and its release
pub const RELEASE_DELAY: Duration = Duration::from_millis(100);

const BEATS_PER_BAR: u8 = 4;
const UNKNOWN_DURATION_MS: u64 = 180_000;

// First matching bucket wins, so the order is part of the policy.
const TEMPO_BUCKETS: &[(&[&str], u32)] = &[
    (&["rock", "metal"], 140),
    (&["pop", "dance"], 128),
    (&["jazz", "blues"], 100),
    (&["ballad", "slow"], 80),
    (&["rap", "hip hop", "hip-hop"], 95),
    (&["electronic", "edm"], 130),
];

/// Guess beats per minute from track name, artists and duration
pub fn estimate_tempo(track: Option<&Track>) -> u32 {
    let Some(track) = track else {
        return DEFAULT_TEMPO;
    };

    let mut text = track.name.to_lowercase();
    for artist in &track.artists {
        text.push(' ');
        text.push_str(&artist.name.to_lowercase());
    }

    if let Some((_, bpm)) = TEMPO_BUCKETS
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| text.contains(k)))
    {
        return *bpm;
    }

    let duration_ms = if track.duration_ms == 0 {
        UNKNOWN_DURATION_MS
    } else {
        track.duration_ms
    };
    let minutes = duration_ms as f64 / 60_000.0;

    if minutes < 2.5 {
        140
    } else if minutes > 4.0 {
        100
    } else {
        DEFAULT_TEMPO
    }
}

/// Beat period for a tempo
pub fn beat_period(bpm: u32) -> Duration {
    Duration::from_secs_f64(60.0 / bpm.max(1) as f64)
}

/// Accent for a step of the bar: strong on 1, medium on 3, weak otherwise
pub fn accent(step: u8) -> f32 {
    match step {
        0 => 1.0,
        2 => 0.7,
        _ => 0.4,
    }
}

fn decay_frame(value: f32) -> f32 {
    let next = value * FRAME_DECAY;
    if next < SILENCE_FLOOR {
        0.0
    } else {
        next
    }
}

/// Owned beat state machine, advanced one frame at a time
#[derive(Debug, Clone)]
pub struct BeatSimulator {
    playing: bool,
    track: Option<Track>,
    tempo: Option<u32>,
    period: Duration,
    clock: Duration,
    next_beat_at: Duration,
    release_at: Option<Duration>,
    step: u8,
    beat_count: u64,
    intensity: f32,
    beating: bool,
}

impl Default for BeatSimulator {
    fn default() -> Self {
        Self::new()
    }
}

impl BeatSimulator {
    pub fn new() -> Self {
        Self {
            playing: false,
            track: None,
            tempo: None,
            period: beat_period(DEFAULT_TEMPO),
            clock: Duration::ZERO,
            next_beat_at: Duration::ZERO,
            release_at: None,
            step: 0,
            beat_count: 0,
            intensity: 0.0,
            beating: false,
        }
    }

    /// Feed the current playback inputs.
    ///
    /// Any change restarts the bar. Stopping (or losing the track) zeroes the
    /// intensity immediately.
    pub fn set_input(&mut self, is_playing: bool, track: Option<&Track>) {
        if self.playing == is_playing && self.track.as_ref() == track {
            return;
        }

        self.playing = is_playing;
        self.track = track.cloned();
        self.clock = Duration::ZERO;
        self.release_at = None;
        self.step = 0;
        self.beating = false;

        if is_playing && track.is_some() {
            let bpm = estimate_tempo(track);
            self.tempo = Some(bpm);
            self.period = beat_period(bpm);
            self.next_beat_at = self.period;
            tracing::debug!("Beat simulator running at {} BPM", bpm);
        } else {
            self.tempo = None;
            self.intensity = 0.0;
        }
    }

    /// Advance by one rendered frame that took `elapsed`
    pub fn tick(&mut self, elapsed: Duration) {
        if self.tempo.is_none() {
            self.intensity = 0.0;
            self.beating = false;
            return;
        }

        self.intensity = decay_frame(self.intensity);
        self.clock += elapsed;

        // Timed events are applied in chronological order
        loop {
            let release_due = self.release_at.filter(|at| *at <= self.clock);
            let beat_due = (self.next_beat_at <= self.clock).then_some(self.next_beat_at);

            match (release_due, beat_due) {
                (Some(release), Some(beat)) if release <= beat => self.release(),
                (_, Some(_)) => self.emit(),
                (Some(_), None) => self.release(),
                (None, None) => break,
            }
        }
    }

    fn emit(&mut self) {
        let at = self.next_beat_at;
        self.step = (self.step + 1) % BEATS_PER_BAR;
        self.beat_count += 1;
        self.intensity = accent(self.step).clamp(0.0, 1.0);
        self.beating = true;
        self.release_at = Some(at + RELEASE_DELAY);
        self.next_beat_at = at + self.period;
    }

    // Reads the intensity at release time, after any frame decay since the accent.
    fn release(&mut self) {
        self.release_at = None;
        self.beating = false;
        self.intensity = (self.intensity * RELEASE_FACTOR).clamp(0.0, 1.0);
    }

    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    pub fn is_beating(&self) -> bool {
        self.beating
    }

    pub fn tempo(&self) -> Option<u32> {
        self.tempo
    }

    /// Current position in the bar (0 is the downbeat)
    pub fn step(&self) -> u8 {
        self.step
    }

    pub fn beat_count(&self) -> u64 {
        self.beat_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: Duration = Duration::from_millis(10);

    fn track(name: &str, artist: &str, duration_ms: u64) -> Track {
        Track::new(name, &[artist], duration_ms)
    }

    #[test]
    fn test_rock_and_metal_win_regardless_of_duration() {
        for duration in [0, 60_000, 180_000, 400_000] {
            assert_eq!(estimate_tempo(Some(&track("Rock Lobster", "B-52s", duration))), 140);
            assert_eq!(estimate_tempo(Some(&track("Song", "HEAVY METAL band", duration))), 140);
        }
    }

    #[test]
    fn test_first_bucket_wins() {
        assert_eq!(estimate_tempo(Some(&track("Slow Rock Ballad", "x", 200_000))), 140);
        assert_eq!(estimate_tempo(Some(&track("Dance Ballad", "x", 200_000))), 128);
        assert_eq!(estimate_tempo(Some(&track("Night", "Jazz Trio", 200_000))), 100);
        assert_eq!(estimate_tempo(Some(&track("Slow Down", "x", 200_000))), 80);
        assert_eq!(estimate_tempo(Some(&track("Hip-Hop Hooray", "x", 200_000))), 95);
        assert_eq!(estimate_tempo(Some(&track("EDM Anthem", "x", 200_000))), 130);
    }

    #[test]
    fn test_duration_fallback() {
        assert_eq!(estimate_tempo(Some(&track("Untitled", "Nobody", 100_000))), 140);
        assert_eq!(estimate_tempo(Some(&track("Untitled", "Nobody", 300_000))), 100);
        assert_eq!(estimate_tempo(Some(&track("Untitled", "Nobody", 200_000))), 120);
        assert_eq!(estimate_tempo(Some(&track("Untitled", "Nobody", 0))), 120);
        assert_eq!(estimate_tempo(None), DEFAULT_TEMPO);
    }

    #[test]
    fn test_idle_simulator_stays_silent() {
        let mut sim = BeatSimulator::new();
        sim.tick(Duration::from_secs(2));
        assert_eq!(sim.intensity(), 0.0);

        // Playing without a track is not enough
        sim.set_input(true, None);
        sim.tick(Duration::from_secs(2));
        assert_eq!(sim.intensity(), 0.0);
        assert_eq!(sim.beat_count(), 0);
    }

    #[test]
    fn test_accent_pattern_over_one_bar() {
        // 120 BPM -> one beat every 500ms
        let t = track("Untitled", "Nobody", 200_000);
        let mut sim = BeatSimulator::new();
        sim.set_input(true, Some(&t));
        assert_eq!(sim.tempo(), Some(120));

        let mut accents = Vec::new();
        let mut last_count = 0;
        for _ in 0..200 {
            sim.tick(FRAME);
            if sim.beat_count() != last_count {
                last_count = sim.beat_count();
                accents.push(sim.intensity());
            }
        }

        assert_eq!(accents, vec![0.4, 0.7, 0.4, 1.0]);
        assert_eq!(sim.step(), 0);
    }

    #[test]
    fn test_release_reads_value_at_fire_time() {
        let t = track("Untitled", "Nobody", 200_000);
        let mut sim = BeatSimulator::new();
        sim.set_input(true, Some(&t));

        sim.tick(Duration::from_millis(500));
        assert!(sim.is_beating());
        assert_eq!(sim.intensity(), 0.4);

        // Nine frames of decay then the release on the tenth
        for _ in 0..9 {
            sim.tick(FRAME);
        }
        assert!(sim.is_beating());
        let before_release = sim.intensity();
        sim.tick(FRAME);
        assert!(!sim.is_beating());
        let expected = before_release * FRAME_DECAY * RELEASE_FACTOR;
        assert!((sim.intensity() - expected).abs() < 1e-6);
    }

    #[test]
    fn test_intensity_bounded_and_non_increasing_between_beats() {
        let t = track("Pop Song", "Someone", 200_000);
        let mut sim = BeatSimulator::new();
        sim.set_input(true, Some(&t));

        let mut previous = sim.intensity();
        let mut last_count = sim.beat_count();
        for _ in 0..1_000 {
            sim.tick(Duration::from_millis(16));
            let value = sim.intensity();
            assert!((0.0..=1.0).contains(&value));
            if sim.beat_count() == last_count {
                assert!(value <= previous);
            }
            last_count = sim.beat_count();
            previous = value;
        }
    }

    #[test]
    fn test_stop_zeroes_immediately() {
        let t = track("Untitled", "Nobody", 200_000);
        let mut sim = BeatSimulator::new();
        sim.set_input(true, Some(&t));
        sim.tick(Duration::from_millis(500));
        assert!(sim.intensity() > 0.0);

        sim.set_input(false, Some(&t));
        assert_eq!(sim.intensity(), 0.0);
        sim.tick(FRAME);
        assert_eq!(sim.intensity(), 0.0);
        assert_eq!(sim.tempo(), None);
    }

    #[test]
    fn test_same_input_keeps_timers_and_track_change_restarts() {
        let t = track("Untitled", "Nobody", 200_000);
        let mut sim = BeatSimulator::new();
        sim.set_input(true, Some(&t));
        sim.tick(Duration::from_millis(400));

        // Re-sending identical input must not restart the bar
        sim.set_input(true, Some(&t));
        sim.tick(Duration::from_millis(100));
        assert_eq!(sim.beat_count(), 1);

        let next = track("Metal Song", "Band", 200_000);
        sim.set_input(true, Some(&next));
        assert_eq!(sim.tempo(), Some(140));
        sim.tick(Duration::from_millis(400));
        assert_eq!(sim.beat_count(), 1);
        sim.tick(Duration::from_millis(30));
        assert_eq!(sim.beat_count(), 2);
    }

    #[test]
    fn test_silence_floor_snaps_to_zero() {
        assert_eq!(decay_frame(0.0105), 0.0);
        assert!(decay_frame(0.5) > 0.0);
    }
}
