/// Offline player that cycles through a fixed set of demo tracks
use super::sdk::{Emitter, PlaybackSdk, PlayerOptions, SdkError, SdkEvent, SdkEventKind, SdkPlayer};
use crate::models::{PlayerStatePayload, Track};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

pub const DEMO_SOURCE: &str = "demo://mixtape-player";

/// Time before the demo moves on to the next track while playing
pub const DEMO_ADVANCE_PERIOD: Duration = Duration::from_secs(10);

pub fn demo_tracks() -> Vec<Track> {
    vec![
        Track::new("Demo Track - Retro Vibes", &["Mixtape Player Demo"], 200_000),
        Track::new("Synthwave Dreams", &["80s Nostalgia"], 215_000),
        Track::new("Tape Deck Memories", &["Vintage Sounds"], 140_000),
        Track::new("Analog Love", &["Retro Revival"], 260_000),
    ]
}

#[derive(Debug, Clone)]
pub struct DemoSdk {
    tracks: Vec<Track>,
    advance_period: Duration,
}

impl Default for DemoSdk {
    fn default() -> Self {
        Self::new()
    }
}

impl DemoSdk {
    pub fn new() -> Self {
        Self {
            tracks: demo_tracks(),
            advance_period: DEMO_ADVANCE_PERIOD,
        }
    }

    pub fn with_advance_period(mut self, period: Duration) -> Self {
        self.advance_period = period;
        self
    }
}

#[async_trait]
impl PlaybackSdk for DemoSdk {
    fn source(&self) -> &str {
        DEMO_SOURCE
    }

    async fn load(&self) -> Result<(), SdkError> {
        tracing::info!("Demo mode: no streaming engine to load");
        Ok(())
    }

    fn create_player(
        &self,
        options: PlayerOptions,
        emitter: Emitter,
    ) -> Result<Box<dyn SdkPlayer>, SdkError> {
        if self.tracks.is_empty() {
            return Err(SdkError::Unavailable("demo has no tracks".to_string()));
        }
        tracing::debug!("Creating demo player \"{}\"", options.name);
        Ok(Box::new(DemoPlayer {
            emitter,
            deck: Arc::new(Mutex::new(DemoDeck {
                tracks: self.tracks.clone(),
                index: 0,
                playing: false,
            })),
            advance_period: self.advance_period,
            task: None,
        }))
    }
}

struct DemoDeck {
    tracks: Vec<Track>,
    index: usize,
    playing: bool,
}

impl DemoDeck {
    fn payload(&self) -> PlayerStatePayload {
        PlayerStatePayload::new(self.tracks[self.index].clone(), !self.playing)
    }

    fn step(&mut self, forward: bool) {
        let len = self.tracks.len();
        self.index = if forward {
            (self.index + 1) % len
        } else {
            (self.index + len - 1) % len
        };
    }
}

struct DemoPlayer {
    emitter: Emitter,
    deck: Arc<Mutex<DemoDeck>>,
    advance_period: Duration,
    task: Option<JoinHandle<()>>,
}

impl DemoPlayer {
    fn update<F>(&self, change: F) -> Result<(), SdkError>
    where
        F: FnOnce(&mut DemoDeck),
    {
        let payload = {
            let mut deck = self
                .deck
                .lock()
                .map_err(|_| SdkError::Operation("demo deck poisoned".to_string()))?;
            change(&mut deck);
            deck.payload()
        };
        self.emitter.emit(SdkEvent::PlayerStateChanged(Some(payload)));
        Ok(())
    }
}

#[async_trait]
impl SdkPlayer for DemoPlayer {
    fn add_listener(&mut self, kind: SdkEventKind) -> bool {
        self.emitter.listen(kind)
    }

    async fn connect(&mut self) -> Result<bool, SdkError> {
        let device_id = format!("demo-{}", uuid::Uuid::new_v4());
        self.emitter.emit(SdkEvent::Ready { device_id });
        self.update(|_| {})?;

        let deck = self.deck.clone();
        let emitter = self.emitter.clone();
        let period = self.advance_period;
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                ticker.tick().await;
                let payload = match deck.lock() {
                    Ok(mut deck) if deck.playing => {
                        deck.step(true);
                        deck.payload()
                    }
                    Ok(_) => continue,
                    Err(_) => break,
                };
                tracing::debug!("Demo auto-advance to {}", payload.track_window.current_track.name);
                emitter.emit(SdkEvent::PlayerStateChanged(Some(payload)));
            }
        });
        self.task = Some(task);
        Ok(true)
    }

    async fn toggle_play(&self) -> Result<(), SdkError> {
        self.update(|deck| deck.playing = !deck.playing)
    }

    async fn next_track(&self) -> Result<(), SdkError> {
        self.update(|deck| deck.step(true))
    }

    async fn previous_track(&self) -> Result<(), SdkError> {
        self.update(|deck| deck.step(false))
    }

    async fn disconnect(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for DemoPlayer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::sdk::{EventReceiver, TokenProvider};
    use tokio::sync::mpsc;

    fn options() -> PlayerOptions {
        let token_provider: TokenProvider = Arc::new(|| None);
        PlayerOptions {
            name: "Test Deck".to_string(),
            volume: 0.5,
            token_provider,
        }
    }

    fn player(sdk: &DemoSdk) -> (Box<dyn SdkPlayer>, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut player = sdk.create_player(options(), Emitter::new(1, tx)).unwrap();
        for kind in SdkEventKind::ALL {
            player.add_listener(kind);
        }
        (player, rx)
    }

    fn current(event: SdkEvent) -> (String, bool) {
        match event {
            SdkEvent::PlayerStateChanged(Some(payload)) => {
                (payload.track_window.current_track.name, payload.paused)
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connect_reports_ready_then_paused_first_track() {
        let (mut player, mut rx) = player(&DemoSdk::new());
        assert!(player.connect().await.unwrap());

        match rx.recv().await.unwrap().event {
            SdkEvent::Ready { device_id } => assert!(device_id.starts_with("demo-")),
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(
            current(rx.recv().await.unwrap().event),
            ("Demo Track - Retro Vibes".to_string(), true)
        );
        player.disconnect().await;
    }

    #[tokio::test]
    async fn test_controls_wrap_around() {
        let (mut player, mut rx) = player(&DemoSdk::new());
        player.connect().await.unwrap();
        rx.recv().await.unwrap();
        rx.recv().await.unwrap();

        player.previous_track().await.unwrap();
        assert_eq!(current(rx.recv().await.unwrap().event).0, "Analog Love");
        player.next_track().await.unwrap();
        assert_eq!(
            current(rx.recv().await.unwrap().event).0,
            "Demo Track - Retro Vibes"
        );
        player.toggle_play().await.unwrap();
        assert!(!current(rx.recv().await.unwrap().event).1);
        player.disconnect().await;
    }

    #[tokio::test]
    async fn test_auto_advance_only_while_playing() {
        let sdk = DemoSdk::new().with_advance_period(Duration::from_millis(20));
        let (mut player, mut rx) = player(&sdk);
        player.connect().await.unwrap();
        rx.recv().await.unwrap();
        rx.recv().await.unwrap();

        tokio::time::sleep(Duration::from_millis(70)).await;
        assert!(rx.try_recv().is_err());

        player.toggle_play().await.unwrap();
        rx.recv().await.unwrap();
        let advanced = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(current(advanced.event).0, "Synthwave Dreams");
        player.disconnect().await;
    }
}
