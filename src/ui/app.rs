/// Interactive deck loop: terminal input, player events and frame ticks
use super::pages::DeckPage;
use super::theme::Theme;
use super::{DeckView, ReelClock};
use crate::auth::{AuthError, CallbackListener, CallbackOutcome};
use crate::beat::BeatSimulator;
use crate::playback::{PlayAction, PlaybackController};
use crossterm::event::{Event, EventStream, KeyCode, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use ratatui::backend::Backend;
use ratatui::Terminal;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

type LoginTask = JoinHandle<Result<CallbackOutcome, AuthError>>;

/// What a key press asks the loop to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeckAction {
    PlayPause,
    Next,
    Previous,
    Login,
    Logout,
    Quit,
}

impl DeckAction {
    pub fn from_key(code: KeyCode, modifiers: KeyModifiers) -> Option<Self> {
        match code {
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => Some(Self::Quit),
            KeyCode::Char(' ') => Some(Self::PlayPause),
            KeyCode::Char('n') | KeyCode::Right => Some(Self::Next),
            KeyCode::Char('p') | KeyCode::Left => Some(Self::Previous),
            KeyCode::Char('l') => Some(Self::Login),
            KeyCode::Char('o') => Some(Self::Logout),
            KeyCode::Char('q') | KeyCode::Esc => Some(Self::Quit),
            _ => None,
        }
    }
}

pub struct DeckApp {
    controller: PlaybackController,
    beat: BeatSimulator,
    reels: ReelClock,
    theme: Theme,
    frame: Duration,
    demo: bool,
    notice: Option<String>,
    exit: bool,
}

impl DeckApp {
    pub fn new(controller: PlaybackController, theme: Theme, frame_rate: u32) -> Self {
        Self {
            controller,
            beat: BeatSimulator::new(),
            reels: ReelClock::default(),
            theme,
            frame: Duration::from_secs_f64(1.0 / frame_rate.clamp(1, 120) as f64),
            demo: false,
            notice: None,
            exit: false,
        }
    }

    pub fn demo(mut self, demo: bool) -> Self {
        self.demo = demo;
        self
    }

    pub fn controller(&self) -> &PlaybackController {
        &self.controller
    }

    pub fn view(&self) -> DeckView {
        DeckView {
            demo: self.demo,
            notice: self.notice.clone(),
            ..DeckView::capture(&self.controller, &self.beat, &self.reels)
        }
    }

    /// Advance animation state by one frame
    pub fn advance(&mut self, elapsed: Duration) {
        let playback = self.controller.playback();
        self.beat
            .set_input(playback.is_playing, playback.current_track.as_ref());
        self.beat.tick(elapsed);
        self.reels.advance(elapsed, playback.is_playing);
    }

    /// Run until the user quits
    pub async fn run<B: Backend>(mut self, terminal: &mut Terminal<B>) -> anyhow::Result<()> {
        let mut player_events = self
            .controller
            .take_event_receiver()
            .ok_or_else(|| anyhow::anyhow!("player event receiver already taken"))?;
        let mut input = EventStream::new();
        let mut ticker = tokio::time::interval(self.frame);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut last_frame = Instant::now();
        let mut login: Option<LoginTask> = None;

        tracing::info!("Deck started");
        while !self.exit {
            tokio::select! {
                _ = ticker.tick() => {
                    let now = Instant::now();
                    self.advance(now - last_frame);
                    last_frame = now;
                    let view = self.view();
                    let theme = &self.theme;
                    terminal.draw(|f| {
                        let area = f.size();
                        DeckPage { view: &view, theme }.render(f, area)
                    })?;
                }
                Some(event) = player_events.recv() => {
                    self.controller.handle_event(event).await;
                }
                maybe_input = input.next() => match maybe_input {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        if let Some(action) = DeckAction::from_key(key.code, key.modifiers) {
                            self.apply(action, &mut login).await;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                    None => break,
                },
                joined = wait_login(&mut login) => {
                    login = None;
                    let outcome = match joined {
                        Ok(Ok(outcome)) => outcome,
                        Ok(Err(e)) => {
                            tracing::warn!("OAuth callback failed: {}", e);
                            CallbackOutcome::Missing
                        }
                        Err(e) => {
                            tracing::warn!("OAuth callback task ended: {}", e);
                            CallbackOutcome::Missing
                        }
                    };
                    self.notice = None;
                    self.controller.complete_login(outcome).await;
                }
            }
        }

        if let Some(task) = login {
            task.abort();
        }
        tracing::info!("Deck closed");
        Ok(())
    }

    async fn apply(&mut self, action: DeckAction, login: &mut Option<LoginTask>) {
        self.controller.clear_error();
        match action {
            DeckAction::PlayPause => {
                if self.controller.play_or_resume().await == PlayAction::NeedsLogin {
                    self.start_login(login);
                }
            }
            DeckAction::Next => self.controller.skip_next().await,
            DeckAction::Previous => self.controller.skip_previous().await,
            DeckAction::Login => {
                if !self.controller.is_authenticated() {
                    self.start_login(login);
                }
            }
            DeckAction::Logout => {
                if let Some(task) = login.take() {
                    task.abort();
                }
                self.notice = None;
                self.controller.disconnect().await;
            }
            DeckAction::Quit => self.exit = true,
        }
    }

    fn start_login(&mut self, login: &mut Option<LoginTask>) {
        if self.demo || login.is_some() {
            return;
        }
        let Some(url) = self.controller.begin_login() else {
            return;
        };

        tracing::info!("Open this URL to log in: {}", url);
        self.notice = Some(format!("Open this URL in a browser to log in: {}", url));
        let redirect_uri = self.controller.spotify_config().redirect_uri.clone();
        *login = Some(tokio::spawn(async move {
            CallbackListener::bind(&redirect_uri).await?.wait().await
        }));
    }
}

async fn wait_login(
    login: &mut Option<LoginTask>,
) -> Result<Result<CallbackOutcome, AuthError>, tokio::task::JoinError> {
    match login.as_mut() {
        Some(task) => task.await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthClient;
    use crate::config::SpotifyConfig;
    use crate::playback::{ConnectionState, DemoSdk};
    use crate::store::TokenStore;
    use std::sync::Arc;

    fn demo_app() -> DeckApp {
        let controller = PlaybackController::new(
            Arc::new(DemoSdk::new()),
            AuthClient::new(SpotifyConfig::default()),
            TokenStore::in_memory(),
        );
        DeckApp::new(controller, Theme::vintage(), 30).demo(true)
    }

    #[test]
    fn test_key_bindings() {
        let none = KeyModifiers::NONE;
        assert_eq!(DeckAction::from_key(KeyCode::Char(' '), none), Some(DeckAction::PlayPause));
        assert_eq!(DeckAction::from_key(KeyCode::Char('n'), none), Some(DeckAction::Next));
        assert_eq!(DeckAction::from_key(KeyCode::Char('p'), none), Some(DeckAction::Previous));
        assert_eq!(DeckAction::from_key(KeyCode::Char('l'), none), Some(DeckAction::Login));
        assert_eq!(DeckAction::from_key(KeyCode::Char('o'), none), Some(DeckAction::Logout));
        assert_eq!(DeckAction::from_key(KeyCode::Char('q'), none), Some(DeckAction::Quit));
        assert_eq!(
            DeckAction::from_key(KeyCode::Char('c'), KeyModifiers::CONTROL),
            Some(DeckAction::Quit)
        );
        assert_eq!(DeckAction::from_key(KeyCode::Char('x'), none), None);
    }

    #[tokio::test]
    async fn test_demo_deck_plays_and_beats() {
        let mut app = demo_app();
        let mut login = None;
        app.controller.connect("demo").await;
        app.controller.process_pending_events().await;
        assert_eq!(app.controller().state(), ConnectionState::Paused);

        // No playlist configured, so play toggles the demo player
        app.apply(DeckAction::PlayPause, &mut login).await;
        app.controller.process_pending_events().await;
        assert_eq!(app.controller().state(), ConnectionState::Playing);
        assert!(login.is_none());

        for _ in 0..60 {
            app.advance(Duration::from_millis(33));
        }
        let view = app.view();
        assert!(view.demo);
        assert!(view.is_playing);
        assert_eq!(view.tempo, Some(120));
        assert!(app.beat.beat_count() > 0);
        assert!(view.reel_angle > 0.0);

        app.apply(DeckAction::Next, &mut login).await;
        app.controller.process_pending_events().await;
        assert_eq!(app.view().track.title, "Synthwave Dreams");

        app.apply(DeckAction::Logout, &mut login).await;
        assert_eq!(app.controller().state(), ConnectionState::Unauthenticated);
        app.advance(Duration::from_millis(33));
        assert_eq!(app.view().intensity, 0.0);

        app.apply(DeckAction::Quit, &mut login).await;
        assert!(app.exit);
    }
}
