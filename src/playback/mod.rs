/// Playback integration: binds the vendor player to the deck state
pub mod demo;
pub mod sdk;
pub mod web_api;

use crate::auth::{AuthClient, AuthError, CallbackOutcome};
use crate::config::SpotifyConfig;
use crate::models::{PlaybackState, PlayerStatePayload, TrackInfo};
use crate::store::TokenStore;
use serde_json::json;
use std::fmt;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tokio::sync::mpsc;
use url::Url;

pub use demo::DemoSdk;
pub use sdk::{
    Emitter, EventReceiver, PlaybackSdk, PlayerEvent, PlayerOptions, SdkError, SdkEvent,
    SdkEventKind, SdkLoader, SdkPlayer, TokenProvider,
};
pub use web_api::WebApiSdk;

/// Connection lifecycle of the deck
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unauthenticated,
    Authenticating,
    Connecting,
    Ready,
    Playing,
    Paused,
    Error,
}

impl ConnectionState {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Unauthenticated => "Not connected",
            ConnectionState::Authenticating => "Authenticating...",
            ConnectionState::Connecting => "Connecting...",
            ConnectionState::Ready => "Ready",
            ConnectionState::Playing => "Playing",
            ConnectionState::Paused => "Paused",
            ConnectionState::Error => "Error",
        }
    }
}

/// Player operations that can fail without breaking the deck
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOp {
    Connect,
    TogglePlayback,
    SkipNext,
    SkipPrevious,
    PlayContext,
}

impl fmt::Display for ControlOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControlOp::Connect => "connect",
            ControlOp::TogglePlayback => "toggle playback",
            ControlOp::SkipNext => "skip next",
            ControlOp::SkipPrevious => "skip previous",
            ControlOp::PlayContext => "play context",
        };
        f.write_str(name)
    }
}

/// Everything that can go wrong during a session.
///
/// None of these escape the controller; each one becomes the message slot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("authentication cancelled: {0}")]
    AuthCancelled(String),
    #[error("token exchange failed: {0}")]
    ExchangeFailed(String),
    #[error("player authentication error: {0}")]
    SdkAuthError(String),
    #[error("player account error: {0}")]
    SdkAccountError(String),
    #[error("player playback error: {0}")]
    SdkPlaybackError(String),
    #[error("{op} failed: {reason}")]
    ControlOpFailed { op: ControlOp, reason: String },
}

impl PlaybackError {
    /// Text shown in the deck's message slot
    pub fn user_message(&self) -> String {
        match self {
            PlaybackError::AuthCancelled(_) => "Spotify authentication was cancelled".to_string(),
            PlaybackError::ExchangeFailed(_) => "Authentication failed".to_string(),
            PlaybackError::SdkAuthError(_) => {
                "Authentication failed. Please login again.".to_string()
            }
            PlaybackError::SdkAccountError(_) => {
                "Account error. Please check your Spotify account.".to_string()
            }
            PlaybackError::SdkPlaybackError(message) => format!("Playback error: {}", message),
            PlaybackError::ControlOpFailed { op, .. } => match op {
                ControlOp::Connect => "Failed to initialize Spotify player".to_string(),
                ControlOp::TogglePlayback => "Failed to toggle playback".to_string(),
                ControlOp::SkipNext => "Failed to skip to next track".to_string(),
                ControlOp::SkipPrevious => "Failed to skip to previous track".to_string(),
                ControlOp::PlayContext => "Failed to play playlist".to_string(),
            },
        }
    }
}

impl From<AuthError> for PlaybackError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Cancelled(reason) => PlaybackError::AuthCancelled(reason),
            other => PlaybackError::ExchangeFailed(other.to_string()),
        }
    }
}

/// What `play_or_resume` ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayAction {
    NeedsLogin,
    StartedContext,
    Toggled,
}

/// Context URI for a playlist id; full URIs pass through
pub fn context_uri(context_id: &str) -> String {
    if context_id.starts_with("spotify:") {
        context_id.to_string()
    } else {
        format!("spotify:playlist:{}", context_id)
    }
}

/// Owns the bound player and every piece of state derived from its callbacks
pub struct PlaybackController {
    sdk: Arc<dyn PlaybackSdk>,
    loader: SdkLoader,
    auth: AuthClient,
    tokens: TokenStore,
    http: reqwest::Client,
    state: ConnectionState,
    player: Option<Box<dyn SdkPlayer>>,
    session: u64,
    device_id: Option<String>,
    playback: PlaybackState,
    error: Option<String>,
    current_token: Arc<RwLock<Option<String>>>,
    events_tx: mpsc::UnboundedSender<PlayerEvent>,
    events_rx: Option<EventReceiver>,
}

impl PlaybackController {
    pub fn new(sdk: Arc<dyn PlaybackSdk>, auth: AuthClient, tokens: TokenStore) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            sdk,
            loader: SdkLoader::new(),
            auth,
            tokens,
            http: reqwest::Client::new(),
            state: ConnectionState::Unauthenticated,
            player: None,
            session: 0,
            device_id: None,
            playback: PlaybackState::default(),
            error: None,
            current_token: Arc::new(RwLock::new(None)),
            events_tx,
            events_rx: Some(events_rx),
        }
    }

    /// Take the event receiver so a UI loop can await events directly.
    ///
    /// After this, `process_pending_events` no longer sees anything.
    pub fn take_event_receiver(&mut self) -> Option<EventReceiver> {
        self.events_rx.take()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn playback(&self) -> &PlaybackState {
        &self.playback
    }

    pub fn track_info(&self) -> TrackInfo {
        TrackInfo::for_track(self.playback.current_track.as_ref())
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    pub fn has_player(&self) -> bool {
        self.player.is_some()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current_token
            .read()
            .map(|t| t.is_some())
            .unwrap_or(false)
    }

    pub fn spotify_config(&self) -> &SpotifyConfig {
        self.auth.config()
    }

    fn set_token(&self, token: Option<String>) {
        match self.current_token.write() {
            Ok(mut guard) => *guard = token,
            Err(_) => tracing::error!("Token slot poisoned; keeping previous token"),
        }
    }

    fn token(&self) -> Option<String> {
        self.current_token.read().ok().and_then(|t| t.clone())
    }

    fn report(&mut self, err: PlaybackError) {
        tracing::warn!("{}", err);
        self.error = Some(err.user_message());
    }

    fn fail(&mut self, err: PlaybackError) {
        self.report(err);
        self.state = ConnectionState::Error;
    }

    /// Start the login flow; returns the URL the user must open
    pub fn begin_login(&mut self) -> Option<Url> {
        self.error = None;
        match self.auth.authorize_url() {
            Ok(url) => {
                self.state = ConnectionState::Authenticating;
                tracing::info!("Waiting for Spotify authorization");
                Some(url)
            }
            Err(e) => {
                self.report(e.into());
                None
            }
        }
    }

    /// Finish the login flow with the redirect outcome. Returns true when connected.
    pub async fn complete_login(&mut self, outcome: CallbackOutcome) -> bool {
        let code = match outcome.into_code() {
            Ok(code) => code,
            Err(e) => {
                self.report(e.into());
                self.state = ConnectionState::Unauthenticated;
                return false;
            }
        };

        let tokens = match self.auth.exchange_code(&code).await {
            Ok(tokens) => tokens,
            Err(e) => {
                self.report(e.into());
                self.state = ConnectionState::Unauthenticated;
                return false;
            }
        };

        if let Err(e) = self.tokens.save(&tokens) {
            tracing::warn!("Failed to persist tokens: {}", e);
        }
        self.connect(&tokens.access_token).await;
        self.player.is_some()
    }

    /// Connect with stored tokens when both are present
    pub async fn restore_session(&mut self) -> bool {
        match self.tokens.load() {
            Ok(Some(tokens)) => {
                tracing::info!("Restoring session from stored tokens");
                self.connect(&tokens.access_token).await;
                self.player.is_some()
            }
            Ok(None) => {
                tracing::info!("No stored session found");
                false
            }
            Err(e) => {
                tracing::warn!("Failed to read stored tokens: {}", e);
                false
            }
        }
    }

    /// Swap the access token for a fresh one using the stored refresh token
    pub async fn refresh_session(&mut self) -> Result<(), PlaybackError> {
        let stored = self
            .tokens
            .load()
            .map_err(|e| PlaybackError::ExchangeFailed(e.to_string()))?
            .ok_or_else(|| PlaybackError::ExchangeFailed("no stored tokens".to_string()))?;

        let tokens = self.auth.refresh(&stored.refresh_token).await?;
        self.tokens
            .save(&tokens)
            .map_err(|e| PlaybackError::ExchangeFailed(e.to_string()))?;
        self.set_token(Some(tokens.access_token));
        tracing::info!("Access token refreshed");
        Ok(())
    }

    /// Load the engine once, create a listening player and connect it
    pub async fn connect(&mut self, token: &str) {
        if let Some(mut previous) = self.player.take() {
            tracing::debug!("Replacing existing player");
            previous.disconnect().await;
        }

        self.set_token(Some(token.to_string()));
        self.state = ConnectionState::Connecting;
        self.device_id = None;

        if let Err(e) = self.loader.ensure_loaded(self.sdk.as_ref()).await {
            self.fail(PlaybackError::ControlOpFailed {
                op: ControlOp::Connect,
                reason: e.to_string(),
            });
            return;
        }

        let token_slot = self.current_token.clone();
        let token_provider: TokenProvider =
            Arc::new(move || token_slot.read().ok().and_then(|t| t.clone()));
        let config = self.auth.config();
        let options = PlayerOptions {
            name: config.player_name.clone(),
            volume: config.volume,
            token_provider,
        };

        self.session += 1;
        let emitter = Emitter::new(self.session, self.events_tx.clone());
        let mut player = match self.sdk.create_player(options, emitter) {
            Ok(player) => player,
            Err(e) => {
                self.fail(PlaybackError::ControlOpFailed {
                    op: ControlOp::Connect,
                    reason: e.to_string(),
                });
                return;
            }
        };

        for kind in SdkEventKind::ALL {
            player.add_listener(kind);
        }

        match player.connect().await {
            Ok(true) => tracing::info!("Successfully connected to Spotify"),
            Ok(false) => tracing::warn!("Player declined to connect"),
            Err(e) => {
                player.disconnect().await;
                self.fail(PlaybackError::ControlOpFailed {
                    op: ControlOp::Connect,
                    reason: e.to_string(),
                });
                return;
            }
        }

        self.player = Some(player);
    }

    /// Apply every event already queued on the internal receiver
    pub async fn process_pending_events(&mut self) -> usize {
        let mut pending = Vec::new();
        if let Some(rx) = self.events_rx.as_mut() {
            while let Ok(event) = rx.try_recv() {
                pending.push(event);
            }
        }

        let count = pending.len();
        for event in pending {
            self.handle_event(event).await;
        }
        count
    }

    /// Apply one player event
    pub async fn handle_event(&mut self, event: PlayerEvent) {
        if self.player.is_none() || event.session != self.session {
            tracing::debug!(
                "Ignoring stale {} event from session {}",
                event.event.kind().name(),
                event.session
            );
            return;
        }

        match event.event {
            SdkEvent::Ready { device_id } => {
                tracing::info!("Player is ready with device id {}", device_id);
                self.device_id = Some(device_id);
                self.state = ConnectionState::Ready;
            }
            SdkEvent::PlayerStateChanged(Some(payload)) => self.apply_state(payload),
            SdkEvent::PlayerStateChanged(None) => {
                tracing::debug!("Player reported no active session; keeping current state");
            }
            SdkEvent::AuthenticationError { message } => {
                tracing::error!("Authentication error: {}", message);
                self.fail(PlaybackError::SdkAuthError(message));
                self.teardown().await;
            }
            SdkEvent::AccountError { message } => {
                tracing::error!("Account error: {}", message);
                self.fail(PlaybackError::SdkAccountError(message));
            }
            SdkEvent::PlaybackError { message } => {
                tracing::error!("Playback error: {}", message);
                self.fail(PlaybackError::SdkPlaybackError(message));
            }
        }
    }

    fn apply_state(&mut self, payload: PlayerStatePayload) {
        let is_playing = !payload.paused;
        tracing::debug!(
            "Player state changed: {} ({})",
            payload.track_window.current_track.name,
            if is_playing { "playing" } else { "paused" }
        );
        self.playback = PlaybackState {
            is_playing,
            current_track: Some(payload.track_window.current_track),
        };
        self.state = if is_playing {
            ConnectionState::Playing
        } else {
            ConnectionState::Paused
        };
    }

    pub async fn toggle_playback(&mut self) {
        let Some(player) = self.player.as_ref() else {
            return;
        };
        let result = player.toggle_play().await;
        if let Err(e) = result {
            self.report(PlaybackError::ControlOpFailed {
                op: ControlOp::TogglePlayback,
                reason: e.to_string(),
            });
        }
    }

    pub async fn skip_next(&mut self) {
        let Some(player) = self.player.as_ref() else {
            return;
        };
        let result = player.next_track().await;
        if let Err(e) = result {
            self.report(PlaybackError::ControlOpFailed {
                op: ControlOp::SkipNext,
                reason: e.to_string(),
            });
        }
    }

    pub async fn skip_previous(&mut self) {
        let Some(player) = self.player.as_ref() else {
            return;
        };
        let result = player.previous_track().await;
        if let Err(e) = result {
            self.report(PlaybackError::ControlOpFailed {
                op: ControlOp::SkipPrevious,
                reason: e.to_string(),
            });
        }
    }

    /// Start a context (playlist) on this player's device. Single attempt.
    pub async fn play_context(&mut self, context_id: &str) {
        if self.player.is_none() {
            return;
        }

        match self.send_play_context(context_id).await {
            Ok(()) => tracing::info!("Started context {}", context_uri(context_id)),
            Err(reason) => self.report(PlaybackError::ControlOpFailed {
                op: ControlOp::PlayContext,
                reason,
            }),
        }
    }

    async fn send_play_context(&self, context_id: &str) -> Result<(), String> {
        let device_id = self
            .device_id
            .as_deref()
            .ok_or_else(|| "player has no device yet".to_string())?;
        let token = self
            .token()
            .ok_or_else(|| "no access token".to_string())?;

        let url = format!("{}/me/player/play", self.auth.endpoints().api_base);
        let response = self
            .http
            .put(url)
            .query(&[("device_id", device_id)])
            .bearer_auth(token)
            .json(&json!({ "context_uri": context_uri(context_id) }))
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(format!("HTTP status {}", response.status()))
        }
    }

    /// Play button semantics: start the configured playlist when nothing is
    /// loaded, otherwise toggle
    pub async fn play_or_resume(&mut self) -> PlayAction {
        if !self.is_authenticated() {
            return PlayAction::NeedsLogin;
        }

        let playlist = self.auth.config().playlist_id.clone();
        if self.playback.current_track.is_none() && self.auth.config().has_playlist() {
            self.play_context(&playlist).await;
            PlayAction::StartedContext
        } else {
            self.toggle_playback().await;
            PlayAction::Toggled
        }
    }

    /// Log out: drop the player, the tokens and all derived state
    pub async fn disconnect(&mut self) {
        self.teardown().await;
        self.error = None;
        self.state = ConnectionState::Unauthenticated;
        tracing::info!("Disconnected from Spotify");
    }

    async fn teardown(&mut self) {
        if let Some(mut player) = self.player.take() {
            player.disconnect().await;
        }
        self.device_id = None;
        self.set_token(None);
        if let Err(e) = self.tokens.clear() {
            tracing::warn!("Failed to clear stored tokens: {}", e);
        }
        self.playback.reset();
    }
}
