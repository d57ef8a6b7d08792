/// Remote player driven through the Spotify Web API.
///
/// Controls an existing Spotify Connect device and polls `/me/player` to
/// synthesize the same events an embedded player would deliver.
use super::sdk::{
    Emitter, PlaybackSdk, PlayerOptions, SdkError, SdkEvent, SdkEventKind, SdkPlayer,
    TokenProvider,
};
use crate::models::{PlayerStatePayload, Track};
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

#[derive(Debug, Deserialize)]
struct Device {
    id: Option<String>,
    #[serde(default)]
    is_active: bool,
}

#[derive(Debug, Deserialize)]
struct DeviceList {
    #[serde(default)]
    devices: Vec<Device>,
}

#[derive(Debug, Deserialize)]
struct CurrentPlayback {
    #[serde(default)]
    device: Option<Device>,
    #[serde(default)]
    is_playing: bool,
    #[serde(default)]
    item: Option<Track>,
}

impl CurrentPlayback {
    fn payload(self) -> Option<PlayerStatePayload> {
        let is_playing = self.is_playing;
        self.item
            .map(|track| PlayerStatePayload::new(track, !is_playing))
    }
}

/// Map a failed request onto the player event it stands for
fn error_event(err: &SdkError) -> SdkEvent {
    let message = err.to_string();
    match err {
        SdkError::Status(401) => SdkEvent::AuthenticationError { message },
        SdkError::Status(403) => SdkEvent::AccountError { message },
        _ => SdkEvent::PlaybackError { message },
    }
}

#[derive(Clone)]
struct WebApiClient {
    http: reqwest::Client,
    api_base: String,
    token_provider: TokenProvider,
}

impl WebApiClient {
    async fn send(
        &self,
        method: Method,
        path: &str,
        device_id: Option<&str>,
    ) -> Result<reqwest::Response, SdkError> {
        let token = (self.token_provider)()
            .ok_or_else(|| SdkError::Operation("no access token".to_string()))?;

        let mut request = self
            .http
            .request(method, format!("{}{}", self.api_base, path))
            .bearer_auth(token);
        if let Some(device_id) = device_id {
            request = request.query(&[("device_id", device_id)]);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(SdkError::Status(status.as_u16()))
        }
    }

    async fn current_playback(&self) -> Result<Option<CurrentPlayback>, SdkError> {
        let response = self.send(Method::GET, "/me/player", None).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        Ok(Some(response.json::<CurrentPlayback>().await?))
    }

    /// Active device if any, otherwise the first one listed
    async fn pick_device(&self) -> Result<Option<String>, SdkError> {
        let list = self
            .send(Method::GET, "/me/player/devices", None)
            .await?
            .json::<DeviceList>()
            .await?;

        let id = list
            .devices
            .iter()
            .find(|d| d.is_active && d.id.is_some())
            .or_else(|| list.devices.iter().find(|d| d.id.is_some()))
            .and_then(|d| d.id.clone());
        Ok(id)
    }
}

/// Web API backed engine. Nothing to load beyond an HTTP client.
pub struct WebApiSdk {
    http: reqwest::Client,
    api_base: String,
    poll_interval: Duration,
}

impl WebApiSdk {
    pub fn new(api_base: impl Into<String>, poll_interval: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            poll_interval,
        }
    }
}

#[async_trait]
impl PlaybackSdk for WebApiSdk {
    fn source(&self) -> &str {
        &self.api_base
    }

    async fn load(&self) -> Result<(), SdkError> {
        Ok(())
    }

    fn create_player(
        &self,
        options: PlayerOptions,
        emitter: Emitter,
    ) -> Result<Box<dyn SdkPlayer>, SdkError> {
        tracing::debug!("Creating Web API player \"{}\"", options.name);
        Ok(Box::new(WebApiPlayer {
            client: WebApiClient {
                http: self.http.clone(),
                api_base: self.api_base.clone(),
                token_provider: options.token_provider,
            },
            emitter,
            poll_interval: self.poll_interval,
            device_id: Arc::new(RwLock::new(None)),
            is_playing: Arc::new(AtomicBool::new(false)),
            refresh: Arc::new(Notify::new()),
            task: None,
        }))
    }
}

struct WebApiPlayer {
    client: WebApiClient,
    emitter: Emitter,
    poll_interval: Duration,
    device_id: Arc<RwLock<Option<String>>>,
    is_playing: Arc<AtomicBool>,
    refresh: Arc<Notify>,
    task: Option<JoinHandle<()>>,
}

/// State owned by the polling task
struct Poller {
    client: WebApiClient,
    emitter: Emitter,
    device_id: Arc<RwLock<Option<String>>>,
    is_playing: Arc<AtomicBool>,
    last_state: Option<Option<PlayerStatePayload>>,
    last_error: Option<String>,
}

impl Poller {
    async fn poll(&mut self) {
        match self.client.current_playback().await {
            Ok(playback) => {
                self.last_error = None;
                if !self.has_device() {
                    self.announce(playback.as_ref()).await;
                }

                let payload = playback.and_then(CurrentPlayback::payload);
                self.is_playing.store(
                    payload.as_ref().map(|p| !p.paused).unwrap_or(false),
                    Ordering::SeqCst,
                );
                if self.last_state.as_ref() != Some(&payload) {
                    self.last_state = Some(payload.clone());
                    self.emitter.emit(SdkEvent::PlayerStateChanged(payload));
                }
            }
            Err(err) => {
                // Re-announce the state once polling recovers
                self.last_state = None;
                let message = err.to_string();
                if self.last_error.as_deref() != Some(message.as_str()) {
                    tracing::warn!("Player state poll failed: {}", message);
                    self.emitter.emit(error_event(&err));
                    self.last_error = Some(message);
                }
            }
        }
    }

    fn has_device(&self) -> bool {
        self.device_id.read().map(|d| d.is_some()).unwrap_or(false)
    }

    async fn announce(&mut self, playback: Option<&CurrentPlayback>) {
        let from_playback = playback
            .and_then(|p| p.device.as_ref())
            .and_then(|d| d.id.clone());
        let device_id = match from_playback {
            Some(id) => Some(id),
            None => match self.client.pick_device().await {
                Ok(id) => id,
                Err(err) => {
                    tracing::warn!("Failed to list Spotify devices: {}", err);
                    None
                }
            },
        };

        let Some(device_id) = device_id else {
            tracing::info!("No Spotify Connect device available yet");
            return;
        };
        if let Ok(mut slot) = self.device_id.write() {
            *slot = Some(device_id.clone());
        }
        self.emitter.emit(SdkEvent::Ready { device_id });
    }
}

impl WebApiPlayer {
    fn device_id(&self) -> Option<String> {
        self.device_id.read().ok().and_then(|d| d.clone())
    }

    async fn control(&self, method: Method, path: &str) -> Result<(), SdkError> {
        let device_id = self.device_id();
        self.client
            .send(method, path, device_id.as_deref())
            .await?;
        self.refresh.notify_one();
        Ok(())
    }
}

#[async_trait]
impl SdkPlayer for WebApiPlayer {
    fn add_listener(&mut self, kind: SdkEventKind) -> bool {
        self.emitter.listen(kind)
    }

    async fn connect(&mut self) -> Result<bool, SdkError> {
        if let Some(task) = self.task.take() {
            task.abort();
        }

        let mut poller = Poller {
            client: self.client.clone(),
            emitter: self.emitter.clone(),
            device_id: self.device_id.clone(),
            is_playing: self.is_playing.clone(),
            last_state: None,
            last_error: None,
        };
        let refresh = self.refresh.clone();
        let period = self.poll_interval;

        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = refresh.notified() => {}
                }
                poller.poll().await;
            }
        }));
        tracing::info!("Polling Spotify player state every {:?}", period);
        Ok(true)
    }

    async fn toggle_play(&self) -> Result<(), SdkError> {
        if self.is_playing.load(Ordering::SeqCst) {
            self.control(Method::PUT, "/me/player/pause").await
        } else {
            self.control(Method::PUT, "/me/player/play").await
        }
    }

    async fn next_track(&self) -> Result<(), SdkError> {
        self.control(Method::POST, "/me/player/next").await
    }

    async fn previous_track(&self) -> Result<(), SdkError> {
        self.control(Method::POST, "/me/player/previous").await
    }

    async fn disconnect(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!("Stopped player state polling");
        }
    }
}

impl Drop for WebApiPlayer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
