/// Vendor player seam.
///
/// The streaming engine is an external collaborator. It is passed into the
/// controller as a `PlaybackSdk` instead of being reached through globals.
use crate::models::PlayerStatePayload;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};

/// Error type for SDK operations
#[derive(Debug, Error)]
pub enum SdkError {
    #[error("playback SDK unavailable: {0}")]
    Unavailable(String),
    #[error("player operation failed: {0}")]
    Operation(String),
    #[error("player request rejected with HTTP status {0}")]
    Status(u16),
    #[error("player request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// The five player events the controller listens to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SdkEventKind {
    Ready,
    PlayerStateChanged,
    AuthenticationError,
    AccountError,
    PlaybackError,
}

impl SdkEventKind {
    pub const ALL: [SdkEventKind; 5] = [
        SdkEventKind::Ready,
        SdkEventKind::PlayerStateChanged,
        SdkEventKind::AuthenticationError,
        SdkEventKind::AccountError,
        SdkEventKind::PlaybackError,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SdkEventKind::Ready => "ready",
            SdkEventKind::PlayerStateChanged => "player_state_changed",
            SdkEventKind::AuthenticationError => "authentication_error",
            SdkEventKind::AccountError => "account_error",
            SdkEventKind::PlaybackError => "playback_error",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SdkEvent {
    Ready { device_id: String },
    /// `None` means the player reported no active session
    PlayerStateChanged(Option<PlayerStatePayload>),
    AuthenticationError { message: String },
    AccountError { message: String },
    PlaybackError { message: String },
}

impl SdkEvent {
    pub fn kind(&self) -> SdkEventKind {
        match self {
            SdkEvent::Ready { .. } => SdkEventKind::Ready,
            SdkEvent::PlayerStateChanged(_) => SdkEventKind::PlayerStateChanged,
            SdkEvent::AuthenticationError { .. } => SdkEventKind::AuthenticationError,
            SdkEvent::AccountError { .. } => SdkEventKind::AccountError,
            SdkEvent::PlaybackError { .. } => SdkEventKind::PlaybackError,
        }
    }
}

/// Event tagged with the player session that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerEvent {
    pub session: u64,
    pub event: SdkEvent,
}

pub type EventSender = mpsc::UnboundedSender<PlayerEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<PlayerEvent>;

/// Returns the current access token whenever the player asks for one
pub type TokenProvider = Arc<dyn Fn() -> Option<String> + Send + Sync>;

/// Construction options for a player instance
#[derive(Clone)]
pub struct PlayerOptions {
    pub name: String,
    pub volume: f32,
    pub token_provider: TokenProvider,
}

/// Delivers events for the kinds a listener was registered for
#[derive(Clone)]
pub struct Emitter {
    session: u64,
    sender: EventSender,
    listeners: Arc<RwLock<HashSet<SdkEventKind>>>,
}

impl Emitter {
    pub fn new(session: u64, sender: EventSender) -> Self {
        Self {
            session,
            sender,
            listeners: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Register interest in `kind`; returns false if it was already registered
    pub fn listen(&self, kind: SdkEventKind) -> bool {
        match self.listeners.write() {
            Ok(mut listeners) => listeners.insert(kind),
            Err(_) => false,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().map(|l| l.len()).unwrap_or(0)
    }

    /// Forward `event` if someone listens for it
    pub fn emit(&self, event: SdkEvent) -> bool {
        let listening = self
            .listeners
            .read()
            .map(|l| l.contains(&event.kind()))
            .unwrap_or(false);
        if !listening {
            tracing::trace!("Dropping {} event without listener", event.kind().name());
            return false;
        }
        self.sender
            .send(PlayerEvent {
                session: self.session,
                event,
            })
            .is_ok()
    }
}

/// Entry point of a vendor playback engine
#[async_trait]
pub trait PlaybackSdk: Send + Sync {
    /// Identifies the engine's loadable resource (script URL, endpoint, ...)
    fn source(&self) -> &str;

    /// Make the engine available. Resolves once it is ready to create players.
    async fn load(&self) -> Result<(), SdkError>;

    /// Build a player that reports through `emitter`
    fn create_player(
        &self,
        options: PlayerOptions,
        emitter: Emitter,
    ) -> Result<Box<dyn SdkPlayer>, SdkError>;
}

/// A player instance created by the engine
#[async_trait]
pub trait SdkPlayer: Send + Sync {
    /// Register a listener for one event kind
    fn add_listener(&mut self, kind: SdkEventKind) -> bool;

    /// Connect to the streaming service. `Ok(false)` means the engine declined.
    async fn connect(&mut self) -> Result<bool, SdkError>;

    async fn toggle_play(&self) -> Result<(), SdkError>;

    async fn next_track(&self) -> Result<(), SdkError>;

    async fn previous_track(&self) -> Result<(), SdkError>;

    async fn disconnect(&mut self);
}

/// Loads each engine source at most once per process
#[derive(Default)]
pub struct SdkLoader {
    loaded: Mutex<HashSet<String>>,
}

impl SdkLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `sdk` unless its source was loaded before. Returns true on a fresh load.
    pub async fn ensure_loaded(&self, sdk: &dyn PlaybackSdk) -> Result<bool, SdkError> {
        let mut loaded = self.loaded.lock().await;
        if loaded.contains(sdk.source()) {
            tracing::debug!("Playback SDK {} already loaded", sdk.source());
            return Ok(false);
        }

        sdk.load().await?;
        loaded.insert(sdk.source().to_string());
        tracing::info!("Playback SDK {} loaded", sdk.source());
        Ok(true)
    }

    #[cfg(test)]
    pub async fn is_loaded(&self, source: &str) -> bool {
        self.loaded.lock().await.contains(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSdk {
        loads: AtomicUsize,
    }

    #[async_trait]
    impl PlaybackSdk for CountingSdk {
        fn source(&self) -> &str {
            "test://sdk.js"
        }

        async fn load(&self) -> Result<(), SdkError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn create_player(
            &self,
            _options: PlayerOptions,
            _emitter: Emitter,
        ) -> Result<Box<dyn SdkPlayer>, SdkError> {
            Err(SdkError::Unavailable("not needed".to_string()))
        }
    }

    #[tokio::test]
    async fn test_loader_loads_source_once() {
        let sdk = CountingSdk {
            loads: AtomicUsize::new(0),
        };
        let loader = SdkLoader::new();

        assert!(loader.ensure_loaded(&sdk).await.unwrap());
        assert!(!loader.ensure_loaded(&sdk).await.unwrap());
        assert!(loader.is_loaded("test://sdk.js").await);
        assert_eq!(sdk.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_emitter_only_forwards_registered_kinds() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let emitter = Emitter::new(7, tx);

        assert!(!emitter.emit(SdkEvent::Ready {
            device_id: "d".to_string()
        }));
        assert!(emitter.listen(SdkEventKind::Ready));
        assert!(!emitter.listen(SdkEventKind::Ready));
        assert!(emitter.emit(SdkEvent::Ready {
            device_id: "d".to_string()
        }));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.session, 7);
        assert_eq!(received.event.kind(), SdkEventKind::Ready);
        assert!(rx.try_recv().is_err());
    }
}
