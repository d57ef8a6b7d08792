/// Main entry point for the Mixtape Player CLI
use anyhow::Context;
use clap::{Parser, Subcommand};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use mixtape_player::auth::API_BASE_URL;
use mixtape_player::ui::{DeckApp, Theme};
use mixtape_player::{
    estimate_tempo, AuthClient, CallbackListener, Config, DemoSdk, PlaybackController,
    PlaybackSdk, TokenStore, Track, WebApiSdk,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;

const LOG_FILE: &str = "mixtape.log";
const TOKEN_DIR: &str = "tokens";

#[derive(Parser, Debug)]
#[command(
    name = "mixtape",
    version,
    about = "Cassette-deck mixtape player for Spotify",
    long_about = None
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config
    #[arg(short, long)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the interactive deck (default)
    Deck,

    /// Start the deck with simulated tracks, no account needed
    Demo,

    /// Log in to Spotify and store the tokens
    Login,

    /// Forget the stored tokens
    Logout,

    /// Trade the stored refresh token for a new access token
    Refresh,

    /// Show session, configuration and current playback
    Status,

    /// Print the estimated tempo for a track
    Tempo {
        /// Track name
        #[arg(short, long)]
        name: String,

        /// Artist name
        #[arg(short, long, default_value = "")]
        artist: String,

        /// Track duration in milliseconds (0 if unknown)
        #[arg(short, long, default_value_t = 0)]
        duration_ms: u64,
    },
}

impl Command {
    fn is_interactive(&self) -> bool {
        matches!(self, Command::Deck | Command::Demo)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let command = args.command.unwrap_or(Command::Deck);

    let config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("failed to load configuration")?;
    let data_dir = config.data_dir()?;

    let level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.general.log_level);
    init_logging(level, command.is_interactive().then_some(data_dir.as_path()))?;

    info!("Starting Mixtape Player v{}", env!("CARGO_PKG_VERSION"));

    let tokens = TokenStore::on_disk(data_dir.join(TOKEN_DIR));
    match command {
        Command::Deck => run_deck(&config, tokens).await,
        Command::Demo => run_demo(&config).await,
        Command::Login => handle_login(&config, &tokens).await,
        Command::Logout => {
            tokens.clear()?;
            println!("Logged out; stored tokens removed.");
            Ok(())
        }
        Command::Refresh => handle_refresh(&config, &tokens).await,
        Command::Status => handle_status(&config, &tokens).await,
        Command::Tempo {
            name,
            artist,
            duration_ms,
        } => {
            let artists: Vec<&str> = if artist.is_empty() {
                Vec::new()
            } else {
                vec![artist.as_str()]
            };
            let track = Track::new(name, &artists, duration_ms);
            println!("{} BPM", estimate_tempo(Some(&track)));
            Ok(())
        }
    }
}

/// Interactive modes log to a file so the deck stays clean
fn init_logging(level: &str, log_dir: Option<&Path>) -> anyhow::Result<()> {
    let level_filter: LevelFilter = level
        .parse()
        .with_context(|| format!("invalid log level '{}'", level))?;

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join(LOG_FILE))?;
            tracing_subscriber::fmt()
                .with_max_level(level_filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_max_level(level_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

async fn run_deck(config: &Config, tokens: TokenStore) -> anyhow::Result<()> {
    let sdk: Arc<dyn PlaybackSdk> = Arc::new(WebApiSdk::new(
        API_BASE_URL,
        Duration::from_millis(config.general.poll_interval_ms),
    ));
    let mut controller =
        PlaybackController::new(sdk, AuthClient::new(config.spotify.clone()), tokens);
    controller.restore_session().await;

    let app = DeckApp::new(
        controller,
        Theme::named(&config.general.theme),
        config.general.frame_rate,
    );
    run_terminal(app).await
}

async fn run_demo(config: &Config) -> anyhow::Result<()> {
    let mut spotify = config.spotify.clone();
    // The demo player has no playlist to start
    spotify.playlist_id.clear();

    let mut controller = PlaybackController::new(
        Arc::new(DemoSdk::new()),
        AuthClient::new(spotify),
        TokenStore::in_memory(),
    );
    controller.connect("demo").await;

    let app = DeckApp::new(
        controller,
        Theme::named(&config.general.theme),
        config.general.frame_rate,
    )
    .demo(true);
    run_terminal(app).await
}

async fn run_terminal(app: DeckApp) -> anyhow::Result<()> {
    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let result = app.run(&mut terminal).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

async fn handle_login(config: &Config, tokens: &TokenStore) -> anyhow::Result<()> {
    let auth = AuthClient::new(config.spotify.clone());
    let url = auth.authorize_url()?;
    let listener = CallbackListener::bind(&config.spotify.redirect_uri).await?;

    println!("Open this URL in your browser to log in:\n\n  {}\n", url);
    println!("Waiting for the redirect to {} ...", config.spotify.redirect_uri);

    let code = listener.wait().await?.into_code()?;
    let pair = auth.exchange_code(&code).await?;
    tokens.save(&pair)?;

    println!("Logged in. Run `mixtape` to start the deck.");
    Ok(())
}

async fn handle_refresh(config: &Config, tokens: &TokenStore) -> anyhow::Result<()> {
    let sdk: Arc<dyn PlaybackSdk> = Arc::new(WebApiSdk::new(
        API_BASE_URL,
        Duration::from_millis(config.general.poll_interval_ms),
    ));
    let mut controller =
        PlaybackController::new(sdk, AuthClient::new(config.spotify.clone()), tokens.clone());
    controller
        .refresh_session()
        .await
        .context("could not refresh the session; run `mixtape login` if not logged in")?;
    println!("Access token refreshed.");
    Ok(())
}

async fn handle_status(config: &Config, tokens: &TokenStore) -> anyhow::Result<()> {
    let stored = tokens.load()?;
    println!("Mixtape Player status:");
    println!(
        "  Session:      {}",
        if stored.is_some() { "logged in" } else { "not logged in" }
    );
    println!("  Client ID:    {}", config.spotify.client_id);
    println!("  Redirect URI: {}", config.spotify.redirect_uri);
    println!(
        "  Playlist:     {}",
        if config.spotify.has_playlist() {
            config.spotify.playlist_id.as_str()
        } else {
            "(not configured)"
        }
    );
    println!("  Theme:        {}", config.general.theme);
    println!("  Data dir:     {}", config.data_dir()?.display());

    let Some(stored) = stored else {
        return Ok(());
    };

    let response = reqwest::Client::new()
        .get(format!("{}/me/player", API_BASE_URL))
        .bearer_auth(&stored.access_token)
        .send()
        .await?;

    match response.status().as_u16() {
        204 => println!("  Playback:     nothing playing"),
        401 => println!("  Playback:     token expired; run `mixtape refresh`"),
        code if !(200..300).contains(&code) => {
            println!("  Playback:     unavailable (HTTP {})", code)
        }
        _ => {
            let body: serde_json::Value = response.json().await?;
            let track = body["item"]["name"].as_str().unwrap_or("Unknown Track");
            let artist = body["item"]["artists"][0]["name"]
                .as_str()
                .unwrap_or("Unknown Artist");
            let state = if body["is_playing"].as_bool().unwrap_or(false) {
                "playing"
            } else {
                "paused"
            };
            println!("  Playback:     {} - {} ({})", track, artist, state);
            println!(
                "  Tempo:        ~{} BPM",
                estimate_tempo(serde_json::from_value::<Track>(body["item"].clone()).ok().as_ref())
            );
        }
    }

    Ok(())
}
