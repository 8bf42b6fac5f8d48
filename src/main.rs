use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use clap::builder::BoolishValueParser;
use sign_types::MatchMode;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

use signplayer::{AppState, PlaybackHandle, Session, SimulatedPlayer, Status, router};

/// Sign-language clip player service.
#[derive(Debug, Parser)]
#[command(name = "signplayer")]
#[command(about = "Turns text into a queue of sign-language clips and plays it back")]
struct Config {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,
    /// JSON dictionary artifact with `phrases` and `words`.
    #[arg(long, env = "DICTIONARY_PATH", default_value = "data/asl_dictionary.json")]
    dictionary: PathBuf,
    /// Directory the `./assets/asl/...` clip paths resolve against.
    #[arg(long, env = "ASSET_ROOT", default_value = ".")]
    asset_root: PathBuf,
    /// Nominal clip length for the simulated player at speed 1.0.
    #[arg(
        long,
        env = "CLIP_MS",
        default_value_t = 800,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    clip_ms: u64,
    /// Restart the queue after it is exhausted.
    #[arg(long, env = "IDLE_LOOP", value_parser = BoolishValueParser::new())]
    idle_loop: bool,
    /// Fingerspell everything, ignoring the dictionary.
    #[arg(long)]
    letters_only: bool,
}

impl Config {
    fn mode(&self) -> MatchMode {
        if self.letters_only {
            MatchMode::LettersOnly
        } else {
            MatchMode::Dictionary
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::parse();
    info!("binding to {}:{}", config.host, config.port);
    info!("using dictionary at {}", config.dictionary.display());
    info!("serving clips from {}", config.asset_root.display());

    let player = SimulatedPlayer::new(&config.asset_root, Duration::from_millis(config.clip_ms));
    let session = Arc::new(Session::new(
        PlaybackHandle::spawn(player),
        &config.dictionary,
    ));
    session.set_mode(config.mode()).await;
    session.set_idle_loop(config.idle_loop).await;
    session.load_dictionary().await;
    session.announce(Status::Idle).await;

    let app = router(AppState { session }).layer(TraceLayer::new_for_http());
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", config.host, config.port))?;
    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app).await?;
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_level(true)
        .with_max_level(Level::INFO)
        .init();
}
