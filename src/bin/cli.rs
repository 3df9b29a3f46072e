//! CLI binary for chatvox.

use chatvox::speech::{EspeakEngine, SpeechEngine};
use chatvox::{Bot, BotConfig, BotError, app_dirs};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// First reconnect delay after the connection drops.
const INITIAL_BACKOFF: Duration = Duration::from_secs(2);
/// Reconnect delay ceiling.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Chatvox: reads chat aloud and plays song requests.
#[derive(Parser)]
#[command(name = "chatvox", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Join the configured channel and serve commands until Ctrl+C.
    Run,

    /// List the synthesizer's voices with the indices `!voice` profiles use.
    Voices,

    /// List the songs `!sr <N>` selects from.
    Songs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _log_guard = init_tracing();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config).await,
        Command::Voices => list_voices(&config),
        Command::Songs => {
            list_songs(&config);
            Ok(())
        }
    }
}

/// Console plus daily rolling file output. The guard must outlive `main`.
fn init_tracing() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chatvox=info"));
    let console = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = app_dirs::logs_dir();
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        tracing_subscriber::registry().with(filter).with(console).init();
        warn!("file logging disabled, cannot create {}: {e}", log_dir.display());
        return None;
    }

    let appender = tracing_appender::rolling::daily(&log_dir, "chatvox.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let file = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false);
    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .init();
    Some(guard)
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<BotConfig> {
    if let Some(path) = path {
        return Ok(BotConfig::from_file(path)?);
    }
    let default_path = BotConfig::default_config_path();
    if default_path.exists() {
        info!("using config {}", default_path.display());
        Ok(BotConfig::from_file(&default_path)?)
    } else {
        info!("no config at {}; using defaults", default_path.display());
        Ok(BotConfig::default())
    }
}

async fn run(config: BotConfig) -> anyhow::Result<()> {
    println!("chatvox v{}", env!("CARGO_PKG_VERSION"));

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl+C, shutting down...");
            cancel_clone.cancel();
        }
    });

    let mut backoff = INITIAL_BACKOFF;
    loop {
        match Bot::start(&config).await {
            Ok(mut bot) => {
                println!("Joined #{}. Press Ctrl+C to quit.", config.chat.channel_name());
                backoff = INITIAL_BACKOFF;
                let interrupted = tokio::select! {
                    () = cancel.cancelled() => true,
                    () = bot.terminated() => false,
                };
                let result = bot.shutdown().await;
                if interrupted {
                    return Ok(result?);
                }
                if let Err(e) = result {
                    warn!("session ended: {e}");
                }
            }
            Err(e @ BotError::Connection(_)) => warn!("{e}"),
            Err(e) => {
                error!("cannot start: {e}");
                return Err(e.into());
            }
        }

        info!("reconnecting in {}s", backoff.as_secs());
        tokio::select! {
            () = cancel.cancelled() => return Ok(()),
            () = tokio::time::sleep(backoff) => {}
        }
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}

fn list_voices(config: &BotConfig) -> anyhow::Result<()> {
    let engine = EspeakEngine::new(&config.speech.command)?;
    for (index, voice) in engine.catalog().iter().enumerate() {
        println!("{index:>4}  {}", voice.id);
    }
    Ok(())
}

fn list_songs(config: &BotConfig) {
    let library = chatvox::playback::SongLibrary::new(
        &config.playback.music_dir,
        &config.playback.extensions,
    );
    let tracks = library.tracks();
    if tracks.is_empty() {
        println!("No songs in {}", library.dir().display());
    }
    for (index, track) in tracks.iter().enumerate() {
        println!("{:>4}. {}", index + 1, track.name);
    }
}
