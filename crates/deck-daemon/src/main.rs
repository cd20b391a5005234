mod bridge;
mod http;
mod supervisor;
#[cfg(all(test, unix))]
mod test_support;

use std::sync::Arc;

use deck_proto::channel::LineChannel;
use deck_proto::config::Config;
use deck_proto::library::SongList;
use deck_proto::state::PlaybackState;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::bridge::CommandBridge;
use crate::http::HttpState;
use crate::supervisor::Supervisor;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Setup file logging + console
    let data_dir = deck_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("daemon.log");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false);
    let console_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,deck_daemon=debug")),
        )
        .init();

    info!("Log file: {:?}", log_path);

    let config = Config::load()?;
    info!("Config loaded from: {:?}", Config::config_path());

    std::fs::create_dir_all(&config.backend.working_dir)?;
    std::fs::create_dir_all(&config.library.music_dir)?;
    let songs = Arc::new(SongList::new(config.library.songs_file.clone()));
    songs.ensure_exists().await?;

    let supervisor = Arc::new(Supervisor::new(
        config.backend.clone(),
        Arc::new(LineChannel::new()),
        Arc::new(PlaybackState::new()),
    ));

    // A missing or broken backend is not fatal: the control surface keeps
    // running and reports "Backend not running" until a restart succeeds.
    if let Err(e) = supervisor.start().await {
        error!("Backend not started: {}", e);
    }

    let http_handle = http::start_server(
        config.http.bind_address.clone(),
        config.http.port,
        HttpState {
            supervisor: supervisor.clone(),
            bridge: CommandBridge::new(supervisor.clone()),
            songs,
            music_dir: config.library.music_dir.clone(),
        },
    );

    info!("Daemon initialised");
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown requested");
        }
        _ = http_handle => {
            error!("HTTP server stopped");
        }
    }

    supervisor.shutdown().await;
    info!("Daemon stopped");
    Ok(())
}
