//! huddle-relay: WebSocket signaling relay for voice rooms.
//!
//! Accepts WebSocket connections, groups them by room, pushes the room
//! roster on every join and leave, and routes signaling frames between
//! participants. Frames with a `toId` reach that participant only; frames
//! without one reach everyone else in the room. The relay stamps `fromId`
//! itself and never looks at SDP or candidates.

mod connection;
mod protocol;
mod session;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use huddle_config::HuddleConfig;
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;

use crate::connection::handle_connection;
use crate::session::RoomStore;

#[derive(Parser)]
#[command(name = "huddle-relay", about = "WebSocket signaling relay for huddle voice rooms")]
struct Args {
    /// Port to listen on. Overrides `relay.port` from the config file.
    #[arg(short, long)]
    port: Option<u16>,

    /// Config file to use instead of the platform default.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn load_config(path: Option<&PathBuf>) -> (HuddleConfig, Option<String>) {
    let loaded = match path {
        Some(path) => huddle_config::toml_loader::load_from_path(path),
        None => huddle_config::load_config(),
    };
    match loaded {
        Ok(config) => (config, None),
        Err(e) => (HuddleConfig::default(), Some(e.to_string())),
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let (config, config_error) = load_config(args.config.as_ref());

    let default_filter = format!("huddle_relay={}", config.logging.level.as_filter());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    if let Some(e) = config_error {
        tracing::warn!(error = %e, "Using default config");
    }

    let port = match args.port {
        Some(port) => port,
        None => match u16::try_from(config.relay.port) {
            Ok(port) => port,
            Err(_) => {
                tracing::error!(port = config.relay.port, "relay.port out of range");
                std::process::exit(2);
            }
        },
    };
    let hello_timeout = Duration::from_secs(config.relay.hello_timeout_secs.into());
    let store = RoomStore::new();

    let addr = format!("0.0.0.0:{port}");
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "Failed to bind TCP listener");
            std::process::exit(1);
        }
    };

    tracing::info!("huddle-relay listening on {}", addr);

    // Accept loop.
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let store = store.clone();
                tokio::spawn(async move {
                    match accept_async(stream).await {
                        Ok(ws) => handle_connection(ws, addr, store.clone(), hello_timeout).await,
                        Err(e) => {
                            tracing::warn!(peer = %addr, error = %e, "WS handshake failed");
                        }
                    }
                    let rooms = store.room_count().await;
                    tracing::debug!(rooms = rooms, "Connection finished");
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "TCP accept error");
            }
        }
    }
}
