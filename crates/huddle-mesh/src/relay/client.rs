//! WebSocket client for `huddle-relay` with auto-reconnect.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use huddle_common::{ParticipantId, RelayError, RoomId};
use huddle_config::schema::RelayConfig;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

use super::types::{InboundFrame, RelayEvent, RelayHello, SignalingRelay};
use crate::protocol::SignalMessage;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RelayClientConfig {
    pub url: String,
    pub connect_timeout: Duration,
    pub reconnect_delay: Duration,
    pub max_reconnect_delay: Duration,
}

impl Default for RelayClientConfig {
    fn default() -> Self {
        Self::from(&RelayConfig::default())
    }
}

impl From<&RelayConfig> for RelayClientConfig {
    fn from(config: &RelayConfig) -> Self {
        Self {
            url: config.url.clone(),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs.into()),
            reconnect_delay: Duration::from_secs(config.reconnect_delay_secs.into()),
            max_reconnect_delay: Duration::from_secs(config.max_reconnect_delay_secs.into()),
        }
    }
}

#[derive(Debug)]
enum RelayCommand {
    Send(String),
    Disconnect,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Handle to a background relay connection.
///
/// Outbound sends are queued to the connection task without waiting, so a
/// caller never blocks on the socket. Inbound traffic is delivered on the
/// receiver returned by [`WsRelay::connect`].
pub struct WsRelay {
    command_tx: mpsc::UnboundedSender<RelayCommand>,
}

impl WsRelay {
    /// Start the connection task and join `room_id` as `participant_id`.
    pub fn connect(
        config: RelayClientConfig,
        room_id: RoomId,
        participant_id: ParticipantId,
    ) -> (Self, mpsc::Receiver<RelayEvent>) {
        let (event_tx, event_rx) = mpsc::channel(256);
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let hello = RelayHello::Join {
            room_id,
            participant_id,
        };

        tokio::spawn(connection_loop(config, hello, event_tx, command_rx));

        (Self { command_tx }, event_rx)
    }

    /// Close the connection and stop reconnecting.
    pub fn disconnect(&self) {
        let _ = self.command_tx.send(RelayCommand::Disconnect);
    }
}

#[async_trait]
impl SignalingRelay for WsRelay {
    async fn send(&self, message: SignalMessage) -> Result<(), RelayError> {
        let json = message.to_json()?;
        self.command_tx
            .send(RelayCommand::Send(json))
            .map_err(|_| RelayError::Closed)
    }
}

// ---------------------------------------------------------------------------
// Connection Loop
// ---------------------------------------------------------------------------

async fn connection_loop(
    config: RelayClientConfig,
    hello: RelayHello,
    event_tx: mpsc::Sender<RelayEvent>,
    mut command_rx: mpsc::UnboundedReceiver<RelayCommand>,
) {
    let hello = match serde_json::to_string(&hello) {
        Ok(json) => json,
        Err(e) => {
            error!(error = %e, "Failed to encode relay hello");
            return;
        }
    };
    let mut reconnect_delay = config.reconnect_delay;

    loop {
        info!(url = %config.url, "Connecting to signaling relay");

        match tokio::time::timeout(
            config.connect_timeout,
            tokio_tungstenite::connect_async(config.url.as_str()),
        )
        .await
        {
            Ok(Ok((ws_stream, _))) => {
                reconnect_delay = config.reconnect_delay;

                // Signals queued while offline target the previous session.
                if discard_queued(&mut command_rx) {
                    return;
                }

                let (mut sink, mut stream) = ws_stream.split();
                if let Err(e) = sink.send(WsMessage::Text(hello.clone().into())).await {
                    warn!(error = %e, "Failed to send relay hello");
                } else {
                    let _ = event_tx.send(RelayEvent::Connected).await;

                    let stop = loop {
                        tokio::select! {
                            command = command_rx.recv() => match command {
                                Some(RelayCommand::Send(json)) => {
                                    if let Err(e) = sink.send(WsMessage::Text(json.into())).await {
                                        warn!(error = %e, "Relay send failed");
                                        break false;
                                    }
                                }
                                Some(RelayCommand::Disconnect) | None => {
                                    let _ = sink.send(WsMessage::Close(None)).await;
                                    break true;
                                }
                            },
                            frame = stream.next() => match frame {
                                Some(Ok(WsMessage::Text(text))) => {
                                    handle_frame(&text, &event_tx).await;
                                }
                                Some(Ok(WsMessage::Ping(data))) => {
                                    let _ = sink.send(WsMessage::Pong(data)).await;
                                }
                                Some(Ok(WsMessage::Close(_))) | None => {
                                    info!("Relay closed connection");
                                    break false;
                                }
                                Some(Err(e)) => {
                                    warn!(error = %e, "Relay WebSocket error");
                                    break false;
                                }
                                _ => {}
                            }
                        }
                    };

                    let _ = event_tx.send(RelayEvent::Disconnected).await;
                    if stop {
                        info!("Relay client stopped");
                        return;
                    }
                }
            }
            Ok(Err(e)) => {
                error!(error = %e, "Failed to connect to signaling relay");
                let _ = event_tx
                    .send(RelayEvent::Error(format!("Connection failed: {e}")))
                    .await;
            }
            Err(_elapsed) => {
                error!(timeout = ?config.connect_timeout, "Relay connection timed out");
                let _ = event_tx
                    .send(RelayEvent::Error("Connection timed out".to_string()))
                    .await;
            }
        }

        info!(delay = ?reconnect_delay, "Reconnecting to relay");
        if wait_or_disconnect(reconnect_delay, &mut command_rx).await {
            return;
        }
        reconnect_delay = (reconnect_delay * 2).min(config.max_reconnect_delay);
    }
}

/// Drop queued sends. Returns true if a disconnect was requested.
fn discard_queued(command_rx: &mut mpsc::UnboundedReceiver<RelayCommand>) -> bool {
    let mut dropped = 0usize;
    while let Ok(command) = command_rx.try_recv() {
        match command {
            RelayCommand::Send(_) => dropped += 1,
            RelayCommand::Disconnect => return true,
        }
    }
    if dropped > 0 {
        debug!(dropped, "Discarded signals queued while offline");
    }
    false
}

/// Sleep for the backoff delay. Returns true if a disconnect was requested.
async fn wait_or_disconnect(
    delay: Duration,
    command_rx: &mut mpsc::UnboundedReceiver<RelayCommand>,
) -> bool {
    let deadline = Instant::now() + delay;
    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => return false,
            command = command_rx.recv() => match command {
                Some(RelayCommand::Send(_)) => continue,
                Some(RelayCommand::Disconnect) | None => return true,
            }
        }
    }
}

async fn handle_frame(text: &str, event_tx: &mpsc::Sender<RelayEvent>) {
    match serde_json::from_str::<InboundFrame>(text) {
        Ok(frame) => {
            let _ = event_tx.send(RelayEvent::from(frame)).await;
        }
        Err(e) => {
            debug!(error = %e, "Unrecognized relay frame");
        }
    }
}
