//! Per-connection handler: join, register, then route messages.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use huddle_common::{ParticipantId, RoomId};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::protocol::{stamp, RelayHello, RelayResponse};
use crate::session::RoomStore;

type WsStream = tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>;

/// Handle a single WebSocket connection.
pub async fn handle_connection(
    ws: WsStream,
    addr: SocketAddr,
    store: RoomStore,
    hello_timeout: Duration,
) {
    let (mut sink, mut stream) = ws.split();

    // 1. Read the join hello.
    let Some((room_id, participant_id)) = read_hello(&mut stream, addr, hello_timeout).await else {
        let _ = sink
            .send(Message::Text(
                RelayResponse::Error {
                    message: "expected join hello".into(),
                }
                .to_json()
                .into(),
            ))
            .await;
        return;
    };

    // 2. Register, taking over any stale connection for the same participant.
    let conn_id = huddle_common::new_id();
    let (tx, mut rx) = mpsc::channel::<String>(256);
    if let Some(stale) = store.register(&room_id, participant_id, &conn_id, tx).await {
        tracing::info!(
            room_id = %room_id,
            %participant_id,
            "Replacing existing connection"
        );
        let replaced = RelayResponse::Error {
            message: "replaced by a newer connection".into(),
        };
        let _ = stale.try_send(replaced.to_json());
    }

    tracing::info!(
        peer = %addr,
        room_id = %room_id,
        %participant_id,
        "Client joined"
    );

    // 3. Confirm, then tell the room.
    let joined = RelayResponse::Joined {
        room_id: room_id.clone(),
        participant_id,
    };
    if sink
        .send(Message::Text(joined.to_json().into()))
        .await
        .is_err()
    {
        store.unregister(&room_id, participant_id, &conn_id).await;
        store.broadcast_roster(&room_id).await;
        return;
    }
    store.broadcast_roster(&room_id).await;

    // 4. Routing loop.
    loop {
        tokio::select! {
            // Frames for this client
            outgoing = rx.recv() => match outgoing {
                Some(msg) => {
                    if sink.send(Message::Text(msg.into())).await.is_err() {
                        break;
                    }
                }
                // Slot taken over by a newer connection.
                None => break,
            },

            // Frames from this client
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        match stamp(&text, &room_id, participant_id) {
                            Ok(outbound) => {
                                let to_id = outbound.to_id;
                                let delivered = store.route(&room_id, participant_id, outbound).await;
                                tracing::trace!(room_id = %room_id, from = %participant_id, to = ?to_id, delivered, "Routed frame");
                            }
                            Err(e) => {
                                tracing::debug!(peer = %addr, error = %e, "Dropping frame");
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(peer = %addr, error = %e, "WS error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    // 5. Cleanup.
    tracing::info!(
        peer = %addr,
        room_id = %room_id,
        %participant_id,
        "Client disconnected"
    );
    if store.unregister(&room_id, participant_id, &conn_id).await {
        store.broadcast_roster(&room_id).await;
    }
}

/// Read and parse the first message as a join hello.
async fn read_hello(
    stream: &mut futures_util::stream::SplitStream<WsStream>,
    addr: SocketAddr,
    timeout: Duration,
) -> Option<(RoomId, ParticipantId)> {
    let frame = tokio::time::timeout(timeout, stream.next()).await;

    match frame {
        Ok(Some(Ok(Message::Text(text)))) => match serde_json::from_str::<RelayHello>(&text) {
            Ok(RelayHello::Join {
                room_id,
                participant_id,
            }) => Some((room_id, participant_id)),
            Err(e) => {
                tracing::warn!(peer = %addr, error = %e, "Invalid hello message");
                None
            }
        },
        Ok(Some(Ok(_))) => {
            tracing::warn!(peer = %addr, "Expected text hello, got binary");
            None
        }
        Ok(Some(Err(e))) => {
            tracing::warn!(peer = %addr, error = %e, "WS error during hello");
            None
        }
        Ok(None) => {
            tracing::debug!(peer = %addr, "Connection closed before hello");
            None
        }
        Err(_) => {
            tracing::warn!(peer = %addr, ?timeout, "Hello timeout");
            None
        }
    }
}
