//! The per-peer negotiation task.

use huddle_common::ParticipantId;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::media::{ConnectionEvent, LocalAudioStream, RemoteAudioStream};
use crate::negotiation::{NegotiationEvent, Negotiator};
use crate::protocol::PeerSignal;

/// Messages from the room to one peer task.
#[derive(Debug)]
pub(crate) enum PeerInput {
    Signal(PeerSignal),
    /// Start first contact.
    Negotiate,
    AttachLocalAudio(LocalAudioStream),
}

/// Reports from a peer task back to the room.
#[derive(Debug)]
pub(crate) enum PeerNotice {
    RemoteStream {
        peer_id: ParticipantId,
        generation: u64,
        stream: RemoteAudioStream,
    },
}

pub(crate) async fn run_peer<T>(
    mut negotiator: Negotiator,
    generation: u64,
    mut inputs: mpsc::UnboundedReceiver<PeerInput>,
    mut events: mpsc::UnboundedReceiver<ConnectionEvent>,
    notices: mpsc::Sender<T>,
) where
    T: From<PeerNotice> + Send + 'static,
{
    let peer_id = negotiator.peer_id();

    loop {
        let event = tokio::select! {
            input = inputs.recv() => {
                let Some(input) = input else { break };
                match input {
                    PeerInput::Signal(signal) => Some(NegotiationEvent::from(signal)),
                    PeerInput::Negotiate => Some(NegotiationEvent::NegotiationNeeded),
                    PeerInput::AttachLocalAudio(stream) => {
                        let connection = negotiator.session().connection.clone();
                        match connection.add_local_audio(stream).await {
                            // The connection reports NegotiationNeeded itself.
                            Ok(()) => None,
                            Err(e) => {
                                warn!(%peer_id, error = %e, "Failed to attach local audio");
                                Some(NegotiationEvent::NegotiationNeeded)
                            }
                        }
                    }
                }
            }
            Some(event) = events.recv() => match event {
                ConnectionEvent::NegotiationNeeded => Some(NegotiationEvent::NegotiationNeeded),
                ConnectionEvent::LocalCandidate(candidate) => {
                    Some(NegotiationEvent::LocalCandidate(candidate))
                }
                ConnectionEvent::RemoteTrack(stream) => {
                    let notice = PeerNotice::RemoteStream {
                        peer_id,
                        generation,
                        stream,
                    };
                    if notices.send(notice.into()).await.is_err() {
                        break;
                    }
                    None
                }
            },
        };

        let Some(event) = event else { continue };
        match negotiator.handle(event).await {
            Ok(outcome) => debug!(%peer_id, ?outcome, "Negotiation step"),
            Err(e) => warn!(%peer_id, error = %e, "Negotiation failed for peer"),
        }
    }

    debug!(%peer_id, generation, "Peer task finished");
}
