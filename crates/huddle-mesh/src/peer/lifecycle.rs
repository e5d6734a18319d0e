//! Creation and teardown of peer sessions.

use std::collections::HashMap;
use std::sync::Arc;

use huddle_common::{NegotiationError, ParticipantId, RoomId};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::media::{LocalAudioStream, PeerConnection, PeerConnectionFactory};
use crate::negotiation::{Negotiator, PeerSession};
use crate::relay::SignalingRelay;

use super::task::{run_peer, PeerInput, PeerNotice};

/// What every peer task of one room shares.
pub(crate) struct PeerContext<T> {
    pub room_id: RoomId,
    pub self_id: ParticipantId,
    pub relay: Arc<dyn SignalingRelay>,
    pub factory: Arc<dyn PeerConnectionFactory>,
    pub notices: mpsc::Sender<T>,
}

/// The room's side of one running peer task.
pub(crate) struct PeerHandle {
    pub peer_id: ParticipantId,
    pub generation: u64,
    inputs: mpsc::UnboundedSender<PeerInput>,
    connection: Arc<dyn PeerConnection>,
    task: JoinHandle<()>,
}

impl PeerHandle {
    /// Queue an input for the task. False if the task is gone.
    pub(crate) fn send(&self, input: PeerInput) -> bool {
        self.inputs.send(input).is_ok()
    }

    /// Cancel in-flight negotiation, then close the connection.
    async fn close(self) {
        self.task.abort();
        self.connection.close().await;
        debug!(peer_id = %self.peer_id, generation = self.generation, "Peer connection closed");
    }
}

/// All live peer sessions of a room, keyed by remote participant.
pub(crate) struct PeerSet<T> {
    context: PeerContext<T>,
    peers: HashMap<ParticipantId, PeerHandle>,
    next_generation: u64,
}

impl<T> PeerSet<T>
where
    T: From<PeerNotice> + Send + 'static,
{
    pub(crate) fn new(context: PeerContext<T>) -> Self {
        Self {
            context,
            peers: HashMap::new(),
            next_generation: 0,
        }
    }

    /// Create a session for `peer_id` unless one exists.
    ///
    /// Returns true if a session was created. With a local stream the
    /// track is attached straight away so it rides the first offer;
    /// without one the task is kicked to make first contact if it is the
    /// deterministic offerer.
    pub(crate) async fn ensure_peer(
        &mut self,
        peer_id: ParticipantId,
        local_audio: Option<&LocalAudioStream>,
    ) -> Result<bool, NegotiationError> {
        if self.peers.contains_key(&peer_id) {
            return Ok(false);
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let connection = self.context.factory.create(peer_id, event_tx).await?;
        let session = PeerSession::new(self.context.self_id, peer_id, Arc::clone(&connection));
        let polite = session.polite;
        let negotiator = Negotiator::new(
            self.context.room_id.clone(),
            self.context.self_id,
            session,
            Arc::clone(&self.context.relay),
        );

        self.next_generation += 1;
        let generation = self.next_generation;
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_peer(
            negotiator,
            generation,
            input_rx,
            event_rx,
            self.context.notices.clone(),
        ));

        let handle = PeerHandle {
            peer_id,
            generation,
            inputs: input_tx,
            connection,
            task,
        };
        match local_audio {
            Some(stream) => handle.send(PeerInput::AttachLocalAudio(Arc::clone(stream))),
            None => handle.send(PeerInput::Negotiate),
        };

        info!(
            room_id = %self.context.room_id,
            %peer_id,
            polite,
            generation,
            "Peer session created"
        );
        self.peers.insert(peer_id, handle);
        Ok(true)
    }

    /// Tear down the session for `peer_id`. No-op if there is none.
    pub(crate) async fn remove_peer(&mut self, peer_id: ParticipantId) -> bool {
        let Some(handle) = self.peers.remove(&peer_id) else {
            return false;
        };
        handle.close().await;
        info!(room_id = %self.context.room_id, %peer_id, "Peer session removed");
        true
    }

    pub(crate) async fn remove_all(&mut self) {
        for (_, handle) in self.peers.drain() {
            handle.close().await;
        }
    }

    pub(crate) fn get(&self, peer_id: ParticipantId) -> Option<&PeerHandle> {
        self.peers.get(&peer_id)
    }

    pub(crate) fn contains(&self, peer_id: ParticipantId) -> bool {
        self.peers.contains_key(&peer_id)
    }

    pub(crate) fn ids(&self) -> Vec<ParticipantId> {
        let mut ids: Vec<_> = self.peers.keys().copied().collect();
        ids.sort();
        ids
    }

    pub(crate) fn len(&self) -> usize {
        self.peers.len()
    }

    /// Attach a freshly opened microphone to every live connection.
    pub(crate) fn attach_local_audio(&self, stream: &LocalAudioStream) {
        for handle in self.peers.values() {
            if !handle.send(PeerInput::AttachLocalAudio(Arc::clone(stream))) {
                debug!(peer_id = %handle.peer_id, "Peer task gone, skipping track attach");
            }
        }
    }

    /// Whether a notice tagged with `generation` still belongs to a live session.
    pub(crate) fn is_current(&self, peer_id: ParticipantId, generation: u64) -> bool {
        self.peers
            .get(&peer_id)
            .is_some_and(|handle| handle.generation == generation)
    }
}
