//! State of one active room membership.

use std::collections::HashMap;

use huddle_common::{MicError, ParticipantId, RoomId};
use tracing::{debug, warn};

use crate::media::{LocalAudioStream, RemoteAudioStream};
use crate::peer::PeerSet;
use crate::protocol::{PeerSignal, SignalMessage, SignalPayload};
use crate::state::{RemotePeerStates, StatePropagator};
use crate::vad::Sampler;

use super::actor::RoomNotice;
use super::types::RoomSnapshot;

/// Where an accepted inbound message goes.
#[derive(Debug)]
pub(super) enum Inbound {
    PeerState {
        peer_id: ParticipantId,
        muted: bool,
        speaking: bool,
    },
    Signal {
        peer_id: ParticipantId,
        signal: PeerSignal,
    },
}

pub(super) struct RoomSession {
    pub room_id: RoomId,
    pub self_id: ParticipantId,
    pub roster: Vec<ParticipantId>,
    pub local_muted: bool,
    pub local_speaking: bool,
    pub local_stream: Option<LocalAudioStream>,
    pub mic_error: Option<MicError>,
    pub remote: RemotePeerStates,
    pub remote_streams: HashMap<ParticipantId, RemoteAudioStream>,
    pub peers: PeerSet<RoomNotice>,
    pub propagator: StatePropagator,
    pub sampler: Option<Sampler>,
}

impl RoomSession {
    pub fn new(
        room_id: RoomId,
        self_id: ParticipantId,
        peers: PeerSet<RoomNotice>,
        propagator: StatePropagator,
    ) -> Self {
        Self {
            room_id,
            self_id,
            roster: Vec::new(),
            local_muted: true,
            local_speaking: false,
            local_stream: None,
            mic_error: None,
            remote: RemotePeerStates::new(),
            remote_streams: HashMap::new(),
            peers,
            propagator,
            sampler: None,
        }
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_id: Some(self.room_id.clone()),
            self_id: Some(self.self_id),
            roster: self.roster.clone(),
            local_muted: self.local_muted,
            local_speaking: self.local_speaking,
            mic_error: self.mic_error.clone(),
            remote_muted: self.remote.muted().clone(),
            remote_speaking: self.remote.speaking().clone(),
            remote_streams: self.remote_streams.clone(),
            peers: self.peers.ids(),
        }
    }

    /// Everyone in the roster except ourselves.
    pub fn remote_ids(&self) -> Vec<ParticipantId> {
        self.roster
            .iter()
            .copied()
            .filter(|id| *id != self.self_id)
            .collect()
    }

    pub fn in_roster(&self, peer_id: ParticipantId) -> bool {
        self.roster.contains(&peer_id)
    }

    /// Close the peer session and drop every trace of the peer.
    pub async fn forget_peer(&mut self, peer_id: ParticipantId) -> bool {
        let removed = self.peers.remove_peer(peer_id).await;
        self.remote.forget(peer_id);
        self.remote_streams.remove(&peer_id);
        removed
    }

    /// Broadcast the current local flags. Relay failures are logged.
    pub async fn broadcast_local(&self) {
        if let Err(e) = self
            .propagator
            .broadcast(self.local_muted, self.local_speaking)
            .await
        {
            warn!(room_id = %self.room_id, error = %e, "Failed to broadcast local state");
        }
    }

    /// Stop voice activity sampling. Returns true if we were reporting speech.
    pub fn stop_sampler(&mut self) -> bool {
        self.sampler = None;
        std::mem::replace(&mut self.local_speaking, false)
    }

    /// Decide whether an inbound message is for us.
    pub fn route(&self, message: SignalMessage) -> Option<Inbound> {
        let kind = message.payload.kind();
        if message.room_id != self.room_id {
            debug!(kind, room_id = %message.room_id, "Dropping message for another room");
            return None;
        }
        if message.from_id == self.self_id {
            return None;
        }

        let peer_id = message.from_id;
        match message.payload {
            SignalPayload::PeerState { muted, speaking } => {
                if !self.in_roster(peer_id) {
                    debug!(%peer_id, "Dropping peer-state from participant outside the roster");
                    return None;
                }
                Some(Inbound::PeerState {
                    peer_id,
                    muted,
                    speaking,
                })
            }
            payload => {
                if message.to_id != Some(self.self_id) {
                    debug!(kind, %peer_id, to_id = ?message.to_id, "Dropping signal for another recipient");
                    return None;
                }
                if !self.peers.contains(peer_id) {
                    debug!(kind, %peer_id, "Dropping signal from participant without a session");
                    return None;
                }
                PeerSignal::from_payload(payload).map(|signal| Inbound::Signal { peer_id, signal })
            }
        }
    }
}
