//! Out-of-band mute/speaking propagation.
//!
//! Local flags are broadcast to the whole room as `peer-state` messages;
//! remote flags are whatever each peer last reported about itself. Nothing
//! here is inferred from media.

use std::collections::HashMap;
use std::sync::Arc;

use huddle_common::{ParticipantId, RelayError, RoomId};
use tracing::debug;

use crate::protocol::SignalMessage;
use crate::relay::SignalingRelay;

/// Broadcasts this participant's flags to the room.
pub struct StatePropagator {
    room_id: RoomId,
    self_id: ParticipantId,
    relay: Arc<dyn SignalingRelay>,
}

impl StatePropagator {
    pub fn new(room_id: RoomId, self_id: ParticipantId, relay: Arc<dyn SignalingRelay>) -> Self {
        Self {
            room_id,
            self_id,
            relay,
        }
    }

    /// A muted participant never reports itself as speaking.
    pub async fn broadcast(&self, muted: bool, speaking: bool) -> Result<(), RelayError> {
        let speaking = speaking && !muted;
        debug!(room_id = %self.room_id, muted, speaking, "Broadcasting local state");
        self.relay
            .send(SignalMessage::peer_state(
                self.room_id.clone(),
                self.self_id,
                muted,
                speaking,
            ))
            .await
    }
}

/// Last reported flags of every remote participant.
#[derive(Debug, Clone, Default)]
pub struct RemotePeerStates {
    muted: HashMap<ParticipantId, bool>,
    speaking: HashMap<ParticipantId, bool>,
}

impl RemotePeerStates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a report. Returns true if anything changed.
    pub fn apply(&mut self, peer_id: ParticipantId, muted: bool, speaking: bool) -> bool {
        let previous_muted = self.muted.insert(peer_id, muted);
        let previous_speaking = self.speaking.insert(peer_id, speaking);
        previous_muted != Some(muted) || previous_speaking != Some(speaking)
    }

    /// Drop everything known about a peer.
    pub fn forget(&mut self, peer_id: ParticipantId) {
        self.muted.remove(&peer_id);
        self.speaking.remove(&peer_id);
    }

    pub fn muted(&self) -> &HashMap<ParticipantId, bool> {
        &self.muted
    }

    pub fn speaking(&self) -> &HashMap<ParticipantId, bool> {
        &self.speaking
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::SignalPayload;
    use crate::testing::RecordingRelay;

    #[tokio::test]
    async fn muting_forces_speaking_false() {
        let relay = Arc::new(RecordingRelay::new());
        let propagator = StatePropagator::new(RoomId::from("r1"), ParticipantId(5), relay.clone());

        propagator.broadcast(true, true).await.unwrap();

        let sent = relay.messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to_id, None);
        assert_eq!(
            sent[0].payload,
            SignalPayload::PeerState {
                muted: true,
                speaking: false
            }
        );
    }

    #[test]
    fn apply_reports_changes_only() {
        let mut states = RemotePeerStates::new();
        assert!(states.apply(ParticipantId(9), false, true));
        assert!(!states.apply(ParticipantId(9), false, true));
        assert!(states.apply(ParticipantId(9), false, false));
        assert_eq!(states.speaking().get(&ParticipantId(9)), Some(&false));
    }

    #[test]
    fn forget_clears_both_maps() {
        let mut states = RemotePeerStates::new();
        states.apply(ParticipantId(9), true, false);
        states.apply(ParticipantId(11), false, true);
        states.forget(ParticipantId(9));
        assert!(!states.muted().contains_key(&ParticipantId(9)));
        assert!(!states.speaking().contains_key(&ParticipantId(9)));
        assert!(states.muted().contains_key(&ParticipantId(11)));
    }
}
