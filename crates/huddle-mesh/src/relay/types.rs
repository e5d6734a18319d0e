//! Relay trait, events, and the control frames spoken with `huddle-relay`.

use async_trait::async_trait;
use huddle_common::{ParticipantId, RelayError, RoomId};
use serde::{Deserialize, Serialize};

use crate::protocol::SignalMessage;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Outbound half of the relay.
///
/// Messages with a `toId` reach that participant only; messages without
/// reach every other participant of the room. Delivery is ordered per
/// sender and recipient pair. `send` is called from the room actor and
/// peer tasks, so it must queue rather than wait on the network.
#[async_trait]
pub trait SignalingRelay: Send + Sync {
    async fn send(&self, message: SignalMessage) -> Result<(), RelayError>;
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Inbound traffic from the relay.
#[derive(Debug, Clone)]
pub enum RelayEvent {
    /// Transport connected; the join hello has been sent.
    Connected,
    /// The relay accepted our join.
    Joined {
        room_id: RoomId,
        participant_id: ParticipantId,
    },
    /// Authoritative participant list, including ourselves.
    Roster(Vec<ParticipantId>),
    Signal(SignalMessage),
    Disconnected,
    Error(String),
}

// ---------------------------------------------------------------------------
// Control frames
// ---------------------------------------------------------------------------

/// First frame a client sends.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayHello {
    Join {
        #[serde(rename = "roomId")]
        room_id: RoomId,
        #[serde(rename = "participantId")]
        participant_id: ParticipantId,
    },
}

/// Frames the relay itself originates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayControl {
    Joined {
        #[serde(rename = "roomId")]
        room_id: RoomId,
        #[serde(rename = "participantId")]
        participant_id: ParticipantId,
    },
    Roster { participants: Vec<ParticipantId> },
    Error { message: String },
}

/// Anything the relay can deliver to a client.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum InboundFrame {
    Control(RelayControl),
    Signal(SignalMessage),
}

impl From<InboundFrame> for RelayEvent {
    fn from(frame: InboundFrame) -> Self {
        match frame {
            InboundFrame::Control(RelayControl::Joined {
                room_id,
                participant_id,
            }) => RelayEvent::Joined {
                room_id,
                participant_id,
            },
            InboundFrame::Control(RelayControl::Roster { participants }) => {
                RelayEvent::Roster(participants)
            }
            InboundFrame::Control(RelayControl::Error { message }) => RelayEvent::Error(message),
            InboundFrame::Signal(message) => RelayEvent::Signal(message),
        }
    }
}
