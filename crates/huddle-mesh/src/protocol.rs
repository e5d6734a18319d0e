//! Signaling wire protocol for the room audio mesh.
//!
//! Every message is a JSON object carrying `roomId` and `fromId`, plus a
//! `toId` for point-to-point messages. The payload is tagged by `type`:
//!
//! ```json
//! {"type":"offer","roomId":"r1","fromId":5,"toId":9,"sdp":"v=0..."}
//! {"type":"peer-state","roomId":"r1","fromId":5,"muted":true,"speaking":false}
//! ```

use huddle_common::{ParticipantId, RelayError, RoomId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// An ICE candidate as exchanged between peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(rename = "sdpMid", default)]
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex", default)]
    pub sdp_m_line_index: Option<u16>,
    #[serde(rename = "usernameFragment", default)]
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_m_line_index: None,
            username_fragment: None,
        }
    }
}

/// Message body, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SignalPayload {
    Offer { sdp: String },
    Answer { sdp: String },
    IceCandidate(IceCandidate),
    /// Room broadcast of a participant's mute/speaking flags.
    PeerState { muted: bool, speaking: bool },
}

impl SignalPayload {
    /// Offers, answers and candidates target a single peer.
    pub fn is_point_to_point(&self) -> bool {
        !matches!(self, SignalPayload::PeerState { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SignalPayload::Offer { .. } => "offer",
            SignalPayload::Answer { .. } => "answer",
            SignalPayload::IceCandidate(_) => "ice-candidate",
            SignalPayload::PeerState { .. } => "peer-state",
        }
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// A signaling message scoped to a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalMessage {
    #[serde(rename = "roomId")]
    pub room_id: RoomId,
    #[serde(rename = "fromId")]
    pub from_id: ParticipantId,
    /// Absent for room broadcasts.
    #[serde(rename = "toId", default, skip_serializing_if = "Option::is_none")]
    pub to_id: Option<ParticipantId>,
    #[serde(flatten)]
    pub payload: SignalPayload,
}

impl SignalMessage {
    pub fn to_peer(
        room_id: RoomId,
        from_id: ParticipantId,
        to_id: ParticipantId,
        payload: SignalPayload,
    ) -> Self {
        Self {
            room_id,
            from_id,
            to_id: Some(to_id),
            payload,
        }
    }

    pub fn peer_state(room_id: RoomId, from_id: ParticipantId, muted: bool, speaking: bool) -> Self {
        Self {
            room_id,
            from_id,
            to_id: None,
            payload: SignalPayload::PeerState { muted, speaking },
        }
    }

    pub fn to_json(&self) -> Result<String, RelayError> {
        serde_json::to_string(self).map_err(|e| RelayError::Encode(e.to_string()))
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Point-to-point signal delivered to one peer's negotiation task.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerSignal {
    Offer(String),
    Answer(String),
    Candidate(IceCandidate),
}

impl PeerSignal {
    /// `None` for room broadcasts.
    pub fn from_payload(payload: SignalPayload) -> Option<Self> {
        match payload {
            SignalPayload::Offer { sdp } => Some(PeerSignal::Offer(sdp)),
            SignalPayload::Answer { sdp } => Some(PeerSignal::Answer(sdp)),
            SignalPayload::IceCandidate(candidate) => Some(PeerSignal::Candidate(candidate)),
            SignalPayload::PeerState { .. } => None,
        }
    }
}
