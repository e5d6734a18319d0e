//! Room session types: runtime config, snapshot, and UI events.

use std::collections::HashMap;

use huddle_common::{MicError, ParticipantId, RoomId};
use huddle_config::HuddleConfig;

use crate::media::RemoteAudioStream;
use crate::vad::SamplerConfig;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MeshConfig {
    pub command_capacity: usize,
    pub event_capacity: usize,
    /// Soft limit; larger rosters are applied but logged.
    pub max_participants: usize,
    pub sampler: SamplerConfig,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self::from(&HuddleConfig::default())
    }
}

impl From<&HuddleConfig> for MeshConfig {
    fn from(config: &HuddleConfig) -> Self {
        Self {
            command_capacity: config.mesh.command_capacity.max(1) as usize,
            event_capacity: config.mesh.event_capacity.max(1) as usize,
            max_participants: config.mesh.max_participants as usize,
            sampler: SamplerConfig::from(&config.voice_activity),
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Read-only view of the room session, published after every change.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomSnapshot {
    pub room_id: Option<RoomId>,
    pub self_id: Option<ParticipantId>,
    pub roster: Vec<ParticipantId>,
    pub local_muted: bool,
    pub local_speaking: bool,
    pub mic_error: Option<MicError>,
    pub remote_muted: HashMap<ParticipantId, bool>,
    pub remote_speaking: HashMap<ParticipantId, bool>,
    pub remote_streams: HashMap<ParticipantId, RemoteAudioStream>,
    /// Participants with a live peer session, sorted.
    pub peers: Vec<ParticipantId>,
}

impl Default for RoomSnapshot {
    fn default() -> Self {
        Self {
            room_id: None,
            self_id: None,
            roster: Vec::new(),
            local_muted: true,
            local_speaking: false,
            mic_error: None,
            remote_muted: HashMap::new(),
            remote_speaking: HashMap::new(),
            remote_streams: HashMap::new(),
            peers: Vec::new(),
        }
    }
}

impl RoomSnapshot {
    pub fn in_room(&self) -> bool {
        self.room_id.is_some()
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Events emitted by the mesh engine for the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum MeshEvent {
    Joined {
        room_id: RoomId,
        self_id: ParticipantId,
    },
    Left {
        room_id: RoomId,
    },
    PeerAdded {
        peer_id: ParticipantId,
        polite: bool,
    },
    PeerRemoved {
        peer_id: ParticipantId,
    },
    RemoteStream {
        peer_id: ParticipantId,
        stream: RemoteAudioStream,
    },
    RemoteStateChanged {
        peer_id: ParticipantId,
        muted: bool,
        speaking: bool,
    },
    LocalStateChanged {
        muted: bool,
        speaking: bool,
    },
    MicrophoneError(MicError),
}
