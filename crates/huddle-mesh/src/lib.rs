//! Room audio mesh negotiation engine.
//!
//! Every participant of a voice room holds a direct audio link to every
//! other participant. This crate keeps those links in step with the room
//! roster, negotiates each one with the "perfect negotiation" pattern over a
//! signaling relay, and propagates mute and speaking flags out of band.
//!
//! The media stack itself is consumed through the traits in [`media`]; the
//! relay through [`relay::SignalingRelay`].

pub mod media;
pub mod negotiation;
pub mod protocol;
pub mod relay;
pub mod roster;
pub mod state;
pub mod vad;

mod peer;
mod room;

#[cfg(test)]
mod testing;

pub use media::{
    AudioSource, ConnectionEvent, LocalAudioStream, MediaCapture, MeshDeps, PeerConnection,
    PeerConnectionFactory, RemoteAudioStream, SessionDescription, SignalingState,
};
pub use negotiation::{NegotiationEvent, NegotiationOutcome, Negotiator, PeerSession};
pub use protocol::{IceCandidate, SignalMessage, SignalPayload};
pub use relay::{RelayClientConfig, RelayEvent, SignalingRelay, WsRelay};
pub use room::{MeshConfig, MeshEvent, RoomSnapshot, VoiceMesh};
pub use roster::{diff_roster, RosterDiff};
pub use vad::{rms, SamplerConfig, SpeakingDetector};
