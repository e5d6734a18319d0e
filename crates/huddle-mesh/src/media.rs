//! Capabilities the mesh consumes from the media stack.
//!
//! The engine never touches codecs, encryption or ICE transport directly.
//! It drives a [`PeerConnection`] per remote participant, opens the
//! microphone through [`MediaCapture`], and samples audio energy from the
//! resulting [`AudioSource`].

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use huddle_common::{MicError, NegotiationError, ParticipantId};
use tokio::sync::mpsc;

use crate::protocol::IceCandidate;
use crate::relay::SignalingRelay;

// ---------------------------------------------------------------------------
// Session descriptions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalingState {
    Stable,
    HaveLocalOffer,
    HaveRemoteOffer,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpKind {
    Offer,
    Answer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Streams
// ---------------------------------------------------------------------------

/// Local microphone capture.
pub trait AudioSource: Send + Sync {
    fn id(&self) -> &str;
    /// A disabled track stays attached to connections but sends silence.
    fn set_enabled(&self, enabled: bool);
    fn is_enabled(&self) -> bool;
    /// Stop all capture tracks. The source is unusable afterwards.
    fn stop(&self);
    /// Fill `buf` with the latest time-domain samples, normalized to `[-1, 1]`.
    fn read_samples(&self, buf: &mut [f32]);
}

pub type LocalAudioStream = Arc<dyn AudioSource>;

impl fmt::Debug for dyn AudioSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioSource")
            .field("id", &self.id())
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// Handle to remote media delivered by a connection.
#[derive(Clone)]
pub struct RemoteAudioStream {
    pub id: String,
    pub track: Arc<dyn Any + Send + Sync>,
}

impl RemoteAudioStream {
    pub fn new(id: impl Into<String>, track: Arc<dyn Any + Send + Sync>) -> Self {
        Self {
            id: id.into(),
            track,
        }
    }
}

impl fmt::Debug for RemoteAudioStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteAudioStream")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl PartialEq for RemoteAudioStream {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

#[async_trait]
pub trait MediaCapture: Send + Sync {
    /// Ask for microphone access. Permission and device failures are distinct.
    async fn open_microphone(&self) -> Result<LocalAudioStream, MicError>;
}

// ---------------------------------------------------------------------------
// Peer connections
// ---------------------------------------------------------------------------

/// What a connection reports back to the mesh.
#[derive(Debug)]
pub enum ConnectionEvent {
    NegotiationNeeded,
    LocalCandidate(IceCandidate),
    RemoteTrack(RemoteAudioStream),
}

/// One direct media link to a remote participant.
///
/// Events are reported through the sender handed to
/// [`PeerConnectionFactory::create`]. Adding a local track must report
/// [`ConnectionEvent::NegotiationNeeded`]. A fresh connection must not
/// report it on its own; the mesh starts the first negotiation itself.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    fn signaling_state(&self) -> SignalingState;
    fn has_remote_description(&self) -> bool;
    fn has_local_audio_sender(&self) -> bool;

    async fn add_local_audio(&self, stream: LocalAudioStream) -> Result<(), NegotiationError>;
    async fn create_offer(&self) -> Result<SessionDescription, NegotiationError>;
    async fn create_answer(&self) -> Result<SessionDescription, NegotiationError>;
    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), NegotiationError>;
    /// Applying a remote offer while in `HaveLocalOffer` rolls the local offer back.
    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), NegotiationError>;
    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), NegotiationError>;
    async fn close(&self);
}

#[async_trait]
pub trait PeerConnectionFactory: Send + Sync {
    async fn create(
        &self,
        peer_id: ParticipantId,
        events: mpsc::UnboundedSender<ConnectionEvent>,
    ) -> Result<Arc<dyn PeerConnection>, NegotiationError>;
}

/// Everything the mesh needs from the outside world.
#[derive(Clone)]
pub struct MeshDeps {
    pub factory: Arc<dyn PeerConnectionFactory>,
    pub relay: Arc<dyn SignalingRelay>,
    pub capture: Arc<dyn MediaCapture>,
}
