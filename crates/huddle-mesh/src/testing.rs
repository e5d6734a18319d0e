//! In-memory stand-ins for the media stack and the relay.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use huddle_common::{MicError, NegotiationError, ParticipantId, RelayError};
use tokio::sync::mpsc;

use crate::media::{
    AudioSource, ConnectionEvent, LocalAudioStream, MediaCapture, MeshDeps, PeerConnection,
    PeerConnectionFactory, RemoteAudioStream, SdpKind, SessionDescription, SignalingState,
};
use crate::protocol::{IceCandidate, SignalMessage, SignalPayload};
use crate::relay::SignalingRelay;

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct ConnectionState {
    signaling: SignalingState,
    remote: Option<SessionDescription>,
    has_sender: bool,
    applied: Vec<IceCandidate>,
    offers: usize,
    fail_offers: bool,
    fail_answers: bool,
    track_received: bool,
    closed: bool,
}

/// Signaling-state machine of a browser peer connection, without media.
///
/// Audio only flows along an offer: an offer made while a local sender is
/// attached is marked `+audio`, and applying such an offer reports one remote
/// track. Answers never carry audio.
pub struct FakeConnection {
    label: String,
    state: Mutex<ConnectionState>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
}

impl FakeConnection {
    pub fn new(label: impl Into<String>, events: mpsc::UnboundedSender<ConnectionEvent>) -> Self {
        Self {
            label: label.into(),
            state: Mutex::new(ConnectionState {
                signaling: SignalingState::Stable,
                remote: None,
                has_sender: false,
                applied: Vec::new(),
                offers: 0,
                fail_offers: false,
                fail_answers: false,
                track_received: false,
                closed: false,
            }),
            events,
        }
    }

    /// Make every offer creation fail.
    pub fn fail_offers(&self) {
        self.state.lock().unwrap().fail_offers = true;
    }

    /// Make every remote answer fail to apply.
    pub fn fail_answers(&self) {
        self.state.lock().unwrap().fail_answers = true;
    }

    /// Report an event as the media stack would.
    pub fn emit(&self, event: ConnectionEvent) {
        let _ = self.events.send(event);
    }

    pub fn deliver_track(&self, id: &str) {
        self.emit(ConnectionEvent::RemoteTrack(RemoteAudioStream::new(
            id,
            Arc::new(id.to_string()),
        )));
    }

    pub fn applied_candidates(&self) -> Vec<IceCandidate> {
        self.state.lock().unwrap().applied.clone()
    }

    pub fn offers_created(&self) -> usize {
        self.state.lock().unwrap().offers
    }

    pub fn remote_description(&self) -> Option<SessionDescription> {
        self.state.lock().unwrap().remote.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }
}

#[async_trait]
impl PeerConnection for FakeConnection {
    fn signaling_state(&self) -> SignalingState {
        self.state.lock().unwrap().signaling
    }

    fn has_remote_description(&self) -> bool {
        self.state.lock().unwrap().remote.is_some()
    }

    fn has_local_audio_sender(&self) -> bool {
        self.state.lock().unwrap().has_sender
    }

    async fn add_local_audio(&self, _stream: LocalAudioStream) -> Result<(), NegotiationError> {
        {
            let mut state = self.state.lock().unwrap();
            if state.closed {
                return Err(NegotiationError::Closed);
            }
            state.has_sender = true;
        }
        self.emit(ConnectionEvent::NegotiationNeeded);
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription, NegotiationError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_offers {
            return Err(NegotiationError::Connection("offer creation failed".into()));
        }
        state.offers += 1;
        let audio = if state.has_sender { "+audio" } else { "" };
        Ok(SessionDescription::offer(format!(
            "offer:{}:{}{audio}",
            self.label, state.offers
        )))
    }

    async fn create_answer(&self) -> Result<SessionDescription, NegotiationError> {
        let state = self.state.lock().unwrap();
        if state.signaling != SignalingState::HaveRemoteOffer {
            return Err(NegotiationError::Sdp("no remote offer to answer".into()));
        }
        Ok(SessionDescription::answer(format!("answer:{}", self.label)))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), NegotiationError> {
        let mut state = self.state.lock().unwrap();
        state.signaling = match (desc.kind, state.signaling) {
            (SdpKind::Offer, SignalingState::Stable) => SignalingState::HaveLocalOffer,
            (SdpKind::Answer, SignalingState::HaveRemoteOffer) => SignalingState::Stable,
            (kind, current) => {
                return Err(NegotiationError::Sdp(format!(
                    "cannot set local {kind:?} in {current:?}"
                )))
            }
        };
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), NegotiationError> {
        let mut state = self.state.lock().unwrap();
        state.signaling = match (desc.kind, state.signaling) {
            // Implicit rollback of a local offer.
            (SdpKind::Offer, SignalingState::Stable | SignalingState::HaveLocalOffer) => {
                SignalingState::HaveRemoteOffer
            }
            (SdpKind::Answer, SignalingState::HaveLocalOffer) if state.fail_answers => {
                return Err(NegotiationError::Sdp("malformed answer".into()))
            }
            (SdpKind::Answer, SignalingState::HaveLocalOffer) => SignalingState::Stable,
            (kind, current) => {
                return Err(NegotiationError::Sdp(format!(
                    "cannot set remote {kind:?} in {current:?}"
                )))
            }
        };
        let carries_audio = desc.kind == SdpKind::Offer && desc.sdp.ends_with("+audio");
        state.remote = Some(desc);
        if carries_audio && !state.track_received {
            state.track_received = true;
            self.deliver_track(&format!("{}-remote", self.label));
        }
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), NegotiationError> {
        let mut state = self.state.lock().unwrap();
        if state.remote.is_none() {
            return Err(NegotiationError::Candidate("no remote description".into()));
        }
        if candidate.candidate.is_empty() {
            return Err(NegotiationError::Candidate("empty candidate".into()));
        }
        state.applied.push(candidate);
        Ok(())
    }

    async fn close(&self) {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        state.signaling = SignalingState::Closed;
    }
}

/// Hands out [`FakeConnection`]s and keeps them for inspection.
#[derive(Default)]
pub struct FakeFactory {
    label: String,
    connections: Mutex<HashMap<ParticipantId, Arc<FakeConnection>>>,
    created: AtomicUsize,
}

impl FakeFactory {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    /// The latest connection opened towards `peer_id`.
    pub fn connection(&self, peer_id: ParticipantId) -> Option<Arc<FakeConnection>> {
        self.connections.lock().unwrap().get(&peer_id).cloned()
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PeerConnectionFactory for FakeFactory {
    async fn create(
        &self,
        peer_id: ParticipantId,
        events: mpsc::UnboundedSender<ConnectionEvent>,
    ) -> Result<Arc<dyn PeerConnection>, NegotiationError> {
        let connection = Arc::new(FakeConnection::new(
            format!("{}->{}", self.label, peer_id),
            events,
        ));
        self.connections
            .lock()
            .unwrap()
            .insert(peer_id, Arc::clone(&connection));
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(connection)
    }
}

// ---------------------------------------------------------------------------
// Relay
// ---------------------------------------------------------------------------

/// Records every outbound message, optionally forwarding a copy.
#[derive(Default)]
pub struct RecordingRelay {
    sent: Mutex<Vec<SignalMessage>>,
    forward: Option<mpsc::UnboundedSender<SignalMessage>>,
}

impl RecordingRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forwarding(forward: mpsc::UnboundedSender<SignalMessage>) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            forward: Some(forward),
        }
    }

    pub fn messages(&self) -> Vec<SignalMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Payloads of `peer-state` broadcasts, oldest first.
    pub fn peer_states(&self) -> Vec<(bool, bool)> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m.payload {
                SignalPayload::PeerState { muted, speaking } => Some((muted, speaking)),
                _ => None,
            })
            .collect()
    }

    /// Point-to-point messages of one kind sent to `to_id`.
    pub fn sent_to(&self, to_id: ParticipantId, kind: &str) -> Vec<SignalMessage> {
        self.messages()
            .into_iter()
            .filter(|m| m.to_id == Some(to_id) && m.payload.kind() == kind)
            .collect()
    }
}

#[async_trait]
impl SignalingRelay for RecordingRelay {
    async fn send(&self, message: SignalMessage) -> Result<(), RelayError> {
        self.sent.lock().unwrap().push(message.clone());
        if let Some(forward) = &self.forward {
            forward.send(message).map_err(|_| RelayError::Closed)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Audio
// ---------------------------------------------------------------------------

/// A microphone producing a square wave of configurable amplitude.
pub struct FakeAudioSource {
    id: String,
    level: Mutex<f32>,
    enabled: AtomicBool,
    stopped: AtomicBool,
}

impl FakeAudioSource {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            level: Mutex::new(0.0),
            enabled: AtomicBool::new(true),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn set_level(&self, level: f32) {
        *self.level.lock().unwrap() = level;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl AudioSource for FakeAudioSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn read_samples(&self, buf: &mut [f32]) {
        let level = if self.is_enabled() && !self.is_stopped() {
            *self.level.lock().unwrap()
        } else {
            0.0
        };
        for (i, sample) in buf.iter_mut().enumerate() {
            *sample = if i % 2 == 0 { level } else { -level };
        }
    }
}

/// Grants or denies the microphone on demand.
pub struct FakeCapture {
    source: Arc<FakeAudioSource>,
    failure: Mutex<Option<MicError>>,
    opened: AtomicUsize,
}

impl FakeCapture {
    pub fn new(source: Arc<FakeAudioSource>) -> Self {
        Self {
            source,
            failure: Mutex::new(None),
            opened: AtomicUsize::new(0),
        }
    }

    pub fn fail_with(&self, failure: Option<MicError>) {
        *self.failure.lock().unwrap() = failure;
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaCapture for FakeCapture {
    async fn open_microphone(&self) -> Result<LocalAudioStream, MicError> {
        if let Some(e) = self.failure.lock().unwrap().clone() {
            return Err(e);
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::clone(&self.source) as LocalAudioStream)
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// One participant's fakes, wired into [`MeshDeps`].
pub struct Rig {
    pub factory: Arc<FakeFactory>,
    pub relay: Arc<RecordingRelay>,
    pub capture: Arc<FakeCapture>,
    pub mic: Arc<FakeAudioSource>,
}

impl Rig {
    pub fn new(label: &str) -> Self {
        Self::with_relay(label, RecordingRelay::new())
    }

    pub fn with_relay(label: &str, relay: RecordingRelay) -> Self {
        let mic = Arc::new(FakeAudioSource::new(format!("{label}-mic")));
        Self {
            factory: Arc::new(FakeFactory::new(label)),
            relay: Arc::new(relay),
            capture: Arc::new(FakeCapture::new(Arc::clone(&mic))),
            mic,
        }
    }

    pub fn deps(&self) -> MeshDeps {
        MeshDeps {
            factory: self.factory.clone(),
            relay: self.relay.clone(),
            capture: self.capture.clone(),
        }
    }
}
