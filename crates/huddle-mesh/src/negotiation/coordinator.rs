//! Per-peer "perfect negotiation" state machine.
//!
//! Each pair resolves offer collisions on its own using only the two
//! participant ids: the higher id is polite and yields, the lower id is
//! impolite and keeps its own offer. The lower id also makes first contact.

use std::sync::Arc;

use huddle_common::{NegotiationError, ParticipantId, RoomId};
use tracing::{debug, warn};

use crate::media::{PeerConnection, SessionDescription, SignalingState};
use crate::protocol::{IceCandidate, PeerSignal, SignalMessage, SignalPayload};
use crate::relay::SignalingRelay;

use super::ice_buffer::CandidateBuffer;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Negotiation state for one remote participant.
pub struct PeerSession {
    pub peer_id: ParticipantId,
    /// Fixed at creation from the id pair.
    pub polite: bool,
    pub making_offer: bool,
    /// Set when the last incoming offer was dropped on collision.
    pub ignore_offer: bool,
    pub pending_candidates: CandidateBuffer,
    pub connection: Arc<dyn PeerConnection>,
}

impl PeerSession {
    pub fn new(
        self_id: ParticipantId,
        peer_id: ParticipantId,
        connection: Arc<dyn PeerConnection>,
    ) -> Self {
        Self {
            peer_id,
            polite: self_id.is_polite_towards(peer_id),
            making_offer: false,
            ignore_offer: false,
            pending_candidates: CandidateBuffer::new(),
            connection,
        }
    }
}

/// Inputs to the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum NegotiationEvent {
    NegotiationNeeded,
    LocalCandidate(IceCandidate),
    RemoteOffer(String),
    RemoteAnswer(String),
    RemoteCandidate(IceCandidate),
}

impl From<PeerSignal> for NegotiationEvent {
    fn from(signal: PeerSignal) -> Self {
        match signal {
            PeerSignal::Offer(sdp) => NegotiationEvent::RemoteOffer(sdp),
            PeerSignal::Answer(sdp) => NegotiationEvent::RemoteAnswer(sdp),
            PeerSignal::Candidate(candidate) => NegotiationEvent::RemoteCandidate(candidate),
        }
    }
}

/// Which branch an event took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationOutcome {
    OfferSent,
    /// Not the deterministic offerer and nothing to send.
    OfferNotNeeded,
    /// An offer is already in flight; retried once the connection is stable.
    OfferDeferred,
    /// Impolite side dropped a colliding offer.
    OfferIgnored,
    AnswerSent { collision: bool },
    AnswerApplied,
    /// No local offer in flight to answer.
    AnswerIgnored,
    CandidateForwarded,
    CandidateApplied,
    CandidateQueued,
    /// Candidate belonged to an ignored offer.
    CandidateDiscarded,
}

// ---------------------------------------------------------------------------
// Negotiator
// ---------------------------------------------------------------------------

pub struct Negotiator {
    room_id: RoomId,
    self_id: ParticipantId,
    session: PeerSession,
    relay: Arc<dyn SignalingRelay>,
    renegotiate_when_stable: bool,
}

impl Negotiator {
    pub fn new(
        room_id: RoomId,
        self_id: ParticipantId,
        session: PeerSession,
        relay: Arc<dyn SignalingRelay>,
    ) -> Self {
        Self {
            room_id,
            self_id,
            session,
            relay,
            renegotiate_when_stable: false,
        }
    }

    pub fn session(&self) -> &PeerSession {
        &self.session
    }

    #[cfg(test)]
    pub(crate) fn session_mut(&mut self) -> &mut PeerSession {
        &mut self.session
    }

    pub fn peer_id(&self) -> ParticipantId {
        self.session.peer_id
    }

    /// Advance the state machine by one event.
    pub async fn handle(
        &mut self,
        event: NegotiationEvent,
    ) -> Result<NegotiationOutcome, NegotiationError> {
        match event {
            NegotiationEvent::NegotiationNeeded => self.on_negotiation_needed().await,
            NegotiationEvent::LocalCandidate(candidate) => {
                self.send(SignalPayload::IceCandidate(candidate)).await;
                Ok(NegotiationOutcome::CandidateForwarded)
            }
            NegotiationEvent::RemoteOffer(sdp) => self.on_remote_offer(sdp).await,
            NegotiationEvent::RemoteAnswer(sdp) => self.on_remote_answer(sdp).await,
            NegotiationEvent::RemoteCandidate(candidate) => self.on_remote_candidate(candidate).await,
        }
    }

    async fn on_negotiation_needed(&mut self) -> Result<NegotiationOutcome, NegotiationError> {
        let connection = Arc::clone(&self.session.connection);
        let peer_id = self.session.peer_id;

        if !self.self_id.is_deterministic_offerer(peer_id) && !connection.has_local_audio_sender() {
            debug!(%peer_id, "Negotiation needed but nothing to send, waiting for remote offer");
            return Ok(NegotiationOutcome::OfferNotNeeded);
        }

        if self.session.making_offer || connection.signaling_state() != SignalingState::Stable {
            debug!(%peer_id, "Negotiation already in flight, deferring");
            self.renegotiate_when_stable = true;
            return Ok(NegotiationOutcome::OfferDeferred);
        }

        self.session.making_offer = true;
        let result = self.make_offer(connection.as_ref()).await;
        self.session.making_offer = false;
        result
    }

    async fn make_offer(
        &self,
        connection: &dyn PeerConnection,
    ) -> Result<NegotiationOutcome, NegotiationError> {
        let offer = connection.create_offer().await?;
        connection.set_local_description(offer.clone()).await?;
        debug!(peer_id = %self.session.peer_id, "Sending offer");
        self.send(SignalPayload::Offer { sdp: offer.sdp }).await;
        Ok(NegotiationOutcome::OfferSent)
    }

    async fn on_remote_offer(&mut self, sdp: String) -> Result<NegotiationOutcome, NegotiationError> {
        let connection = Arc::clone(&self.session.connection);
        let peer_id = self.session.peer_id;

        let collision =
            self.session.making_offer || connection.signaling_state() != SignalingState::Stable;
        self.session.ignore_offer = !self.session.polite && collision;
        if self.session.ignore_offer {
            debug!(%peer_id, "Offer collision, impolite side keeps its own offer");
            return Ok(NegotiationOutcome::OfferIgnored);
        }

        if collision {
            debug!(%peer_id, "Offer collision, polite side rolls back");
            // The rolled-back offer may have been the one carrying our track.
            if connection.has_local_audio_sender() {
                self.renegotiate_when_stable = true;
            }
        }
        connection
            .set_remote_description(SessionDescription::offer(sdp))
            .await?;
        self.flush_candidates().await;

        let answer = connection.create_answer().await?;
        connection.set_local_description(answer.clone()).await?;
        debug!(%peer_id, collision, "Sending answer");
        self.send(SignalPayload::Answer { sdp: answer.sdp }).await;

        self.resume_deferred().await;
        Ok(NegotiationOutcome::AnswerSent { collision })
    }

    async fn on_remote_answer(&mut self, sdp: String) -> Result<NegotiationOutcome, NegotiationError> {
        let connection = Arc::clone(&self.session.connection);
        if connection.signaling_state() != SignalingState::HaveLocalOffer {
            debug!(peer_id = %self.session.peer_id, "Answer without a local offer, dropping");
            return Ok(NegotiationOutcome::AnswerIgnored);
        }

        connection
            .set_remote_description(SessionDescription::answer(sdp))
            .await?;
        self.flush_candidates().await;
        debug!(peer_id = %self.session.peer_id, "Answer applied");

        self.resume_deferred().await;
        Ok(NegotiationOutcome::AnswerApplied)
    }

    async fn on_remote_candidate(
        &mut self,
        candidate: IceCandidate,
    ) -> Result<NegotiationOutcome, NegotiationError> {
        let connection = Arc::clone(&self.session.connection);
        if !connection.has_remote_description() {
            self.session.pending_candidates.enqueue(candidate);
            return Ok(NegotiationOutcome::CandidateQueued);
        }

        match connection.add_ice_candidate(candidate).await {
            Ok(()) => Ok(NegotiationOutcome::CandidateApplied),
            Err(_) if self.session.ignore_offer => Ok(NegotiationOutcome::CandidateDiscarded),
            Err(e) => Err(e),
        }
    }

    async fn flush_candidates(&mut self) {
        let connection = Arc::clone(&self.session.connection);
        let report = self
            .session
            .pending_candidates
            .flush(connection.as_ref())
            .await;
        if report.applied + report.failed > 0 {
            debug!(
                peer_id = %self.session.peer_id,
                applied = report.applied,
                failed = report.failed,
                "Flushed buffered ICE candidates"
            );
        }
    }

    /// Re-run a negotiation that was requested while another was in flight.
    async fn resume_deferred(&mut self) {
        if !self.renegotiate_when_stable
            || self.session.connection.signaling_state() != SignalingState::Stable
        {
            return;
        }
        self.renegotiate_when_stable = false;
        if let Err(e) = self.on_negotiation_needed().await {
            warn!(peer_id = %self.session.peer_id, error = %e, "Deferred renegotiation failed");
        }
    }

    async fn send(&self, payload: SignalPayload) {
        let kind = payload.kind();
        let message = SignalMessage::to_peer(
            self.room_id.clone(),
            self.self_id,
            self.session.peer_id,
            payload,
        );
        if let Err(e) = self.relay.send(message).await {
            warn!(peer_id = %self.session.peer_id, kind, error = %e, "Failed to relay signal");
        }
    }
}
