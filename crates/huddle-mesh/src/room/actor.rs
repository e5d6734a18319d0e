//! The room actor.
//!
//! A single task owns the room session and applies commands one at a time.
//! Peer tasks, the voice activity sampler and microphone requests report back
//! through a separate notice channel, so the session is never written from
//! more than one place.

use std::sync::Arc;

use huddle_common::{MeshError, MicError, ParticipantId, RoomId};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::media::{LocalAudioStream, MeshDeps};
use crate::peer::{PeerContext, PeerInput, PeerNotice, PeerSet};
use crate::protocol::SignalMessage;
use crate::roster::{diff_roster, normalize_roster};
use crate::state::StatePropagator;
use crate::vad::{Sampler, SamplerConfig, SpeakingTransition};

use super::session::{Inbound, RoomSession};
use super::types::{MeshConfig, MeshEvent, RoomSnapshot};

type MuteReply = oneshot::Sender<Result<bool, MeshError>>;

/// Requests from [`VoiceMesh`](super::VoiceMesh) handles.
#[derive(Debug)]
pub(crate) enum RoomCommand {
    Join {
        room_id: RoomId,
        roster: Vec<ParticipantId>,
        self_id: ParticipantId,
        reply: oneshot::Sender<()>,
    },
    Leave {
        reply: oneshot::Sender<()>,
    },
    UpdateRoster {
        roster: Vec<ParticipantId>,
        reply: oneshot::Sender<Result<(), MeshError>>,
    },
    ToggleMute {
        reply: MuteReply,
    },
    RetryMicrophone {
        reply: MuteReply,
    },
    Inbound {
        message: SignalMessage,
        reply: oneshot::Sender<()>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Reports from tasks the actor spawned.
#[derive(Debug)]
pub(crate) enum RoomNotice {
    Peer(PeerNotice),
    Speaking(SpeakingTransition),
    MicrophoneOpened {
        attempt: u64,
        result: Result<LocalAudioStream, MicError>,
    },
}

impl From<PeerNotice> for RoomNotice {
    fn from(notice: PeerNotice) -> Self {
        RoomNotice::Peer(notice)
    }
}

impl From<SpeakingTransition> for RoomNotice {
    fn from(transition: SpeakingTransition) -> Self {
        RoomNotice::Speaking(transition)
    }
}

pub(crate) struct RoomActor {
    config: MeshConfig,
    deps: MeshDeps,
    session: Option<RoomSession>,
    notice_tx: mpsc::Sender<RoomNotice>,
    event_tx: mpsc::Sender<MeshEvent>,
    snapshot_tx: watch::Sender<RoomSnapshot>,
    sampler_generation: u64,
    /// Bumped on leave so late microphone results are discarded.
    mic_attempt: u64,
    mic_waiters: Vec<MuteReply>,
}

impl RoomActor {
    pub(crate) fn new(
        config: MeshConfig,
        deps: MeshDeps,
        notice_tx: mpsc::Sender<RoomNotice>,
        event_tx: mpsc::Sender<MeshEvent>,
        snapshot_tx: watch::Sender<RoomSnapshot>,
    ) -> Self {
        Self {
            config,
            deps,
            session: None,
            notice_tx,
            event_tx,
            snapshot_tx,
            sampler_generation: 0,
            mic_attempt: 0,
            mic_waiters: Vec::new(),
        }
    }

    /// Process commands until shutdown or until every handle is dropped.
    pub(crate) async fn run(
        mut self,
        mut commands: mpsc::Receiver<RoomCommand>,
        mut notices: mpsc::Receiver<RoomNotice>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(RoomCommand::Shutdown { reply }) => {
                        self.leave().await;
                        self.publish();
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command).await,
                    None => {
                        self.leave().await;
                        self.publish();
                        break;
                    }
                },
                Some(notice) = notices.recv() => {
                    self.handle_notice(notice).await;
                    self.publish();
                }
            }
        }
        debug!("Room actor stopped");
    }

    async fn handle_command(&mut self, command: RoomCommand) {
        match command {
            RoomCommand::Join {
                room_id,
                roster,
                self_id,
                reply,
            } => {
                self.join(room_id, roster, self_id).await;
                self.publish();
                let _ = reply.send(());
            }
            RoomCommand::Leave { reply } => {
                self.leave().await;
                self.publish();
                let _ = reply.send(());
            }
            RoomCommand::UpdateRoster { roster, reply } => {
                let result = self.apply_roster(roster).await;
                self.publish();
                let _ = reply.send(result);
            }
            RoomCommand::ToggleMute { reply } => {
                self.toggle_mute(reply).await;
            }
            RoomCommand::RetryMicrophone { reply } => {
                self.retry_microphone(reply);
            }
            RoomCommand::Inbound { message, reply } => {
                self.inbound(message);
                self.publish();
                let _ = reply.send(());
            }
            // Handled by the run loop.
            RoomCommand::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    async fn handle_notice(&mut self, notice: RoomNotice) {
        match notice {
            RoomNotice::Peer(PeerNotice::RemoteStream {
                peer_id,
                generation,
                stream,
            }) => {
                let Some(session) = self.session.as_mut() else {
                    return;
                };
                if !session.peers.is_current(peer_id, generation) {
                    debug!(%peer_id, generation, "Dropping remote stream from a closed peer session");
                    return;
                }
                info!(%peer_id, stream_id = %stream.id, "Remote audio stream received");
                session.remote_streams.insert(peer_id, stream.clone());
                self.emit(MeshEvent::RemoteStream { peer_id, stream });
            }
            RoomNotice::Speaking(transition) => self.on_speaking(transition).await,
            RoomNotice::MicrophoneOpened { attempt, result } => {
                self.on_microphone_opened(attempt, result).await;
            }
        }
    }

    // -- Membership ----------------------------------------------------------

    async fn join(&mut self, room_id: RoomId, roster: Vec<ParticipantId>, self_id: ParticipantId) {
        if let Some(session) = &self.session {
            if session.room_id == room_id && session.self_id == self_id {
                if let Err(e) = self.apply_roster(roster).await {
                    warn!(error = %e, "Failed to apply roster on rejoin");
                }
                return;
            }
            self.leave().await;
        }

        let peers = PeerSet::new(PeerContext {
            room_id: room_id.clone(),
            self_id,
            relay: Arc::clone(&self.deps.relay),
            factory: Arc::clone(&self.deps.factory),
            notices: self.notice_tx.clone(),
        });
        let propagator = StatePropagator::new(room_id.clone(), self_id, Arc::clone(&self.deps.relay));
        self.session = Some(RoomSession::new(room_id.clone(), self_id, peers, propagator));

        info!(%room_id, %self_id, "Joined voice room");
        self.emit(MeshEvent::Joined { room_id, self_id });

        if let Err(e) = self.apply_roster(roster).await {
            warn!(error = %e, "Failed to apply initial roster");
        }
    }

    async fn leave(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };

        self.mic_attempt += 1;
        for waiter in self.mic_waiters.drain(..) {
            let _ = waiter.send(Err(MeshError::NotInRoom));
        }

        if session.stop_sampler() {
            session.broadcast_local().await;
        }
        session.peers.remove_all().await;
        if let Some(stream) = session.local_stream.take() {
            stream.stop();
        }

        info!(room_id = %session.room_id, "Left voice room");
        self.emit(MeshEvent::Left {
            room_id: session.room_id,
        });
    }

    async fn apply_roster(&mut self, roster: Vec<ParticipantId>) -> Result<(), MeshError> {
        let max_participants = self.config.max_participants;
        let Some(session) = self.session.as_mut() else {
            return Err(MeshError::NotInRoom);
        };

        let roster = normalize_roster(&roster);
        if roster.len() > max_participants {
            warn!(
                room_id = %session.room_id,
                participants = roster.len(),
                max_participants,
                "Roster exceeds the configured participant limit"
            );
        }
        let diff = diff_roster(&session.roster, &roster);
        session.roster = roster;
        debug!(
            room_id = %session.room_id,
            added = diff.added.len(),
            removed = diff.removed.len(),
            "Roster updated"
        );

        let mut events = Vec::new();

        // Close before opening.
        for peer_id in diff.removed {
            if peer_id != session.self_id && session.forget_peer(peer_id).await {
                events.push(MeshEvent::PeerRemoved { peer_id });
            }
        }

        let remote_ids = session.remote_ids();
        if remote_ids.is_empty() && session.local_stream.is_some() {
            info!(room_id = %session.room_id, "Alone in the room, releasing microphone");
            let was_speaking = session.stop_sampler();
            if let Some(stream) = session.local_stream.take() {
                stream.stop();
            }
            session.local_muted = true;
            if was_speaking {
                session.broadcast_local().await;
            }
            events.push(MeshEvent::LocalStateChanged {
                muted: true,
                speaking: false,
            });
        }

        let mut created = false;
        for peer_id in remote_ids {
            match session
                .peers
                .ensure_peer(peer_id, session.local_stream.as_ref())
                .await
            {
                Ok(true) => {
                    created = true;
                    events.push(MeshEvent::PeerAdded {
                        peer_id,
                        polite: session.self_id.is_polite_towards(peer_id),
                    });
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(%peer_id, error = %e, "Failed to open peer connection");
                }
            }
        }

        // Newcomers have no idea whether we are muted.
        if created {
            session.broadcast_local().await;
        }

        for event in events {
            self.emit(event);
        }
        Ok(())
    }

    // -- Local audio ---------------------------------------------------------

    async fn toggle_mute(&mut self, reply: MuteReply) {
        let Some(session) = self.session.as_mut() else {
            let _ = reply.send(Err(MeshError::NotInRoom));
            return;
        };

        if !session.local_muted {
            session.local_muted = true;
            if let Some(stream) = &session.local_stream {
                stream.set_enabled(false);
            }
            session.stop_sampler();
            session.broadcast_local().await;
            debug!(room_id = %session.room_id, "Muted");
            self.emit(MeshEvent::LocalStateChanged {
                muted: true,
                speaking: false,
            });
            self.publish();
            let _ = reply.send(Ok(true));
            return;
        }

        let Some(stream) = session.local_stream.clone() else {
            if session.remote_ids().is_empty() {
                debug!(room_id = %session.room_id, "Alone in the room, microphone stays closed");
                let _ = reply.send(Ok(true));
                return;
            }
            self.request_microphone(reply);
            return;
        };

        stream.set_enabled(true);
        session.local_muted = false;
        spawn_sampler(
            session,
            &self.config.sampler,
            &mut self.sampler_generation,
            &self.notice_tx,
        );
        session.broadcast_local().await;
        debug!(room_id = %session.room_id, "Unmuted");
        self.emit(MeshEvent::LocalStateChanged {
            muted: false,
            speaking: false,
        });
        self.publish();
        let _ = reply.send(Ok(false));
    }

    fn retry_microphone(&mut self, reply: MuteReply) {
        let Some(session) = self.session.as_mut() else {
            let _ = reply.send(Err(MeshError::NotInRoom));
            return;
        };
        if session.local_stream.is_some() {
            let _ = reply.send(Ok(session.local_muted));
            return;
        }
        session.mic_error = None;
        let alone = session.remote_ids().is_empty();
        self.publish();
        if alone {
            let _ = reply.send(Ok(true));
            return;
        }
        self.request_microphone(reply);
    }

    /// Open the microphone without blocking the mailbox on the permission prompt.
    fn request_microphone(&mut self, reply: MuteReply) {
        self.mic_waiters.push(reply);
        if self.mic_waiters.len() > 1 {
            return;
        }

        let capture = Arc::clone(&self.deps.capture);
        let notices = self.notice_tx.clone();
        let attempt = self.mic_attempt;
        debug!(attempt, "Requesting microphone");
        tokio::spawn(async move {
            let result = capture.open_microphone().await;
            let _ = notices
                .send(RoomNotice::MicrophoneOpened { attempt, result })
                .await;
        });
    }

    async fn on_microphone_opened(
        &mut self,
        attempt: u64,
        result: Result<LocalAudioStream, MicError>,
    ) {
        let session = match self.session.as_mut() {
            Some(session) if attempt == self.mic_attempt => session,
            _ => {
                if let Ok(stream) = result {
                    stream.stop();
                }
                debug!(attempt, "Discarding microphone from a previous session");
                return;
            }
        };
        let waiters = std::mem::take(&mut self.mic_waiters);

        match result {
            // Everyone else left while the prompt was open.
            Ok(stream) if session.remote_ids().is_empty() => {
                debug!(room_id = %session.room_id, "Alone in the room, closing fresh microphone");
                stream.stop();
                for waiter in waiters {
                    let _ = waiter.send(Ok(true));
                }
            }
            Ok(stream) => {
                stream.set_enabled(true);
                session.mic_error = None;
                session.local_muted = false;
                session.peers.attach_local_audio(&stream);
                session.local_stream = Some(stream);
                spawn_sampler(
                    session,
                    &self.config.sampler,
                    &mut self.sampler_generation,
                    &self.notice_tx,
                );
                session.broadcast_local().await;
                info!(room_id = %session.room_id, peers = session.peers.len(), "Microphone opened");
                self.emit(MeshEvent::LocalStateChanged {
                    muted: false,
                    speaking: false,
                });
                self.publish();
                for waiter in waiters {
                    let _ = waiter.send(Ok(false));
                }
            }
            Err(e) => {
                warn!(room_id = %session.room_id, error = %e, "Microphone unavailable");
                session.mic_error = Some(e.clone());
                session.local_muted = true;
                self.emit(MeshEvent::MicrophoneError(e.clone()));
                self.publish();
                for waiter in waiters {
                    let _ = waiter.send(Err(MeshError::Microphone(e.clone())));
                }
            }
        }
    }

    async fn on_speaking(&mut self, transition: SpeakingTransition) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let current = session.sampler.as_ref().map(Sampler::generation);
        if current != Some(transition.generation) || session.local_muted {
            debug!(generation = transition.generation, "Dropping stale speaking transition");
            return;
        }

        session.local_speaking = transition.speaking;
        session.broadcast_local().await;
        self.emit(MeshEvent::LocalStateChanged {
            muted: false,
            speaking: transition.speaking,
        });
    }

    // -- Inbound -------------------------------------------------------------

    fn inbound(&mut self, message: SignalMessage) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        match session.route(message) {
            Some(Inbound::PeerState {
                peer_id,
                muted,
                speaking,
            }) => {
                if session.remote.apply(peer_id, muted, speaking) {
                    self.emit(MeshEvent::RemoteStateChanged {
                        peer_id,
                        muted,
                        speaking,
                    });
                }
            }
            Some(Inbound::Signal { peer_id, signal }) => {
                let delivered = session
                    .peers
                    .get(peer_id)
                    .is_some_and(|peer| peer.send(PeerInput::Signal(signal)));
                if !delivered {
                    debug!(%peer_id, "Peer task gone, dropping signal");
                }
            }
            None => {}
        }
    }

    // -- Output --------------------------------------------------------------

    fn publish(&self) {
        let snapshot = self
            .session
            .as_ref()
            .map(RoomSession::snapshot)
            .unwrap_or_default();
        self.snapshot_tx.send_replace(snapshot);
    }

    fn emit(&self, event: MeshEvent) {
        if let Err(mpsc::error::TrySendError::Full(event)) = self.event_tx.try_send(event) {
            debug!(?event, "Mesh event channel full, dropping event");
        }
    }
}

/// Start sampling if the microphone is live and unmuted.
fn spawn_sampler(
    session: &mut RoomSession,
    config: &SamplerConfig,
    generation: &mut u64,
    notices: &mpsc::Sender<RoomNotice>,
) {
    if session.local_muted || session.sampler.is_some() {
        return;
    }
    let Some(stream) = session.local_stream.clone() else {
        return;
    };
    *generation += 1;
    session.sampler = Some(Sampler::spawn(stream, config.clone(), *generation, notices.clone()));
}
