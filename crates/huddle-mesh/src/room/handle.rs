//! Public handle for driving the room audio mesh.

use huddle_common::{MeshError, ParticipantId, RoomId};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::media::MeshDeps;
use crate::protocol::SignalMessage;
use crate::relay::RelayEvent;

use super::actor::{RoomActor, RoomCommand};
use super::types::{MeshConfig, MeshEvent, RoomSnapshot};

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Handle to the room actor.
///
/// Every method sends a command to the background task and waits for it to
/// be applied, so a snapshot read after a call reflects that call. Cloning
/// yields another handle to the same actor. The actor stops on
/// [`shutdown`](Self::shutdown) or once every handle is dropped.
#[derive(Clone)]
pub struct VoiceMesh {
    command_tx: mpsc::Sender<RoomCommand>,
    snapshot_rx: watch::Receiver<RoomSnapshot>,
}

impl VoiceMesh {
    /// Spawn the room actor. Returns `(mesh, event_receiver)`.
    pub fn start(config: MeshConfig, deps: MeshDeps) -> (Self, mpsc::Receiver<MeshEvent>) {
        let (command_tx, command_rx) = mpsc::channel(config.command_capacity);
        let (notice_tx, notice_rx) = mpsc::channel(config.command_capacity);
        let (event_tx, event_rx) = mpsc::channel(config.event_capacity);
        let (snapshot_tx, snapshot_rx) = watch::channel(RoomSnapshot::default());

        let actor = RoomActor::new(config, deps, notice_tx, event_tx, snapshot_tx);
        tokio::spawn(actor.run(command_rx, notice_rx));

        (
            Self {
                command_tx,
                snapshot_rx,
            },
            event_rx,
        )
    }

    /// Join `room_id` as `self_id`, leaving any other room first.
    pub async fn join_room(
        &self,
        room_id: RoomId,
        roster: Vec<ParticipantId>,
        self_id: ParticipantId,
    ) -> Result<(), MeshError> {
        self.request(|reply| RoomCommand::Join {
            room_id,
            roster,
            self_id,
            reply,
        })
        .await
    }

    /// Close every peer session and release the microphone.
    pub async fn leave_room(&self) -> Result<(), MeshError> {
        self.request(|reply| RoomCommand::Leave { reply }).await
    }

    /// Apply a new authoritative roster.
    pub async fn update_roster(&self, roster: Vec<ParticipantId>) -> Result<(), MeshError> {
        self.request(|reply| RoomCommand::UpdateRoster { roster, reply })
            .await?
    }

    /// Flip local mute. Returns the new muted state.
    ///
    /// The first unmute opens the microphone; a permission or device failure
    /// is returned here and also recorded as `mic_error`. With nobody else in
    /// the roster the microphone stays closed and this returns `Ok(true)`.
    pub async fn toggle_mute(&self) -> Result<bool, MeshError> {
        self.request(|reply| RoomCommand::ToggleMute { reply })
            .await?
    }

    /// Clear `mic_error` and ask for the microphone again.
    pub async fn retry_microphone(&self) -> Result<(), MeshError> {
        self.request(|reply| RoomCommand::RetryMicrophone { reply })
            .await?
            .map(|_| ())
    }

    /// Feed one message received from the relay.
    pub async fn handle_inbound_message(&self, message: SignalMessage) -> Result<(), MeshError> {
        self.request(|reply| RoomCommand::Inbound { message, reply })
            .await
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Watch the room state. A new value is published after every change.
    pub fn subscribe(&self) -> watch::Receiver<RoomSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Leave the room and stop the actor.
    pub async fn shutdown(&self) -> Result<(), MeshError> {
        self.request(|reply| RoomCommand::Shutdown { reply }).await
    }

    /// Drive the mesh from a relay connection's inbound events.
    ///
    /// The relay's `joined` confirmation names the room and our id; each
    /// roster push then joins or updates, and a disconnect leaves the room.
    pub fn attach_relay(&self, events: mpsc::Receiver<RelayEvent>) -> JoinHandle<()> {
        tokio::spawn(relay_pump(self.clone(), events))
    }

    async fn request<R>(
        &self,
        command: impl FnOnce(oneshot::Sender<R>) -> RoomCommand,
    ) -> Result<R, MeshError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(command(reply_tx))
            .await
            .map_err(|_| MeshError::Stopped)?;
        reply_rx.await.map_err(|_| MeshError::Stopped)
    }
}

// ---------------------------------------------------------------------------
// Relay pump
// ---------------------------------------------------------------------------

async fn relay_pump(mesh: VoiceMesh, mut events: mpsc::Receiver<RelayEvent>) {
    let mut membership: Option<(RoomId, ParticipantId)> = None;

    while let Some(event) = events.recv().await {
        let result = match event {
            RelayEvent::Connected => {
                debug!("Relay connected");
                Ok(())
            }
            RelayEvent::Joined {
                room_id,
                participant_id,
            } => {
                info!(%room_id, %participant_id, "Relay accepted join");
                membership = Some((room_id, participant_id));
                Ok(())
            }
            RelayEvent::Roster(roster) => match &membership {
                Some((room_id, self_id)) => {
                    let current = mesh.snapshot();
                    if current.room_id.as_ref() == Some(room_id) && current.self_id == Some(*self_id) {
                        mesh.update_roster(roster).await
                    } else {
                        mesh.join_room(room_id.clone(), roster, *self_id).await
                    }
                }
                None => {
                    debug!("Roster before join confirmation, ignoring");
                    Ok(())
                }
            },
            RelayEvent::Signal(message) => mesh.handle_inbound_message(message).await,
            RelayEvent::Disconnected => {
                membership = None;
                mesh.leave_room().await
            }
            RelayEvent::Error(message) => {
                warn!(%message, "Relay error");
                Ok(())
            }
        };

        if let Err(MeshError::Stopped) = result {
            break;
        }
        if let Err(e) = result {
            warn!(error = %e, "Failed to apply relay event");
        }
    }
    debug!("Relay pump finished");
}
