//! Room store: maps each room to the connections of its participants.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use huddle_common::{ParticipantId, RoomId};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};

use crate::protocol::{Outbound, RelayResponse};

/// Sender half feeding one client's WebSocket.
pub type ClientTx = mpsc::Sender<String>;

struct Member {
    conn_id: String,
    tx: ClientTx,
}

/// Thread-safe room store.
#[derive(Clone, Default)]
pub struct RoomStore {
    rooms: Arc<RwLock<HashMap<RoomId, BTreeMap<ParticipantId, Member>>>>,
}

impl RoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection. Returns the sender of a connection it replaced.
    pub async fn register(
        &self,
        room_id: &RoomId,
        participant_id: ParticipantId,
        conn_id: &str,
        tx: ClientTx,
    ) -> Option<ClientTx> {
        let mut rooms = self.rooms.write().await;
        let members = rooms.entry(room_id.clone()).or_default();
        members
            .insert(
                participant_id,
                Member {
                    conn_id: conn_id.to_string(),
                    tx,
                },
            )
            .map(|old| old.tx)
    }

    /// Unregister a connection. No-op if the slot was taken over by a newer
    /// connection. Returns true if something was removed.
    pub async fn unregister(
        &self,
        room_id: &RoomId,
        participant_id: ParticipantId,
        conn_id: &str,
    ) -> bool {
        let mut rooms = self.rooms.write().await;
        let Some(members) = rooms.get_mut(room_id) else {
            return false;
        };
        let owned = members
            .get(&participant_id)
            .is_some_and(|member| member.conn_id == conn_id);
        if owned {
            members.remove(&participant_id);
        }
        if members.is_empty() {
            rooms.remove(room_id);
        }
        owned
    }

    /// Participants of a room, in id order.
    #[cfg(test)]
    pub async fn roster(&self, room_id: &RoomId) -> Vec<ParticipantId> {
        self.rooms
            .read()
            .await
            .get(room_id)
            .map(|members| members.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Push the current roster to every member of the room.
    ///
    /// Members whose queue is full are disconnected, and the survivors get
    /// the shrunken roster.
    pub async fn broadcast_roster(&self, room_id: &RoomId) {
        loop {
            let targets = {
                let rooms = self.rooms.read().await;
                let Some(members) = rooms.get(room_id) else {
                    return;
                };
                let participants: Vec<_> = members.keys().copied().collect();
                let json = RelayResponse::Roster { participants }.to_json();
                members
                    .iter()
                    .map(|(id, m)| Target::new(*id, m, json.clone()))
                    .collect::<Vec<_>>()
            };

            let (_, stalled) = deliver(room_id, targets);
            if stalled.is_empty() || !self.evict(room_id, &stalled).await {
                return;
            }
        }
    }

    /// Deliver a stamped frame from `from_id`. Returns how many members got it.
    ///
    /// Never waits on a recipient: one that is not draining its queue is
    /// disconnected instead of stalling the sender.
    pub async fn route(&self, room_id: &RoomId, from_id: ParticipantId, frame: Outbound) -> usize {
        let targets: Vec<Target> = {
            let rooms = self.rooms.read().await;
            let Some(members) = rooms.get(room_id) else {
                return 0;
            };
            match frame.to_id {
                Some(to_id) if to_id == from_id => Vec::new(),
                Some(to_id) => members
                    .get(&to_id)
                    .map(|m| Target::new(to_id, m, frame.json.clone()))
                    .into_iter()
                    .collect(),
                None => members
                    .iter()
                    .filter(|(id, _)| **id != from_id)
                    .map(|(id, m)| Target::new(*id, m, frame.json.clone()))
                    .collect(),
            }
        };

        let (delivered, stalled) = deliver(room_id, targets);
        if !stalled.is_empty() && self.evict(room_id, &stalled).await {
            self.broadcast_roster(room_id).await;
        }
        delivered
    }

    /// Drop stalled members. Returns true if any was still registered.
    async fn evict(&self, room_id: &RoomId, stalled: &[(ParticipantId, String)]) -> bool {
        let mut removed = false;
        for (participant_id, conn_id) in stalled {
            removed |= self.unregister(room_id, *participant_id, conn_id).await;
        }
        removed
    }

    /// Number of rooms with at least one member.
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}

/// One queued delivery.
struct Target {
    participant_id: ParticipantId,
    conn_id: String,
    tx: ClientTx,
    json: String,
}

impl Target {
    fn new(participant_id: ParticipantId, member: &Member, json: String) -> Self {
        Self {
            participant_id,
            conn_id: member.conn_id.clone(),
            tx: member.tx.clone(),
            json,
        }
    }
}

/// Queue without waiting. Returns the delivered count and the members whose
/// queue was full.
fn deliver(room_id: &RoomId, targets: Vec<Target>) -> (usize, Vec<(ParticipantId, String)>) {
    let mut delivered = 0;
    let mut stalled = Vec::new();
    for target in targets {
        match target.tx.try_send(target.json) {
            Ok(()) => delivered += 1,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    room_id = %room_id,
                    participant_id = %target.participant_id,
                    "Member not keeping up, disconnecting"
                );
                stalled.push((target.participant_id, target.conn_id));
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(room_id = %room_id, participant_id = %target.participant_id, "Member channel closed");
            }
        }
    }
    (delivered, stalled)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> RoomId {
        RoomId::from("r1")
    }

    async fn member(store: &RoomStore, id: u64, conn: &str) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(16);
        assert!(store
            .register(&room(), ParticipantId(id), conn, tx)
            .await
            .is_none());
        rx
    }

    #[tokio::test]
    async fn roster_is_sorted_by_id() {
        let store = RoomStore::new();
        let _a = member(&store, 9, "a").await;
        let _b = member(&store, 5, "b").await;
        let _c = member(&store, 12, "c").await;
        assert_eq!(
            store.roster(&room()).await,
            vec![ParticipantId(5), ParticipantId(9), ParticipantId(12)]
        );
    }

    #[tokio::test]
    async fn broadcast_roster_reaches_everyone() {
        let store = RoomStore::new();
        let mut a = member(&store, 5, "a").await;
        let mut b = member(&store, 9, "b").await;

        store.broadcast_roster(&room()).await;
        let expected = r#"{"type":"roster","participants":[5,9]}"#;
        assert_eq!(a.recv().await.unwrap(), expected);
        assert_eq!(b.recv().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn point_to_point_reaches_only_the_recipient() {
        let store = RoomStore::new();
        let mut a = member(&store, 5, "a").await;
        let mut b = member(&store, 9, "b").await;
        let mut c = member(&store, 12, "c").await;

        let frame = Outbound {
            to_id: Some(ParticipantId(9)),
            json: "offer".into(),
        };
        assert_eq!(store.route(&room(), ParticipantId(5), frame).await, 1);
        assert_eq!(b.recv().await.unwrap(), "offer");
        assert!(a.try_recv().is_err());
        assert!(c.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_skips_the_sender() {
        let store = RoomStore::new();
        let mut a = member(&store, 5, "a").await;
        let mut b = member(&store, 9, "b").await;
        let mut c = member(&store, 12, "c").await;

        let frame = Outbound {
            to_id: None,
            json: "state".into(),
        };
        assert_eq!(store.route(&room(), ParticipantId(5), frame).await, 2);
        assert_eq!(b.recv().await.unwrap(), "state");
        assert_eq!(c.recv().await.unwrap(), "state");
        assert!(a.try_recv().is_err());
    }

    #[tokio::test]
    async fn unknown_or_self_recipient_is_dropped() {
        let store = RoomStore::new();
        let _a = member(&store, 5, "a").await;

        let to_self = Outbound {
            to_id: Some(ParticipantId(5)),
            json: "x".into(),
        };
        let to_stranger = Outbound {
            to_id: Some(ParticipantId(77)),
            json: "x".into(),
        };
        assert_eq!(store.route(&room(), ParticipantId(5), to_self).await, 0);
        assert_eq!(store.route(&room(), ParticipantId(5), to_stranger).await, 0);
    }

    #[tokio::test]
    async fn full_member_is_disconnected_instead_of_blocking() {
        let store = RoomStore::new();
        let mut a = member(&store, 5, "a").await;
        let (tx, slow) = mpsc::channel(1);
        assert!(store.register(&room(), ParticipantId(9), "slow", tx).await.is_none());

        let frame = |json: &str| Outbound {
            to_id: Some(ParticipantId(9)),
            json: json.into(),
        };
        assert_eq!(store.route(&room(), ParticipantId(5), frame("one")).await, 1);
        let second = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            store.route(&room(), ParticipantId(5), frame("two")),
        )
        .await
        .unwrap();
        assert_eq!(second, 0);

        assert_eq!(store.roster(&room()).await, vec![ParticipantId(5)]);
        assert_eq!(a.recv().await.unwrap(), r#"{"type":"roster","participants":[5]}"#);
        drop(slow);
    }

    #[tokio::test]
    async fn stale_connection_cannot_unregister_replacement() {
        let store = RoomStore::new();
        let _old = member(&store, 5, "old").await;

        let (tx, _new) = mpsc::channel(16);
        let replaced = store.register(&room(), ParticipantId(5), "new", tx).await;
        assert!(replaced.is_some());

        assert!(!store.unregister(&room(), ParticipantId(5), "old").await);
        assert_eq!(store.roster(&room()).await, vec![ParticipantId(5)]);

        assert!(store.unregister(&room(), ParticipantId(5), "new").await);
        assert_eq!(store.room_count().await, 0);
    }
}
