//! Relay-level wire protocol.
//!
//! The first frame is a `join` hello. After that every text frame is a
//! signaling message; the relay only looks at its routing fields.

use huddle_common::{ParticipantId, RoomId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// First message a client sends to identify itself.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayHello {
    Join {
        #[serde(rename = "roomId")]
        room_id: RoomId,
        #[serde(rename = "participantId")]
        participant_id: ParticipantId,
    },
}

/// Messages the relay itself originates.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayResponse {
    Joined {
        #[serde(rename = "roomId")]
        room_id: RoomId,
        #[serde(rename = "participantId")]
        participant_id: ParticipantId,
    },
    Roster {
        participants: Vec<ParticipantId>,
    },
    Error {
        message: String,
    },
}

impl RelayResponse {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|e| format!(r#"{{"type":"error","message":"encode failed: {e}"}}"#))
    }
}

/// Why a client frame was not forwarded.
#[derive(Debug, thiserror::Error)]
pub enum Rejected {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("frame is not a JSON object")]
    NotAnObject,

    #[error("frame for room {0:?}")]
    WrongRoom(Option<String>),

    #[error("invalid toId")]
    BadRecipient,
}

/// A client frame ready to be delivered.
#[derive(Debug, PartialEq)]
pub struct Outbound {
    /// `None` for room broadcasts.
    pub to_id: Option<ParticipantId>,
    pub json: String,
}

/// Check a client frame against its sender's registration and stamp `fromId`.
pub fn stamp(text: &str, room_id: &RoomId, from_id: ParticipantId) -> Result<Outbound, Rejected> {
    let mut value: Value = serde_json::from_str(text)?;
    let object = value.as_object_mut().ok_or(Rejected::NotAnObject)?;

    match object.get("roomId").and_then(Value::as_str) {
        Some(room) if room == room_id.as_str() => {}
        other => return Err(Rejected::WrongRoom(other.map(str::to_owned))),
    }

    let to_id = match object.get("toId") {
        None | Some(Value::Null) => None,
        Some(raw) => Some(
            raw.as_u64()
                .map(ParticipantId)
                .ok_or(Rejected::BadRecipient)?,
        ),
    };

    object.insert("fromId".into(), Value::from(from_id.get()));
    Ok(Outbound {
        to_id,
        json: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_join_hello() {
        let hello: RelayHello =
            serde_json::from_str(r#"{"type":"join","roomId":"org-1/standup","participantId":42}"#)
                .unwrap();
        let RelayHello::Join {
            room_id,
            participant_id,
        } = hello;
        assert_eq!(room_id.as_str(), "org-1/standup");
        assert_eq!(participant_id, ParticipantId(42));
    }

    #[test]
    fn roster_response_shape() {
        let json = RelayResponse::Roster {
            participants: vec![ParticipantId(5), ParticipantId(9)],
        }
        .to_json();
        assert_eq!(json, r#"{"type":"roster","participants":[5,9]}"#);
    }

    #[test]
    fn stamp_overwrites_spoofed_sender() {
        let out = stamp(
            r#"{"type":"offer","roomId":"r1","fromId":1,"toId":9,"sdp":"v=0"}"#,
            &RoomId::from("r1"),
            ParticipantId(5),
        )
        .unwrap();
        assert_eq!(out.to_id, Some(ParticipantId(9)));
        let value: Value = serde_json::from_str(&out.json).unwrap();
        assert_eq!(value["fromId"], 5);
        assert_eq!(value["sdp"], "v=0");
    }

    #[test]
    fn broadcast_has_no_recipient() {
        let out = stamp(
            r#"{"type":"peer-state","roomId":"r1","muted":true,"speaking":false}"#,
            &RoomId::from("r1"),
            ParticipantId(5),
        )
        .unwrap();
        assert_eq!(out.to_id, None);
    }

    #[test]
    fn rejects_other_rooms_and_garbage() {
        let room = RoomId::from("r1");
        assert!(matches!(
            stamp(r#"{"type":"offer","roomId":"r2","toId":9}"#, &room, ParticipantId(5)),
            Err(Rejected::WrongRoom(Some(_)))
        ));
        assert!(matches!(
            stamp(r#"{"type":"offer","toId":9}"#, &room, ParticipantId(5)),
            Err(Rejected::WrongRoom(None))
        ));
        assert!(matches!(
            stamp("[1,2]", &room, ParticipantId(5)),
            Err(Rejected::NotAnObject)
        ));
        assert!(matches!(
            stamp("not json", &room, ParticipantId(5)),
            Err(Rejected::Malformed(_))
        ));
        assert!(matches!(
            stamp(r#"{"roomId":"r1","toId":"nine"}"#, &room, ParticipantId(5)),
            Err(Rejected::BadRecipient)
        ));
    }
}
