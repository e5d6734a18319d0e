pub mod errors;
pub mod id;

pub use errors::{ConfigError, HuddleError, MeshError, MicError, NegotiationError, RelayError};
pub use id::{new_id, ParticipantId, RoomId};

pub type Result<T> = std::result::Result<T, HuddleError>;
