//! Room session: the single owner of roster, local audio and remote state.

mod actor;
mod handle;
mod session;
mod types;


pub use handle::VoiceMesh;
pub use types::{MeshConfig, MeshEvent, RoomSnapshot};
