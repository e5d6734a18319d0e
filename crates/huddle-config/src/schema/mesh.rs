//! Room mesh engine settings.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshSchemaConfig {
    /// Mailbox size of the room actor.
    pub command_capacity: u32,
    /// Buffer size of the UI event channel.
    pub event_capacity: u32,
    /// Soft limit; larger rosters are applied but logged.
    pub max_participants: u32,
}

impl Default for MeshSchemaConfig {
    fn default() -> Self {
        Self {
            command_capacity: 64,
            event_capacity: 256,
            max_participants: 16,
        }
    }
}
