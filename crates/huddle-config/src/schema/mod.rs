//! Configuration schema types for huddle.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod mesh;
mod relay;
mod system;
mod voice_activity;

pub use mesh::*;
pub use relay::*;
pub use system::*;
pub use voice_activity::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration.
///
/// All options have sensible defaults. Only override what you want to change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct HuddleConfig {
    pub voice_activity: VoiceActivityConfig,
    pub mesh: MeshSchemaConfig,
    pub relay: RelayConfig,
    pub logging: LoggingConfig,
}
