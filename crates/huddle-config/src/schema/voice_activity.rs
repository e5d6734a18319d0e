//! Voice activity sampler settings.

use serde::{Deserialize, Serialize};

/// Local speaking detection.
///
/// `threshold` is an RMS level on the normalized `[-1, 1]` sample domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceActivityConfig {
    pub threshold: f64,
    /// Samples per RMS window. Must be a power of two.
    pub buffer_size: u32,
    /// Sampling cadence in milliseconds (one display-refresh tick by default).
    pub tick_ms: u32,
}

impl Default for VoiceActivityConfig {
    fn default() -> Self {
        Self {
            threshold: 0.02,
            buffer_size: 2048,
            tick_ms: 16,
        }
    }
}
