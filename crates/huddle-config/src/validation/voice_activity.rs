//! Validation for the voice activity sampler.

use crate::schema::HuddleConfig;

use super::helpers::{validate_range, validate_range_f64};

pub(crate) fn validate_voice_activity(errors: &mut Vec<String>, config: &HuddleConfig) {
    let vad = &config.voice_activity;
    validate_range_f64(errors, "voice_activity.threshold", vad.threshold, 0.0, 1.0);
    validate_range(errors, "voice_activity.buffer_size", vad.buffer_size, 32, 32768);
    if !vad.buffer_size.is_power_of_two() {
        errors.push(format!(
            "voice_activity.buffer_size = {} is not a power of two",
            vad.buffer_size
        ));
    }
    validate_range(errors, "voice_activity.tick_ms", vad.tick_ms, 5, 1000);
}
