//! Loudness normalization against a shared target level.

use crate::audio::AudioBuffer;
use crate::error::MixError;

use super::level::{db_to_linear, rms_db};

/// Linear gain that brings `samples` to `target_db`, scaled by this track's
/// share of the loudness budget.
///
/// # Errors
/// Fails with [`MixError::ZeroLoudnessWeight`] if `total_weight` is not
/// positive, or [`MixError::InvalidConfig`] for a negative weight.
pub fn loudness_gain(
    samples: &[f32],
    target_db: f64,
    weight: f64,
    total_weight: f64,
) -> Result<f64, MixError> {
    if !(total_weight > 0.0) {
        return Err(MixError::ZeroLoudnessWeight);
    }
    if !(weight >= 0.0) {
        return Err(MixError::InvalidConfig(format!(
            "relative loudness must be non-negative, got {}",
            weight
        )));
    }
    let current_db = rms_db(samples);
    Ok(db_to_linear(target_db - current_db) * (weight / total_weight))
}

/// Scale a buffer in place and return the gain that was applied.
pub fn normalize(
    buffer: &mut AudioBuffer,
    target_db: f64,
    weight: f64,
    total_weight: f64,
) -> Result<f64, MixError> {
    let gain = loudness_gain(&buffer.samples, target_db, weight, total_weight)?;
    let gain_f32 = gain as f32;
    for sample in buffer.samples.iter_mut() {
        *sample *= gain_f32;
    }
    Ok(gain)
}
