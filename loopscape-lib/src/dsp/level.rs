//! Helpers for converting between linear and dB levels.

use crate::constants::RMS_EPSILON;

/// Convert a dB value to linear gain.
pub fn db_to_linear(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}

/// Convert a linear gain to dB.
pub fn linear_to_db(value: f64) -> f64 {
    let v = value.max(f64::MIN_POSITIVE);
    20.0 * v.log10()
}

/// Root-mean-square of a buffer. An empty buffer has zero RMS.
pub fn rms(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum / samples.len() as f64).sqrt()
}

/// RMS level in dB, offset by a small epsilon so silence stays finite.
pub fn rms_db(samples: &[f32]) -> f64 {
    20.0 * (rms(samples) + RMS_EPSILON).log10()
}

/// Sum of squared samples.
pub fn energy(samples: &[f32]) -> f64 {
    samples.iter().map(|&s| (s as f64) * (s as f64)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_round_trip() {
        assert!((db_to_linear(6.0) - 1.9952623).abs() < 1e-6);
        assert!((linear_to_db(db_to_linear(-12.5)) + 12.5).abs() < 1e-9);
    }

    #[test]
    fn rms_of_square_wave() {
        let samples = [0.5_f32, -0.5, 0.5, -0.5];
        assert!((rms(&samples) - 0.5).abs() < 1e-9);
        assert!((energy(&samples) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn silence_is_finite() {
        assert_eq!(rms(&[]), 0.0);
        assert!((rms_db(&[]) + 120.0).abs() < 1e-6);
        assert!(rms_db(&[0.0; 8]).is_finite());
    }
}
