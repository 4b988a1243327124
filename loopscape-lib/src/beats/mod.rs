//! Tempo and beat estimation seam.
//!
//! The loop padding engine only needs a tempo and an ordered list of beat
//! times. Anything that can produce those implements [`BeatEstimator`]: the
//! spectral-flux [`OnsetBeatTracker`], or a [`FixedBeats`] grid taken straight
//! from the config.

mod tracker;

pub use tracker::OnsetBeatTracker;

use serde::{Deserialize, Serialize};

use crate::error::MixError;

/// Estimated tempo plus beat timestamps in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeatGrid {
    pub bpm: f64,
    pub beats: Vec<f64>,
}

impl BeatGrid {
    pub fn new(bpm: f64, beats: Vec<f64>) -> Self {
        Self { bpm, beats }
    }

    /// Check the preconditions of the padding engine.
    ///
    /// # Errors
    /// [`MixError::InsufficientBeats`] for fewer than two beats,
    /// [`MixError::InvalidTempo`] for a non-positive or non-finite tempo and
    /// [`MixError::InvalidBeats`] for negative or unordered timestamps.
    pub fn validate(&self) -> Result<(), MixError> {
        if self.beats.len() < 2 {
            return Err(MixError::InsufficientBeats {
                found: self.beats.len(),
            });
        }
        if !(self.bpm.is_finite() && self.bpm > 0.0) {
            return Err(MixError::InvalidTempo(self.bpm));
        }
        if self.beats.iter().any(|t| !t.is_finite() || *t < 0.0) {
            return Err(MixError::InvalidBeats(
                "beat times must be finite and non-negative".to_string(),
            ));
        }
        if self.beats.windows(2).any(|pair| pair[1] < pair[0]) {
            return Err(MixError::InvalidBeats(
                "beat times must be in ascending order".to_string(),
            ));
        }
        Ok(())
    }

    pub fn first_beat(&self) -> f64 {
        self.beats.first().copied().unwrap_or(0.0)
    }

    pub fn last_beat(&self) -> f64 {
        self.beats.last().copied().unwrap_or(0.0)
    }

    /// Length of one beat, rounded to whole samples.
    pub fn beat_period_samples(&self, sample_rate: u32) -> Result<usize, MixError> {
        if !(self.bpm.is_finite() && self.bpm > 0.0) {
            return Err(MixError::InvalidTempo(self.bpm));
        }
        let period = (sample_rate as f64 * 60.0 / self.bpm).round();
        if period < 1.0 {
            return Err(MixError::InvalidTempo(self.bpm));
        }
        Ok(period as usize)
    }
}

/// Source of tempo and beat positions for a mono clip.
pub trait BeatEstimator {
    /// Estimate the beat grid of `samples`.
    fn estimate(&self, samples: &[f32], sample_rate: u32) -> Result<BeatGrid, MixError>;
}

/// A predetermined grid, returned unchanged for any input.
#[derive(Debug, Clone)]
pub struct FixedBeats {
    grid: BeatGrid,
}

impl FixedBeats {
    pub fn new(grid: BeatGrid) -> Self {
        Self { grid }
    }
}

impl BeatEstimator for FixedBeats {
    fn estimate(&self, _samples: &[f32], _sample_rate: u32) -> Result<BeatGrid, MixError> {
        Ok(self.grid.clone())
    }
}
