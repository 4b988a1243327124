//! Render configuration loaded from JSON.

use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::beats::BeatGrid;
use crate::constants::{
    LCM_CAP_FACTOR, NOISE_CROSSFADE_SECONDS, NOISE_REFILL_SECONDS, OVERSHOOT_TOLERANCE,
    SAMPLE_RATE, SEARCH_ITERATIONS,
};
use crate::error::MixError;

/// How a track is treated by the mixer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    /// Loop-padded and repeated verbatim.
    Music,
    /// Re-sampled from random segments of the source and crossfaded.
    Noise,
}

/// One source clip in the mix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackConfig {
    pub filename: String,
    #[serde(rename = "type")]
    pub kind: TrackKind,
    pub relative_loudness: f64,
    /// Fixed tempo used instead of the beat estimator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bpm: Option<f64>,
    /// Fixed beat times in seconds used instead of the beat estimator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beats: Option<Vec<f64>>,
}

impl TrackConfig {
    /// Build a track without a fixed beat grid.
    pub fn new(filename: impl Into<String>, kind: TrackKind, relative_loudness: f64) -> Self {
        Self {
            filename: filename.into(),
            kind,
            relative_loudness,
            bpm: None,
            beats: None,
        }
    }

    /// Beat grid supplied in the config, if both `bpm` and `beats` are set.
    pub fn beat_grid(&self) -> Option<BeatGrid> {
        match (self.bpm, self.beats.as_ref()) {
            (Some(bpm), Some(beats)) => Some(BeatGrid::new(bpm, beats.clone())),
            _ => None,
        }
    }
}

/// Sample encoding used for the output file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleEncoding {
    #[default]
    Float32,
    Pcm16,
}

/// Noise bed replenishment parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseSettings {
    /// Refill once fewer than this many seconds remain buffered.
    pub refill_seconds: f64,
    /// Overlap between the buffered tail and a fresh segment.
    pub crossfade_seconds: f64,
}

impl Default for NoiseSettings {
    fn default() -> Self {
        Self {
            refill_seconds: NOISE_REFILL_SECONDS,
            crossfade_seconds: NOISE_CROSSFADE_SECONDS,
        }
    }
}

/// Heuristics used when picking the final output length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileSettings {
    /// Stop folding music lengths into the LCM past this multiple of the target.
    pub lcm_cap_factor: f64,
    /// Accepted relative overshoot before falling back to the random search.
    pub overshoot_tolerance: f64,
    /// Candidates drawn by the random search.
    pub search_iterations: usize,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            lcm_cap_factor: LCM_CAP_FACTOR,
            overshoot_tolerance: OVERSHOOT_TOLERANCE,
            search_iterations: SEARCH_ITERATIONS,
        }
    }
}

fn default_sample_rate() -> u32 {
    SAMPLE_RATE
}

/// Full render configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixConfig {
    /// Target level in dBFS (RMS) for the aggregate mix.
    pub decibels: f64,
    /// Requested duration in seconds.
    pub target_length: f64,
    pub output_path: String,
    pub audio: Vec<TrackConfig>,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default)]
    pub encoding: SampleEncoding,
    #[serde(default)]
    pub noise: NoiseSettings,
    #[serde(default)]
    pub reconcile: ReconcileSettings,
}

impl MixConfig {
    /// Read and validate a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, MixError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_json(&raw)?;
        info!(
            "Loaded config {} with {} tracks",
            path.display(),
            config.audio.len()
        );
        Ok(config)
    }

    /// Parse and validate a JSON config string.
    pub fn from_json(raw: &str) -> Result<Self, MixError> {
        let config: MixConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every precondition the render pipeline relies on.
    pub fn validate(&self) -> Result<(), MixError> {
        if self.audio.is_empty() {
            return Err(MixError::EmptyTrackList);
        }
        if !self.decibels.is_finite() {
            return Err(MixError::InvalidConfig("decibels must be finite".to_string()));
        }
        if !(self.target_length.is_finite() && self.target_length > 0.0) {
            return Err(MixError::InvalidConfig(format!(
                "target_length must be positive, got {}",
                self.target_length
            )));
        }
        if self.sample_rate == 0 {
            return Err(MixError::InvalidConfig(
                "sample_rate must be positive".to_string(),
            ));
        }
        for track in &self.audio {
            if !(track.relative_loudness.is_finite() && track.relative_loudness > 0.0) {
                return Err(MixError::InvalidConfig(format!(
                    "relative_loudness of {} must be positive, got {}",
                    track.filename, track.relative_loudness
                )));
            }
            if track.bpm.is_some() != track.beats.is_some() {
                return Err(MixError::InvalidConfig(format!(
                    "{} must set both bpm and beats, or neither",
                    track.filename
                )));
            }
        }
        if self.total_loudness() <= 0.0 {
            return Err(MixError::ZeroLoudnessWeight);
        }

        let noise = &self.noise;
        if !(noise.crossfade_seconds.is_finite() && noise.crossfade_seconds > 0.0) {
            return Err(MixError::InvalidConfig(
                "noise.crossfade_seconds must be positive".to_string(),
            ));
        }
        // A refill must survive one rendered second and still cover the overlap.
        if !(noise.refill_seconds >= noise.crossfade_seconds + 1.0) {
            return Err(MixError::InvalidConfig(format!(
                "noise.refill_seconds ({}) must be at least crossfade_seconds + 1 ({})",
                noise.refill_seconds,
                noise.crossfade_seconds + 1.0
            )));
        }

        let reconcile = &self.reconcile;
        if !(reconcile.lcm_cap_factor.is_finite() && reconcile.lcm_cap_factor > 0.0) {
            return Err(MixError::InvalidConfig(
                "reconcile.lcm_cap_factor must be positive".to_string(),
            ));
        }
        if !(reconcile.overshoot_tolerance.is_finite()
            && (0.0..1.0).contains(&reconcile.overshoot_tolerance))
        {
            return Err(MixError::InvalidConfig(
                "reconcile.overshoot_tolerance must be in [0, 1)".to_string(),
            ));
        }
        if reconcile.search_iterations == 0 {
            return Err(MixError::InvalidConfig(
                "reconcile.search_iterations must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Sum of all relative loudness weights.
    pub fn total_loudness(&self) -> f64 {
        self.audio.iter().map(|track| track.relative_loudness).sum()
    }

    /// Requested duration expressed in samples (at least one).
    pub fn target_samples(&self) -> u64 {
        ((self.target_length * self.sample_rate as f64) as u64).max(1)
    }

    /// Example configuration printed by `loopscape create config`.
    pub fn default_template() -> Self {
        let mut music = TrackConfig::new("data/sounds/loop.wav", TrackKind::Music, 2.0);
        music.bpm = Some(120.0);
        music.beats = Some(vec![0.5, 1.0, 1.5, 2.0]);
        Self {
            decibels: -20.0,
            target_length: 600.0,
            output_path: "output/ambience.wav".to_string(),
            audio: vec![
                TrackConfig::new("data/sounds/rain.wav", TrackKind::Noise, 1.0),
                music,
            ],
            sample_rate: SAMPLE_RATE,
            seed: None,
            encoding: SampleEncoding::default(),
            noise: NoiseSettings::default(),
            reconcile: ReconcileSettings::default(),
        }
    }
}
