//! One-second-at-a-time compositor.

use log::{debug, info};
use rand::Rng;
use serde::Serialize;

use crate::audio::FrameSink;
use crate::config::{NoiseSettings, TrackKind};
use crate::constants::PROGRESS_INTERVAL_SECONDS;
use crate::error::MixError;

use super::plan::LoopPlan;
use super::track::TrackStream;

/// Totals reported once the mixer has run to completion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MixSummary {
    pub frames_written: u64,
    pub samples_written: u64,
    pub noise_refills: usize,
    /// Largest absolute output sample.
    pub peak: f32,
}

/// Sums prepared tracks into frames of `sample_rate` samples.
///
/// Each track holds at most about one frame plus one refill of queued
/// samples, so memory does not grow with the output length.
pub struct StreamingMixer<R: Rng> {
    tracks: Vec<TrackStream>,
    sample_rate: u32,
    final_length: u64,
    total_seconds: u64,
    second: u64,
    refill_threshold: usize,
    overlap: usize,
    rng: R,
    peak: f32,
}

impl<R: Rng> StreamingMixer<R> {
    /// # Errors
    /// [`MixError::CrossfadeTooShort`] when a noise source cannot cover the
    /// crossfade overlap.
    pub fn new(
        tracks: Vec<TrackStream>,
        plan: &LoopPlan,
        sample_rate: u32,
        noise: &NoiseSettings,
        rng: R,
    ) -> Result<Self, MixError> {
        if sample_rate == 0 {
            return Err(MixError::InvalidConfig(
                "sample_rate must be positive".to_string(),
            ));
        }
        let refill_threshold = (noise.refill_seconds * sample_rate as f64) as usize;
        let overlap = (noise.crossfade_seconds * sample_rate as f64) as usize;

        if let Some(track) = tracks
            .iter()
            .find(|t| t.kind == TrackKind::Noise && t.source_len() <= overlap)
        {
            return Err(MixError::CrossfadeTooShort {
                overlap,
                first: track.remaining_len(),
                second: track.source_len(),
            });
        }

        Ok(Self {
            tracks,
            sample_rate,
            final_length: plan.final_length_samples,
            total_seconds: plan.frame_count(sample_rate),
            second: 0,
            refill_threshold,
            overlap,
            rng,
            peak: 0.0,
        })
    }

    pub fn total_seconds(&self) -> u64 {
        self.total_seconds
    }

    pub fn tracks(&self) -> &[TrackStream] {
        &self.tracks
    }

    /// Length of frame `second`; only the last frame can be short.
    fn frame_len(&self, second: u64) -> usize {
        let rate = self.sample_rate as u64;
        let remainder = self.final_length % rate;
        if second + 1 == self.total_seconds && remainder != 0 {
            remainder as usize
        } else {
            rate as usize
        }
    }

    /// Render the next frame, or `None` once the output is complete.
    pub fn next_frame(&mut self) -> Result<Option<Vec<f32>>, MixError> {
        if self.second >= self.total_seconds {
            return Ok(None);
        }
        let len = self.frame_len(self.second);
        let last = self.second + 1 == self.total_seconds;
        let mut frame = vec![0.0_f32; len];

        for track in self.tracks.iter_mut() {
            match track.kind {
                TrackKind::Music => track.ensure_music(len),
                TrackKind::Noise => {
                    track.ensure_noise(self.refill_threshold.max(len), self.overlap, &mut self.rng)?
                }
            }
            track.take_into(&mut frame, last);
        }

        self.peak = frame.iter().fold(self.peak, |peak, s| peak.max(s.abs()));
        if self.second % PROGRESS_INTERVAL_SECONDS == 0 {
            info!("Mixing second {} of {}", self.second, self.total_seconds);
        }
        self.second += 1;
        Ok(Some(frame))
    }

    /// Render every remaining frame into `sink`.
    pub fn run<S: FrameSink + ?Sized>(mut self, sink: &mut S) -> Result<MixSummary, MixError> {
        let mut frames_written = 0;
        let mut samples_written = 0;
        while let Some(frame) = self.next_frame()? {
            sink.write_frame(&frame)?;
            frames_written += 1;
            samples_written += frame.len() as u64;
        }

        let summary = MixSummary {
            frames_written,
            samples_written,
            noise_refills: self.tracks.iter().map(TrackStream::refills).sum(),
            peak: self.peak,
        };
        debug!("mix summary: {:?}", summary);
        Ok(summary)
    }
}
