//! Spectral-flux onset tracking.

use std::f32::consts::PI;

use log::debug;
use realfft::RealFftPlanner;

use crate::error::MixError;

use super::{BeatEstimator, BeatGrid};

const DEFAULT_FRAME_SIZE: usize = 1024;
const DEFAULT_HOP: usize = 512;
/// Frames on each side used for the adaptive onset threshold.
const MEAN_RADIUS: usize = 8;
/// Magnitude compression, `ln(1 + k * |X|)`.
const COMPRESSION: f32 = 100.0;

/// Beat tracker built on an onset envelope and its autocorrelation.
#[derive(Debug, Clone)]
pub struct OnsetBeatTracker {
    pub frame_size: usize,
    pub hop: usize,
    pub min_bpm: f64,
    pub max_bpm: f64,
    /// Tempo favoured when several lags correlate equally well.
    pub prior_bpm: f64,
    /// Width of the tempo prior in octaves.
    pub prior_width: f64,
}

impl Default for OnsetBeatTracker {
    fn default() -> Self {
        Self {
            frame_size: DEFAULT_FRAME_SIZE,
            hop: DEFAULT_HOP,
            min_bpm: 60.0,
            max_bpm: 200.0,
            prior_bpm: 120.0,
            prior_width: 1.0,
        }
    }
}

impl OnsetBeatTracker {
    /// Half-wave rectified spectral flux, one value per hop.
    pub fn onset_envelope(&self, samples: &[f32]) -> Result<Vec<f32>, MixError> {
        if self.frame_size < 2 || self.hop == 0 {
            return Err(MixError::InvalidBeats(
                "frame size and hop must be positive".to_string(),
            ));
        }
        if samples.len() < 2 * self.frame_size {
            return Err(MixError::InsufficientBeats { found: 0 });
        }

        let mut planner = RealFftPlanner::<f32>::new();
        let r2c = planner.plan_fft_forward(self.frame_size);
        let mut input = r2c.make_input_vec();
        let mut spectrum = r2c.make_output_vec();

        let window: Vec<f32> = (0..self.frame_size)
            .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / self.frame_size as f32).cos())
            .collect();

        let mut previous = vec![0.0_f32; spectrum.len()];
        let mut flux = Vec::with_capacity(samples.len() / self.hop + 1);
        let mut start = 0;
        while start + self.frame_size <= samples.len() {
            for ((slot, &sample), &w) in input
                .iter_mut()
                .zip(&samples[start..start + self.frame_size])
                .zip(&window)
            {
                *slot = sample * w;
            }
            r2c.process(&mut input, &mut spectrum)
                .map_err(|err| MixError::InvalidBeats(format!("fft failed: {}", err)))?;

            let mut total = 0.0_f32;
            for (bin, prev) in spectrum.iter().zip(previous.iter_mut()) {
                let magnitude = (1.0 + COMPRESSION * bin.norm()).ln();
                total += (magnitude - *prev).max(0.0);
                *prev = magnitude;
            }
            flux.push(total);
            start += self.hop;
        }
        // The first frame is measured against silence.
        if let Some(first) = flux.first_mut() {
            *first = 0.0;
        }

        let envelope = (0..flux.len())
            .map(|i| {
                let lo = i.saturating_sub(MEAN_RADIUS);
                let hi = (i + MEAN_RADIUS + 1).min(flux.len());
                let mean = flux[lo..hi].iter().sum::<f32>() / (hi - lo) as f32;
                (flux[i] - mean).max(0.0)
            })
            .collect();
        Ok(envelope)
    }

    /// Beat period in envelope frames (fractional) from the autocorrelation.
    fn period_frames(&self, envelope: &[f32], envelope_rate: f64) -> Option<f64> {
        let n = envelope.len();
        let min_lag = ((envelope_rate * 60.0 / self.max_bpm).floor() as usize).max(1);
        let max_lag = ((envelope_rate * 60.0 / self.min_bpm).ceil() as usize).min(n.saturating_sub(1));
        if min_lag + 1 >= max_lag {
            return None;
        }

        let autocorrelation: Vec<f64> = (0..=max_lag + 1)
            .map(|lag| {
                if lag >= n {
                    return 0.0;
                }
                let sum: f64 = envelope[..n - lag]
                    .iter()
                    .zip(&envelope[lag..])
                    .map(|(&a, &b)| a as f64 * b as f64)
                    .sum();
                sum / (n - lag) as f64
            })
            .collect();

        let weighted = |lag: usize| {
            let bpm = 60.0 * envelope_rate / lag as f64;
            let octaves = (bpm / self.prior_bpm).log2() / self.prior_width;
            autocorrelation[lag] * (-0.5 * octaves * octaves).exp()
        };
        let best = (min_lag..=max_lag).max_by(|&a, &b| {
            weighted(a)
                .partial_cmp(&weighted(b))
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;
        if !(autocorrelation[best] > 0.0) {
            return None;
        }

        // Parabolic refinement around the peak.
        let (a, b, c) = (
            autocorrelation[best - 1],
            autocorrelation[best],
            autocorrelation[best + 1],
        );
        let denominator = a - 2.0 * b + c;
        let offset = if denominator.abs() > f64::EPSILON {
            (0.5 * (a - c) / denominator).clamp(-0.5, 0.5)
        } else {
            0.0
        };
        Some(best as f64 + offset)
    }

    /// Beat positions (envelope frames) for the best-scoring phase.
    fn place_beats(envelope: &[f32], period: f64) -> Vec<usize> {
        let n = envelope.len();
        let comb = |phase: f64| -> f64 {
            let mut score = 0.0;
            let mut position = phase;
            while (position.round() as usize) < n {
                score += envelope[position.round() as usize] as f64;
                position += period;
            }
            score
        };
        let phase = (0..period.ceil() as usize)
            .map(|p| p as f64)
            .max_by(|a, b| {
                comb(*a)
                    .partial_cmp(&comb(*b))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(0.0);

        let radius = ((period / 8.0).round() as usize).max(1);
        let mut beats: Vec<usize> = Vec::new();
        let mut position = phase;
        while (position.round() as usize) < n {
            let center = position.round() as usize;
            let lo = center.saturating_sub(radius);
            let hi = (center + radius + 1).min(n);
            let peak = (lo..hi)
                .max_by(|&a, &b| {
                    envelope[a]
                        .partial_cmp(&envelope[b])
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .unwrap_or(center);
            if beats.last().map_or(true, |&last| peak > last) {
                beats.push(peak);
            }
            position += period;
        }
        beats
    }
}

impl BeatEstimator for OnsetBeatTracker {
    fn estimate(&self, samples: &[f32], sample_rate: u32) -> Result<BeatGrid, MixError> {
        let envelope = self.onset_envelope(samples)?;
        let envelope_rate = sample_rate as f64 / self.hop as f64;

        let period = self
            .period_frames(&envelope, envelope_rate)
            .ok_or(MixError::InsufficientBeats { found: 0 })?;
        let bpm = 60.0 * envelope_rate / period;

        let beats: Vec<f64> = Self::place_beats(&envelope, period)
            .into_iter()
            .map(|frame| (frame * self.hop) as f64 / sample_rate as f64)
            .collect();
        debug!("estimated {:.2} bpm with {} beats", bpm, beats.len());

        let grid = BeatGrid::new(bpm, beats);
        grid.validate()?;
        Ok(grid)
    }
}
