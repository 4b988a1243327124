//! Per-track sample queues consumed by the mixer.

use std::collections::VecDeque;

use log::debug;
use rand::Rng;

use crate::config::TrackKind;
use crate::dsp::crossfade::{crossfade, fade_out_gain};
use crate::error::MixError;

/// A prepared track plus the samples still queued for output.
///
/// Music queues are topped up by appending the whole (loop-padded) source.
/// Noise queues are topped up with random segments of the source,
/// crossfaded onto the queued tail.
#[derive(Debug, Clone)]
pub struct TrackStream {
    pub name: String,
    pub kind: TrackKind,
    source: Vec<f32>,
    remaining: VecDeque<f32>,
    refills: usize,
}

impl TrackStream {
    pub fn new(name: impl Into<String>, kind: TrackKind, source: Vec<f32>) -> Result<Self, MixError> {
        let name = name.into();
        if source.is_empty() {
            return Err(MixError::EmptySource(name));
        }
        let remaining = source.iter().copied().collect();
        Ok(Self {
            name,
            kind,
            source,
            remaining,
            refills: 0,
        })
    }

    pub fn source_len(&self) -> usize {
        self.source.len()
    }

    pub fn remaining_len(&self) -> usize {
        self.remaining.len()
    }

    /// Number of noise segments blended in so far.
    pub fn refills(&self) -> usize {
        self.refills
    }

    /// Append whole copies of the source until `frames` samples are queued.
    pub fn ensure_music(&mut self, frames: usize) {
        while self.remaining.len() < frames {
            self.remaining.extend(self.source.iter().copied());
        }
    }

    /// Blend random source segments onto the queue until at least
    /// `threshold` samples are queued.
    ///
    /// # Errors
    /// Fails if the queued tail or the source is shorter than `overlap`.
    pub fn ensure_noise<R: Rng + ?Sized>(
        &mut self,
        threshold: usize,
        overlap: usize,
        rng: &mut R,
    ) -> Result<(), MixError> {
        while self.remaining.len() < threshold {
            let (start, length) = self.random_segment(threshold, rng);
            if self.remaining.len() < overlap || length <= overlap {
                return Err(MixError::CrossfadeTooShort {
                    overlap,
                    first: self.remaining.len(),
                    second: length,
                });
            }

            let tail: Vec<f32> = self
                .remaining
                .drain(self.remaining.len() - overlap..)
                .collect();
            let blended = crossfade(&tail, &self.source[start..start + length], overlap)?;
            self.remaining.extend(blended);
            self.refills += 1;
            debug!(
                "{}: refilled with {} samples from offset {} ({} queued)",
                self.name,
                length,
                start,
                self.remaining.len()
            );
        }
        Ok(())
    }

    /// Segment length in `[max(len/4, threshold) capped at len, len]` and a
    /// start offset that keeps it inside the source.
    fn random_segment<R: Rng + ?Sized>(&self, threshold: usize, rng: &mut R) -> (usize, usize) {
        let len = self.source.len();
        let min_length = (len / 4).max(threshold).min(len);
        let length = rng.gen_range(min_length..=len);
        let start = rng.gen_range(0..=len - length);
        (start, length)
    }

    /// Add the next `frame.len()` queued samples into `frame` and drop them
    /// from the queue, optionally under a linear fade-out.
    pub fn take_into(&mut self, frame: &mut [f32], fade_out: bool) {
        let len = frame.len();
        let take = len.min(self.remaining.len());
        for (i, (out, sample)) in frame.iter_mut().zip(self.remaining.drain(..take)).enumerate() {
            let gain = if fade_out { fade_out_gain(i, len) } else { 1.0 };
            *out += sample * gain;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn empty_source_is_rejected() {
        assert!(matches!(
            TrackStream::new("silence", TrackKind::Music, Vec::new()),
            Err(MixError::EmptySource(_))
        ));
    }

    #[test]
    fn music_is_repeated_whole() {
        let mut track = TrackStream::new("loop", TrackKind::Music, vec![1.0, 2.0, 3.0]).unwrap();
        let mut frame = vec![0.0; 4];
        track.ensure_music(4);
        track.take_into(&mut frame, false);
        assert_eq!(frame, vec![1.0, 2.0, 3.0, 1.0]);
        assert_eq!(track.remaining_len(), 2);

        let mut frame = vec![0.0; 7];
        track.ensure_music(7);
        track.take_into(&mut frame, false);
        assert_eq!(frame, vec![2.0, 3.0, 1.0, 2.0, 3.0, 1.0, 2.0]);
    }

    #[test]
    fn noise_refill_reaches_threshold() {
        let source: Vec<f32> = (0..80).map(|i| i as f32).collect();
        let mut track = TrackStream::new("rain", TrackKind::Noise, source).unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        let mut frame = vec![0.0; 70];
        track.take_into(&mut frame, false);
        assert_eq!(track.remaining_len(), 10);

        track.ensure_noise(50, 10, &mut rng).unwrap();
        assert!(track.remaining_len() >= 50);
        assert!(track.refills() >= 1);
    }

    #[test]
    fn noise_shorter_than_overlap_fails() {
        let mut track = TrackStream::new("tick", TrackKind::Noise, vec![0.5; 5]).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            track.ensure_noise(20, 8, &mut rng),
            Err(MixError::CrossfadeTooShort { .. })
        ));
    }

    #[test]
    fn fade_out_applies_across_frame() {
        let mut track = TrackStream::new("pad", TrackKind::Music, vec![1.0; 5]).unwrap();
        let mut frame = vec![0.0; 5];
        track.take_into(&mut frame, true);
        assert_eq!(frame, vec![1.0, 0.75, 0.5, 0.25, 0.0]);
    }
}
