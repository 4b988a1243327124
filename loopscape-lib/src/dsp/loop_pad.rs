//! Beat-aligned loop padding for music beds.
//!
//! The span between the first and last detected beat already loops in time.
//! What does not is the lead-out after the last beat followed by the lead-in
//! before the first one, so a bridge is synthesized between the two that
//! rounds their combined length up to one or two beat periods.

use log::{debug, info};

use crate::audio::AudioBuffer;
use crate::beats::BeatGrid;
use crate::error::MixError;

use super::bridge::bridge;

/// Where the lead fragments sit and how much padding they need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaddingPlan {
    /// First sample of the first beat; `audio[..start_sample]` is the lead-in.
    pub start_sample: usize,
    /// First sample of the last beat; `audio[end_sample..]` is the lead-out.
    pub end_sample: usize,
    pub beat_period: usize,
    /// Lead-in plus lead-out length.
    pub combined: usize,
    /// Number of bridge samples appended to the clip.
    pub padding: usize,
}

/// Bridge length that brings `combined` lead samples up to whole beats.
///
/// One beat when the leads are shorter than a beat, two beats when they are
/// shorter than (or equal to) two. Longer leads round up to the next whole
/// beat.
pub fn padding_length(combined: usize, beat_period: usize) -> usize {
    if combined < beat_period {
        beat_period - combined
    } else if combined <= 2 * beat_period {
        2 * beat_period - combined
    } else {
        combined.div_ceil(beat_period) * beat_period - combined
    }
}

/// Locate the lead fragments of `buffer` and size the bridge between them.
///
/// # Errors
/// Fails fast on a grid with fewer than two beats or a non-positive tempo.
pub fn plan_padding(buffer: &AudioBuffer, grid: &BeatGrid) -> Result<PaddingPlan, MixError> {
    grid.validate()?;
    let beat_period = grid.beat_period_samples(buffer.sample_rate)?;

    let start_sample = buffer.sample_at(grid.first_beat());
    let end_sample = buffer.sample_at(grid.last_beat()).max(start_sample);
    let combined = start_sample + (buffer.len() - end_sample);

    Ok(PaddingPlan {
        start_sample,
        end_sample,
        beat_period,
        combined,
        padding: padding_length(combined, beat_period),
    })
}

/// Append an interpolated bridge so `buffer` loops end to start without a
/// seam.
pub fn pad_music(buffer: &AudioBuffer, grid: &BeatGrid) -> Result<AudioBuffer, MixError> {
    let plan = plan_padding(buffer, grid)?;
    debug!(
        "padding plan: start={} end={} beat={} combined={} padding={}",
        plan.start_sample, plan.end_sample, plan.beat_period, plan.combined, plan.padding
    );

    let lead_in = context(&buffer.samples[..plan.start_sample], &buffer.samples, Edge::Head);
    let lead_out = context(&buffer.samples[plan.end_sample..], &buffer.samples, Edge::Tail);
    let bridge = bridge(lead_out, plan.padding, lead_in);

    let mut samples = Vec::with_capacity(buffer.len() + bridge.len());
    samples.extend_from_slice(&buffer.samples);
    samples.extend_from_slice(&bridge);

    info!(
        "padded {} samples with a {} sample bridge ({:.1} bpm)",
        buffer.len(),
        bridge.len(),
        grid.bpm
    );
    Ok(AudioBuffer::new(buffer.sample_rate, samples))
}

enum Edge {
    Head,
    Tail,
}

/// A lead fragment, or the two samples at the clip edge when the fragment is
/// too short to carry a slope. The bridge always has to meet the actual wrap
/// point of the clip.
fn context<'a>(fragment: &'a [f32], whole: &'a [f32], edge: Edge) -> &'a [f32] {
    if fragment.len() >= 2 {
        return fragment;
    }
    let take = whole.len().min(2);
    match edge {
        Edge::Head => &whole[..take],
        Edge::Tail => &whole[whole.len() - take..],
    }
}
