//! Linear crossfades and fades.

use crate::error::MixError;

/// Blend the last `overlap` samples of `first` into the first `overlap`
/// samples of `second`.
///
/// The result has length `first.len() + second.len() - overlap`; sample `i`
/// of the junction is `first_tail[i] * (1 - i/overlap) + second_head[i] * (i/overlap)`.
///
/// # Errors
/// Fails if either input is shorter than the overlap.
pub fn crossfade(first: &[f32], second: &[f32], overlap: usize) -> Result<Vec<f32>, MixError> {
    if first.len() < overlap || second.len() < overlap {
        return Err(MixError::CrossfadeTooShort {
            overlap,
            first: first.len(),
            second: second.len(),
        });
    }

    let split = first.len() - overlap;
    let mut out = Vec::with_capacity(first.len() + second.len() - overlap);
    out.extend_from_slice(&first[..split]);
    for (i, (&a, &b)) in first[split..].iter().zip(&second[..overlap]).enumerate() {
        let t = i as f32 / overlap as f32;
        out.push(a * (1.0 - t) + b * t);
    }
    out.extend_from_slice(&second[overlap..]);
    Ok(out)
}

/// [`crossfade`] with the overlap given in seconds.
pub fn crossfade_seconds(
    first: &[f32],
    second: &[f32],
    overlap_seconds: f64,
    sample_rate: u32,
) -> Result<Vec<f32>, MixError> {
    let overlap = (overlap_seconds * sample_rate as f64) as usize;
    crossfade(first, second, overlap)
}

/// Gain of a linear 1 -> 0 ramp across `len` samples, endpoints included.
pub fn fade_out_gain(index: usize, len: usize) -> f32 {
    if len <= 1 {
        return 1.0;
    }
    1.0 - index as f32 / (len - 1) as f32
}

/// Apply a linear 1 -> 0 fade across the whole slice.
pub fn apply_fade_out(samples: &mut [f32]) {
    let len = samples.len();
    for (i, sample) in samples.iter_mut().enumerate() {
        *sample *= fade_out_gain(i, len);
    }
}
