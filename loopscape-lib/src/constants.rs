//! Shared constants for mixing defaults.

/// Default sample rate used for decoding and rendering (Hz).
pub const SAMPLE_RATE: u32 = 44100;

/// Epsilon added to the RMS before taking its logarithm.
pub const RMS_EPSILON: f64 = 1e-6;

/// Noise buffers are refilled once fewer than this many seconds remain.
pub const NOISE_REFILL_SECONDS: f64 = 5.0;

/// Overlap used when a fresh noise segment is blended onto a track.
pub const NOISE_CROSSFADE_SECONDS: f64 = 2.0;

/// Stop growing the music LCM once it reaches this multiple of the target.
pub const LCM_CAP_FACTOR: f64 = 2.0;

/// Largest accepted overshoot of the LCM-derived length over the target.
pub const OVERSHOOT_TOLERANCE: f64 = 0.1;

/// Number of random candidates drawn by the fallback length search.
pub const SEARCH_ITERATIONS: usize = 100_000;

/// Progress is logged every this many rendered seconds.
pub const PROGRESS_INTERVAL_SECONDS: u64 = 100;
