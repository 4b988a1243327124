//! Owned mono sample buffer.

/// Single-channel `f32` samples at a fixed sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub sample_rate: u32,
    pub samples: Vec<f32>,
}

impl AudioBuffer {
    pub fn new(sample_rate: u32, samples: Vec<f32>) -> Self {
        Self {
            sample_rate,
            samples,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Length of the buffer in seconds.
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Sample index for a time in seconds, truncated and clamped to the buffer.
    pub fn sample_at(&self, seconds: f64) -> usize {
        let index = (seconds.max(0.0) * self.sample_rate as f64) as usize;
        index.min(self.samples.len())
    }
}
