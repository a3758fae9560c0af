//! Per-block loudness proxy for the capture path.

use serde::{Deserialize, Serialize};

use super::pcm_container::samples_i16;

/// Largest representable 16-bit magnitude, the normalization divisor.
pub const FULL_SCALE: f32 = i16::MAX as f32;

/// Turns one raw 16-bit block into one scalar.
///
/// The value is the sum over every sample of `|sample| / FULL_SCALE`
/// (each term clamped to 1.0 so `i16::MIN` does not overshoot). It is not
/// divided by the frame count: a short tail block scores lower than a full
/// block of the same loudness.
#[derive(Debug, Clone, Copy, Default)]
pub struct AmplitudeSampler;

impl AmplitudeSampler {
    /// Sample a little-endian byte block. A trailing odd byte is ignored.
    pub fn sample(&self, block: &[u8]) -> f32 {
        samples_i16(block).map(normalized_magnitude).sum()
    }
}

fn normalized_magnitude(sample: i16) -> f32 {
    (sample.unsigned_abs() as f32 / FULL_SCALE).min(1.0)
}

/// Ordered per-callback amplitude values for one capture session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AmplitudeSeries(Vec<f32>);

impl AmplitudeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: f32) {
        self.0.push(value);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &f32> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.0
    }
}

impl From<Vec<f32>> for AmplitudeSeries {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}
