//! Streaming pitch shifter for the playback path.
//!
//! Delay-line shifter: each channel keeps a short history and reads it
//! through two taps whose delay sweeps at `1 - ratio` samples per sample.
//! The taps are half a window apart and crossfaded with Hann gains, so each
//! tap's wrap-around happens while its gain is zero. Output length always
//! equals input length; tempo is preserved.

use crate::models::state::MAX_PITCH_OFFSET_CENTS;

use super::pcm_container::{samples_i16, write_samples_i16};

/// Delay sweep window in samples (about 46 ms at 44.1 kHz).
pub const WINDOW_LEN: usize = 2048;

#[derive(Debug, Clone)]
struct DelayLine {
    history: Vec<f32>,
    write: usize,
    phase: f32,
}

impl DelayLine {
    fn new() -> Self {
        Self {
            history: vec![0.0; WINDOW_LEN + 2],
            write: 0,
            phase: 0.0,
        }
    }

    fn read(&self, delay: f32) -> f32 {
        let len = self.history.len() as f32;
        let mut pos = self.write as f32 - delay;
        if pos < 0.0 {
            pos += len;
        }
        let base = pos.floor();
        let frac = pos - base;
        let i0 = base as usize % self.history.len();
        let i1 = (i0 + 1) % self.history.len();
        self.history[i0] * (1.0 - frac) + self.history[i1] * frac
    }

    fn process(&mut self, input: f32, step: f32) -> f32 {
        self.write = (self.write + 1) % self.history.len();
        self.history[self.write] = input;

        let window = WINDOW_LEN as f32;
        let phase_b = (self.phase + 0.5).fract();
        let gain_a = hann(self.phase);
        let gain_b = hann(phase_b);
        let out = gain_a * self.read(self.phase * window) + gain_b * self.read(phase_b * window);

        self.phase = (self.phase + step).rem_euclid(1.0);
        out
    }
}

fn hann(phase: f32) -> f32 {
    0.5 - 0.5 * (std::f32::consts::TAU * phase).cos()
}

/// Pitch offset stage applied to interleaved 16-bit output buffers.
#[derive(Debug, Clone)]
pub struct PitchShifter {
    cents: f32,
    ratio: f32,
    lines: Vec<DelayLine>,
}

impl PitchShifter {
    /// Create a shifter for `channels` interleaved channels.
    ///
    /// Offsets outside ±600 cents are clamped; non-finite offsets become 0.
    pub fn new(cents: f32, channels: u16) -> Self {
        let requested = if cents.is_finite() { cents } else { 0.0 };
        let clamped = requested.clamp(-MAX_PITCH_OFFSET_CENTS, MAX_PITCH_OFFSET_CENTS);
        if clamped != requested {
            log::warn!(
                "pitch offset {} cents out of range, clamped to {}",
                cents,
                clamped
            );
        }
        Self {
            cents: clamped,
            ratio: 2f32.powf(clamped / 1200.0),
            lines: (0..channels.max(1)).map(|_| DelayLine::new()).collect(),
        }
    }

    /// Effective offset after clamping.
    pub fn cents(&self) -> f32 {
        self.cents
    }

    /// Frequency ratio, `2^(cents / 1200)`.
    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    pub fn is_bypass(&self) -> bool {
        self.cents == 0.0
    }

    /// Shift one interleaved sample block in place.
    pub fn process(&mut self, samples: &mut [i16]) {
        if self.is_bypass() {
            return;
        }
        let step = (1.0 - self.ratio) / WINDOW_LEN as f32;
        let channels = self.lines.len();
        for (i, sample) in samples.iter_mut().enumerate() {
            let line = &mut self.lines[i % channels];
            let out = line.process(*sample as f32, step);
            *sample = out.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        }
    }

    /// Shift little-endian PCM bytes in place. A trailing odd byte is left as is.
    pub fn process_bytes(&mut self, bytes: &mut [u8]) {
        if self.is_bypass() {
            return;
        }
        let mut samples: Vec<i16> = samples_i16(bytes).collect();
        self.process(&mut samples);
        write_samples_i16(&samples, bytes);
    }
}
