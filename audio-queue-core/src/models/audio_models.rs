use serde::{Deserialize, Serialize};

/// Sample rate of every recording the capture engine produces.
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Linear PCM stream description (signed, packed, little-endian).
///
/// This is the format descriptor stored in the container header and the
/// format handed to a `QueueDevice` on create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl PcmFormat {
    /// 16-bit signed mono at the given rate.
    pub const fn mono_16bit(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: 1,
            bits_per_sample: 16,
        }
    }

    /// Bytes in one frame (one sample per channel).
    pub fn bytes_per_frame(&self) -> usize {
        self.channels as usize * self.bits_per_sample as usize / 8
    }

    pub fn bytes_per_second(&self) -> u64 {
        self.sample_rate as u64 * self.bytes_per_frame() as u64
    }

    pub fn frames_to_secs(&self, frames: u64) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        frames as f64 / self.sample_rate as f64
    }

    pub fn bytes_to_secs(&self, bytes: u64) -> f64 {
        let bpf = self.bytes_per_frame() as u64;
        if bpf == 0 {
            return 0.0;
        }
        self.frames_to_secs(bytes / bpf)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate == 0 {
            return Err("sample rate must be positive".into());
        }
        if self.bits_per_sample != 16 {
            return Err(format!("unsupported bit depth: {}", self.bits_per_sample));
        }
        if ![1, 2].contains(&self.channels) {
            return Err(format!("unsupported channel count: {}", self.channels));
        }
        Ok(())
    }
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self::mono_16bit(DEFAULT_SAMPLE_RATE)
    }
}

/// Which way PCM flows through a buffer queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueDirection {
    /// Device fills buffers, engine drains them into the file.
    Capture,
    /// Engine fills buffers from the file, device drains them.
    Playback,
}

/// Per-session counters, reset on every `start`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineDiagnostics {
    pub callback_count: u64,
    pub requeue_count: u64,
    pub bytes_transferred: u64,
    pub io_failures: u64,
}
