use std::path::PathBuf;

use super::audio_models::PcmFormat;

/// Container file every recording overwrites, relative to the working directory.
pub const DEFAULT_FILE_NAME: &str = "recordedAudio.wav";

/// Upper bound on buffers in one ring.
pub const MAX_BUFFER_COUNT: usize = 16;

/// Configuration shared by the capture and playback engines.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfiguration {
    /// The single PCM container. Truncated on every new recording.
    pub file_path: PathBuf,

    /// Format written by capture. Playback uses the format read from the file header.
    pub format: PcmFormat,

    /// Buffers in the ring (default: 3).
    pub buffer_count: usize,

    /// Capacity of each buffer in bytes (default: 1024). Must hold whole frames.
    pub buffer_size_bytes: usize,
}

impl EngineConfiguration {
    pub fn with_file(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        self.format.validate()?;
        if self.buffer_count == 0 || self.buffer_count > MAX_BUFFER_COUNT {
            return Err(format!(
                "buffer count must be between 1 and {}, got {}",
                MAX_BUFFER_COUNT, self.buffer_count
            ));
        }
        let frame = self.format.bytes_per_frame();
        if self.buffer_size_bytes == 0 || self.buffer_size_bytes % frame != 0 {
            return Err(format!(
                "buffer size {} is not a positive multiple of the {}-byte frame",
                self.buffer_size_bytes, frame
            ));
        }
        Ok(())
    }

    /// Frames that fit in one buffer.
    pub fn frames_per_buffer(&self) -> usize {
        self.buffer_size_bytes / self.format.bytes_per_frame().max(1)
    }
}

impl Default for EngineConfiguration {
    fn default() -> Self {
        Self {
            file_path: PathBuf::from(DEFAULT_FILE_NAME),
            format: PcmFormat::default(),
            buffer_count: 3,
            buffer_size_bytes: 1024,
        }
    }
}

/// Report windowing and document info.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportConfiguration {
    /// Wall-clock span of one chart panel.
    pub seconds_per_window: f64,
    pub title: String,
    pub author: String,
    pub creator: String,
}

impl ReportConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.seconds_per_window.is_finite() && self.seconds_per_window > 0.0) {
            return Err(format!(
                "seconds per window must be positive, got {}",
                self.seconds_per_window
            ));
        }
        Ok(())
    }
}

impl Default for ReportConfiguration {
    fn default() -> Self {
        Self {
            seconds_per_window: 10.0,
            title: "Audio amplitude".into(),
            author: String::new(),
            creator: "Audio Recorder / Player".into(),
        }
    }
}

/// Configuration for `AudioSession`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionConfiguration {
    pub engine: EngineConfiguration,
    pub report: ReportConfiguration,

    /// Write `<file>.metadata.json` next to the container when a recording stops.
    pub write_metadata: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_configuration_is_valid() {
        let config = EngineConfiguration::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.frames_per_buffer(), 512);
    }

    #[test]
    fn rejects_empty_ring() {
        let config = EngineConfiguration {
            buffer_count: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_partial_frames() {
        let config = EngineConfiguration {
            buffer_size_bytes: 1023,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn report_window_must_be_positive() {
        let report = ReportConfiguration {
            seconds_per_window: 0.0,
            ..Default::default()
        };
        assert!(report.validate().is_err());
        assert!(ReportConfiguration::default().validate().is_ok());
    }
}
