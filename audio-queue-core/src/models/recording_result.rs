use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::audio_models::PcmFormat;

/// What the capture engine reports when a recording stops.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingSummary {
    pub file_path: PathBuf,
    /// Device-timeline duration. `None` if no timeline was ever available.
    pub duration_secs: Option<f64>,
    pub bytes_written: u64,
    pub amplitude_count: usize,
}

/// Sidecar stored next to the container as `<file>.metadata.json`.
///
/// Carries the amplitude series so the report can be rendered by a
/// process that did not do the recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub id: String,
    pub created_at: String,
    pub file_path: String,
    pub format: PcmFormat,
    pub duration_secs: Option<f64>,
    pub bytes_written: u64,
    pub checksum: String,
    pub amplitudes: Vec<f32>,
}

impl RecordingMetadata {
    pub fn new(
        summary: &RecordingSummary,
        format: PcmFormat,
        checksum: &str,
        amplitudes: Vec<f32>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            file_path: summary.file_path.to_string_lossy().to_string(),
            format,
            duration_secs: summary.duration_secs,
            bytes_written: summary.bytes_written,
            checksum: checksum.to_string(),
            amplitudes,
        }
    }
}
