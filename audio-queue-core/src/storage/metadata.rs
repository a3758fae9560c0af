use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::error::EngineError;
use crate::models::recording_result::RecordingMetadata;

/// Sidecar path for a recording: `{stem}.metadata.json` next to it.
pub fn metadata_path(recording_path: &Path) -> PathBuf {
    recording_path.with_extension("metadata.json")
}

/// Write recording metadata as a JSON sidecar file.
pub fn write_metadata(metadata: &RecordingMetadata, recording_path: &Path) -> Result<(), EngineError> {
    let json = serde_json::to_string_pretty(metadata)
        .map_err(|e| EngineError::File(format!("failed to serialize metadata: {}", e)))?;
    fs::write(metadata_path(recording_path), json)
        .map_err(|e| EngineError::File(format!("failed to write metadata: {}", e)))?;
    Ok(())
}

/// Read recording metadata from a JSON sidecar file.
pub fn read_metadata(recording_path: &Path) -> Result<RecordingMetadata, EngineError> {
    let json = fs::read_to_string(metadata_path(recording_path))
        .map_err(|e| EngineError::File(format!("failed to read metadata: {}", e)))?;
    let metadata: RecordingMetadata = serde_json::from_str(&json)
        .map_err(|e| EngineError::File(format!("failed to parse metadata: {}", e)))?;
    Ok(metadata)
}

/// SHA-256 hex digest of a file.
pub fn file_checksum(path: &Path) -> Result<String, EngineError> {
    let data = fs::read(path)
        .map_err(|e| EngineError::File(format!("failed to read file for checksum: {}", e)))?;
    let digest = Sha256::digest(&data);
    Ok(hex_encode(&digest))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::audio_models::PcmFormat;
    use crate::models::recording_result::RecordingSummary;

    fn temp_file_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("audio_queue_meta_{}_{}", std::process::id(), name))
    }

    #[test]
    fn sidecar_sits_next_to_recording() {
        let path = Path::new("/tmp/recordedAudio.wav");
        assert_eq!(metadata_path(path), Path::new("/tmp/recordedAudio.metadata.json"));
    }

    #[test]
    fn metadata_round_trips_through_sidecar() {
        let recording = temp_file_path("rec.wav");
        let summary = RecordingSummary {
            file_path: recording.clone(),
            duration_secs: Some(12.5),
            bytes_written: 1_102_500,
            amplitude_count: 3,
        };
        let metadata = RecordingMetadata::new(
            &summary,
            PcmFormat::default(),
            "abc123",
            vec![1.0, 2.5, 0.0],
        );

        write_metadata(&metadata, &recording).unwrap();
        let loaded = read_metadata(&recording).unwrap();
        assert_eq!(loaded, metadata);
        assert_eq!(loaded.amplitudes, vec![1.0, 2.5, 0.0]);
        assert!(uuid::Uuid::parse_str(&loaded.id).is_ok());

        fs::remove_file(metadata_path(&recording)).ok();
    }

    #[test]
    fn duration_survives_sidecar_bit_for_bit() {
        let recording = temp_file_path("duration_bits.wav");
        // 20480 frames at 44.1 kHz; parses one ULP off without exact float parsing.
        let duration = 0.464_399_092_970_521_57_f64;
        let summary = RecordingSummary {
            file_path: recording.clone(),
            duration_secs: Some(duration),
            bytes_written: 40 * 1024,
            amplitude_count: 40,
        };
        let metadata = RecordingMetadata::new(&summary, PcmFormat::default(), "abc123", vec![0.1; 40]);

        write_metadata(&metadata, &recording).unwrap();
        let loaded = read_metadata(&recording).unwrap();
        assert_eq!(loaded.duration_secs.map(f64::to_bits), Some(duration.to_bits()));
        assert_eq!(loaded.amplitudes, vec![0.1f32; 40]);

        fs::remove_file(metadata_path(&recording)).ok();
    }

    #[test]
    fn missing_sidecar_is_a_file_error() {
        let err = read_metadata(&temp_file_path("never_written.wav")).unwrap_err();
        assert!(err.is_file());
    }

    #[test]
    fn checksum_is_sha256_hex() {
        let path = temp_file_path("checksum.bin");
        fs::write(&path, b"abc").unwrap();
        assert_eq!(
            file_checksum(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        fs::remove_file(&path).ok();
    }
}
