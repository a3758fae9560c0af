use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::models::audio_models::PcmFormat;
use crate::models::error::EngineError;
use crate::processing::pcm_container::{self, HEADER_SIZE};

/// Sequential PCM container writer for the capture engine.
///
/// ## File format
///
/// ```text
/// [44-byte RIFF/WAVE header, sizes patched on close]
/// [raw 16-bit little-endian PCM...]
/// ```
///
/// The cursor counts payload bytes. Every write lands at the cursor, and the
/// cursor only advances by what was actually written.
#[derive(Debug)]
pub struct PcmFileWriter {
    file_path: PathBuf,
    format: PcmFormat,
    file: Option<File>,
    cursor: u64,
}

impl PcmFileWriter {
    /// Create or truncate `file_path` and write the initial header.
    pub fn create(file_path: impl Into<PathBuf>, format: PcmFormat) -> Result<Self, EngineError> {
        let file_path = file_path.into();
        format.validate().map_err(EngineError::UnsupportedFormat)?;

        if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| EngineError::File(format!("failed to create directory: {}", e)))?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&file_path)
            .map_err(|e| {
                EngineError::File(format!("failed to create {}: {}", file_path.display(), e))
            })?;

        file.write_all(&pcm_container::generate_header(&format, 0))
            .map_err(|e| EngineError::File(format!("failed to write header: {}", e)))?;

        Ok(Self {
            file_path,
            format,
            file: Some(file),
            cursor: 0,
        })
    }

    /// Write `data` at the cursor and advance it. Returns bytes written.
    pub fn write(&mut self, data: &[u8]) -> Result<usize, EngineError> {
        let offset = HEADER_SIZE as u64 + self.cursor;
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| EngineError::File("file is not open".into()))?;
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| EngineError::File(format!("seek failed: {}", e)))?;
        file.write_all(data)
            .map_err(|e| EngineError::File(format!("write failed: {}", e)))?;
        self.cursor += data.len() as u64;
        Ok(data.len())
    }

    /// Patch the header sizes and close. Returns payload bytes written.
    ///
    /// Closing twice is harmless and returns the same count.
    pub fn close(&mut self) -> Result<u64, EngineError> {
        let Some(mut file) = self.file.take() else {
            return Ok(self.cursor);
        };

        let mut header = pcm_container::generate_header(&self.format, 0);
        pcm_container::patch_data_size(&mut header, self.cursor);
        pcm_container::patch_file_size(&mut header, HEADER_SIZE as u64 + self.cursor);

        file.seek(SeekFrom::Start(0))
            .map_err(|e| EngineError::File(e.to_string()))?;
        file.write_all(&header)
            .map_err(|e| EngineError::File(format!("failed to patch header: {}", e)))?;
        file.flush().map_err(|e| EngineError::File(e.to_string()))?;

        log::debug!(
            "closed {} ({} payload bytes)",
            self.file_path.display(),
            self.cursor
        );
        Ok(self.cursor)
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Payload bytes written so far.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn format(&self) -> PcmFormat {
        self.format
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

/// Read-only PCM container reader for the playback engine.
#[derive(Debug)]
pub struct PcmFileReader {
    file_path: PathBuf,
    format: PcmFormat,
    file: Option<File>,
    data_len: u64,
    cursor: u64,
}

impl PcmFileReader {
    /// Open `file_path` and parse its header.
    ///
    /// A header whose data size was never patched (a recording that did not
    /// close cleanly) is read to the end of the file.
    pub fn open(file_path: impl Into<PathBuf>) -> Result<Self, EngineError> {
        let file_path = file_path.into();
        let mut file = File::open(&file_path).map_err(|e| {
            EngineError::File(format!("failed to open {}: {}", file_path.display(), e))
        })?;

        let mut header = [0u8; HEADER_SIZE];
        file.read_exact(&mut header).map_err(|e| {
            EngineError::UnsupportedFormat(format!("failed to read header: {}", e))
        })?;
        let (format, declared) = pcm_container::parse_header(&header)?;

        let file_len = file
            .metadata()
            .map_err(|e| EngineError::File(e.to_string()))?
            .len();
        let available = file_len.saturating_sub(HEADER_SIZE as u64);
        let data_len = if declared == 0 {
            available
        } else {
            (declared as u64).min(available)
        };

        Ok(Self {
            file_path,
            format,
            file: Some(file),
            data_len,
            cursor: 0,
        })
    }

    /// Read the next whole frames into `out`, up to its length.
    ///
    /// Returns bytes read; 0 means end of stream.
    pub fn read_frames(&mut self, out: &mut [u8]) -> Result<usize, EngineError> {
        let frame = self.format.bytes_per_frame();
        let remaining = self.data_len - self.cursor;
        let wanted = (out.len().min(remaining as usize) / frame) * frame;
        if wanted == 0 {
            return Ok(0);
        }

        let offset = HEADER_SIZE as u64 + self.cursor;
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| EngineError::File("file is not open".into()))?;
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| EngineError::File(format!("seek failed: {}", e)))?;
        file.read_exact(&mut out[..wanted])
            .map_err(|e| EngineError::File(format!("read failed: {}", e)))?;

        self.cursor += wanted as u64;
        Ok(wanted)
    }

    pub fn close(&mut self) {
        self.file = None;
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    pub fn format(&self) -> PcmFormat {
        self.format
    }

    /// Payload bytes consumed so far.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Payload bytes in the file.
    pub fn data_len(&self) -> u64 {
        self.data_len
    }

    pub fn duration_secs(&self) -> f64 {
        self.format.bytes_to_secs(self.data_len)
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("audio_queue_pcm_{}_{}", std::process::id(), name))
    }

    #[test]
    fn writer_patches_sizes_on_close() {
        let path = temp_file_path("writer.wav");
        let mut writer = PcmFileWriter::create(&path, PcmFormat::default()).unwrap();
        writer.write(&[1u8; 1024]).unwrap();
        writer.write(&[2u8; 512]).unwrap();
        assert_eq!(writer.cursor(), 1536);

        assert_eq!(writer.close().unwrap(), 1536);
        assert!(!writer.is_open());
        assert_eq!(writer.close().unwrap(), 1536);

        let data = fs::read(&path).unwrap();
        assert_eq!(data.len(), 44 + 1536);
        let (format, data_size) = pcm_container::parse_header(&data).unwrap();
        assert_eq!(format, PcmFormat::default());
        assert_eq!(data_size, 1536);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn create_truncates_previous_recording() {
        let path = temp_file_path("truncate.wav");
        let mut first = PcmFileWriter::create(&path, PcmFormat::default()).unwrap();
        first.write(&[7u8; 4096]).unwrap();
        first.close().unwrap();

        let mut second = PcmFileWriter::create(&path, PcmFormat::default()).unwrap();
        second.write(&[9u8; 8]).unwrap();
        second.close().unwrap();

        assert_eq!(fs::metadata(&path).unwrap().len(), 44 + 8);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn write_after_close_fails_without_advancing() {
        let path = temp_file_path("closed.wav");
        let mut writer = PcmFileWriter::create(&path, PcmFormat::default()).unwrap();
        writer.close().unwrap();

        let err = writer.write(&[0u8; 4]).unwrap_err();
        assert!(err.is_file());
        assert_eq!(writer.cursor(), 0);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn create_in_missing_directory_tree() {
        let dir = temp_file_path("nested_dir");
        let path = dir.join("a").join("rec.wav");
        let mut writer = PcmFileWriter::create(&path, PcmFormat::default()).unwrap();
        writer.close().unwrap();
        assert!(path.exists());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn reader_streams_whole_frames_until_eof() {
        let path = temp_file_path("reader.wav");
        let mut writer = PcmFileWriter::create(&path, PcmFormat::default()).unwrap();
        let payload: Vec<u8> = (0..2500u32).map(|i| i as u8).collect();
        writer.write(&payload).unwrap();
        writer.close().unwrap();

        let mut reader = PcmFileReader::open(&path).unwrap();
        assert_eq!(reader.data_len(), 2500);

        let mut out = vec![0u8; 1024];
        let mut collected = Vec::new();
        loop {
            let n = reader.read_frames(&mut out).unwrap();
            if n == 0 {
                break;
            }
            collected.extend_from_slice(&out[..n]);
        }
        assert_eq!(collected, payload);
        assert_eq!(reader.cursor(), 2500);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn reader_drops_trailing_partial_frame() {
        let path = temp_file_path("odd.wav");
        let mut writer = PcmFileWriter::create(&path, PcmFormat::default()).unwrap();
        writer.write(&[1u8; 5]).unwrap();
        writer.close().unwrap();

        let mut reader = PcmFileReader::open(&path).unwrap();
        let mut out = [0u8; 16];
        assert_eq!(reader.read_frames(&mut out).unwrap(), 4);
        assert_eq!(reader.read_frames(&mut out).unwrap(), 0);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn reader_falls_back_to_file_length_for_unpatched_header() {
        let path = temp_file_path("unpatched.wav");
        let mut bytes = pcm_container::generate_header(&PcmFormat::default(), 0).to_vec();
        bytes.extend_from_slice(&[0u8; 300]);
        fs::write(&path, &bytes).unwrap();

        let reader = PcmFileReader::open(&path).unwrap();
        assert_eq!(reader.data_len(), 300);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn reader_rejects_missing_and_foreign_files() {
        let missing = temp_file_path("does_not_exist.wav");
        assert!(PcmFileReader::open(&missing).unwrap_err().is_file());

        let path = temp_file_path("foreign.wav");
        fs::write(&path, vec![0u8; 100]).unwrap();
        let err = PcmFileReader::open(&path).unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedFormat(_)));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn duration_from_payload() {
        let path = temp_file_path("duration.wav");
        let mut writer = PcmFileWriter::create(&path, PcmFormat::default()).unwrap();
        writer.write(&vec![0u8; 88_200]).unwrap();
        writer.close().unwrap();

        let reader = PcmFileReader::open(&path).unwrap();
        assert!((reader.duration_secs() - 1.0).abs() < 1e-9);
        fs::remove_file(&path).ok();
    }
}
