//! RIFF/WAVE container for linear PCM files.
//!
//! Engines write a 44-byte header up front with zero sizes and patch the
//! size fields on close. Reading accepts any canonical header whose format
//! code is 1 (integer PCM).

use crate::models::audio_models::PcmFormat;
use crate::models::error::EngineError;

/// Size of the canonical RIFF header in bytes.
pub const HEADER_SIZE: usize = 44;

/// Build a 44-byte header for `format` with the given payload size.
///
/// ```text
/// [0-3]    "RIFF"
/// [4-7]    36 + data_size
/// [8-11]   "WAVE"
/// [12-15]  "fmt "
/// [16-19]  16
/// [20-21]  1 (integer PCM)
/// [22-23]  channels
/// [24-27]  sample_rate
/// [28-31]  byte_rate
/// [32-33]  block_align
/// [34-35]  bits_per_sample
/// [36-39]  "data"
/// [40-43]  data_size
/// ```
pub fn generate_header(format: &PcmFormat, data_size: u32) -> [u8; HEADER_SIZE] {
    let block_align = format.channels * format.bits_per_sample / 8;
    let byte_rate = format.sample_rate * block_align as u32;

    let mut header = [0u8; HEADER_SIZE];
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&(36u32.saturating_add(data_size)).to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");

    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&1u16.to_le_bytes());
    header[22..24].copy_from_slice(&format.channels.to_le_bytes());
    header[24..28].copy_from_slice(&format.sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&format.bits_per_sample.to_le_bytes());

    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_size.to_le_bytes());
    header
}

/// Parse a header, returning the format and the declared payload size.
pub fn parse_header(bytes: &[u8]) -> Result<(PcmFormat, u32), EngineError> {
    if bytes.len() < HEADER_SIZE {
        return Err(EngineError::UnsupportedFormat(format!(
            "header is {} bytes, need {}",
            bytes.len(),
            HEADER_SIZE
        )));
    }
    if &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err(EngineError::UnsupportedFormat("not a RIFF/WAVE file".into()));
    }
    if &bytes[12..16] != b"fmt " || &bytes[36..40] != b"data" {
        return Err(EngineError::UnsupportedFormat(
            "non-canonical chunk layout".into(),
        ));
    }
    let format_code = read_u16(bytes, 20);
    if format_code != 1 {
        return Err(EngineError::UnsupportedFormat(format!(
            "format code {format_code} is not integer PCM"
        )));
    }

    let format = PcmFormat {
        channels: read_u16(bytes, 22),
        sample_rate: read_u32(bytes, 24),
        bits_per_sample: read_u16(bytes, 34),
    };
    format.validate().map_err(EngineError::UnsupportedFormat)?;
    Ok((format, read_u32(bytes, 40)))
}

/// Patch the RIFF chunk size at offset 4 (total file size - 8).
pub fn patch_file_size(header: &mut [u8], total_file_size: u64) {
    let chunk_size = clamp_u32(total_file_size.saturating_sub(8));
    header[4..8].copy_from_slice(&chunk_size.to_le_bytes());
}

/// Patch the data chunk size at offset 40.
pub fn patch_data_size(header: &mut [u8], data_size: u64) {
    header[40..44].copy_from_slice(&clamp_u32(data_size).to_le_bytes());
}

/// Read little-endian signed 16-bit samples. A trailing odd byte is ignored.
pub fn samples_i16(bytes: &[u8]) -> impl Iterator<Item = i16> + '_ {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
}

/// Write `samples` as little-endian bytes into `out`, returning bytes written.
pub fn write_samples_i16(samples: &[i16], out: &mut [u8]) -> usize {
    let mut written = 0;
    for (sample, slot) in samples.iter().zip(out.chunks_exact_mut(2)) {
        slot.copy_from_slice(&sample.to_le_bytes());
        written += 2;
    }
    written
}

fn clamp_u32(value: u64) -> u32 {
    value.min(u32::MAX as u64) as u32
}

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_magic_and_size() {
        let header = generate_header(&PcmFormat::default(), 0);
        assert_eq!(header.len(), 44);
        assert_eq!(&header[0..4], b"RIFF");
        assert_eq!(&header[8..12], b"WAVE");
        assert_eq!(&header[12..16], b"fmt ");
        assert_eq!(&header[36..40], b"data");
    }

    #[test]
    fn header_mono_44k_16bit() {
        let header = generate_header(&PcmFormat::mono_16bit(44_100), 2048);

        assert_eq!(read_u16(&header, 20), 1);
        assert_eq!(read_u16(&header, 22), 1);
        assert_eq!(read_u32(&header, 24), 44_100);
        assert_eq!(read_u32(&header, 28), 88_200);
        assert_eq!(read_u16(&header, 32), 2);
        assert_eq!(read_u16(&header, 34), 16);
        assert_eq!(read_u32(&header, 40), 2048);
        assert_eq!(read_u32(&header, 4), 36 + 2048);
    }

    #[test]
    fn parse_accepts_generated_header() {
        let format = PcmFormat {
            sample_rate: 22_050,
            channels: 2,
            bits_per_sample: 16,
        };
        let header = generate_header(&format, 400);
        let (parsed, data_size) = parse_header(&header).unwrap();
        assert_eq!(parsed, format);
        assert_eq!(data_size, 400);
    }

    #[test]
    fn parse_rejects_garbage() {
        let err = parse_header(&[0u8; 44]).unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedFormat(_)));

        let err = parse_header(b"RIFF").unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedFormat(_)));
    }

    #[test]
    fn parse_rejects_float_and_8bit() {
        let mut header = generate_header(&PcmFormat::default(), 0);
        header[20..22].copy_from_slice(&3u16.to_le_bytes());
        assert!(parse_header(&header).is_err());

        let mut header = generate_header(&PcmFormat::default(), 0);
        header[34..36].copy_from_slice(&8u16.to_le_bytes());
        assert!(parse_header(&header).is_err());
    }

    #[test]
    fn patch_sizes() {
        let mut header = generate_header(&PcmFormat::default(), 0);
        patch_data_size(&mut header, 19_200);
        patch_file_size(&mut header, 19_200 + 44);
        assert_eq!(read_u32(&header, 40), 19_200);
        assert_eq!(read_u32(&header, 4), 19_200 + 36);
    }

    #[test]
    fn sample_helpers_are_little_endian() {
        let mut out = [0u8; 6];
        assert_eq!(write_samples_i16(&[1, -2, i16::MAX], &mut out), 6);
        assert_eq!(out, [0x01, 0x00, 0xFE, 0xFF, 0xFF, 0x7F]);

        let back: Vec<i16> = samples_i16(&out[..5]).collect();
        assert_eq!(back, vec![1, -2]);
    }
}
