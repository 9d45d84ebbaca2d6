//! # PCM Module
//!
//! Converts captured audio containers into normalized sample buffers and back.
//!
//! The container layout is a fixed-size header (44 bytes for a canonical WAV
//! file) followed by signed 16-bit little-endian mono samples. The header is
//! never inspected: the capture side guarantees rate and channel count.

use anyhow::Result;
use std::io::Cursor;

/// Size of a canonical PCM WAV header.
pub const WAV_HEADER_LEN: usize = 44;

/// Divisor mapping the 16-bit range onto [-1.0, 1.0).
const I16_SCALE: f32 = 32768.0;

/// Extracts normalized samples from a container.
///
/// Returns `None` when the input is shorter than the header. A trailing odd
/// byte is ignored.
///
/// # Arguments
/// * `bytes` - Raw container bytes
/// * `header_len` - Number of leading bytes to skip
pub fn decode_container(bytes: &[u8], header_len: usize) -> Option<Vec<f32>> {
    let payload = bytes.get(header_len..)?;
    let samples = payload
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / I16_SCALE)
        .collect();
    Some(samples)
}

/// Converts a normalized sample back to its 16-bit value.
pub fn denormalize(sample: f32) -> i16 {
    (sample * I16_SCALE).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Encodes samples as a 16-bit mono WAV container.
///
/// The output decodes with [`decode_container`] using [`WAV_HEADER_LEN`].
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::with_capacity(WAV_HEADER_LEN + samples.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &sample in samples {
            writer.write_sample(denormalize(sample))?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// Silence gate: true when any sample's magnitude exceeds `threshold`.
pub fn is_audible(samples: &[f32], threshold: f32) -> bool {
    samples.iter().any(|s| s.abs() > threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container(values: &[i16]) -> Vec<u8> {
        let mut bytes = vec![0u8; WAV_HEADER_LEN];
        for v in values {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn short_input_is_no_data() {
        assert!(decode_container(&[0u8; 43], WAV_HEADER_LEN).is_none());
        assert_eq!(decode_container(&[0u8; 44], WAV_HEADER_LEN), Some(vec![]));
    }

    #[test]
    fn sign_extends_and_normalizes() {
        let decoded = decode_container(&container(&[0, 16384, -16384, i16::MIN]), 44).unwrap();
        assert_eq!(decoded, vec![0.0, 0.5, -0.5, -1.0]);
    }

    #[test]
    fn high_byte_above_signed_max_is_negative() {
        let mut bytes = vec![0u8; WAV_HEADER_LEN];
        bytes.extend_from_slice(&[0xff, 0xff]);
        assert_eq!(decode_container(&bytes, 44).unwrap(), vec![-1.0 / 32768.0]);
    }

    #[test]
    fn trailing_odd_byte_is_dropped() {
        let mut bytes = container(&[100]);
        bytes.push(0x7f);
        assert_eq!(decode_container(&bytes, 44).unwrap().len(), 1);
    }

    #[test]
    fn decode_then_reencode_is_lossless() {
        let values: Vec<i16> = vec![i16::MIN, -12345, -1, 0, 1, 255, 256, 12345, i16::MAX];
        let decoded = decode_container(&container(&values), 44).unwrap();
        let reencoded: Vec<i16> = decoded.iter().map(|&s| denormalize(s)).collect();
        assert_eq!(reencoded, values);
    }

    #[test]
    fn wav_encoding_has_canonical_header() {
        let samples = [0.25_f32, -0.25, 0.5];
        let bytes = encode_wav(&samples, 22050).unwrap();
        assert_eq!(bytes.len(), WAV_HEADER_LEN + samples.len() * 2);
        assert_eq!(&bytes[..4], b"RIFF");
        assert_eq!(decode_container(&bytes, WAV_HEADER_LEN).unwrap(), samples);
    }

    #[test]
    fn gate_rejects_quiet_buffer() {
        let quiet: Vec<f32> = (0..256).map(|i| if i % 2 == 0 { 0.02 } else { -0.02 }).collect();
        assert!(!is_audible(&quiet, 0.03));
    }

    #[test]
    fn gate_accepts_single_loud_sample() {
        let mut buffer = vec![0.0_f32; 256];
        buffer[100] = 0.05;
        assert!(is_audible(&buffer, 0.03));
    }
}
