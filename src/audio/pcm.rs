//! PCM sample conversion and transport-safe framing.
//!
//! Converts between f32 samples in `[-1, 1]` and 16-bit little-endian
//! signed integers, and between binary frames and base64 strings. No
//! resampling happens here; sample rates are fixed by device configuration.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;

use crate::errors::DecodeError;

/// Encode f32 samples to a 16-bit little-endian PCM frame.
///
/// Samples are scaled by 32768 with rounding and clamped to the i16 range.
pub fn encode_f32_to_i16le(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        let scaled = (s * 32768.0).round();
        let v = scaled.clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a 16-bit little-endian PCM frame to f32 samples.
///
/// A frame whose length is not a whole number of samples is malformed.
pub fn decode_i16le_to_f32(bytes: &[u8]) -> Result<Vec<f32>, DecodeError> {
    if bytes.len() % 2 != 0 {
        return Err(DecodeError::TruncatedFrame(bytes.len()));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|c| i16::from_le_bytes([c[0], c[1]]) as f32 / 32768.0)
        .collect())
}

/// Encode a binary frame as a base64 string.
pub fn to_base64(bytes: &[u8]) -> String {
    B64.encode(bytes)
}

/// Decode a base64 string back to the original bytes.
pub fn from_base64(data: &str) -> Result<Vec<u8>, DecodeError> {
    Ok(B64.decode(data)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_within_int16_tolerance() {
        let samples: Vec<f32> = (0..4096)
            .map(|i| ((i as f32) * 0.013).sin() * 0.8)
            .collect();
        let bytes = encode_f32_to_i16le(&samples);
        let decoded = decode_i16le_to_f32(&bytes).unwrap();
        assert_eq!(decoded.len(), samples.len());
        for (a, b) in samples.iter().zip(decoded.iter()) {
            assert!((a - b).abs() <= 1.0 / 32768.0, "{} vs {}", a, b);
        }
    }

    #[test]
    fn full_scale_clamps_without_wrapping() {
        let bytes = encode_f32_to_i16le(&[1.0, -1.0, 2.0, -2.0]);
        let decoded = decode_i16le_to_f32(&bytes).unwrap();
        assert!((decoded[0] - (i16::MAX as f32 / 32768.0)).abs() < 1e-6);
        assert!((decoded[1] + 1.0).abs() < 1e-6);
        // Out-of-range input clamps to the same extremes.
        assert_eq!(decoded[0], decoded[2]);
        assert_eq!(decoded[1], decoded[3]);
    }

    #[test]
    fn silence_is_exact() {
        let bytes = encode_f32_to_i16le(&[0.0; 16]);
        assert!(bytes.iter().all(|&b| b == 0));
        let decoded = decode_i16le_to_f32(&bytes).unwrap();
        assert!(decoded.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn odd_length_frame_is_rejected() {
        let err = decode_i16le_to_f32(&[0u8, 1, 2]).unwrap_err();
        assert!(matches!(err, DecodeError::TruncatedFrame(3)));
    }

    #[test]
    fn base64_round_trips_exactly() {
        let bytes: Vec<u8> = (0..=255).collect();
        let encoded = to_base64(&bytes);
        assert!(encoded.is_ascii());
        assert_eq!(from_base64(&encoded).unwrap(), bytes);
    }

    #[test]
    fn bad_base64_is_a_decode_error() {
        assert!(matches!(
            from_base64("not base64!!"),
            Err(DecodeError::Base64(_))
        ));
    }
}
