//! Half-precision decoding.
//!
//! Snapshot payloads store IEEE 754 binary16 values, 2 bytes each,
//! little-endian. This is the only place that reinterprets those bytes.

use half::f16;

use super::{Error, Result};

/// Width in bytes of one stored half-precision value.
pub const F16_BYTES: usize = 2;

/// Decode little-endian binary16 bytes into `f32`.
///
/// Fails if `bytes` is not a whole number of values.
pub fn decode_f16_le(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % F16_BYTES != 0 {
        return Err(Error::format(format!(
            "half-precision buffer has odd length {}",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(F16_BYTES)
        .map(|c| f16::from_le_bytes([c[0], c[1]]).to_f32())
        .collect())
}

/// Encode `f32` values as little-endian binary16 bytes (round to nearest).
pub fn encode_f16_le(values: &[f32]) -> Vec<u8> {
    let halves: Vec<f16> = values.iter().map(|&v| f16::from_f32(v)).collect();
    let mut bytes: Vec<u8> = bytemuck::cast_slice(&halves).to_vec();
    if cfg!(target_endian = "big") {
        for pair in bytes.chunks_exact_mut(F16_BYTES) {
            pair.swap(0, 1);
        }
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_values() {
        // 1.0 = 0x3C00, -2.0 = 0xC000, 0.5 = 0x3800
        let bytes = [0x00, 0x3C, 0x00, 0xC0, 0x00, 0x38, 0x00, 0x00];
        let values = decode_f16_le(&bytes).unwrap();
        assert_eq!(values, vec![1.0, -2.0, 0.5, 0.0]);
    }

    #[test]
    fn test_special_values() {
        // +inf = 0x7C00, smallest subnormal = 0x0001
        let values = decode_f16_le(&[0x00, 0x7C, 0x01, 0x00]).unwrap();
        assert!(values[0].is_infinite());
        assert!(values[1] > 0.0 && values[1] < 1e-7);
    }

    #[test]
    fn test_odd_length() {
        assert!(matches!(decode_f16_le(&[0x00, 0x3C, 0x00]), Err(Error::Format(_))));
    }

    #[test]
    fn test_encode_matches_decode() {
        let bytes = encode_f16_le(&[1.0, 0.25, -3.5]);
        assert_eq!(&bytes[0..2], &[0x00, 0x3C]);
        assert_eq!(decode_f16_le(&bytes).unwrap(), vec![1.0, 0.25, -3.5]);
    }
}
