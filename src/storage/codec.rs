//! Encoding blob codec.
//!
//! Encodings are stored as packed little-endian IEEE-754 `f64` values with no
//! header, so a 128-dimension encoding is exactly 1024 bytes.

use crate::models::FaceEncoding;

const F64_WIDTH: usize = std::mem::size_of::<f64>();

/// Packs an encoding into a blob.
#[must_use]
pub fn encode(encoding: &FaceEncoding) -> Vec<u8> {
    encoding
        .as_slice()
        .iter()
        .flat_map(|value| value.to_le_bytes())
        .collect()
}

/// Unpacks a blob, validating it against the expected dimensionality.
///
/// # Errors
///
/// Returns a human-readable reason when the blob length is not a multiple of
/// 8, the dimensionality differs from `expected_dimensions`, or any value is
/// not finite.
pub fn decode(blob: &[u8], expected_dimensions: usize) -> Result<FaceEncoding, String> {
    if blob.len() % F64_WIDTH != 0 {
        return Err(format!(
            "blob length {} is not a multiple of {F64_WIDTH}",
            blob.len()
        ));
    }

    let dimensions = blob.len() / F64_WIDTH;
    if dimensions != expected_dimensions {
        return Err(format!(
            "expected {expected_dimensions} dimensions, found {dimensions}"
        ));
    }

    let values: Vec<f64> = blob
        .chunks_exact(F64_WIDTH)
        .map(|chunk| {
            let mut bytes = [0u8; F64_WIDTH];
            bytes.copy_from_slice(chunk);
            f64::from_le_bytes(bytes)
        })
        .collect();

    if let Some(position) = values.iter().position(|v| !v.is_finite()) {
        return Err(format!("non-finite value at position {position}"));
    }

    Ok(FaceEncoding::new(values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_layout_is_little_endian_f64() {
        let blob = encode(&FaceEncoding::new(vec![1.0, -0.5]));
        assert_eq!(blob.len(), 16);
        assert_eq!(&blob[..8], &1.0f64.to_le_bytes());
        assert_eq!(&blob[8..], &(-0.5f64).to_le_bytes());
        assert_eq!(decode(&blob, 2).unwrap().as_slice(), &[1.0, -0.5]);
    }

    #[test_case(vec![0u8; 15], 2, "not a multiple" ; "truncated blob")]
    #[test_case(vec![0u8; 24], 2, "expected 2 dimensions, found 3" ; "wrong dimensionality")]
    #[test_case(vec![], 128, "expected 128 dimensions, found 0" ; "empty blob")]
    #[test_case(f64::NAN.to_le_bytes().to_vec(), 1, "non-finite value at position 0" ; "nan value")]
    fn test_decode_rejects(blob: Vec<u8>, dimensions: usize, expected: &str) {
        let reason = decode(&blob, dimensions).unwrap_err();
        assert!(reason.contains(expected), "unexpected reason: {reason}");
    }
}
