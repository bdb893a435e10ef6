//! Encoded polyline decoding (precision 1e5) for routing provider geometry.

use crate::models::Coordinates;
use thiserror::Error;

const PRECISION: f64 = 1e5;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolylineError {
    #[error("polyline truncated at byte {0}")]
    Truncated(usize),
    #[error("invalid polyline byte {byte:#04x} at {index}")]
    InvalidByte { index: usize, byte: u8 },
    #[error("polyline coordinate overflows at byte {0}")]
    Overflow(usize),
}

/// Decode an encoded polyline into ordered coordinates.
pub fn decode(encoded: &str) -> Result<Vec<Coordinates>, PolylineError> {
    let bytes = encoded.as_bytes();
    let mut index = 0usize;
    let mut lat: i64 = 0;
    let mut lng: i64 = 0;
    let mut points = Vec::new();

    while index < bytes.len() {
        lat = lat
            .checked_add(next_value(bytes, &mut index)?)
            .ok_or(PolylineError::Overflow(index))?;
        lng = lng
            .checked_add(next_value(bytes, &mut index)?)
            .ok_or(PolylineError::Overflow(index))?;
        points.push(Coordinates {
            lat: lat as f64 / PRECISION,
            lng: lng as f64 / PRECISION,
            altitude: None,
        });
    }

    Ok(points)
}

fn next_value(bytes: &[u8], index: &mut usize) -> Result<i64, PolylineError> {
    let mut result: i64 = 0;
    let mut shift = 0u32;

    loop {
        let byte = *bytes.get(*index).ok_or(PolylineError::Truncated(*index))?;
        if !(63..=126).contains(&byte) || shift > 60 {
            return Err(PolylineError::InvalidByte { index: *index, byte });
        }
        *index += 1;

        let chunk = (byte - 63) as i64;
        result |= (chunk & 0x1f) << shift;
        shift += 5;
        if chunk < 0x20 {
            break;
        }
    }

    Ok(if result & 1 != 0 { !(result >> 1) } else { result >> 1 })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_reference_polyline() {
        // Example from the polyline algorithm documentation.
        let points = decode("_p~iF~ps|U_ulLnnqC_mqNvxq`@").unwrap();
        let expected = [(38.5, -120.2), (40.7, -120.95), (43.252, -126.453)];
        assert_eq!(points.len(), expected.len());
        for (point, (lat, lng)) in points.iter().zip(expected) {
            assert!((point.lat - lat).abs() < 1e-9);
            assert!((point.lng - lng).abs() < 1e-9);
        }
    }

    #[test]
    fn empty_input_decodes_to_no_points() {
        assert!(decode("").unwrap().is_empty());
    }

    #[test]
    fn truncated_input_is_an_error() {
        // Continuation bit set on the last byte.
        assert!(matches!(decode("_p~iF~ps|"), Err(PolylineError::Truncated(_))));
        assert!(matches!(decode("_p~iF"), Err(PolylineError::Truncated(_))));
    }

    #[test]
    fn accumulated_overflow_is_an_error() {
        // Each value decodes to -2^60; the ninth latitude step passes i64::MIN.
        let big_delta = format!("{}@", "~".repeat(12));
        let encoded = big_delta.repeat(20);
        assert!(matches!(decode(&encoded), Err(PolylineError::Overflow(_))));
    }
}
