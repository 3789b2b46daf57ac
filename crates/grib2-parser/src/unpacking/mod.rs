//! GRIB2 data unpacking algorithms.
//!
//! Only simple packing (Data Representation Template 5.0) is decoded; other
//! templates are reported as unsupported so callers can still inventory the
//! message.

use crate::Grib2Error;

/// Unpack simple packed GRIB2 data
///
/// Simple packing formula: value = (reference_value + packed_value * 2^E) * 10^(-D)
///
/// `num_points` is the full grid size. When a bitmap is given, packed values
/// exist only for points whose bit is set; the remaining points are `None`.
pub fn unpack_simple(
    packed_data: &[u8],
    num_points: u32,
    bits_per_value: u8,
    reference_value: f32,
    binary_scale_factor: i16,
    decimal_scale_factor: i16,
    bitmap: Option<&[u8]>,
) -> Result<Vec<Option<f32>>, Grib2Error> {
    let reference = reference_value as f64;
    let binary_scale = 2.0_f64.powi(binary_scale_factor as i32);
    let decimal_scale = 10.0_f64.powi(-(decimal_scale_factor as i32));

    let mut values = Vec::with_capacity(num_points as usize);
    let mut bit_position = 0;
    let bits_per_value = bits_per_value as usize;

    for i in 0..(num_points as usize) {
        if let Some(bm) = bitmap {
            if !bit_is_set(bm, i) {
                values.push(None);
                continue;
            }
        }

        let packed_value = if bits_per_value == 0 {
            0
        } else {
            extract_bits(packed_data, bit_position, bits_per_value).map_err(|e| {
                Grib2Error::UnpackingError(format!("Failed to extract bits: {}", e))
            })?
        };
        bit_position += bits_per_value;

        let value = (reference + packed_value as f64 * binary_scale) * decimal_scale;
        values.push(Some(value as f32));
    }

    Ok(values)
}

/// Bitmap: 1 bit per data point, MSB first, 1 = value present.
fn bit_is_set(bitmap: &[u8], index: usize) -> bool {
    match bitmap.get(index / 8) {
        Some(byte) => (byte >> (7 - (index % 8))) & 1 == 1,
        None => false,
    }
}

/// Extract bits from a byte array
/// Returns the bits as a 32-bit unsigned integer
fn extract_bits(data: &[u8], start_bit: usize, num_bits: usize) -> Result<u32, String> {
    if num_bits > 32 || num_bits == 0 {
        return Err(format!("Invalid number of bits: {}", num_bits));
    }

    let mut result = 0u32;

    for i in 0..num_bits {
        let absolute_bit = start_bit + i;
        let byte_idx = absolute_bit / 8;
        let bit_idx = 7 - (absolute_bit % 8); // MSB first

        if byte_idx >= data.len() {
            return Err("Not enough data to extract bits".to_string());
        }

        let bit = (data[byte_idx] >> bit_idx) & 1;
        result = (result << 1) | (bit as u32);
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bits() {
        // Test with simple byte: 0b10110101
        let data = vec![0b10110101];

        // Extract first 2 bits (should be 0b10 = 2)
        let result = extract_bits(&data, 0, 2).unwrap();
        assert_eq!(result, 0b10);

        // Extract bits 2-4 (should be 0b11 = 3)
        let result = extract_bits(&data, 2, 2).unwrap();
        assert_eq!(result, 0b11);

        // Extract all 8 bits
        let result = extract_bits(&data, 0, 8).unwrap();
        assert_eq!(result, 0b10110101);

        assert!(extract_bits(&data, 4, 8).is_err());
    }

    #[test]
    fn test_simple_unpacking() {
        let packed = vec![100, 200];
        let vals = unpack_simple(&packed, 2, 8, 0.0, 0, 0, None).unwrap();

        assert_eq!(vals.len(), 2);
        assert!((vals[0].unwrap() - 100.0).abs() < 0.1);
        assert!((vals[1].unwrap() - 200.0).abs() < 0.1);
    }

    #[test]
    fn test_scaled_unpacking() {
        // (250 + 3 * 2^1) * 10^-1 = 25.6
        let vals = unpack_simple(&[3], 1, 8, 250.0, 1, 1, None).unwrap();
        assert!((vals[0].unwrap() - 25.6).abs() < 1e-4);
    }

    #[test]
    fn test_bitmap_skips_missing_points() {
        // Points 0 and 2 present, point 1 missing: only two packed values.
        let bitmap = [0b1010_0000];
        let vals = unpack_simple(&[10, 20], 3, 8, 0.0, 0, 0, Some(&bitmap)).unwrap();

        assert_eq!(vals, vec![Some(10.0), None, Some(20.0)]);
    }

    #[test]
    fn test_constant_field() {
        let vals = unpack_simple(&[], 4, 0, 273.15, 0, 0, None).unwrap();
        assert_eq!(vals.len(), 4);
        assert!(vals.iter().all(|v| (v.unwrap() - 273.15).abs() < 1e-4));
    }
}
