//! Octet maps for the grid and product definition templates the reader understands.
//!
//! Each entry is the width in octets of one template field; a negative width
//! marks a signed (sign-magnitude) field. The maps follow the WMO template
//! tables, so field `n` of a decoded template is the `n`-th template entry.

/// Field widths of one template.
pub type TemplateMap = Vec<i8>;

/// Octet map of a grid definition template (Code Table 3.1).
pub fn grid_template(number: u16) -> Option<TemplateMap> {
    let map: &[i8] = match number {
        // Latitude/longitude
        0 => &[1, 1, 4, 1, 4, 1, 4, 4, 4, 4, 4, -4, 4, 1, -4, 4, 4, 4, 1],
        // Rotated latitude/longitude
        1 => &[1, 1, 4, 1, 4, 1, 4, 4, 4, 4, 4, -4, 4, 1, -4, 4, 4, 4, 1, -4, 4, 4],
        // Mercator
        10 => &[1, 1, 4, 1, 4, 1, 4, 4, 4, -4, 4, 1, -4, -4, 4, 1, 4, 4, 4],
        // Polar stereographic
        20 => &[1, 1, 4, 1, 4, 1, 4, 4, 4, -4, 4, 1, -4, 4, 4, 4, 1, 1],
        // Lambert conformal
        30 => &[1, 1, 4, 1, 4, 1, 4, 4, 4, -4, 4, 1, -4, -4, 4, 4, 1, 1, -4, -4, -4, 4],
        // Gaussian latitude/longitude
        40 => &[1, 1, 4, 1, 4, 1, 4, 4, 4, 4, 4, -4, 4, 1, -4, 4, 4, 4, 1],
        // Space view perspective
        90 => &[1, 1, 4, 1, 4, 1, 4, 4, 4, -4, 4, 1, 4, 4, 4, 4, 1, 4, 4, 4, 4],
        _ => return None,
    };
    Some(map.to_vec())
}

/// Index of the scanning mode flags within a decoded grid template.
pub fn scanning_mode_index(number: u16) -> Option<usize> {
    match number {
        0 | 1 | 40 => Some(18),
        10 => Some(15),
        20 | 30 => Some(17),
        90 => Some(16),
        _ => None,
    }
}

/// Horizontal-level prefix shared by the product templates below:
/// category, number, generating process, background id, forecast id,
/// cutoff hours, cutoff minutes, time unit, forecast time,
/// first surface (type, scale factor, scaled value), second surface (same).
const HORIZONTAL: [i8; 15] = [1, 1, 1, 1, 1, 2, 1, 1, 4, 1, -1, -4, 1, -1, -4];
/// Individual ensemble member: type, perturbation number, ensemble size.
const ENSEMBLE: [i8; 3] = [1, 1, 1];
/// Derived ensemble forecast: derived code, ensemble size.
const DERIVED: [i8; 2] = [1, 1];
/// End of the overall time interval (year .. second), number of time
/// ranges, number of missing values.
const INTERVAL: [i8; 8] = [2, 1, 1, 1, 1, 1, 1, 4];
/// One time range: process, increment type, unit, length, increment unit, increment.
const TIME_RANGE: [i8; 6] = [1, 1, 1, 4, 1, 4];

/// Fixed part of a product definition template (Code Table 4.0).
///
/// Statistically processed templates additionally carry the time range
/// specifications; see [`time_range_count_index`].
pub fn product_template(number: u16) -> Option<TemplateMap> {
    let parts: &[&[i8]] = match number {
        0 => &[&HORIZONTAL],
        1 => &[&HORIZONTAL, &ENSEMBLE],
        2 => &[&HORIZONTAL, &DERIVED],
        8 => &[&HORIZONTAL, &INTERVAL],
        11 => &[&HORIZONTAL, &ENSEMBLE, &INTERVAL],
        12 => &[&HORIZONTAL, &DERIVED, &INTERVAL],
        _ => return None,
    };
    Some(parts.concat())
}

/// Position of the "number of time ranges" field for statistical templates.
pub fn time_range_count_index(number: u16) -> Option<usize> {
    let prefix = match number {
        8 => HORIZONTAL.len(),
        11 => HORIZONTAL.len() + ENSEMBLE.len(),
        12 => HORIZONTAL.len() + DERIVED.len(),
        _ => return None,
    };
    // year, month, day, hour, minute, second precede the count
    Some(prefix + 6)
}

/// Extend a statistical template's fixed part with `ranges` time ranges.
pub fn with_time_ranges(base: &TemplateMap, ranges: usize) -> TemplateMap {
    let mut map = base.clone();
    for _ in 0..ranges {
        map.extend_from_slice(&TIME_RANGE);
    }
    map
}

/// Named positions within the horizontal-level prefix.
pub mod product_fields {
    pub const PARAMETER_CATEGORY: usize = 0;
    pub const PARAMETER_NUMBER: usize = 1;
    pub const TIME_UNIT: usize = 7;
    pub const FORECAST_TIME: usize = 8;
    pub const FIRST_SURFACE_TYPE: usize = 9;
    pub const FIRST_SURFACE_SCALE: usize = 10;
    pub const FIRST_SURFACE_VALUE: usize = 11;
    pub const SECOND_SURFACE_TYPE: usize = 12;
    pub const SECOND_SURFACE_SCALE: usize = 13;
    pub const SECOND_SURFACE_VALUE: usize = 14;
}

/// Positions relative to the "number of time ranges" field.
pub mod interval_fields {
    /// Offset of the end-of-interval year from the range count.
    pub const END_YEAR_BACK: usize = 6;
    /// First range: statistical process (Code Table 4.10).
    pub const PROCESS: usize = 2;
    /// First range: time unit of the range length.
    pub const RANGE_UNIT: usize = 4;
    /// First range: length of the range.
    pub const RANGE_LENGTH: usize = 5;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn octets(map: &TemplateMap) -> usize {
        map.iter().map(|w| w.unsigned_abs() as usize).sum()
    }

    #[test]
    fn test_latlon_template_is_58_octets() {
        let map = grid_template(0).unwrap();
        assert_eq!(map.len(), 19);
        assert_eq!(octets(&map), 58);
    }

    #[test]
    fn test_lambert_template_is_67_octets() {
        assert_eq!(octets(&grid_template(30).unwrap()), 67);
    }

    #[test]
    fn test_product_template_8_with_one_range() {
        let base = product_template(8).unwrap();
        let full = with_time_ranges(&base, 1);
        assert_eq!(full.len(), 29);
        // 4.8 with one range occupies octets 10-58 of section 4
        assert_eq!(octets(&full), 49);
        assert_eq!(time_range_count_index(8), Some(21));
    }

    #[test]
    fn test_unknown_templates() {
        assert!(grid_template(50).is_none());
        assert!(product_template(48).is_none());
        assert!(scanning_mode_index(50).is_none());
    }
}
