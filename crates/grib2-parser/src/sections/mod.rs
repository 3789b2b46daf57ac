//! GRIB2 section parsing.
//!
//! A GRIB2 message is an indicator (section 0), a sequence of length-prefixed
//! sections 1-7 and the `7777` end marker. This module locates the sections of
//! one message and decodes the parts the inventory and the field decoder need.
//! Template-specific octets are unpacked into plain integer lists with the
//! octet maps in [`crate::templates`].

use crate::templates::{self, TemplateMap};
use crate::Grib2Error;
use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};

/// Section 0: Indicator Section (16 bytes)
#[derive(Debug, Clone)]
pub struct Indicator {
    pub discipline: u8,
    pub edition: u8,
    pub message_length: u64,
}

/// Section 1: Identification Section
#[derive(Debug, Clone)]
pub struct Identification {
    pub center: u16,
    pub sub_center: u16,
    pub table_version: u8,
    pub local_table_version: u8,
    pub significance_of_reference_time: u8,
    pub reference_time: DateTime<Utc>,
    pub production_status: u8,
    pub data_type: u8,
}

/// Section 3: Grid Definition Section
#[derive(Debug, Clone, PartialEq)]
pub struct GridDefinition {
    /// Number of data points described by the grid.
    pub num_points: u32,
    /// Grid definition template number (Code Table 3.1).
    pub template_number: u16,
    /// Template octets decoded into integers, in template order.
    pub template: Vec<i64>,
}

impl GridDefinition {
    /// Points along a parallel / x axis. All supported templates keep it at index 7.
    pub fn nx(&self) -> u32 {
        self.template.get(7).copied().unwrap_or(0) as u32
    }

    /// Points along a meridian / y axis (template index 8).
    pub fn ny(&self) -> u32 {
        self.template.get(8).copied().unwrap_or(0) as u32
    }
}

/// Section 4: Product Definition Section
#[derive(Debug, Clone)]
pub struct ProductDefinition {
    /// Product definition template number (Code Table 4.0).
    pub template_number: u16,
    /// Template octets decoded into integers, in template order.
    pub template: Vec<i64>,
}

/// Section 5: Data Representation Section
#[derive(Debug, Clone)]
pub struct DataRepresentation {
    /// Number of packed values (points present in the bitmap).
    pub num_data_points: u32,
    pub template_number: u16,
    pub reference_value: f32,
    pub binary_scale_factor: i16,
    pub decimal_scale_factor: i16,
    pub bits_per_value: u8,
    pub original_data_type: u8,
}

/// Section 6: Bitmap Section
#[derive(Debug, Clone)]
pub struct Bitmap {
    pub indicator: u8,
    pub data: Bytes,
}

impl Bitmap {
    /// A bitmap is only meaningful when the indicator says it follows.
    pub fn is_present(&self) -> bool {
        self.indicator == 0
    }
}

/// Section 7: Data Section
#[derive(Debug, Clone)]
pub struct DataSection {
    pub data: Bytes,
}

/// Byte offsets of the first occurrence of sections 1-7 within a message.
#[derive(Debug, Clone, Copy, Default)]
pub struct SectionIndex {
    offsets: [Option<usize>; 8],
}

impl SectionIndex {
    pub fn get(&self, section: u8) -> Option<usize> {
        self.offsets.get(section as usize).copied().flatten()
    }

    fn require(&self, section: u8) -> Result<usize, Grib2Error> {
        self.get(section).ok_or_else(|| Grib2Error::InvalidSection {
            section,
            reason: "Section not found".to_string(),
        })
    }
}

// ===== Parsing Functions =====

/// Parse Section 0 (Indicator) from start of message
pub fn parse_indicator(data: &[u8]) -> Result<Indicator, Grib2Error> {
    if data.len() < 16 {
        return Err(Grib2Error::InvalidFormat(
            "Not enough data for indicator section".to_string(),
        ));
    }

    if &data[0..4] != b"GRIB" {
        return Err(Grib2Error::InvalidFormat(
            "Invalid GRIB magic bytes".to_string(),
        ));
    }

    // Octets 1-4: "GRIB", 5-6: reserved, 7: discipline, 8: edition,
    // 9-16: total length of the message (8-byte big-endian).
    let discipline = data[6];
    let edition = data[7];
    let message_length = u64::from_be_bytes([
        data[8], data[9], data[10], data[11], data[12], data[13], data[14], data[15],
    ]);

    if edition != 2 {
        return Err(Grib2Error::InvalidFormat(format!(
            "Expected GRIB edition 2, got {}",
            edition
        )));
    }

    Ok(Indicator {
        discipline,
        edition,
        message_length,
    })
}

/// Walk the sections of one message and record where each one starts.
///
/// Only the first field of a multi-field message is indexed: the walk stops
/// at the first data section.
pub fn index_sections(data: &[u8]) -> Result<SectionIndex, Grib2Error> {
    let mut index = SectionIndex::default();
    let mut offset = 16; // After Section 0

    loop {
        if data.len() >= offset + 4 && &data[offset..offset + 4] == b"7777" {
            break;
        }
        if offset + 5 > data.len() {
            return Err(Grib2Error::InvalidFormat(
                "Message ended before section 7".to_string(),
            ));
        }

        let section_length = u32::from_be_bytes([
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ]) as usize;
        let section = data[offset + 4];

        if section_length < 5 || offset + section_length > data.len() {
            return Err(Grib2Error::InvalidSection {
                section,
                reason: "Invalid section length".to_string(),
            });
        }
        if !(1..=7).contains(&section) {
            return Err(Grib2Error::InvalidSection {
                section,
                reason: "Unknown section number".to_string(),
            });
        }

        let slot = &mut index.offsets[section as usize];
        if slot.is_none() {
            *slot = Some(offset);
        }
        offset += section_length;

        if section == 7 {
            break;
        }
    }

    for section in [1u8, 3, 4, 5, 7] {
        index.require(section)?;
    }
    Ok(index)
}

/// Return the bytes of one section (header included).
pub fn section_bytes<'a>(
    data: &'a [u8],
    index: &SectionIndex,
    section: u8,
) -> Result<&'a [u8], Grib2Error> {
    let offset = index.require(section)?;
    let length = u32::from_be_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ]) as usize;
    Ok(&data[offset..offset + length])
}

/// Parse Section 1 (Identification)
pub fn parse_identification(section: &[u8]) -> Result<Identification, Grib2Error> {
    if section.len() < 21 {
        return Err(Grib2Error::InvalidSection {
            section: 1,
            reason: "Not enough data".to_string(),
        });
    }

    let center = u16::from_be_bytes([section[5], section[6]]);
    let sub_center = u16::from_be_bytes([section[7], section[8]]);
    let table_version = section[9];
    let local_table_version = section[10];
    let significance_of_reference_time = section[11];

    let year = u16::from_be_bytes([section[12], section[13]]);
    let month = section[14];
    let day = section[15];
    let hour = section[16];
    let minute = section[17];
    let second = section[18];

    let reference_time = NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
        .and_then(|date| date.and_hms_opt(hour as u32, minute as u32, second as u32))
        .ok_or_else(|| Grib2Error::InvalidSection {
            section: 1,
            reason: format!(
                "Invalid date: {}-{:02}-{:02} {:02}:{:02}:{:02}",
                year, month, day, hour, minute, second
            ),
        })?;

    Ok(Identification {
        center,
        sub_center,
        table_version,
        local_table_version,
        significance_of_reference_time,
        reference_time: DateTime::<Utc>::from_naive_utc_and_offset(reference_time, Utc),
        production_status: section[19],
        data_type: section[20],
    })
}

/// Parse Section 3 (Grid Definition)
pub fn parse_grid_definition(section: &[u8]) -> Result<GridDefinition, Grib2Error> {
    // Octet 6: source of grid definition, 7-10: number of data points,
    // 11: octets for optional list, 12: its interpretation,
    // 13-14: grid definition template number, 15+: template.
    if section.len() < 14 {
        return Err(Grib2Error::InvalidSection {
            section: 3,
            reason: "Not enough data".to_string(),
        });
    }

    let num_points = u32::from_be_bytes([section[6], section[7], section[8], section[9]]);
    let template_number = u16::from_be_bytes([section[12], section[13]]);
    let map = templates::grid_template(template_number).ok_or(
        Grib2Error::UnsupportedTemplate {
            section: 3,
            template: template_number,
        },
    )?;
    let template = unpack_template(&section[14..], &map, 3)?;

    Ok(GridDefinition {
        num_points,
        template_number,
        template,
    })
}

/// Parse Section 4 (Product Definition)
pub fn parse_product_definition(section: &[u8]) -> Result<ProductDefinition, Grib2Error> {
    // Octets 6-7: number of coordinate values after the template,
    // 8-9: product definition template number, 10+: template.
    if section.len() < 11 {
        return Err(Grib2Error::InvalidSection {
            section: 4,
            reason: "Not enough data".to_string(),
        });
    }

    let template_number = u16::from_be_bytes([section[7], section[8]]);
    let body = &section[9..];
    let base = templates::product_template(template_number).ok_or(
        Grib2Error::UnsupportedTemplate {
            section: 4,
            template: template_number,
        },
    )?;

    // Statistically processed templates end with a variable number of time
    // range specifications; their count is part of the fixed prefix.
    let map = match templates::time_range_count_index(template_number) {
        Some(count_index) => {
            let prefix = unpack_template(body, &base, 4)?;
            let ranges = prefix.get(count_index).copied().unwrap_or(1).max(1) as usize;
            templates::with_time_ranges(&base, ranges)
        }
        None => base,
    };
    let template = unpack_template(body, &map, 4)?;

    Ok(ProductDefinition {
        template_number,
        template,
    })
}

/// Parse Section 5 (Data Representation)
pub fn parse_data_representation(section: &[u8]) -> Result<DataRepresentation, Grib2Error> {
    if section.len() < 11 {
        return Err(Grib2Error::InvalidSection {
            section: 5,
            reason: "Not enough data".to_string(),
        });
    }

    // Octets 6-9: number of packed values, 10-11: template number.
    // Template 5.0 (and the common prefix of 5.2/5.3/5.40/5.41):
    // 12-15: reference value (IEEE float), 16-17: binary scale factor,
    // 18-19: decimal scale factor, 20: bits per value, 21: original type.
    let num_data_points = u32::from_be_bytes([section[5], section[6], section[7], section[8]]);
    let template_number = u16::from_be_bytes([section[9], section[10]]);
    let t = &section[11..];

    let reference_value = if t.len() >= 4 {
        f32::from_be_bytes([t[0], t[1], t[2], t[3]])
    } else {
        0.0
    };
    let binary_scale_factor = if t.len() >= 6 {
        decode_grib2_signed(&t[4..6]) as i16
    } else {
        0
    };
    let decimal_scale_factor = if t.len() >= 8 {
        decode_grib2_signed(&t[6..8]) as i16
    } else {
        0
    };

    Ok(DataRepresentation {
        num_data_points,
        template_number,
        reference_value,
        binary_scale_factor,
        decimal_scale_factor,
        bits_per_value: t.get(8).copied().unwrap_or(0),
        original_data_type: t.get(9).copied().unwrap_or(0),
    })
}

/// Parse Section 6 (Bitmap)
pub fn parse_bitmap(section: &[u8]) -> Result<Bitmap, Grib2Error> {
    if section.len() < 6 {
        return Err(Grib2Error::InvalidSection {
            section: 6,
            reason: "Not enough data".to_string(),
        });
    }

    let indicator = section[5];
    if indicator == 254 {
        return Err(Grib2Error::UnsupportedTemplate {
            section: 6,
            template: 254,
        });
    }

    Ok(Bitmap {
        indicator,
        data: Bytes::copy_from_slice(&section[6..]),
    })
}

/// Parse Section 7 (Data)
pub fn parse_data_section(section: &[u8]) -> Result<DataSection, Grib2Error> {
    if section.len() < 5 {
        return Err(Grib2Error::InvalidSection {
            section: 7,
            reason: "Not enough data".to_string(),
        });
    }

    Ok(DataSection {
        data: Bytes::copy_from_slice(&section[5..]),
    })
}

// ===== Helper Functions =====

/// Unpack template octets into integers following an octet map.
///
/// Negative widths denote signed (sign-magnitude) entries.
pub fn unpack_template(data: &[u8], map: &TemplateMap, section: u8) -> Result<Vec<i64>, Grib2Error> {
    let mut values = Vec::with_capacity(map.len());
    let mut offset = 0usize;

    for &width in map.iter() {
        let size = width.unsigned_abs() as usize;
        if offset + size > data.len() {
            return Err(Grib2Error::InvalidSection {
                section,
                reason: format!(
                    "Template needs {} octets, section has {}",
                    map.iter().map(|w| w.unsigned_abs() as usize).sum::<usize>(),
                    data.len()
                ),
            });
        }
        let bytes = &data[offset..offset + size];
        let value = if width < 0 {
            decode_grib2_signed(bytes)
        } else {
            bytes.iter().fold(0i64, |acc, &b| (acc << 8) | b as i64)
        };
        values.push(value);
        offset += size;
    }

    Ok(values)
}

/// Decode a GRIB2 sign-magnitude integer of 1, 2 or 4 octets.
///
/// GRIB2 stores negative numbers with the most significant bit as sign and
/// the remaining bits as magnitude. Other widths decode to 0.
pub fn decode_grib2_signed(bytes: &[u8]) -> i64 {
    let (raw, sign_bit) = match bytes.len() {
        1 => (bytes[0] as u64, 0x80u64),
        2 => (u16::from_be_bytes([bytes[0], bytes[1]]) as u64, 0x8000),
        4 => (
            u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as u64,
            0x8000_0000,
        ),
        _ => return 0,
    };

    let magnitude = (raw & (sign_bit - 1)) as i64;
    if raw & sign_bit != 0 {
        -magnitude
    } else {
        magnitude
    }
}
