//! GRIB2 parser implementation (WMO FM 92 GRIB Edition 2).
//!
//! This crate provides a pure Rust implementation for scanning GRIB2 files,
//! the standard format for meteorological data exchange. It decodes the
//! metadata an inventory needs (identification, grid, product definition)
//! and unpacks simple packed fields.
//!
//! # Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use grib2_parser::Grib2Reader;
//!
//! let data = Bytes::from(std::fs::read("gfs.grib2").unwrap());
//! let mut reader = Grib2Reader::new(data);
//! while let Some(message) = reader.next_message().unwrap() {
//!     let record = message.record().unwrap();
//!     println!("{}:{}:{}:{}", record.ordinal, record.offset, record.short_name, record.level);
//! }
//! ```

pub mod sections;
pub mod tables;
pub mod templates;
pub mod unpacking;

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use tracing::debug;

use sections::{
    Bitmap, DataRepresentation, DataSection, GridDefinition, Identification, Indicator,
    ProductDefinition,
};
use tables::{Grib2Tables, ParameterInfo};
use templates::{interval_fields, product_fields};

/// Value stored for points without data (bitmap holes).
pub const UNDEFINED: f32 = 9.999e20;

/// Errors raised while decoding GRIB2 data.
#[derive(Error, Debug)]
pub enum Grib2Error {
    #[error("Invalid GRIB2 format: {0}")]
    InvalidFormat(String),

    #[error("Invalid section {section}: {reason}")]
    InvalidSection { section: u8, reason: String },

    #[error("Unsupported template {template} in section {section}")]
    UnsupportedTemplate { section: u8, template: u16 },

    #[error("Unpacking error: {0}")]
    UnpackingError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Grib2Error>;

/// A fixed surface of the product definition (Code Table 4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedSurface {
    pub type_code: u8,
    pub scale_factor: i64,
    pub scaled_value: i64,
}

impl FixedSurface {
    /// Surface value in its native units, `None` when the value is missing.
    pub fn value(&self) -> Option<f64> {
        // All-ones octets decode to -127 and -2147483647 in sign-magnitude.
        if self.type_code == tables::MISSING_SURFACE
            || self.scale_factor == -127
            || self.scaled_value == -2_147_483_647
        {
            return None;
        }
        let value = self.scaled_value as f64;
        let scale = self.scale_factor as i32;
        // Divide for positive scales so 14 with scale 1 is exactly 1.4.
        Some(if scale >= 0 {
            value / 10f64.powi(scale)
        } else {
            value * 10f64.powi(-scale)
        })
    }

    pub fn is_missing(&self) -> bool {
        self.type_code == tables::MISSING_SURFACE
    }
}

/// Flattened metadata of one message, the unit an inventory is made of.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRecord {
    /// 1-based position of the message in its file.
    pub ordinal: usize,
    /// Byte offset of the message start.
    pub offset: u64,
    pub short_name: String,
    pub long_name: String,
    pub units: String,
    /// Level descriptor, e.g. "500 mb".
    pub level: String,
    /// Time descriptor, e.g. "3-6 hour acc fcst".
    pub time: String,
    pub discipline: u8,
    pub centre: String,
    pub subcentre: String,
    pub master_table: u8,
    pub local_table: u8,
    pub pdt: u16,
    pub parameter_category: u8,
    pub parameter_number: u8,
    pub first_surface: FixedSurface,
    pub second_surface: FixedSurface,
    pub reference_time: DateTime<Utc>,
    /// Start of the forecast interval, seconds after the reference time.
    pub forecast_start: i64,
    /// End of the forecast interval, seconds after the reference time.
    pub forecast_end: i64,
    pub num_points: u32,
    pub nx: u32,
    pub ny: u32,
    pub gdt: u16,
    pub gdt_template: Vec<i64>,
}

/// One decoded GRIB2 message (its first field).
#[derive(Debug, Clone)]
pub struct Grib2Message {
    pub ordinal: usize,
    pub offset: u64,
    pub indicator: Indicator,
    pub identification: Identification,
    pub grid_definition: GridDefinition,
    pub product_definition: ProductDefinition,
    pub data_representation: DataRepresentation,
    pub bitmap: Option<Bitmap>,
    pub data_section: DataSection,
    tables: Arc<Grib2Tables>,
}

impl Grib2Message {
    /// Parse the message that occupies `data` entirely.
    pub fn parse(
        data: &[u8],
        ordinal: usize,
        offset: u64,
        tables: Arc<Grib2Tables>,
    ) -> Result<Self> {
        let indicator = sections::parse_indicator(data)?;
        let index = sections::index_sections(data)?;

        let identification =
            sections::parse_identification(sections::section_bytes(data, &index, 1)?)?;
        let grid_definition =
            sections::parse_grid_definition(sections::section_bytes(data, &index, 3)?)?;
        let product_definition =
            sections::parse_product_definition(sections::section_bytes(data, &index, 4)?)?;
        let data_representation =
            sections::parse_data_representation(sections::section_bytes(data, &index, 5)?)?;
        let bitmap = match index.get(6) {
            Some(_) => Some(sections::parse_bitmap(sections::section_bytes(
                data, &index, 6,
            )?)?),
            None => None,
        };
        let data_section = sections::parse_data_section(sections::section_bytes(data, &index, 7)?)?;

        Ok(Self {
            ordinal,
            offset,
            indicator,
            identification,
            grid_definition,
            product_definition,
            data_representation,
            bitmap,
            data_section,
            tables,
        })
    }

    /// Product discipline (Code Table 0.0).
    pub fn discipline(&self) -> u8 {
        self.indicator.discipline
    }

    fn product_field(&self, index: usize) -> i64 {
        self.product_definition
            .template
            .get(index)
            .copied()
            .unwrap_or(0)
    }

    pub fn parameter_category(&self) -> u8 {
        self.product_field(product_fields::PARAMETER_CATEGORY) as u8
    }

    pub fn parameter_number(&self) -> u8 {
        self.product_field(product_fields::PARAMETER_NUMBER) as u8
    }

    /// Parameter names resolved through the code tables.
    pub fn parameter(&self) -> ParameterInfo {
        self.tables.get_parameter(
            self.discipline(),
            self.parameter_category(),
            self.parameter_number(),
        )
    }

    pub fn first_surface(&self) -> FixedSurface {
        FixedSurface {
            type_code: self.product_field(product_fields::FIRST_SURFACE_TYPE) as u8,
            scale_factor: self.product_field(product_fields::FIRST_SURFACE_SCALE),
            scaled_value: self.product_field(product_fields::FIRST_SURFACE_VALUE),
        }
    }

    pub fn second_surface(&self) -> FixedSurface {
        FixedSurface {
            type_code: self.product_field(product_fields::SECOND_SURFACE_TYPE) as u8,
            scale_factor: self.product_field(product_fields::SECOND_SURFACE_SCALE),
            scaled_value: self.product_field(product_fields::SECOND_SURFACE_VALUE),
        }
    }

    /// Level descriptor, e.g. "500 mb" or "0-0.1 m below ground".
    pub fn level(&self) -> String {
        let first = self.first_surface();
        let second = self.second_surface();
        self.tables.get_level_description(
            first.type_code,
            first.value(),
            Some((second.type_code, second.value())),
        )
    }

    /// (nx, ny) of the grid.
    pub fn grid_dims(&self) -> (u32, u32) {
        (self.grid_definition.nx(), self.grid_definition.ny())
    }

    /// Statistical process of the first time range, if the template has one.
    pub fn statistical_process(&self) -> Option<u8> {
        let count = templates::time_range_count_index(self.product_definition.template_number)?;
        Some(self.product_field(count + interval_fields::PROCESS) as u8)
    }

    /// Forecast interval as (start, end) seconds after the reference time.
    pub fn forecast_interval(&self) -> Result<(i64, i64)> {
        let unit = self.product_field(product_fields::TIME_UNIT) as u8;
        let unit_seconds = tables::time_unit_seconds(unit).ok_or_else(|| {
            Grib2Error::InvalidSection {
                section: 4,
                reason: format!("Unsupported time unit {}", unit),
            }
        })?;
        let start = self.product_field(product_fields::FORECAST_TIME) * unit_seconds;

        let count = match templates::time_range_count_index(self.product_definition.template_number)
        {
            Some(count) => count,
            None => return Ok((start, start)),
        };

        let end = match self.interval_end(count) {
            Some(end) => (end - self.identification.reference_time).num_seconds(),
            None => {
                let range_unit = self.product_field(count + interval_fields::RANGE_UNIT) as u8;
                let length = self.product_field(count + interval_fields::RANGE_LENGTH);
                let seconds = tables::time_unit_seconds(range_unit).ok_or_else(|| {
                    Grib2Error::InvalidSection {
                        section: 4,
                        reason: format!("Unsupported time range unit {}", range_unit),
                    }
                })?;
                start + length * seconds
            }
        };
        Ok((start, end))
    }

    /// End of the overall time interval of a statistical template.
    fn interval_end(&self, count: usize) -> Option<DateTime<Utc>> {
        let base = count.checked_sub(interval_fields::END_YEAR_BACK)?;
        let field = |i: usize| self.product_field(base + i) as u32;
        let end = NaiveDate::from_ymd_opt(field(0) as i32, field(1), field(2))?
            .and_hms_opt(field(3), field(4), field(5))?;
        Some(DateTime::<Utc>::from_naive_utc_and_offset(end, Utc))
    }

    /// Time descriptor, e.g. "anl", "12 hour fcst" or "3-6 hour acc fcst".
    pub fn time_descriptor(&self) -> Result<String> {
        let (start, end) = self.forecast_interval()?;
        let unit = self.product_field(product_fields::TIME_UNIT) as u8;

        match self.statistical_process() {
            None if start == 0 => Ok("anl".to_string()),
            None => Ok(format!("{} fcst", format_duration(start, unit))),
            Some(process) => {
                let name = tables::statistical_process_name(process)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("stat{}", process));
                let (unit_seconds, unit_name) = display_unit(&[start, end], unit);
                Ok(format!(
                    "{}-{} {} {} fcst",
                    start / unit_seconds,
                    end / unit_seconds,
                    unit_name,
                    name
                ))
            }
        }
    }

    /// Full metadata record of this message.
    pub fn record(&self) -> Result<MessageRecord> {
        let parameter = self.parameter();
        let (forecast_start, forecast_end) = self.forecast_interval()?;
        let (nx, ny) = self.grid_dims();
        let centre = self.identification.center;

        Ok(MessageRecord {
            ordinal: self.ordinal,
            offset: self.offset,
            short_name: parameter.short_name,
            long_name: parameter.long_name,
            units: parameter.units,
            level: self.level(),
            time: self.time_descriptor()?,
            discipline: self.discipline(),
            centre: match self.tables.get_centre_name(centre) {
                Some(name) => format!("{} - {}", centre, name),
                None => centre.to_string(),
            },
            subcentre: self.identification.sub_center.to_string(),
            master_table: self.identification.table_version,
            local_table: self.identification.local_table_version,
            pdt: self.product_definition.template_number,
            parameter_category: self.parameter_category(),
            parameter_number: self.parameter_number(),
            first_surface: self.first_surface(),
            second_surface: self.second_surface(),
            reference_time: self.identification.reference_time,
            forecast_start,
            forecast_end,
            num_points: self.grid_definition.num_points,
            nx,
            ny,
            gdt: self.grid_definition.template_number,
            gdt_template: self.grid_definition.template.clone(),
        })
    }

    /// Unpack the field values in storage order.
    ///
    /// Points masked by the bitmap are set to [`UNDEFINED`].
    pub fn unpack_data(&self) -> Result<Vec<f32>> {
        let drs = &self.data_representation;
        if drs.template_number != 0 {
            return Err(Grib2Error::UnsupportedTemplate {
                section: 5,
                template: drs.template_number,
            });
        }

        let bitmap = match &self.bitmap {
            Some(bitmap) if bitmap.is_present() => Some(bitmap.data.as_ref()),
            Some(bitmap) if bitmap.indicator != 255 => {
                return Err(Grib2Error::UnsupportedTemplate {
                    section: 6,
                    template: bitmap.indicator as u16,
                })
            }
            _ => None,
        };

        let values = unpacking::unpack_simple(
            &self.data_section.data,
            self.grid_definition.num_points,
            drs.bits_per_value,
            drs.reference_value,
            drs.binary_scale_factor,
            drs.decimal_scale_factor,
            bitmap,
        )?;

        Ok(values
            .into_iter()
            .map(|v| v.unwrap_or(UNDEFINED))
            .collect())
    }
}

/// Render a forecast offset the way inventories do ("12 hour", "30 min").
fn format_duration(seconds: i64, unit: u8) -> String {
    let (unit_seconds, unit_name) = display_unit(&[seconds], unit);
    format!("{} {}", seconds / unit_seconds, unit_name)
}

/// Pick the unit to print offsets in: the template's unit when all offsets
/// are whole multiples of it, else the largest unit that divides them.
fn display_unit(offsets: &[i64], unit: u8) -> (i64, &'static str) {
    let preferred = match unit {
        0 => Some((60, "min")),
        1 | 10 | 11 | 12 => Some((3_600, "hour")),
        2 => Some((86_400, "day")),
        13 => Some((1, "sec")),
        _ => None,
    };
    let fits = |s: i64| offsets.iter().all(|o| o % s == 0);
    if let Some((s, name)) = preferred {
        if fits(s) {
            return (s, name);
        }
    }
    [(86_400, "day"), (3_600, "hour"), (60, "min")]
        .into_iter()
        .find(|&(s, _)| fits(s))
        .unwrap_or((1, "sec"))
}

/// Sequential reader over the messages of a GRIB2 file.
pub struct Grib2Reader {
    data: Bytes,
    offset: usize,
    ordinal: usize,
    tables: Arc<Grib2Tables>,
}

impl Grib2Reader {
    /// Reader with the standard code tables.
    pub fn new(data: Bytes) -> Self {
        Self::with_tables(data, Arc::new(Grib2Tables::standard()))
    }

    pub fn with_tables(data: Bytes, tables: Arc<Grib2Tables>) -> Self {
        Self {
            data,
            offset: 0,
            ordinal: 0,
            tables,
        }
    }

    /// Size of the underlying buffer in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Decode the next message, `None` once the data is exhausted.
    ///
    /// Bytes between messages are skipped until the next `GRIB` marker.
    pub fn next_message(&mut self) -> Result<Option<Grib2Message>> {
        let start = match find_marker(&self.data, self.offset) {
            Some(start) => start,
            None => {
                self.offset = self.data.len();
                return Ok(None);
            }
        };

        let length = self.message_length(start)?;
        self.ordinal += 1;
        self.offset = start + length;

        let message = Grib2Message::parse(
            &self.data[start..start + length],
            self.ordinal,
            start as u64,
            self.tables.clone(),
        )?;
        debug!(
            ordinal = message.ordinal,
            offset = message.offset,
            length = length,
            "Decoded GRIB2 message"
        );
        Ok(Some(message))
    }

    /// Decode the message starting exactly at `offset`.
    pub fn message_at(&self, offset: u64, ordinal: usize) -> Result<Grib2Message> {
        let start = offset as usize;
        if self.data.get(start..start + 4) != Some(b"GRIB".as_slice()) {
            return Err(Grib2Error::InvalidFormat(format!(
                "No GRIB message at offset {}",
                offset
            )));
        }
        let length = self.message_length(start)?;
        Grib2Message::parse(
            &self.data[start..start + length],
            ordinal,
            offset,
            self.tables.clone(),
        )
    }

    fn message_length(&self, start: usize) -> Result<usize> {
        let indicator = sections::parse_indicator(&self.data[start..])?;
        let length = indicator.message_length as usize;
        if length < 16 || start + length > self.data.len() {
            return Err(Grib2Error::InvalidFormat(format!(
                "Message at offset {} claims {} bytes, {} available",
                start,
                length,
                self.data.len() - start
            )));
        }
        Ok(length)
    }
}

impl Iterator for Grib2Reader {
    type Item = Result<Grib2Message>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_message().transpose()
    }
}

fn find_marker(data: &[u8], from: usize) -> Option<usize> {
    data.get(from..)?
        .windows(4)
        .position(|w| w == b"GRIB")
        .map(|p| p + from)
}
