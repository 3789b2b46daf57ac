//! Synthetic GRIB2 message builder.
//!
//! Creates small but structurally valid GRIB2 edition 2 messages on a
//! latitude/longitude grid (template 3.0), with either an instantaneous
//! product (template 4.0) or a statistically processed one (template 4.8),
//! simple packing (template 5.0) and an optional bitmap.
//!
//! Signed template fields are written in sign-magnitude form, as GRIB2
//! requires.

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike, Datelike};
use std::io::Write;
use std::path::Path;

/// Statistical processing over the forecast interval (template 4.8).
#[derive(Debug, Clone, Copy)]
struct Statistics {
    process: u8,
    end_hour: u32,
}

/// Build a minimal GRIB2 message with the specified parameters
#[derive(Debug, Clone)]
pub struct Grib2Builder {
    discipline: u8,
    centre: u16,
    subcentre: u16,
    reference_time: NaiveDateTime,
    // Grid definition
    ni: u32,
    nj: u32,
    la1: i32, // microdegrees
    lo1: u32,
    la2: i32,
    lo2: u32,
    di: u32,
    dj: u32,
    scanning_mode: u8,
    // Product definition
    param_category: u8,
    param_number: u8,
    first_surface: (u8, i8, i32),
    second_surface: (u8, i8, i32),
    forecast_hour: u32,
    statistics: Option<Statistics>,
    // Data, in storage order
    data_values: Vec<f32>,
    present: Option<Vec<bool>>,
}

impl Default for Grib2Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Grib2Builder {
    /// 4x3 one-degree grid of 2 m temperature, stored north to south like GFS.
    pub fn new() -> Self {
        let reference_time = NaiveDate::from_ymd_opt(2020, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        Self {
            discipline: 0,
            centre: 7,
            subcentre: 0,
            reference_time,
            ni: 0,
            nj: 0,
            la1: 0,
            lo1: 0,
            la2: 0,
            lo2: 0,
            di: 1_000_000,
            dj: 1_000_000,
            scanning_mode: 0x00,
            param_category: 0,
            param_number: 0,
            first_surface: (103, 0, 2),
            second_surface: (255, 0, 0),
            forecast_hour: 0,
            statistics: None,
            data_values: Vec::new(),
            present: None,
        }
        .with_grid(4, 3)
    }

    pub fn with_discipline(mut self, discipline: u8) -> Self {
        self.discipline = discipline;
        self
    }

    pub fn with_centre(mut self, centre: u16, subcentre: u16) -> Self {
        self.centre = centre;
        self.subcentre = subcentre;
        self
    }

    pub fn with_reference_time(mut self, year: i32, month: u32, day: u32, hour: u32) -> Self {
        self.reference_time = NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|d| d.and_hms_opt(hour, 0, 0))
            .unwrap();
        self
    }

    /// One-degree grid with its south-west corner at (0N, 0E).
    ///
    /// Values default to the storage index of each point.
    pub fn with_grid(mut self, ni: u32, nj: u32) -> Self {
        self.ni = ni;
        self.nj = nj;
        self.data_values = (0..ni * nj).map(|i| i as f32).collect();
        self.present = None;
        let mode = self.scanning_mode;
        self.with_scanning_mode(mode)
    }

    /// Set the scanning mode; the first/last grid points follow it.
    pub fn with_scanning_mode(mut self, mode: u8) -> Self {
        let north = ((self.nj.max(1) - 1) * self.dj) as i32;
        let east = (self.ni.max(1) - 1) * self.di;
        self.scanning_mode = mode;
        if mode & 0x40 != 0 {
            self.la1 = 0;
            self.la2 = north;
        } else {
            self.la1 = north;
            self.la2 = 0;
        }
        if mode & 0x80 != 0 {
            self.lo1 = east;
            self.lo2 = 0;
        } else {
            self.lo1 = 0;
            self.lo2 = east;
        }
        self
    }

    /// Shift the grid so its first point is at the given latitude (microdegrees).
    pub fn with_first_latitude(mut self, la1: i32) -> Self {
        let span = ((self.nj.max(1) - 1) * self.dj) as i32;
        self.la1 = la1;
        self.la2 = if self.scanning_mode & 0x40 != 0 {
            la1 + span
        } else {
            la1 - span
        };
        self
    }

    pub fn with_parameter(mut self, category: u8, number: u8) -> Self {
        self.param_category = category;
        self.param_number = number;
        self
    }

    /// First fixed surface: type, scale factor and scaled value.
    pub fn with_level(mut self, level_type: u8, scale_factor: i8, scaled_value: i32) -> Self {
        self.first_surface = (level_type, scale_factor, scaled_value);
        self
    }

    /// Isobaric surface in hPa (stored in Pa).
    pub fn with_isobaric_level(self, hpa: i32) -> Self {
        self.with_level(100, 0, hpa * 100)
    }

    /// Second fixed surface, turning the level into a layer.
    pub fn with_second_level(mut self, level_type: u8, scale_factor: i8, scaled_value: i32) -> Self {
        self.second_surface = (level_type, scale_factor, scaled_value);
        self
    }

    pub fn with_forecast_hour(mut self, hour: u32) -> Self {
        self.forecast_hour = hour;
        self.statistics = None;
        self
    }

    /// Statistically processed field over [start_hour, end_hour] (template 4.8).
    pub fn with_statistics(mut self, process: u8, start_hour: u32, end_hour: u32) -> Self {
        self.forecast_hour = start_hour;
        self.statistics = Some(Statistics { process, end_hour });
        self
    }

    /// Accumulation (Code Table 4.10 value 1) over [start_hour, end_hour].
    pub fn with_accumulation(self, start_hour: u32, end_hour: u32) -> Self {
        self.with_statistics(1, start_hour, end_hour)
    }

    pub fn with_constant_value(mut self, value: f32) -> Self {
        self.data_values = vec![value; (self.ni * self.nj) as usize];
        self
    }

    /// Values in storage order (as the scanning mode lays them out).
    pub fn with_data(mut self, data: Vec<f32>) -> Self {
        self.data_values = data;
        self
    }

    /// Mark points as present (`true`) or missing; writes a bitmap section.
    pub fn with_bitmap(mut self, present: Vec<bool>) -> Self {
        self.present = Some(present);
        self
    }

    /// Build the complete GRIB2 message bytes
    pub fn build(&self) -> Vec<u8> {
        let packed_values: Vec<f32> = match &self.present {
            Some(mask) => self
                .data_values
                .iter()
                .zip(mask)
                .filter(|(_, p)| **p)
                .map(|(v, _)| *v)
                .collect(),
            None => self.data_values.clone(),
        };

        let section1 = self.build_section1();
        let section3 = self.build_section3();
        let section4 = self.build_section4();
        let (section5, section7) = build_packing(&packed_values);
        let section6 = self.build_section6();

        let message_length = 16
            + section1.len()
            + section3.len()
            + section4.len()
            + section5.len()
            + section6.len()
            + section7.len()
            + 4;

        let mut message = Vec::with_capacity(message_length);

        // Section 0: Indicator
        message.extend_from_slice(b"GRIB");
        message.extend_from_slice(&[0, 0]);
        message.push(self.discipline);
        message.push(2);
        message.extend_from_slice(&(message_length as u64).to_be_bytes());

        message.extend_from_slice(&section1);
        message.extend_from_slice(&section3);
        message.extend_from_slice(&section4);
        message.extend_from_slice(&section5);
        message.extend_from_slice(&section6);
        message.extend_from_slice(&section7);

        // Section 8: End
        message.extend_from_slice(b"7777");

        message
    }

    fn build_section1(&self) -> Vec<u8> {
        let mut section = Vec::new();
        section.extend_from_slice(&21u32.to_be_bytes());
        section.push(1);

        section.extend_from_slice(&self.centre.to_be_bytes());
        section.extend_from_slice(&self.subcentre.to_be_bytes());
        section.push(2); // Master table version
        section.push(1); // Local table version
        section.push(1); // Significance of reference time (start of forecast)

        push_time(&mut section, self.reference_time);

        section.push(0); // Production status (operational)
        section.push(1); // Type of data (forecast)
        section
    }

    fn build_section3(&self) -> Vec<u8> {
        let mut section = Vec::new();

        // Template 3.0: Latitude/Longitude, 58 octets
        let section_length: u32 = 14 + 58;
        section.extend_from_slice(&section_length.to_be_bytes());
        section.push(3);

        section.push(0); // Source of grid definition
        section.extend_from_slice(&(self.ni * self.nj).to_be_bytes());
        section.push(0); // Number of octets for optional list
        section.push(0); // Interpretation of optional list
        section.extend_from_slice(&0u16.to_be_bytes());

        section.push(6); // Shape of Earth (spherical with radius 6371229m)
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());

        section.extend_from_slice(&self.ni.to_be_bytes());
        section.extend_from_slice(&self.nj.to_be_bytes());
        section.extend_from_slice(&0u32.to_be_bytes()); // Basic angle
        section.extend_from_slice(&0xFFFF_FFFFu32.to_be_bytes()); // Subdivisions

        section.extend_from_slice(&sign_magnitude_i32(self.la1));
        section.extend_from_slice(&self.lo1.to_be_bytes());
        section.push(48); // Resolution and component flags
        section.extend_from_slice(&sign_magnitude_i32(self.la2));
        section.extend_from_slice(&self.lo2.to_be_bytes());
        section.extend_from_slice(&self.di.to_be_bytes());
        section.extend_from_slice(&self.dj.to_be_bytes());
        section.push(self.scanning_mode);

        section
    }

    fn build_section4(&self) -> Vec<u8> {
        let mut body = Vec::new();

        body.push(self.param_category);
        body.push(self.param_number);
        body.push(2); // Type of generating process (forecast)
        body.push(0); // Background generating process
        body.push(0); // Analysis or forecast process
        body.extend_from_slice(&0u16.to_be_bytes()); // Hours of cutoff
        body.push(0); // Minutes of cutoff
        body.push(1); // Time range unit (hours)
        body.extend_from_slice(&self.forecast_hour.to_be_bytes());

        let (t1, s1, v1) = self.first_surface;
        body.push(t1);
        body.push(sign_magnitude_i8(s1));
        body.extend_from_slice(&sign_magnitude_i32(v1));
        let (t2, s2, v2) = self.second_surface;
        body.push(t2);
        body.push(sign_magnitude_i8(s2));
        body.extend_from_slice(&sign_magnitude_i32(v2));

        let template: u16 = match self.statistics {
            None => 0,
            Some(stats) => {
                let end = self.reference_time + Duration::hours(stats.end_hour as i64);
                push_time(&mut body, end);
                body.push(1); // Number of time ranges
                body.extend_from_slice(&0u32.to_be_bytes()); // Missing values
                body.push(stats.process);
                body.push(2); // Successive times, forecast time incremented
                body.push(1); // Unit of range length (hours)
                body.extend_from_slice(&(stats.end_hour - self.forecast_hour).to_be_bytes());
                body.push(255); // Increment unit (missing)
                body.extend_from_slice(&0u32.to_be_bytes());
                8
            }
        };

        let mut section = Vec::new();
        section.extend_from_slice(&(9 + body.len() as u32).to_be_bytes());
        section.push(4);
        section.extend_from_slice(&0u16.to_be_bytes()); // Number of coordinate values
        section.extend_from_slice(&template.to_be_bytes());
        section.extend_from_slice(&body);
        section
    }

    fn build_section6(&self) -> Vec<u8> {
        let mut section = Vec::new();
        match &self.present {
            None => {
                section.extend_from_slice(&6u32.to_be_bytes());
                section.push(6);
                section.push(255); // No bitmap
            }
            Some(mask) => {
                let mut bits = vec![0u8; mask.len().div_ceil(8)];
                for (i, &p) in mask.iter().enumerate() {
                    if p {
                        bits[i / 8] |= 0x80 >> (i % 8);
                    }
                }
                section.extend_from_slice(&(6 + bits.len() as u32).to_be_bytes());
                section.push(6);
                section.push(0); // Bitmap follows
                section.extend_from_slice(&bits);
            }
        }
        section
    }
}

/// Sections 5 and 7 for 16-bit simple packing of `values`.
fn build_packing(values: &[f32]) -> (Vec<u8>, Vec<u8>) {
    let (min_val, max_val) = values.iter().fold(
        (f32::INFINITY, f32::NEG_INFINITY),
        |(min, max), &v| (min.min(v), max.max(v)),
    );
    let (reference_value, range) = if values.is_empty() {
        (0.0, 0.0)
    } else {
        (min_val, (max_val - min_val) as f64)
    };

    // value = R + packed * 2^E; 16 bits give packed values up to 65535.
    let (bits_per_value, binary_scale_factor): (u8, i16) = if range == 0.0 {
        (0, 0)
    } else {
        (16, (range / 65535.0).log2().ceil() as i16)
    };

    let mut section5 = Vec::new();
    section5.extend_from_slice(&21u32.to_be_bytes());
    section5.push(5);
    section5.extend_from_slice(&(values.len() as u32).to_be_bytes());
    section5.extend_from_slice(&0u16.to_be_bytes()); // Template 5.0
    section5.extend_from_slice(&reference_value.to_be_bytes());
    section5.extend_from_slice(&sign_magnitude_i16(binary_scale_factor));
    section5.extend_from_slice(&sign_magnitude_i16(0)); // Decimal scale factor
    section5.push(bits_per_value);
    section5.push(0); // Original field type (floating point)

    let mut packed = Vec::new();
    if bits_per_value > 0 {
        let binary_scale = 2.0_f64.powi(binary_scale_factor as i32);
        for &val in values {
            let p = ((val as f64 - reference_value as f64) / binary_scale).round() as u16;
            packed.extend_from_slice(&p.to_be_bytes());
        }
    }

    let mut section7 = Vec::new();
    section7.extend_from_slice(&(5 + packed.len() as u32).to_be_bytes());
    section7.push(7);
    section7.extend_from_slice(&packed);

    (section5, section7)
}

fn push_time(buf: &mut Vec<u8>, time: NaiveDateTime) {
    buf.extend_from_slice(&(time.year() as u16).to_be_bytes());
    buf.push(time.month() as u8);
    buf.push(time.day() as u8);
    buf.push(time.hour() as u8);
    buf.push(time.minute() as u8);
    buf.push(time.second() as u8);
}

/// Encode as GRIB2 sign-magnitude (MSB = sign).
pub fn sign_magnitude_i8(value: i8) -> u8 {
    if value < 0 {
        value.unsigned_abs() | 0x80
    } else {
        value as u8
    }
}

pub fn sign_magnitude_i16(value: i16) -> [u8; 2] {
    let raw = if value < 0 {
        value.unsigned_abs() | 0x8000
    } else {
        value as u16
    };
    raw.to_be_bytes()
}

pub fn sign_magnitude_i32(value: i32) -> [u8; 4] {
    let raw = if value < 0 {
        value.unsigned_abs() | 0x8000_0000
    } else {
        value as u32
    };
    raw.to_be_bytes()
}

/// Write messages back to back into one file.
pub fn write_grib_file(path: &Path, messages: &[Grib2Builder]) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    for message in messages {
        file.write_all(&message.build())?;
    }
    file.flush()
}
