//! Structured per-message metadata built from decoder records.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use grib2_parser::tables::MISSING_SURFACE;
use grib2_parser::MessageRecord;
use serde::{Deserialize, Serialize};

use crate::error::{DatasetError, Result};

/// Metadata of one GRIB2 message.
///
/// Created once per message while scanning a file and never mutated
/// afterwards, except for `file`, which is rebound when a persisted
/// inventory is loaded for a relocated file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaData {
    /// File the message lives in. Not persisted with inventories.
    #[serde(skip)]
    pub file: PathBuf,
    /// 1-based message number within the file.
    pub ordinal: usize,
    /// Byte offset of the message within the file.
    pub offset: u64,
    pub varname: String,
    /// Level descriptor, e.g. "2 m above ground".
    pub level_str: String,
    /// Time descriptor, e.g. "3-6 hour acc fcst".
    pub time_str: String,
    pub discipline: u8,
    pub centre: String,
    pub subcentre: String,
    pub master_table: u8,
    pub local_table: u8,
    pub long_name: String,
    pub units: String,
    pub pdt: u16,
    pub parameter_category: u8,
    pub parameter_number: u8,
    pub bot_level_code: u8,
    pub bot_level_value: Option<f64>,
    pub top_level_code: u8,
    /// Present only when `top_level_code` is not 255.
    pub top_level_value: Option<f64>,
    pub reftime: DateTime<Utc>,
    pub start_ft: DateTime<Utc>,
    pub end_ft: DateTime<Utc>,
    pub npts: u32,
    pub nx: u32,
    pub ny: u32,
    pub gdtnum: u16,
    pub gdtmpl: Vec<i64>,
}

impl MetaData {
    /// Translate a decoder record for a message of `file`.
    pub fn from_record(file: &Path, record: &MessageRecord) -> Result<Self> {
        if record.forecast_end < record.forecast_start {
            return Err(DatasetError::decode(
                file,
                format!(
                    "message {} ends before it starts ({}s < {}s)",
                    record.ordinal, record.forecast_end, record.forecast_start
                ),
            ));
        }

        let bottom = record.first_surface;
        let top = record.second_surface;
        let top_level_value = if top.is_missing() {
            None
        } else {
            Some(top.value().ok_or_else(|| {
                DatasetError::decode(
                    file,
                    format!(
                        "message {} has no value for top level type {}",
                        record.ordinal, top.type_code
                    ),
                )
            })?)
        };

        Ok(Self {
            file: file.to_path_buf(),
            ordinal: record.ordinal,
            offset: record.offset,
            varname: record.short_name.clone(),
            level_str: sanitize_level(bottom.type_code, &record.level),
            time_str: record.time.clone(),
            discipline: record.discipline,
            centre: record.centre.clone(),
            subcentre: record.subcentre.clone(),
            master_table: record.master_table,
            local_table: record.local_table,
            long_name: record.long_name.clone(),
            units: record.units.clone(),
            pdt: record.pdt,
            parameter_category: record.parameter_category,
            parameter_number: record.parameter_number,
            bot_level_code: bottom.type_code,
            bot_level_value: bottom.value(),
            top_level_code: if top.is_missing() {
                MISSING_SURFACE
            } else {
                top.type_code
            },
            top_level_value,
            reftime: record.reference_time,
            start_ft: record.reference_time + Duration::seconds(record.forecast_start),
            end_ft: record.reference_time + Duration::seconds(record.forecast_end),
            npts: record.num_points,
            nx: record.nx,
            ny: record.ny,
            gdtnum: record.gdt,
            gdtmpl: record.gdt_template.clone(),
        })
    }

    /// Alias of `bot_level_code`.
    pub fn level_code(&self) -> u8 {
        self.bot_level_code
    }

    /// Alias of `bot_level_value`.
    pub fn level_value(&self) -> Option<f64> {
        self.bot_level_value
    }

    /// Length of the forecast interval.
    pub fn forecast_period(&self) -> Duration {
        self.end_ft - self.start_ft
    }

    /// End of the forecast interval relative to the reference time.
    pub fn forecast_offset(&self) -> Duration {
        self.end_ft - self.reftime
    }

    /// Message position as "ordinal:offset".
    pub fn position(&self) -> String {
        format!("{}:{}", self.ordinal, self.offset)
    }

    /// True if both messages are on the same grid.
    pub fn same_grid(&self, other: &MetaData) -> bool {
        self.gdtnum == other.gdtnum && self.gdtmpl == other.gdtmpl
    }
}

impl fmt::Display for MetaData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}|{}",
            self.position(),
            self.varname,
            self.level_str,
            self.time_str,
            self.reftime.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

/// Strip characters that break variable names downstream.
fn sanitize_level(level_code: u8, level: &str) -> String {
    let level = level.replace(['(', ')'], "");
    match level_code {
        21..=24 => level.replace("/m^3", "*m-3"),
        109 => level.replace("Km^2/kg/s", "K*m2*kg-1*s-1"),
        _ => level,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;
    use grib2_parser::FixedSurface;

    pub(crate) fn record(short_name: &str, level: &str, time: &str) -> MessageRecord {
        MessageRecord {
            ordinal: 1,
            offset: 0,
            short_name: short_name.to_string(),
            long_name: "Temperature".to_string(),
            units: "K".to_string(),
            level: level.to_string(),
            time: time.to_string(),
            discipline: 0,
            centre: "7 - US National Weather Service - NCEP (WMC)".to_string(),
            subcentre: "0".to_string(),
            master_table: 2,
            local_table: 1,
            pdt: 0,
            parameter_category: 0,
            parameter_number: 0,
            first_surface: FixedSurface {
                type_code: 100,
                scale_factor: 0,
                scaled_value: 50000,
            },
            second_surface: FixedSurface {
                type_code: 255,
                scale_factor: 0,
                scaled_value: 0,
            },
            reference_time: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            forecast_start: 12 * 3600,
            forecast_end: 12 * 3600,
            num_points: 12,
            nx: 4,
            ny: 3,
            gdt: 0,
            gdt_template: vec![6, 0, 0, 0, 0, 0, 0, 4, 3],
        }
    }

    #[test]
    fn test_from_record() {
        let meta = MetaData::from_record(Path::new("a.grib2"), &record("TMP", "500 mb", "12 hour fcst"))
            .unwrap();

        assert_eq!(meta.file, PathBuf::from("a.grib2"));
        assert_eq!(meta.varname, "TMP");
        assert_eq!(meta.level_code(), 100);
        assert_eq!(meta.level_value(), Some(50000.0));
        assert_eq!(meta.top_level_code, 255);
        assert_eq!(meta.top_level_value, None);
        assert_eq!(meta.forecast_period(), Duration::zero());
        assert_eq!(meta.forecast_offset(), Duration::hours(12));
        assert_eq!(
            meta.to_string(),
            "1:0|TMP|500 mb|12 hour fcst|2020-01-01 00:00:00"
        );
    }

    #[test]
    fn test_interval_ending_before_start_is_rejected() {
        let mut rec = record("APCP", "surface", "6-3 hour acc fcst");
        rec.forecast_start = 6 * 3600;
        rec.forecast_end = 3 * 3600;

        let err = MetaData::from_record(Path::new("a.grib2"), &rec).unwrap_err();
        assert!(matches!(err, DatasetError::Decode { .. }));
    }

    #[test]
    fn test_layer_requires_top_value() {
        let mut rec = record("SOILW", "0-0.1 m below ground", "anl");
        rec.first_surface = FixedSurface {
            type_code: 106,
            scale_factor: 0,
            scaled_value: 0,
        };
        rec.second_surface = FixedSurface {
            type_code: 106,
            scale_factor: 1,
            scaled_value: 1,
        };
        let meta = MetaData::from_record(Path::new("a.grib2"), &rec).unwrap();
        assert_eq!(meta.top_level_code, 106);
        assert_eq!(meta.top_level_value, Some(0.1));

        rec.second_surface.scale_factor = -127;
        rec.second_surface.scaled_value = -2_147_483_647;
        assert!(MetaData::from_record(Path::new("a.grib2"), &rec).is_err());
    }

    #[test]
    fn test_sanitize_level() {
        assert_eq!(
            sanitize_level(109, "PV=2e-06 (Km^2/kg/s) surface"),
            "PV=2e-06 K*m2*kg-1*s-1 surface"
        );
        assert_eq!(sanitize_level(22, "0.5 kg/m^3 (level)"), "0.5 kg*m-3 level");
        assert_eq!(sanitize_level(100, "500 mb"), "500 mb");
    }
}
