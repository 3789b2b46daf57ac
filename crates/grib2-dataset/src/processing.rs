//! Statistical processing keywords (GRIB2 Code Table 4.10) and time keys.
//!
//! The time key separates messages of one parameter and level that differ
//! only in how their values were aggregated over time, e.g. 3 and 6 hour
//! accumulations. Plain forecasts get no time key.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DatasetError, Result};
use crate::metadata::MetaData;

/// Keywords the time descriptors of Code Table 4.10 processes contain.
pub const STANDARD_KEYWORDS: &[&str] = &[
    "ave",
    "acc",
    "max",
    "min",
    "last-first",
    "RMS",
    "StdDev",
    "covar",
    "first-last",
    "ratio",
    "standardized anomaly",
    "summation",
];

/// Ordered list of statistical processing keywords.
///
/// The first keyword found in a time descriptor wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTable {
    keywords: Vec<String>,
}

impl Default for ProcessingTable {
    fn default() -> Self {
        Self::new(STANDARD_KEYWORDS.iter().map(|k| k.to_string()).collect())
    }
}

impl ProcessingTable {
    pub fn new(keywords: Vec<String>) -> Self {
        Self { keywords }
    }

    /// Parse a table from YAML: `keywords: [ave, acc, ...]`.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let table: Self = serde_yaml::from_str(yaml)?;
        if table.keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(DatasetError::invalid_config(
                "processing keywords must not be empty",
            ));
        }
        Ok(table)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let yaml = fs::read_to_string(path).map_err(|e| {
            DatasetError::invalid_config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&yaml)
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// First keyword occurring as a whole word in `time_str`.
    pub fn keyword_in(&self, time_str: &str) -> Option<&str> {
        let padded = format!(" {} ", time_str);
        self.keywords
            .iter()
            .find(|k| padded.contains(&format!(" {} ", k)))
            .map(String::as_str)
    }

    /// Time key of `item`, e.g. "6_hour_acc".
    ///
    /// `None` for instantaneous fields and for descriptors without a
    /// processing keyword.
    pub fn time_key(&self, item: &MetaData) -> Option<String> {
        let period = item.forecast_period().num_seconds();
        if period <= 0 {
            return None;
        }
        let keyword = self.keyword_in(&item.time_str)?;
        format_period(period).map(|period| format!("{}_{}", period, keyword))
    }
}

/// "90_min", "6_hour" or "2_day", using the coarsest unit with no remainder
/// below it. Periods shorter than a minute have no representation.
fn format_period(seconds: i64) -> Option<String> {
    let minutes = (seconds / 60) % 60;
    let hours = (seconds / 3600) % 24;
    let days = seconds / 86_400;
    if minutes != 0 {
        Some(format!("{}_min", seconds / 60))
    } else if hours != 0 {
        Some(format!("{}_hour", seconds / 3600))
    } else if days != 0 {
        Some(format!("{}_day", days))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tests::record;
    use std::path::Path;

    fn item(time: &str, start_hour: i64, end_hour: i64) -> MetaData {
        let mut rec = record("APCP", "surface", time);
        rec.forecast_start = start_hour * 3600;
        rec.forecast_end = end_hour * 3600;
        MetaData::from_record(Path::new("f.grib2"), &rec).unwrap()
    }

    #[test]
    fn test_accumulation_key() {
        let table = ProcessingTable::default();
        assert_eq!(
            table.time_key(&item("3-6 hour acc fcst", 3, 6)),
            Some("3_hour_acc".to_string())
        );
        assert_eq!(
            table.time_key(&item("0-6 hour acc fcst", 0, 6)),
            Some("6_hour_acc".to_string())
        );
    }

    #[test]
    fn test_plain_forecast_has_no_key() {
        let table = ProcessingTable::default();
        assert_eq!(table.time_key(&item("12 hour fcst", 12, 12)), None);
        // A period without a keyword is not a statistical product.
        assert_eq!(table.time_key(&item("0-6 hour fcst", 0, 6)), None);
    }

    #[test]
    fn test_keyword_matches_whole_words() {
        let table = ProcessingTable::default();
        assert_eq!(table.keyword_in("0-1 day max fcst"), Some("max"));
        assert_eq!(table.keyword_in("0-1 day maximum fcst"), None);
        assert_eq!(
            table.keyword_in("0-1 day standardized anomaly fcst"),
            Some("standardized anomaly")
        );
    }

    #[test]
    fn test_format_period() {
        assert_eq!(format_period(90 * 60).as_deref(), Some("90_min"));
        assert_eq!(format_period(30 * 3600).as_deref(), Some("30_hour"));
        assert_eq!(format_period(2 * 86_400).as_deref(), Some("2_day"));
        assert_eq!(format_period(30), None);
    }

    #[test]
    fn test_table_from_yaml() {
        let table = ProcessingTable::from_yaml_str("keywords: [avg, acc]").unwrap();
        assert_eq!(table.keywords(), ["avg".to_string(), "acc".to_string()]);
        assert_eq!(
            table.time_key(&item("0-3 hour avg fcst", 0, 3)),
            Some("3_hour_avg".to_string())
        );

        assert!(ProcessingTable::from_yaml_str("keywords: ['  ']").is_err());
        assert!(ProcessingTable::from_yaml_str("nope: 1").is_err());
    }
}
