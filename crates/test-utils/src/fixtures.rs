//! Common GRIB2 fixtures for inventory and dataset tests.
//!
//! A "run" is the set of messages one model cycle produces: temperature on
//! two isobaric surfaces and at 2 m for three forecast hours, plus 3 and
//! 6 hour precipitation accumulations.

use crate::grib2::Grib2Builder;
use std::path::{Path, PathBuf};

/// Reference time as (year, month, day, hour).
pub type RunTime = (i32, u32, u32, u32);

/// Forecast hours of the instantaneous fields in a sample run.
pub const FORECAST_HOURS: [u32; 3] = [0, 3, 6];

/// Isobaric surfaces (hPa) of the sample run's temperature.
pub const ISOBARIC_LEVELS_HPA: [i32; 2] = [500, 700];

/// Grid size of the sample run (nx, ny).
pub const SAMPLE_GRID: (u32, u32) = (4, 3);

fn base(run: RunTime) -> Grib2Builder {
    let (year, month, day, hour) = run;
    Grib2Builder::new()
        .with_reference_time(year, month, day, hour)
        .with_grid(SAMPLE_GRID.0, SAMPLE_GRID.1)
}

/// Temperature on an isobaric surface; constant `200 + hPa / 10 + hour`.
pub fn isobaric_temperature(run: RunTime, hpa: i32, hour: u32) -> Grib2Builder {
    base(run)
        .with_parameter(0, 0)
        .with_isobaric_level(hpa)
        .with_forecast_hour(hour)
        .with_constant_value(200.0 + (hpa / 10) as f32 + hour as f32)
}

/// 2 m temperature; constant `280 + hour`.
pub fn surface_temperature(run: RunTime, hour: u32) -> Grib2Builder {
    base(run)
        .with_parameter(0, 0)
        .with_level(103, 0, 2)
        .with_forecast_hour(hour)
        .with_constant_value(280.0 + hour as f32)
}

/// Surface precipitation accumulated over [start, end] hours; constant `end - start`.
pub fn precipitation(run: RunTime, start: u32, end: u32) -> Grib2Builder {
    base(run)
        .with_parameter(1, 8)
        .with_level(1, 0, 0)
        .with_accumulation(start, end)
        .with_constant_value((end - start) as f32)
}

/// All messages of one sample run, in file order.
pub fn sample_run(run: RunTime) -> Vec<Grib2Builder> {
    let mut messages = Vec::new();
    for hour in FORECAST_HOURS {
        for hpa in ISOBARIC_LEVELS_HPA {
            messages.push(isobaric_temperature(run, hpa, hour));
        }
        messages.push(surface_temperature(run, hour));
    }
    messages.push(precipitation(run, 0, 3));
    messages.push(precipitation(run, 0, 6));
    messages
}

/// Write the sample run for `run` into `dir`, named after its reference time.
pub fn write_sample_run(dir: &Path, run: RunTime) -> std::io::Result<PathBuf> {
    let (year, month, day, hour) = run;
    let path = dir.join(format!("sample_{:04}{:02}{:02}{:02}.grib2", year, month, day, hour));
    crate::grib2::write_grib_file(&path, &sample_run(run))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_run_layout() {
        let run = sample_run((2020, 1, 25, 0));
        assert_eq!(run.len(), FORECAST_HOURS.len() * 3 + 2);
    }

    #[test]
    fn test_write_sample_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample_run(dir.path(), (2020, 1, 25, 12)).unwrap();

        assert!(path.ends_with("sample_2020012512.grib2"));
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[0..4], b"GRIB");
        assert_eq!(&bytes[bytes.len() - 4..], b"7777");
    }
}
