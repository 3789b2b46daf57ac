//! GRIB2 code tables used to describe messages.
//!
//! Translates numeric codes into the names an inventory shows: parameter
//! short names, long names and units, level descriptions, originating
//! centres, statistical processes and time units.
//!
//! `Grib2Tables::standard()` covers the common WMO and NCEP entries;
//! callers can add or override mappings without code changes.

use std::collections::HashMap;

/// Lookup key for parameter: (discipline, category, number)
pub type ParamKey = (u8, u8, u8);

/// Code for "missing" fixed surface type.
pub const MISSING_SURFACE: u8 = 255;

/// Descriptive names of one parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterInfo {
    pub short_name: String,
    pub long_name: String,
    pub units: String,
}

impl ParameterInfo {
    pub fn new(short_name: &str, long_name: &str, units: &str) -> Self {
        Self {
            short_name: short_name.to_string(),
            long_name: long_name.to_string(),
            units: units.to_string(),
        }
    }
}

/// Level description - either static text or a template with {value} placeholder
#[derive(Debug, Clone)]
pub enum LevelDescription {
    /// Static description (e.g., "surface", "mean sea level")
    Static(String),
    /// Template with {value} placeholder (e.g., "{value} mb", "{value} m above ground")
    Template(String),
}

impl LevelDescription {
    /// Format the level description, substituting placeholders if it's a template.
    ///
    /// Supported placeholders:
    /// - `{value}` - Level value in the surface's native units
    /// - `{value_mb}` - Value converted from Pa to mb (divided by 100)
    pub fn format(&self, value: Option<f64>) -> String {
        match self {
            LevelDescription::Static(s) => s.clone(),
            LevelDescription::Template(t) => {
                let value = value.unwrap_or(0.0);
                t.replace("{value}", &format_number(value))
                    .replace("{value_mb}", &format_number(value / 100.0))
            }
        }
    }

    /// Format a layer between two surfaces of this type ("1000-500 mb").
    pub fn format_layer(&self, bottom: Option<f64>, top: Option<f64>) -> String {
        match self {
            LevelDescription::Static(s) => s.clone(),
            LevelDescription::Template(t) => {
                let bottom = bottom.unwrap_or(0.0);
                let top = top.unwrap_or(0.0);
                t.replace(
                    "{value}",
                    &format!("{}-{}", format_number(bottom), format_number(top)),
                )
                .replace(
                    "{value_mb}",
                    &format!(
                        "{}-{}",
                        format_number(bottom / 100.0),
                        format_number(top / 100.0)
                    ),
                )
            }
        }
    }
}

/// Format a number without a trailing ".0" for integral values.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// GRIB2 parameter and level lookup tables.
#[derive(Debug, Clone, Default)]
pub struct Grib2Tables {
    /// (discipline, category, number) -> parameter names
    parameters: HashMap<ParamKey, ParameterInfo>,
    /// level_type -> description pattern
    levels: HashMap<u8, LevelDescription>,
    /// centre code -> centre name
    centres: HashMap<u16, String>,
}

impl Grib2Tables {
    /// Create empty tables
    pub fn new() -> Self {
        Self::default()
    }

    /// Tables populated with the common WMO and NCEP entries.
    pub fn standard() -> Self {
        let mut tables = Self::new();
        for &((d, c, n), short, long, units) in STANDARD_PARAMETERS {
            tables.add_parameter(d, c, n, ParameterInfo::new(short, long, units));
        }
        for &(code, pattern) in STANDARD_LEVELS {
            let description = if pattern.contains('{') {
                LevelDescription::Template(pattern.to_string())
            } else {
                LevelDescription::Static(pattern.to_string())
            };
            tables.add_level(code, description);
        }
        for &(code, name) in STANDARD_CENTRES {
            tables.add_centre(code, name.to_string());
        }
        tables
    }

    /// Add a parameter mapping
    pub fn add_parameter(&mut self, discipline: u8, category: u8, number: u8, info: ParameterInfo) {
        self.parameters.insert((discipline, category, number), info);
    }

    /// Add a level description mapping
    pub fn add_level(&mut self, level_type: u8, description: LevelDescription) {
        self.levels.insert(level_type, description);
    }

    /// Add an originating centre name
    pub fn add_centre(&mut self, code: u16, name: String) {
        self.centres.insert(code, name);
    }

    /// Look up parameter names by GRIB2 codes.
    ///
    /// Unknown parameters get the short name "P{discipline}_{category}_{number}".
    pub fn get_parameter(&self, discipline: u8, category: u8, number: u8) -> ParameterInfo {
        self.parameters
            .get(&(discipline, category, number))
            .cloned()
            .unwrap_or_else(|| ParameterInfo {
                short_name: format!("P{}_{}_{}", discipline, category, number),
                long_name: "unknown".to_string(),
                units: "unknown".to_string(),
            })
    }

    /// Look up parameter short name by GRIB2 codes.
    pub fn get_parameter_name(&self, discipline: u8, category: u8, number: u8) -> String {
        self.get_parameter(discipline, category, number).short_name
    }

    /// Describe a level given its first and (optional) second fixed surface.
    ///
    /// Returns "Level type {type} value {value}" if the type is not known.
    pub fn get_level_description(
        &self,
        level_type: u8,
        level_value: Option<f64>,
        second: Option<(u8, Option<f64>)>,
    ) -> String {
        let describe = |code: u8, value: Option<f64>| match self.levels.get(&code) {
            Some(desc) => desc.format(value),
            None => format!(
                "Level type {} value {}",
                code,
                value.map(format_number).unwrap_or_else(|| "missing".to_string())
            ),
        };

        match second {
            Some((top_type, top_value)) if top_type != MISSING_SURFACE => {
                if top_type == level_type {
                    match self.levels.get(&level_type) {
                        Some(desc) => desc.format_layer(level_value, top_value),
                        None => describe(level_type, level_value),
                    }
                } else {
                    format!(
                        "{} - {}",
                        describe(level_type, level_value),
                        describe(top_type, top_value)
                    )
                }
            }
            _ => describe(level_type, level_value),
        }
    }

    /// Name of an originating centre, if known.
    pub fn get_centre_name(&self, code: u16) -> Option<&str> {
        self.centres.get(&code).map(String::as_str)
    }

    /// Get the number of parameters in the table
    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    /// Get the number of level types in the table
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Check if the tables are empty
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty() && self.levels.is_empty() && self.centres.is_empty()
    }
}

/// Statistical process name (Code Table 4.10), as used in time descriptors.
pub fn statistical_process_name(code: u8) -> Option<&'static str> {
    let name = match code {
        0 => "ave",
        1 => "acc",
        2 => "max",
        3 => "min",
        4 => "last-first",
        5 => "RMS",
        6 => "StdDev",
        7 => "covar",
        8 => "first-last",
        9 => "ratio",
        10 => "standardized anomaly",
        11 => "summation",
        _ => return None,
    };
    Some(name)
}

/// Length in seconds of one indicator of unit of time range (Code Table 4.4).
pub fn time_unit_seconds(code: u8) -> Option<i64> {
    let seconds = match code {
        0 => 60,
        1 => 3_600,
        2 => 86_400,
        10 => 3 * 3_600,
        11 => 6 * 3_600,
        12 => 12 * 3_600,
        13 => 1,
        _ => return None,
    };
    Some(seconds)
}

const STANDARD_PARAMETERS: &[(ParamKey, &str, &str, &str)] = &[
    // Discipline 0, category 0: temperature
    ((0, 0, 0), "TMP", "Temperature", "K"),
    ((0, 0, 1), "VTMP", "Virtual Temperature", "K"),
    ((0, 0, 2), "POT", "Potential Temperature", "K"),
    ((0, 0, 4), "TMAX", "Maximum Temperature", "K"),
    ((0, 0, 5), "TMIN", "Minimum Temperature", "K"),
    ((0, 0, 6), "DPT", "Dew Point Temperature", "K"),
    // Category 1: moisture
    ((0, 1, 0), "SPFH", "Specific Humidity", "kg/kg"),
    ((0, 1, 1), "RH", "Relative Humidity", "%"),
    ((0, 1, 3), "PWAT", "Precipitable Water", "kg/m^2"),
    ((0, 1, 7), "PRATE", "Precipitation Rate", "kg/m^2/s"),
    ((0, 1, 8), "APCP", "Total Precipitation", "kg/m^2"),
    ((0, 1, 9), "NCPCP", "Large-Scale Precipitation (non-convective)", "kg/m^2"),
    ((0, 1, 10), "ACPCP", "Convective Precipitation", "kg/m^2"),
    ((0, 1, 11), "SNOD", "Snow Depth", "m"),
    ((0, 1, 13), "WEASD", "Water Equivalent of Accumulated Snow Depth", "kg/m^2"),
    // Category 2: momentum
    ((0, 2, 0), "WDIR", "Wind Direction (from which blowing)", "deg"),
    ((0, 2, 1), "WIND", "Wind Speed", "m/s"),
    ((0, 2, 2), "UGRD", "U-Component of Wind", "m/s"),
    ((0, 2, 3), "VGRD", "V-Component of Wind", "m/s"),
    ((0, 2, 8), "VVEL", "Vertical Velocity (Pressure)", "Pa/s"),
    ((0, 2, 10), "ABSV", "Absolute Vorticity", "1/s"),
    ((0, 2, 22), "GUST", "Wind Speed (Gust)", "m/s"),
    ((0, 2, 194), "USTM", "U-Component Storm Motion", "m/s"),
    ((0, 2, 195), "VSTM", "V-Component Storm Motion", "m/s"),
    // Category 3: mass
    ((0, 3, 0), "PRES", "Pressure", "Pa"),
    ((0, 3, 1), "PRMSL", "Pressure Reduced to MSL", "Pa"),
    ((0, 3, 5), "HGT", "Geopotential Height", "gpm"),
    // Category 6: cloud
    ((0, 6, 1), "TCDC", "Total Cloud Cover", "%"),
    ((0, 6, 3), "LCDC", "Low Cloud Cover", "%"),
    ((0, 6, 4), "MCDC", "Medium Cloud Cover", "%"),
    ((0, 6, 5), "HCDC", "High Cloud Cover", "%"),
    ((0, 6, 6), "CWAT", "Cloud Water", "kg/m^2"),
    // Category 7: thermodynamic stability
    ((0, 7, 6), "CAPE", "Convective Available Potential Energy", "J/kg"),
    ((0, 7, 7), "CIN", "Convective Inhibition", "J/kg"),
    ((0, 7, 8), "HLCY", "Storm Relative Helicity", "m^2/s^2"),
    ((0, 7, 192), "LFTX", "Surface Lifted Index", "K"),
    ((0, 7, 193), "4LFTX", "Best (4 layer) Lifted Index", "K"),
    // Category 16: forecast radar imagery
    ((0, 16, 195), "REFD", "Reflectivity", "dB"),
    ((0, 16, 196), "REFC", "Composite reflectivity", "dB"),
    // Category 19: physical atmospheric properties
    ((0, 19, 0), "VIS", "Visibility", "m"),
    ((0, 19, 11), "TKE", "Turbulent Kinetic Energy", "J/kg"),
    // Discipline 2: land surface
    ((2, 0, 0), "LAND", "Land Cover (1=land, 0=sea)", "Proportion"),
    ((2, 0, 192), "SOILW", "Volumetric Soil Moisture Content", "Fraction"),
    // Discipline 10: oceanographic
    ((10, 0, 3), "HTSGW", "Significant Height of Combined Wind Waves and Swell", "m"),
    ((10, 2, 0), "ICEC", "Ice Cover", "Proportion"),
    ((10, 3, 0), "WTMP", "Water Temperature", "K"),
];

const STANDARD_LEVELS: &[(u8, &str)] = &[
    (1, "surface"),
    (2, "cloud base"),
    (3, "cloud top"),
    (4, "0C isotherm"),
    (5, "level of adiabatic condensation from sfc"),
    (6, "max wind"),
    (7, "tropopause"),
    (8, "top of atmosphere"),
    (10, "entire atmosphere"),
    (100, "{value_mb} mb"),
    (101, "mean sea level"),
    (102, "{value} m above mean sea level"),
    (103, "{value} m above ground"),
    (104, "{value} sigma level"),
    (105, "{value} hybrid level"),
    (106, "{value} m below ground"),
    (107, "{value} K isentropic level"),
    (108, "{value_mb} mb above ground"),
    (109, "PV={value} (Km^2/kg/s) surface"),
    (111, "{value} eta level"),
    (200, "entire atmosphere (considered as a single layer)"),
    (204, "highest tropospheric freezing level"),
    (211, "boundary layer cloud layer"),
    (212, "low cloud bottom level"),
    (213, "low cloud top level"),
    (214, "low cloud layer"),
    (220, "planetary boundary layer"),
    (222, "middle cloud bottom level"),
    (223, "middle cloud top level"),
    (224, "middle cloud layer"),
    (232, "high cloud bottom level"),
    (233, "high cloud top level"),
    (234, "high cloud layer"),
];

const STANDARD_CENTRES: &[(u16, &str)] = &[
    (7, "US National Weather Service - NCEP (WMC)"),
    (34, "Japanese Meteorological Agency - Tokyo (RSMC)"),
    (54, "Canadian Meteorological Service - Montreal (RSMC)"),
    (58, "US Navy - Fleet Numerical Oceanography Center"),
    (59, "NOAA Forecast Systems Lab, Boulder, CO"),
    (60, "US National Center for Atmospheric Research (NCAR)"),
    (74, "UK Meteorological Office - Exeter (RSMC)"),
    (78, "Offenbach (RSMC)"),
    (85, "French Weather Service - Toulouse"),
    (98, "European Centre for Medium-Range Weather Forecasts (RSMC)"),
    (161, "US NOAA Office of Oceanic and Atmospheric Research"),
];
