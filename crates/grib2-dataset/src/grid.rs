//! Grid geometry from GRIB2 grid definition templates.
//!
//! Every grid is exposed in one canonical orientation: row 0 is the
//! southern edge, column 0 the western edge, rows are contiguous. Field
//! values are brought into that order with [`reorient`]; coordinates are
//! computed for it directly.
//!
//! Supported templates: 3.0 (latitude/longitude), 3.1 (rotated), 3.10
//! (Mercator), 3.20 (polar stereographic), 3.30 (Lambert conformal),
//! 3.40 (Gaussian) and 3.90 (space view). Projected coordinates use a
//! spherical Earth with the template's radius (semi-major axis for
//! ellipsoids).

use std::collections::BTreeMap;
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use grib2_parser::templates::scanning_mode_index;
use grib2_parser::UNDEFINED;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::coords::{attrs, Attributes, Coordinate, Values};
use crate::error::{DatasetError, Result};

/// Scanning mode flags (Flag Table 3.4).
pub mod scan {
    /// Points of a row run east to west.
    pub const I_NEGATIVE: u8 = 0x80;
    /// Rows run south to north.
    pub const J_POSITIVE: u8 = 0x40;
    /// Points are consecutive along columns.
    pub const J_CONSECUTIVE: u8 = 0x20;
    /// Every other row runs in the opposite direction.
    pub const BOUSTROPHEDON: u8 = 0x10;
}

/// Map projection of a grid definition template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Projection {
    LatLon,
    RotatedLatLon,
    Mercator,
    PolarStereographic,
    LambertConformal,
    Gaussian,
    SpaceView,
}

impl Projection {
    pub fn from_template(gdtnum: u16) -> Option<Self> {
        match gdtnum {
            0 => Some(Self::LatLon),
            1 => Some(Self::RotatedLatLon),
            10 => Some(Self::Mercator),
            20 => Some(Self::PolarStereographic),
            30 => Some(Self::LambertConformal),
            40 => Some(Self::Gaussian),
            90 => Some(Self::SpaceView),
            _ => None,
        }
    }

    /// CF grid mapping name.
    pub fn cf_name(&self) -> &'static str {
        match self {
            Self::LatLon => "latitude_longitude",
            Self::RotatedLatLon => "rotated_latitude_longitude",
            Self::Mercator => "mercator",
            Self::PolarStereographic => "polar_stereographic",
            Self::LambertConformal => "lambert_conformal_conic",
            Self::Gaussian => "gaussian",
            Self::SpaceView => "space_view",
        }
    }

    /// Names of the (y, x) dimensions.
    pub fn dims(&self) -> [&'static str; 2] {
        match self {
            Self::LatLon | Self::Mercator | Self::Gaussian => ["latitude", "longitude"],
            _ => ["y", "x"],
        }
    }

    /// Minimum number of template fields.
    fn template_len(&self) -> usize {
        match self {
            Self::LatLon | Self::Gaussian | Self::Mercator => 19,
            Self::PolarStereographic => 18,
            Self::RotatedLatLon | Self::LambertConformal => 22,
            Self::SpaceView => 21,
        }
    }
}

/// Geometry of one grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    pub gdtnum: u16,
    pub gdtmpl: Vec<i64>,
    pub projection: Projection,
    pub nx: usize,
    pub ny: usize,
    pub scanning_mode: u8,
    /// Coordinates in canonical orientation.
    pub coords: BTreeMap<String, Coordinate>,
    /// Grid mapping, Earth shape and raw template.
    pub attrs: Attributes,
}

impl Grid {
    /// Build the geometry of a grid definition section.
    pub fn from_gds(gdtnum: u16, gdtmpl: &[i64]) -> Result<Self> {
        let projection = Projection::from_template(gdtnum).ok_or_else(|| {
            DatasetError::schema(format!("Invalid or unsupported projection: {}", gdtnum))
        })?;
        if gdtmpl.len() < projection.template_len() {
            return Err(DatasetError::schema(format!(
                "Grid template 3.{} has {} fields, expected {}",
                gdtnum,
                gdtmpl.len(),
                projection.template_len()
            )));
        }

        let t = |i: usize| gdtmpl[i] as f64;
        let nx = gdtmpl[7].max(0) as usize;
        let ny = gdtmpl[8].max(0) as usize;
        if nx == 0 || ny == 0 {
            return Err(DatasetError::schema(format!(
                "Grid has no points ({} x {})",
                nx, ny
            )));
        }
        let scanning_mode = scanning_mode_index(gdtnum)
            .and_then(|i| gdtmpl.get(i))
            .map(|&mode| mode as u8)
            .unwrap_or(0);
        let i_negative = scanning_mode & scan::I_NEGATIVE != 0;
        let j_positive = scanning_mode & scan::J_POSITIVE != 0;

        let globe = Globe::decode(gdtmpl)?;
        let radius = globe.radius();
        let mut grid_attrs = attrs([("grid_mapping_name", json!(projection.cf_name()))]);
        let mut coords = BTreeMap::new();

        match projection {
            Projection::LatLon | Projection::Gaussian => {
                let angle = |i: usize| to_degrees(gdtmpl, gdtmpl[i]);
                let (la1, lo1, la2, lo2) = (angle(11), angle(12), angle(14), angle(15));
                let lon = longitudes(lo1, lo2, nx, i_negative);
                let lat = if projection == Projection::Gaussian {
                    let n = if gdtmpl[17] > 0 {
                        gdtmpl[17] as usize
                    } else {
                        ny / 2
                    };
                    gaussian_subset(2 * n, la1.min(la2), ny)?
                } else {
                    linear(la1.min(la2), la1.max(la2), ny)
                };
                insert_lat_lon(&mut coords, lat, lon);
            }
            Projection::RotatedLatLon => {
                let angle = |i: usize| to_degrees(gdtmpl, gdtmpl[i]);
                let (la1, lo1, la2, lo2) = (angle(11), angle(12), angle(14), angle(15));
                let x = longitudes(lo1, lo2, nx, i_negative);
                let y = linear(la1.min(la2), la1.max(la2), ny);
                insert_projected(&mut coords, x, y, "degree");
                grid_attrs.insert("pole_latitude".into(), json!(angle(19)));
                grid_attrs.insert("pole_longitude".into(), json!(angle(20)));
                grid_attrs.insert("central_rotated_longitude".into(), json!(angle(21)));
            }
            Projection::Mercator => {
                let (la1, lo1, lad, la2, lo2) =
                    (t(9) / 1e6, t(10) / 1e6, t(12) / 1e6, t(13) / 1e6, t(14) / 1e6);
                let lon = longitudes(lo1, lo2, nx, i_negative);
                let (south, north) = (mercator_y(la1.min(la2)), mercator_y(la1.max(la2)));
                let lat = linear(south, north, ny)
                    .into_iter()
                    .map(inverse_mercator_y)
                    .collect();
                insert_lat_lon(&mut coords, lat, lon);
                grid_attrs.insert("standard_parallel".into(), json!(lad));
            }
            Projection::PolarStereographic => {
                let (la1, lo1, lad, lov) = (t(9) / 1e6, t(10) / 1e6, t(12) / 1e6, t(13) / 1e6);
                let (dx, dy) = (t(14) / 1e3, t(15) / 1e3);
                let south_pole = gdtmpl[16] & 0x80 != 0;
                let (x1, y1) = polar_stereographic_xy(la1, lo1, lad, lov, radius, south_pole);
                let (x, y) = projected_axes(x1, y1, dx, dy, nx, ny, scanning_mode);
                insert_projected(&mut coords, x, y, "m");
                grid_attrs.insert("straight_vertical_longitude_from_pole".into(), json!(lov));
                grid_attrs.insert("standard_parallel".into(), json!(lad));
                grid_attrs.insert(
                    "latitude_of_projection_origin".into(),
                    json!(if south_pole { -90.0 } else { 90.0 }),
                );
            }
            Projection::LambertConformal => {
                let (la1, lo1, lov) = (t(9) / 1e6, t(10) / 1e6, t(13) / 1e6);
                let (dx, dy) = (t(14) / 1e3, t(15) / 1e3);
                let (latin1, latin2) = (t(18) / 1e6, t(19) / 1e6);
                let origin = (latin1 + latin2) / 2.0;
                let lcc = LambertConic::new(latin1, latin2, origin, lov, radius);
                let (x1, y1) = lcc.forward(la1, lo1);
                let (x, y) = projected_axes(x1, y1, dx, dy, nx, ny, scanning_mode);
                insert_projected(&mut coords, x, y, "m");
                grid_attrs.insert("longitude_of_central_meridian".into(), json!(lov));
                grid_attrs.insert("standard_parallel".into(), json!([latin1, latin2]));
                grid_attrs.insert("latitude_of_projection_origin".into(), json!(origin));
            }
            Projection::SpaceView => {
                let (lap, lop) = (t(9) / 1e6, t(10) / 1e6);
                let (dx, dy) = (t(12), t(13));
                let (xp, yp) = (t(14) / 1e3, t(15) / 1e3);
                let distance = t(18) / 1e6 * radius;
                let height = distance - radius;
                if height <= 0.0 || dx <= 0.0 || dy <= 0.0 {
                    return Err(DatasetError::schema(
                        "Space view grid has no valid camera geometry",
                    ));
                }
                let angle = 2.0 * (radius / distance).asin();
                let (step_x, step_y) = (angle / dx * height, angle / dy * height);
                // Column/row index of the sub-satellite point in canonical order.
                let xo = if i_negative { (nx - 1) as f64 - xp } else { xp };
                let yo = if j_positive { yp } else { (ny - 1) as f64 - yp };
                let x = (0..nx).map(|c| (c as f64 - xo) * step_x).collect();
                let y = (0..ny).map(|r| (r as f64 - yo) * step_y).collect();
                insert_projected(&mut coords, x, y, "m");
                grid_attrs.insert("perspective_point_height".into(), json!(height));
                grid_attrs.insert("latitude_of_projection_origin".into(), json!(lap));
                grid_attrs.insert("longitude_of_projection_origin".into(), json!(lop));
            }
        }

        grid_attrs.extend(globe.attrs());
        grid_attrs.insert("GRIB_earth_shape".into(), json!(gdtmpl[0]));
        grid_attrs.insert("GRIB_gdtnum".into(), json!(gdtnum));
        grid_attrs.insert("GRIB_gdtmpl".into(), json!(gdtmpl));

        Ok(Self {
            gdtnum,
            gdtmpl: gdtmpl.to_vec(),
            projection,
            nx,
            ny,
            scanning_mode,
            coords,
            attrs: grid_attrs,
        })
    }

    pub fn cf_name(&self) -> &'static str {
        self.projection.cf_name()
    }

    /// Dimension names, (y, x).
    pub fn dims(&self) -> Vec<String> {
        self.projection.dims().iter().map(|d| d.to_string()).collect()
    }

    /// Shape, (ny, nx).
    pub fn shape(&self) -> Vec<usize> {
        vec![self.ny, self.nx]
    }

    pub fn npts(&self) -> usize {
        self.nx * self.ny
    }

    /// True if a message with this grid definition is on this grid.
    pub fn matches(&self, gdtnum: u16, gdtmpl: &[i64]) -> bool {
        self.gdtnum == gdtnum && self.gdtmpl == gdtmpl
    }

    /// Field values in canonical orientation.
    pub fn reorient(&self, values: &[f32]) -> Vec<f32> {
        reorient(values, self.nx, self.ny, self.scanning_mode)
    }
}

/// Rearrange values stored in `scanning_mode` order into canonical order
/// (south to north rows, west to east within a row).
///
/// Points beyond the end of `values` are left [`UNDEFINED`].
pub fn reorient(values: &[f32], nx: usize, ny: usize, scanning_mode: u8) -> Vec<f32> {
    let j_consecutive = scanning_mode & scan::J_CONSECUTIVE != 0;
    let (rows, row_len) = if j_consecutive { (nx, ny) } else { (ny, nx) };

    let mut out = vec![UNDEFINED; nx * ny];
    for (k, &value) in values.iter().enumerate().take(nx * ny) {
        let (outer, inner) = (k / row_len, k % row_len);
        let inner = if scanning_mode & scan::BOUSTROPHEDON != 0 && outer % 2 == 1 {
            row_len - 1 - inner
        } else {
            inner
        };
        let (i, j) = if j_consecutive {
            (outer, inner)
        } else {
            (inner, outer)
        };
        debug_assert!(i < nx && j < ny && outer < rows);
        let col = if scanning_mode & scan::I_NEGATIVE != 0 {
            nx - 1 - i
        } else {
            i
        };
        let row = if scanning_mode & scan::J_POSITIVE != 0 {
            j
        } else {
            ny - 1 - j
        };
        out[row * nx + col] = value;
    }
    out
}

/// Shape of the Earth (Code Table 3.2).
#[derive(Debug, Clone, Copy, PartialEq)]
enum Globe {
    Sphere { radius: f64 },
    Ellipsoid { name: &'static str, major: f64, minor: f64 },
}

impl Globe {
    fn decode(t: &[i64]) -> Result<Self> {
        let scaled = |scale: i64, value: i64, shift: i32| {
            value as f64 / 10f64.powi(scale as i32 - shift)
        };
        let globe = match t[0] {
            0 => Self::Sphere { radius: 6_367_470.0 },
            1 => Self::Sphere {
                radius: scaled(t[1], t[2], 0),
            },
            2 => Self::Ellipsoid {
                name: "ellipsoid",
                major: 6_378_160.0,
                minor: 6_356_775.0,
            },
            // Axes in km for code 3, in m for code 7.
            code @ (3 | 7) => {
                let shift = if code == 3 { 3 } else { 0 };
                Self::Ellipsoid {
                    name: "ellipsoid",
                    major: scaled(t[3], t[4], shift),
                    minor: scaled(t[5], t[6], shift),
                }
            }
            4 => Self::Ellipsoid {
                name: "GRS80",
                major: 6_378_137.0,
                minor: 6_356_752.314,
            },
            5 => Self::Ellipsoid {
                name: "WGS84",
                major: 6_378_137.0,
                minor: 6_356_752.314_245,
            },
            6 => Self::Sphere { radius: 6_371_229.0 },
            8 => Self::Sphere { radius: 6_371_200.0 },
            9 => Self::Ellipsoid {
                name: "Airy",
                major: 6_377_563.396,
                minor: 6_356_256.909,
            },
            code => {
                return Err(DatasetError::schema(format!(
                    "Unsupported shape of the Earth: {}",
                    code
                )))
            }
        };
        Ok(globe)
    }

    fn radius(&self) -> f64 {
        match *self {
            Self::Sphere { radius } => radius,
            Self::Ellipsoid { major, .. } => major,
        }
    }

    fn attrs(&self) -> Attributes {
        match *self {
            Self::Sphere { radius } => attrs([
                ("shape", json!("sphere")),
                ("earth_radius", json!(radius)),
            ]),
            Self::Ellipsoid { name, major, minor } => attrs([
                ("shape", json!(name)),
                ("semi_major_axis", json!(major)),
                ("semi_minor_axis", json!(minor)),
            ]),
        }
    }
}

/// Angle field of templates 3.0, 3.1 and 3.40 in degrees. Units are
/// microdegrees unless the basic angle and its subdivisions say otherwise.
fn to_degrees(t: &[i64], value: i64) -> f64 {
    let (basic, subdivisions) = (t[9], t[10]);
    if basic == 0 || subdivisions == 0 || subdivisions == 0xFFFF_FFFF {
        value as f64 / 1e6
    } else {
        value as f64 * basic as f64 / subdivisions as f64
    }
}

/// `n` evenly spaced values from `first` to `last`.
fn linear(first: f64, last: f64, n: usize) -> Vec<f64> {
    if n < 2 {
        return vec![first; n];
    }
    let step = (last - first) / (n - 1) as f64;
    (0..n).map(|k| first + k as f64 * step).collect()
}

/// West to east longitudes between the first and last points of a row.
fn longitudes(lo1: f64, lo2: f64, nx: usize, i_negative: bool) -> Vec<f64> {
    let (west, east) = if i_negative { (lo2, lo1) } else { (lo1, lo2) };
    let span = if east >= west {
        east - west
    } else {
        east - west + 360.0
    };
    linear(west, west + span, nx)
}

fn mercator_y(lat: f64) -> f64 {
    (FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln()
}

fn inverse_mercator_y(y: f64) -> f64 {
    (2.0 * y.exp().atan() - FRAC_PI_2).to_degrees()
}

/// Gaussian latitudes of a grid with `nlat` rows, south to north.
pub fn gaussian_latitudes(nlat: usize) -> Vec<f64> {
    let n = nlat as f64;
    let mut lats: Vec<f64> = (0..nlat)
        .map(|i| {
            // Newton iteration on the Legendre polynomial P_n.
            let mut x = (PI * (i as f64 + 0.75) / (n + 0.5)).cos();
            for _ in 0..100 {
                let (mut p_prev, mut p) = (1.0, x);
                for k in 2..=nlat {
                    let k = k as f64;
                    let next = ((2.0 * k - 1.0) * x * p - (k - 1.0) * p_prev) / k;
                    p_prev = p;
                    p = next;
                }
                let derivative = n * (x * p - p_prev) / (x * x - 1.0);
                let delta = p / derivative;
                x -= delta;
                if delta.abs() < 1e-15 {
                    break;
                }
            }
            x.asin().to_degrees()
        })
        .collect();
    lats.reverse();
    lats
}

/// The `ny` Gaussian latitudes starting at the one nearest `south`.
fn gaussian_subset(nlat: usize, south: f64, ny: usize) -> Result<Vec<f64>> {
    let all = gaussian_latitudes(nlat);
    let start = all
        .iter()
        .enumerate()
        .min_by(|a, b| (a.1 - south).abs().total_cmp(&(b.1 - south).abs()))
        .map(|(i, _)| i)
        .unwrap_or(0);
    all.get(start..start + ny).map(<[f64]>::to_vec).ok_or_else(|| {
        DatasetError::schema(format!(
            "Gaussian grid with {} latitudes cannot hold {} rows from {}",
            nlat, ny, south
        ))
    })
}

/// Longitude difference folded into [-180, 180).
fn delta_longitude(lon: f64, origin: f64) -> f64 {
    (lon - origin + 540.0).rem_euclid(360.0) - 180.0
}

/// Spherical polar stereographic projection, true at latitude `lad`.
fn polar_stereographic_xy(
    lat: f64,
    lon: f64,
    lad: f64,
    lov: f64,
    radius: f64,
    south_pole: bool,
) -> (f64, f64) {
    let k = 1.0 + lad.abs().to_radians().sin();
    let dlon = delta_longitude(lon, lov).to_radians();
    let phi = lat.to_radians();
    if south_pole {
        let rho = radius * k * (FRAC_PI_4 + phi / 2.0).tan();
        (rho * dlon.sin(), rho * dlon.cos())
    } else {
        let rho = radius * k * (FRAC_PI_4 - phi / 2.0).tan();
        (rho * dlon.sin(), -rho * dlon.cos())
    }
}

/// Spherical Lambert conformal conic projection.
struct LambertConic {
    n: f64,
    f: f64,
    rho0: f64,
    lov: f64,
    radius: f64,
}

impl LambertConic {
    fn new(latin1: f64, latin2: f64, origin: f64, lov: f64, radius: f64) -> Self {
        let (p1, p2) = (latin1.to_radians(), latin2.to_radians());
        let t = |p: f64| (FRAC_PI_4 + p / 2.0).tan();
        let n = if (latin1 - latin2).abs() < 1e-9 {
            p1.sin()
        } else {
            (p1.cos() / p2.cos()).ln() / (t(p2) / t(p1)).ln()
        };
        let f = p1.cos() * t(p1).powf(n) / n;
        let mut lcc = Self {
            n,
            f,
            rho0: 0.0,
            lov,
            radius,
        };
        lcc.rho0 = lcc.rho(origin);
        lcc
    }

    fn rho(&self, lat: f64) -> f64 {
        self.radius * self.f / (FRAC_PI_4 + lat.to_radians() / 2.0).tan().powf(self.n)
    }

    fn forward(&self, lat: f64, lon: f64) -> (f64, f64) {
        let theta = self.n * delta_longitude(lon, self.lov).to_radians();
        let rho = self.rho(lat);
        (rho * theta.sin(), self.rho0 - rho * theta.cos())
    }
}

/// Canonical x/y axes of a projected grid from the projected first point.
fn projected_axes(
    x1: f64,
    y1: f64,
    dx: f64,
    dy: f64,
    nx: usize,
    ny: usize,
    scanning_mode: u8,
) -> (Vec<f64>, Vec<f64>) {
    let west = if scanning_mode & scan::I_NEGATIVE != 0 {
        x1 - (nx - 1) as f64 * dx
    } else {
        x1
    };
    let south = if scanning_mode & scan::J_POSITIVE != 0 {
        y1
    } else {
        y1 - (ny - 1) as f64 * dy
    };
    (
        (0..nx).map(|c| west + c as f64 * dx).collect(),
        (0..ny).map(|r| south + r as f64 * dy).collect(),
    )
}

fn insert_lat_lon(coords: &mut BTreeMap<String, Coordinate>, lat: Vec<f64>, lon: Vec<f64>) {
    coords.insert(
        "latitude".to_string(),
        Coordinate::dimension(
            "latitude",
            Values::Numeric(lat),
            attrs([
                ("long_name", "latitude coordinate"),
                ("units", "degree_north"),
                ("standard_name", "latitude"),
                ("axis", "Y"),
            ]),
        ),
    );
    coords.insert(
        "longitude".to_string(),
        Coordinate::dimension(
            "longitude",
            Values::Numeric(lon),
            attrs([
                ("long_name", "longitude coordinate"),
                ("units", "degree_east"),
                ("standard_name", "longitude"),
                ("axis", "X"),
            ]),
        ),
    );
}

fn insert_projected(
    coords: &mut BTreeMap<String, Coordinate>,
    x: Vec<f64>,
    y: Vec<f64>,
    units: &str,
) {
    coords.insert(
        "x".to_string(),
        Coordinate::dimension(
            "x",
            Values::Numeric(x),
            attrs([
                ("units", units),
                ("standard_name", "projection_x_coordinate"),
                ("axis", "X"),
            ]),
        ),
    );
    coords.insert(
        "y".to_string(),
        Coordinate::dimension(
            "y",
            Values::Numeric(y),
            attrs([
                ("units", units),
                ("standard_name", "projection_y_coordinate"),
                ("axis", "Y"),
            ]),
        ),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{assert_approx_eq, create_test_grid, to_storage_order};

    /// Template 3.0 for a one-degree grid, south-west corner at (la, lo).
    fn lat_lon_template(ni: i64, nj: i64, scan: i64) -> Vec<i64> {
        let north = (nj - 1) * 1_000_000;
        let east = (ni - 1) * 1_000_000;
        let (la1, la2) = if scan & 0x40 != 0 { (0, north) } else { (north, 0) };
        let (lo1, lo2) = if scan & 0x80 != 0 { (east, 0) } else { (0, east) };
        vec![
            6, 0, 0, 0, 0, 0, 0, ni, nj, 0, 0xFFFF_FFFF, la1, lo1, 48, la2, lo2, 1_000_000,
            1_000_000, scan,
        ]
    }

    fn numeric<'a>(grid: &'a Grid, name: &str) -> &'a [f64] {
        match &grid.coords[name].values {
            Values::Numeric(v) => v,
            other => panic!("unexpected values {:?}", other),
        }
    }

    #[test]
    fn test_lat_lon_grid() {
        let grid = Grid::from_gds(0, &lat_lon_template(4, 3, 0x00)).unwrap();

        assert_eq!(grid.cf_name(), "latitude_longitude");
        assert_eq!(grid.dims(), vec!["latitude", "longitude"]);
        assert_eq!(grid.shape(), vec![3, 4]);
        assert_eq!(numeric(&grid, "latitude"), &[0.0, 1.0, 2.0]);
        assert_eq!(numeric(&grid, "longitude"), &[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(grid.attrs["shape"], json!("sphere"));
        assert_eq!(grid.attrs["earth_radius"], json!(6_371_229.0));
        assert_eq!(grid.attrs["GRIB_gdtnum"], json!(0));
    }

    #[test]
    fn test_lat_lon_i_negative() {
        let grid = Grid::from_gds(0, &lat_lon_template(4, 3, 0xC0)).unwrap();
        assert_eq!(numeric(&grid, "latitude"), &[0.0, 1.0, 2.0]);
        assert_eq!(numeric(&grid, "longitude"), &[0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_global_longitudes_wrap() {
        let lon = longitudes(359.0, 1.0, 3, false);
        assert_eq!(lon, vec![359.0, 360.0, 361.0]);
    }

    #[test]
    fn test_unsupported_projection() {
        let err = Grid::from_gds(50, &[0; 30]).unwrap_err();
        assert!(matches!(err, DatasetError::Schema(_)));
    }

    #[test]
    fn test_reorient_inverts_storage_order() {
        let canonical = create_test_grid(4, 3);
        for mode in [0x00, 0x40, 0x80, 0xC0, 0x20, 0x60, 0x50, 0x10] {
            let stored = to_storage_order(&canonical, 4, 3, mode);
            assert_eq!(reorient(&stored, 4, 3, mode), canonical, "mode {:#04x}", mode);
        }
    }

    #[test]
    fn test_reorient_known_layouts() {
        let stored = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];

        // Rows alternate direction: north row west to east, south row east to west.
        assert_eq!(
            reorient(&stored, 3, 2, 0x10),
            vec![6.0, 5.0, 4.0, 1.0, 2.0, 3.0]
        );
        // Columns are contiguous, each from north to south.
        assert_eq!(
            reorient(&stored, 3, 2, 0x20),
            vec![2.0, 4.0, 6.0, 1.0, 3.0, 5.0]
        );
        // Columns are contiguous, each from south to north.
        assert_eq!(
            reorient(&stored, 3, 2, 0x60),
            vec![1.0, 3.0, 5.0, 2.0, 4.0, 6.0]
        );
    }

    #[test]
    fn test_reorient_short_input() {
        let out = reorient(&[1.0], 2, 1, 0x40);
        assert_eq!(out, vec![1.0, UNDEFINED]);
    }

    #[test]
    fn test_gaussian_latitudes() {
        let lats = gaussian_latitudes(2);
        assert_approx_eq!(lats[0], -35.264389682754654, 1e-9);
        assert_approx_eq!(lats[1], 35.264389682754654, 1e-9);

        let lats = gaussian_latitudes(94);
        assert_eq!(lats.len(), 94);
        assert!(lats.windows(2).all(|w| w[0] < w[1]));
        assert_approx_eq!(lats[0], -lats[93], 1e-9);
        assert_approx_eq!(lats[93], 88.542, 1e-3);
    }

    #[test]
    fn test_gaussian_grid() {
        // T62: 192 x 94, N = 47
        let mut t = lat_lon_template(192, 94, 0x00);
        t[11] = 88_542_000;
        t[14] = -88_542_000;
        t[16] = 1_875_000;
        t[17] = 47;
        t[15] = 358_125_000;
        let grid = Grid::from_gds(40, &t).unwrap();

        let lat = numeric(&grid, "latitude");
        assert_eq!(lat.len(), 94);
        assert_approx_eq!(lat[0], -88.542, 1e-3);
        let lon = numeric(&grid, "longitude");
        assert_approx_eq!(lon[1], 1.875, 1e-9);
    }

    #[test]
    fn test_mercator_latitudes() {
        let mut t = vec![6, 0, 0, 0, 0, 0, 0, 3, 3];
        // La1, Lo1, res, LaD, La2, Lo2, scan, orientation, Di, Dj
        t.extend([-10_000_000, 0, 48, 20_000_000, 10_000_000, 20_000_000, 0x40, 0, 1, 1]);
        let grid = Grid::from_gds(10, &t).unwrap();

        let lat = numeric(&grid, "latitude");
        assert_approx_eq!(lat[0], -10.0, 1e-9);
        assert_approx_eq!(lat[1], 0.0, 1e-9);
        assert_approx_eq!(lat[2], 10.0, 1e-9);
        assert_eq!(numeric(&grid, "longitude"), &[0.0, 10.0, 20.0]);
        assert_eq!(grid.attrs["standard_parallel"], json!(20.0));
    }

    #[test]
    fn test_polar_stereographic_pole_origin() {
        let mut t = vec![6, 0, 0, 0, 0, 0, 0, 3, 2];
        // La1, Lo1, res, LaD, LoV, Dx, Dy, projection centre, scan
        t.extend([90_000_000, 0, 8, 60_000_000, 255_000_000, 5_000_000, 5_000_000, 0, 0x40]);
        let grid = Grid::from_gds(20, &t).unwrap();

        assert_eq!(grid.dims(), vec!["y", "x"]);
        let x = numeric(&grid, "x");
        let y = numeric(&grid, "y");
        assert_approx_eq!(x[0], 0.0, 1e-6);
        assert_approx_eq!(x[2], 10_000.0, 1e-6);
        assert_approx_eq!(y[1], 5_000.0, 1e-6);
        assert_eq!(grid.attrs["latitude_of_projection_origin"], json!(90.0));
    }

    #[test]
    fn test_lambert_first_point_at_origin() {
        let mut t = vec![6, 0, 0, 0, 0, 0, 0, 3, 3];
        // La1, Lo1, res, LaD, LoV, Dx, Dy, centre, scan, Latin1, Latin2, LaSP, LoSP
        t.extend([
            25_000_000,
            265_000_000,
            8,
            25_000_000,
            265_000_000,
            3_000_000,
            3_000_000,
            0,
            0x00,
            25_000_000,
            25_000_000,
            -90_000_000,
            0,
        ]);
        let grid = Grid::from_gds(30, &t).unwrap();

        // Stored north to south: the first point is the north-west corner.
        let x = numeric(&grid, "x");
        let y = numeric(&grid, "y");
        assert_approx_eq!(x[0], 0.0, 1e-6);
        assert_approx_eq!(x[1], 3_000.0, 1e-6);
        assert_approx_eq!(y[2], 0.0, 1e-6);
        assert_approx_eq!(y[0], -6_000.0, 1e-6);
        assert_eq!(grid.attrs["standard_parallel"], json!([25.0, 25.0]));
    }

    #[test]
    fn test_space_view_centre() {
        let mut t = vec![6, 0, 0, 0, 0, 0, 0, 3, 3];
        // Lap, Lop, res, dx, dy, Xp, Yp, scan, orientation, Nr, Xo, Yo
        t.extend([0, 0, 8, 3, 3, 1_000, 1_000, 0x40, 0, 6_610_700, 0, 0]);
        let grid = Grid::from_gds(90, &t).unwrap();

        let x = numeric(&grid, "x");
        assert_approx_eq!(x[1], 0.0, 1e-9);
        assert!(x[2] > 0.0 && (x[2] + x[0]).abs() < 1e-6);
    }

    #[test]
    fn test_globe_codes() {
        let mut t = lat_lon_template(2, 2, 0x40);
        t[0] = 1;
        t[1] = 1;
        t[2] = 63_712_000;
        let grid = Grid::from_gds(0, &t).unwrap();
        assert_eq!(grid.attrs["earth_radius"], json!(6_371_200.0));

        t[0] = 5;
        let grid = Grid::from_gds(0, &t).unwrap();
        assert_eq!(grid.attrs["shape"], json!("WGS84"));

        t[0] = 42;
        assert!(Grid::from_gds(0, &t).is_err());
    }
}
