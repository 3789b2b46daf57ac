//! Template building.
//!
//! A [`Template`] is the schema inferred from one complete model run:
//! the grid, one [`VarSpec`] per derived variable, and the level and
//! forecast time coordinates those variables use. Assembly fills the
//! template for any number of runs.
//!
//! Variable names are `<short name>.<level key>[.<time key>]` with spaces
//! replaced by underscores, e.g. `TMP.2_m_above_ground`, `TMP.isobaric` or
//! `APCP.surface.6_hour_acc`.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::coords::{attrs, Attributes, Coordinate, Values};
use crate::decoder::Decoder;
use crate::error::{DatasetError, Result};
use crate::grid::Grid;
use crate::inventory::make_inventories;
use crate::metadata::MetaData;
use crate::processing::ProcessingTable;
use crate::selector::Selector;

/// Level classes that can be merged into a vertical dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VertLevelClass {
    Isobaric,
    HeightAsl,
    HeightAgl,
    Sigma,
    Hybrid,
}

impl VertLevelClass {
    pub const ALL: [VertLevelClass; 5] = [
        Self::Isobaric,
        Self::HeightAsl,
        Self::HeightAgl,
        Self::Sigma,
        Self::Hybrid,
    ];

    /// Fixed surface type (Code Table 4.5).
    pub fn code(&self) -> u8 {
        match self {
            Self::Isobaric => 100,
            Self::HeightAsl => 102,
            Self::HeightAgl => 103,
            Self::Sigma => 104,
            Self::Hybrid => 105,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|class| class.code() == code)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Isobaric => "isobaric",
            Self::HeightAsl => "height_asl",
            Self::HeightAgl => "height_agl",
            Self::Sigma => "sigma",
            Self::Hybrid => "hybrid",
        }
    }

    pub fn units(&self) -> &'static str {
        match self {
            Self::Isobaric => "Pa",
            Self::HeightAsl | Self::HeightAgl => "m",
            Self::Sigma | Self::Hybrid => "",
        }
    }

    /// True if values decrease upwards, so the axis runs from the largest value.
    pub fn reverse(&self) -> bool {
        matches!(self, Self::Isobaric | Self::Sigma)
    }
}

impl fmt::Display for VertLevelClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VertLevelClass {
    type Err = DatasetError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|class| class.name() == s)
            .ok_or_else(|| {
                DatasetError::invalid_config(format!(
                    "unknown vertical level class '{}', expected one of: {}",
                    s,
                    Self::ALL.map(|c| c.name()).join(", ")
                ))
            })
    }
}

/// Allocates `<prefix><ordinal>` dimension names.
///
/// Equal extents share a name. Distinct extents are numbered from 1 in
/// ascending (lexicographic) extent order, so names do not depend on the
/// order in which extents were inserted.
#[derive(Debug, Clone)]
pub struct DimensionNamer<K> {
    prefix: String,
    extents: Vec<K>,
}

impl<K: Clone + PartialOrd> DimensionNamer<K> {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            extents: Vec::new(),
        }
    }

    pub fn insert(&mut self, extent: K) {
        if !self.extents.contains(&extent) {
            self.extents.push(extent);
            self.extents
                .sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        }
    }

    /// Name of a previously inserted extent.
    pub fn name(&self, extent: &K) -> Option<String> {
        self.extents
            .iter()
            .position(|e| e == extent)
            .map(|i| format!("{}{}", self.prefix, i + 1))
    }

    /// `(name, extent)` pairs in ordinal order.
    pub fn entries(&self) -> impl Iterator<Item = (String, &K)> + '_ {
        self.extents
            .iter()
            .enumerate()
            .map(|(i, extent)| (format!("{}{}", self.prefix, i + 1), extent))
    }
}

/// Shape contract of one derived variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarSpec {
    /// Forecast time coordinate. Scalar when every variable has a single time.
    pub time_coord: String,
    /// Vertical coordinate, for variables merged over a level class.
    pub level_coord: Option<String>,
    /// Dimensions without `reftime`: `[timeN] [levelN] y x`.
    pub dims: Vec<String>,
    pub shape: Vec<usize>,
    pub attrs: Attributes,
}

impl VarSpec {
    /// Number of values of one reference time slice.
    pub fn slice_len(&self) -> usize {
        self.shape.iter().product()
    }
}

/// Options of [`make_template`].
#[derive(Debug, Clone, Default)]
pub struct TemplateOptions {
    /// Reference time to build from, for files holding several runs.
    pub reftime: Option<DateTime<Utc>>,
    /// Level classes merged into a vertical dimension.
    pub vertlevels: Vec<VertLevelClass>,
    pub inventory_dir: Option<PathBuf>,
    pub save_inventory: bool,
    pub processing: ProcessingTable,
}

/// Inferred dataset schema of one model run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub reftime: DateTime<Utc>,
    pub centre: String,
    pub subcentre: String,
    pub grid: Grid,
    pub vertlevels: Vec<VertLevelClass>,
    pub processing: ProcessingTable,
    /// Grid, level and forecast time coordinates.
    pub coords: BTreeMap<String, Coordinate>,
    pub var_specs: BTreeMap<String, VarSpec>,
    pub attrs: Attributes,
    /// Not persisted; a loaded template selects every message.
    #[serde(skip)]
    selector: Selector,
}

impl Template {
    pub fn var_names(&self) -> impl Iterator<Item = &str> {
        self.var_specs.keys().map(String::as_str)
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Replace the selector, e.g. after [`Template::load`].
    pub fn with_selector(mut self, selector: Selector) -> Self {
        self.selector = selector;
        self
    }

    /// Derived variable name of `item` under this template's rules.
    pub fn varname_for(&self, item: &MetaData) -> String {
        derive_varname(item, &self.vertlevels, &self.processing)
    }

    /// True if `item` is on the template grid.
    pub fn same_grid(&self, item: &MetaData) -> bool {
        self.grid.matches(item.gdtnum, &item.gdtmpl)
    }

    /// Variable of `item`, if the selector accepts it and the template knows it.
    pub fn var_spec_for(&self, item: &MetaData) -> Option<(String, &VarSpec)> {
        if !self.selector.matches(item) {
            return None;
        }
        let name = self.varname_for(item);
        let spec = self.var_specs.get(&name)?;
        Some((name, spec))
    }

    /// Index of the field of `item` within a reference time slice of `spec`,
    /// in units of whole fields.
    ///
    /// `None` when the forecast time or level is not on the template axes.
    pub fn slot(&self, spec: &VarSpec, item: &MetaData) -> Option<usize> {
        let offset = item.forecast_offset().num_seconds();
        let time = self.coords.get(&spec.time_coord)?;
        let time_index = match time.values.position_of_period(offset) {
            Some(index) => index,
            None => {
                info!(
                    varname = %self.varname_for(item),
                    forecast_seconds = offset,
                    message = %item,
                    "Forecast time not in template"
                );
                return None;
            }
        };

        let (level_index, nlevels) = match &spec.level_coord {
            Some(name) => {
                let levels = self.coords.get(name)?;
                let index = item
                    .level_value()
                    .and_then(|v| levels.values.position_of_number(v));
                match index {
                    Some(index) => (index, levels.len()),
                    None => {
                        info!(
                            varname = %self.varname_for(item),
                            level = ?item.level_value(),
                            message = %item,
                            "Level not in template"
                        );
                        return None;
                    }
                }
            }
            None => (0, 1),
        };

        Some(time_index * nlevels + level_index)
    }

    /// Write the template as JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        debug!(path = %path.display(), variables = self.var_specs.len(), "Saved template");
        Ok(())
    }

    /// Read a template written by [`Template::save`].
    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

/// Level key of `item`: the level class name when the class is merged,
/// the level descriptor otherwise.
pub fn level_key(item: &MetaData, vertlevels: &[VertLevelClass]) -> String {
    merged_class(item, vertlevels)
        .map(|class| class.name().to_string())
        .unwrap_or_else(|| item.level_str.clone())
}

fn merged_class(item: &MetaData, vertlevels: &[VertLevelClass]) -> Option<VertLevelClass> {
    item.level_value()?;
    VertLevelClass::from_code(item.level_code()).filter(|class| vertlevels.contains(class))
}

/// `<short name>.<level key>[.<time key>]`, spaces replaced by underscores.
pub fn derive_varname(
    item: &MetaData,
    vertlevels: &[VertLevelClass],
    processing: &ProcessingTable,
) -> String {
    let mut name = format!("{}.{}", item.varname, level_key(item, vertlevels));
    if let Some(time_key) = processing.time_key(item) {
        name.push('.');
        name.push_str(&time_key);
    }
    name.replace(' ', "_")
}

/// Messages of one derived variable.
struct Group<'a> {
    first: &'a MetaData,
    class: Option<VertLevelClass>,
    levels: Vec<f64>,
    times: Vec<i64>,
}

/// Build a template from the messages of `files` accepted by `selector`.
///
/// The files must hold one complete model run (or several runs, with
/// `options.reftime` naming the one to use). Returns `Ok(None)` when no
/// message is selected.
pub fn make_template<P: AsRef<Path>>(
    decoder: &dyn Decoder,
    files: &[P],
    selector: &Selector,
    options: &TemplateOptions,
) -> Result<Option<Template>> {
    let inventory = make_inventories(
        decoder,
        files,
        options.inventory_dir.as_deref(),
        options.save_inventory,
    )?;
    let mut items = selector.select(&inventory);
    if let Some(reftime) = options.reftime {
        items.retain(|item| item.reftime == reftime);
    }

    let Some(&first) = items.first() else {
        info!(files = files.len(), "No messages selected, no template");
        return Ok(None);
    };
    if first.npts as u64 != first.nx as u64 * first.ny as u64 {
        return Err(DatasetError::schema(format!(
            "Thinned grids are not supported ({} points on a {} x {} grid)",
            first.npts, first.nx, first.ny
        )));
    }
    for item in &items[1..] {
        if item.reftime != first.reftime {
            return Err(DatasetError::schema(format!(
                "Reference times differ: {} and {}",
                first, item
            )));
        }
        if !item.same_grid(first) {
            return Err(DatasetError::schema(format!(
                "Grids differ: {} and {}",
                first, item
            )));
        }
    }
    let grid = Grid::from_gds(first.gdtnum, &first.gdtmpl)?;

    let mut groups: BTreeMap<String, Group> = BTreeMap::new();
    for &item in &items {
        let name = derive_varname(item, &options.vertlevels, &options.processing);
        let class = merged_class(item, &options.vertlevels);
        let group = groups.entry(name).or_insert_with(|| Group {
            first: item,
            class,
            levels: Vec::new(),
            times: Vec::new(),
        });
        if let (Some(_), Some(value)) = (group.class, item.level_value()) {
            group.levels.push(value);
        }
        group.times.push(item.forecast_offset().num_seconds());
    }
    for group in groups.values_mut() {
        group.times.sort_unstable();
        group.times.dedup();
        group.levels.sort_by(f64::total_cmp);
        group.levels.dedup();
        if group.class.is_some_and(|class| class.reverse()) {
            group.levels.reverse();
        }
    }

    let mut time_namer = DimensionNamer::new("time");
    let mut level_namers: BTreeMap<VertLevelClass, DimensionNamer<Vec<f64>>> = BTreeMap::new();
    for group in groups.values() {
        time_namer.insert(group.times.clone());
        if let Some(class) = group.class {
            level_namers
                .entry(class)
                .or_insert_with(|| DimensionNamer::new(class.name()))
                .insert(group.levels.clone());
        }
    }
    let squeeze_time = groups.values().all(|group| group.times.len() == 1);

    let mut coords = grid.coords.clone();
    for (name, times) in time_namer.entries() {
        let values = Values::Period(times.clone());
        let time_attrs = attrs([
            ("standard_name", "forecast_period"),
            ("long_name", "time since forecast reference time"),
            ("units", "s"),
        ]);
        let coord = if squeeze_time {
            Coordinate::scalar(values, time_attrs)
        } else {
            Coordinate::dimension(&name, values, time_attrs)
        };
        coords.insert(name, coord);
    }
    for (class, namer) in &level_namers {
        for (name, levels) in namer.entries() {
            let level_attrs = attrs([
                ("units", class.units()),
                ("axis", "Z"),
                ("positive", if class.reverse() { "down" } else { "up" }),
            ]);
            coords.insert(
                name.clone(),
                Coordinate::dimension(&name, Values::Numeric(levels.clone()), level_attrs),
            );
        }
    }

    let mut var_specs = BTreeMap::new();
    for (varname, group) in &groups {
        let mut dims = Vec::new();
        let mut shape = Vec::new();
        let time_coord = time_namer
            .name(&group.times)
            .ok_or_else(|| DatasetError::schema(format!("{} has no time axis", varname)))?;
        if !squeeze_time {
            dims.push(time_coord.clone());
            shape.push(group.times.len());
        }
        let level_coord = match group.class {
            Some(class) => {
                let name = level_namers
                    .get(&class)
                    .and_then(|namer| namer.name(&group.levels))
                    .ok_or_else(|| {
                        DatasetError::schema(format!("{} has no level axis", varname))
                    })?;
                dims.push(name.clone());
                shape.push(group.levels.len());
                Some(name)
            }
            None => None,
        };
        dims.extend(grid.dims());
        shape.extend(grid.shape());

        let short_name = varname.split('.').next().unwrap_or(varname);
        let var_attrs = attrs([
            ("short_name", short_name),
            ("long_name", group.first.long_name.as_str()),
            ("units", group.first.units.as_str()),
            ("grid_mapping", grid.cf_name()),
        ]);
        var_specs.insert(
            varname.clone(),
            VarSpec {
                time_coord,
                level_coord,
                dims,
                shape,
                attrs: var_attrs,
            },
        );
    }

    let template_attrs = attrs([
        ("Projection", json!(grid.cf_name())),
        ("Originating centre", json!(first.centre)),
        ("Originating subcentre", json!(first.subcentre)),
        (
            "History",
            json!(format!("Created by grib2-dataset-{}", env!("CARGO_PKG_VERSION"))),
        ),
    ]);

    debug!(
        reftime = %first.reftime,
        variables = var_specs.len(),
        messages = items.len(),
        "Built template"
    );

    Ok(Some(Template {
        reftime: first.reftime,
        centre: first.centre.clone(),
        subcentre: first.subcentre.clone(),
        grid,
        vertlevels: options.vertlevels.clone(),
        processing: options.processing.clone(),
        coords,
        var_specs,
        attrs: template_attrs,
        selector: selector.clone(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tests::record;
    use grib2_parser::FixedSurface;

    #[test]
    fn test_vert_level_class_names() {
        for class in VertLevelClass::ALL {
            assert_eq!(class.name().parse::<VertLevelClass>().unwrap(), class);
            assert_eq!(VertLevelClass::from_code(class.code()), Some(class));
        }
        assert!("pressure".parse::<VertLevelClass>().is_err());
        assert_eq!(VertLevelClass::from_code(1), None);
        assert!(VertLevelClass::Isobaric.reverse());
        assert!(!VertLevelClass::HeightAgl.reverse());
    }

    #[test]
    fn test_dimension_namer() {
        let mut namer = DimensionNamer::new("time");
        namer.insert(vec![10800]);
        namer.insert(vec![0, 10800, 21600]);
        namer.insert(vec![10800]);

        assert_eq!(namer.name(&vec![0, 10800, 21600]).as_deref(), Some("time1"));
        assert_eq!(namer.name(&vec![10800]).as_deref(), Some("time2"));
        assert_eq!(namer.name(&vec![21600]), None);
        assert_eq!(namer.entries().count(), 2);
    }

    #[test]
    fn test_derive_varname() {
        let processing = ProcessingTable::default();
        let mut rec = record("TMP", "500 mb", "12 hour fcst");
        let item = MetaData::from_record(Path::new("f.grib2"), &rec).unwrap();

        assert_eq!(derive_varname(&item, &[], &processing), "TMP.500_mb");
        assert_eq!(
            derive_varname(&item, &[VertLevelClass::Isobaric], &processing),
            "TMP.isobaric"
        );
        assert_eq!(
            derive_varname(&item, &[VertLevelClass::HeightAgl], &processing),
            "TMP.500_mb"
        );

        rec.short_name = "APCP".to_string();
        rec.level = "surface".to_string();
        rec.time = "3-6 hour acc fcst".to_string();
        rec.first_surface = FixedSurface {
            type_code: 1,
            scale_factor: 0,
            scaled_value: 0,
        };
        rec.forecast_start = 3 * 3600;
        rec.forecast_end = 6 * 3600;
        let item = MetaData::from_record(Path::new("f.grib2"), &rec).unwrap();
        assert_eq!(
            derive_varname(&item, &[VertLevelClass::Isobaric], &processing),
            "APCP.surface.3_hour_acc"
        );
    }
}
