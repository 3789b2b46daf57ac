//! Dataset assembly.
//!
//! [`open_dataset`] fills a [`Template`] with the messages of any number of
//! files, one reference time slice at a time. Slices are independent: each
//! reads only the messages of its own reference time and the immutable
//! template, so they can be computed in parallel. A reference time with no
//! messages at all yields a slice of missing values.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use grib2_parser::UNDEFINED;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::coords::{attrs, Attributes, Coordinate, Values};
use crate::decoder::{Decoder, MessageLocation};
use crate::error::{DatasetError, Result};
use crate::inventory::{load_or_make_inventory, Inventory};
use crate::metadata::MetaData;
use crate::template::Template;

/// Name of the reference time dimension.
pub const REFTIME: &str = "reftime";

/// Options of [`open_dataset`].
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    pub inventory_dir: Option<PathBuf>,
    pub save_inventory: bool,
    /// Chunk sizes per dimension, recorded in [`Dataset::encoding`].
    pub chunks: BTreeMap<String, usize>,
    /// Compute reference time slices on the rayon thread pool.
    pub parallel: bool,
    /// Reference times the dataset must cover. Required when input files are
    /// missing, since their reference times cannot be observed.
    pub expected_reftimes: Option<Vec<DateTime<Utc>>>,
}

/// One data variable. `data` is row-major over `shape`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Variable {
    pub dims: Vec<String>,
    pub shape: Vec<usize>,
    #[serde(skip)]
    pub data: Vec<f32>,
    pub attrs: Attributes,
}

impl Variable {
    /// The 2-D field at the given indices of the leading (non-grid) dimensions.
    pub fn field(&self, index: &[usize]) -> Option<&[f32]> {
        let leading = self.shape.len().checked_sub(2)?;
        if index.len() != leading {
            return None;
        }
        let npts: usize = self.shape[leading..].iter().product();
        let mut position = 0;
        for (&i, &n) in index.iter().zip(&self.shape[..leading]) {
            if i >= n {
                return None;
            }
            position = position * n + i;
        }
        self.data.get(position * npts..(position + 1) * npts)
    }
}

/// Labeled multi-dimensional dataset.
#[derive(Debug, Clone, Serialize)]
pub struct Dataset {
    pub dims: BTreeMap<String, usize>,
    pub coords: BTreeMap<String, Coordinate>,
    pub data_vars: BTreeMap<String, Variable>,
    pub attrs: Attributes,
    pub encoding: Attributes,
}

impl Dataset {
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.data_vars.get(name)
    }

    pub fn coord(&self, name: &str) -> Option<&Coordinate> {
        self.coords.get(name)
    }

    pub fn reftimes(&self) -> &[DateTime<Utc>] {
        match self.coords.get(REFTIME).map(|c| &c.values) {
            Some(Values::Time(times)) => times,
            _ => &[],
        }
    }

    /// Dimensions, coordinate extents, variable shapes and attributes,
    /// without any data.
    pub fn summary(&self) -> serde_json::Value {
        let coords: BTreeMap<_, _> = self
            .coords
            .iter()
            .map(|(name, coord)| {
                (
                    name,
                    json!({ "dims": coord.dims, "size": coord.len(), "attrs": coord.attrs }),
                )
            })
            .collect();
        json!({
            "dims": self.dims,
            "coords": coords,
            "data_vars": self.data_vars,
            "attrs": self.attrs,
            "encoding": self.encoding,
        })
    }
}

/// Assemble the messages of `files` into the variables of `template`.
///
/// Files that do not exist are skipped with a warning. Their reference
/// times must then be listed in `options.expected_reftimes`, otherwise the
/// call fails with [`DatasetError::MissingReferenceTimes`].
pub fn open_dataset<P: AsRef<Path>>(
    decoder: &dyn Decoder,
    files: &[P],
    template: &Template,
    options: &OpenOptions,
) -> Result<Dataset> {
    let mut existing = Vec::new();
    let mut missing = 0;
    for file in files {
        let file = file.as_ref();
        if file.exists() {
            existing.push(file.to_path_buf());
        } else {
            warn!(file = %file.display(), "File does not exist, skipping");
            missing += 1;
        }
    }

    let inventories = existing
        .iter()
        .map(|file| {
            load_or_make_inventory(
                decoder,
                file,
                options.inventory_dir.as_deref(),
                options.save_inventory,
            )
        })
        .collect::<Result<Vec<Inventory>>>()?;

    let mut by_reftime: BTreeMap<DateTime<Utc>, Vec<&MetaData>> = BTreeMap::new();
    for item in inventories.iter().flatten() {
        by_reftime.entry(item.reftime).or_default().push(item);
    }

    let reftimes: Vec<DateTime<Utc>> = match &options.expected_reftimes {
        Some(expected) => {
            let mut all: Vec<_> = expected.iter().chain(by_reftime.keys()).copied().collect();
            all.sort_unstable();
            all.dedup();
            all
        }
        None if missing > 0 => {
            return Err(DatasetError::MissingReferenceTimes(format!(
                "{} of {} files are missing and no expected reference times were given",
                missing,
                files.len()
            )))
        }
        None => by_reftime.keys().copied().collect(),
    };
    if reftimes.is_empty() {
        return Err(DatasetError::MissingReferenceTimes(
            "no reference time observed or expected".to_string(),
        ));
    }

    let no_items = Vec::new();
    let compute = |reftime: &DateTime<Utc>| {
        let items = by_reftime.get(reftime).unwrap_or(&no_items);
        if items.is_empty() {
            info!(reftime = %reftime, "No messages for reference time, filling with missing values");
        }
        assemble_slice(decoder, template, items)
    };
    let slices = if options.parallel {
        use rayon::prelude::*;
        reftimes
            .par_iter()
            .map(compute)
            .collect::<Result<Vec<_>>>()?
    } else {
        reftimes.iter().map(compute).collect::<Result<Vec<_>>>()?
    };

    let nref = reftimes.len();
    let mut dims = BTreeMap::from([(REFTIME.to_string(), nref)]);
    let mut data_vars = BTreeMap::new();
    for (name, spec) in &template.var_specs {
        let mut var_dims = vec![REFTIME.to_string()];
        var_dims.extend(spec.dims.iter().cloned());
        let mut shape = vec![nref];
        shape.extend(spec.shape.iter().copied());
        for (dim, &size) in spec.dims.iter().zip(&spec.shape) {
            dims.insert(dim.clone(), size);
        }
        data_vars.insert(
            name.clone(),
            Variable {
                dims: var_dims,
                shape,
                data: Vec::with_capacity(nref * spec.slice_len()),
                attrs: spec.attrs.clone(),
            },
        );
    }
    for slice in slices {
        for (name, values) in slice {
            if let Some(variable) = data_vars.get_mut(&name) {
                variable.data.extend(values);
            }
        }
    }

    let cf_name = template.grid.cf_name();
    let mut coords = template.coords.clone();
    coords.insert(
        REFTIME.to_string(),
        Coordinate::dimension(
            REFTIME,
            Values::Time(reftimes),
            attrs([
                ("standard_name", "forecast_reference_time"),
                ("long_name", "reference time"),
            ]),
        ),
    );
    coords.insert(
        cf_name.to_string(),
        Coordinate::scalar(Values::Numeric(vec![0.0]), template.grid.attrs.clone()),
    );

    let mut coordinate_names: Vec<&str> = template.coords.keys().map(String::as_str).collect();
    coordinate_names.extend([REFTIME, cf_name]);
    let sources: Vec<String> = existing
        .iter()
        .filter_map(|file| file.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .collect();

    let mut dataset_attrs = template.attrs.clone();
    dataset_attrs.insert("coordinates".into(), json!(coordinate_names.join(" ")));
    dataset_attrs.insert("source".into(), json!(sources.join(" ")));

    let paths: Vec<String> = existing.iter().map(|f| f.display().to_string()).collect();
    let encoding = attrs([("chunks", json!(options.chunks)), ("source", json!(paths))]);

    debug!(
        reftimes = nref,
        variables = data_vars.len(),
        files = existing.len(),
        missing,
        "Assembled dataset"
    );

    Ok(Dataset {
        dims,
        coords,
        data_vars,
        attrs: dataset_attrs,
        encoding,
    })
}

/// One reference time slice of every variable, filled with [`UNDEFINED`]
/// where no message matches.
fn assemble_slice(
    decoder: &dyn Decoder,
    template: &Template,
    items: &[&MetaData],
) -> Result<BTreeMap<String, Vec<f32>>> {
    let npts = template.grid.npts();
    let mut slice: BTreeMap<String, Vec<f32>> = template
        .var_specs
        .iter()
        .map(|(name, spec)| (name.clone(), vec![UNDEFINED; spec.slice_len()]))
        .collect();

    let mut requests: BTreeMap<&Path, Vec<(String, usize, MessageLocation)>> = BTreeMap::new();
    for &item in items {
        let Some((name, spec)) = template.var_spec_for(item) else {
            debug!(message = %item, "Message matches no variable");
            continue;
        };
        if !template.same_grid(item) {
            return Err(DatasetError::grid_mismatch(
                &item.file,
                format!(
                    "{} is on grid template 3.{} {:?}, template grid is 3.{} {:?}",
                    item, item.gdtnum, item.gdtmpl, template.grid.gdtnum, template.grid.gdtmpl
                ),
            ));
        }
        let Some(slot) = template.slot(spec, item) else {
            continue;
        };
        let location = MessageLocation {
            ordinal: item.ordinal,
            offset: item.offset,
        };
        requests
            .entry(item.file.as_path())
            .or_default()
            .push((name, slot, location));
    }

    for (file, requests) in requests {
        let locations: Vec<MessageLocation> = requests.iter().map(|r| r.2).collect();
        let fields = decoder.read_fields(file, &locations)?;
        for ((name, slot, _), field) in requests.into_iter().zip(fields) {
            if field.values.len() != npts {
                return Err(DatasetError::decode(
                    file,
                    format!("field has {} values, expected {}", field.values.len(), npts),
                ));
            }
            let values = template.grid.reorient(&field.values);
            if let Some(target) = slice
                .get_mut(&name)
                .and_then(|data| data.get_mut(slot * npts..(slot + 1) * npts))
            {
                target.copy_from_slice(&values);
            }
        }
    }
    Ok(slice)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variable() -> Variable {
        Variable {
            dims: vec!["reftime".into(), "time1".into(), "y".into(), "x".into()],
            shape: vec![2, 3, 2, 2],
            data: (0..24).map(|v| v as f32).collect(),
            attrs: Attributes::new(),
        }
    }

    #[test]
    fn test_variable_field() {
        let var = variable();
        assert_eq!(var.field(&[0, 0]), Some(&[0.0, 1.0, 2.0, 3.0][..]));
        assert_eq!(var.field(&[1, 2]), Some(&[20.0, 21.0, 22.0, 23.0][..]));
        assert_eq!(var.field(&[2, 0]), None);
        assert_eq!(var.field(&[0]), None);
    }

    #[test]
    fn test_variable_summary_has_no_data() {
        let json = serde_json::to_value(variable()).unwrap();
        assert!(json.get("data").is_none());
        assert_eq!(json["shape"], json!([2, 3, 2, 2]));
    }
}
