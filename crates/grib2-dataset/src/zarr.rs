//! Zarr V3 export of assembled datasets.
//!
//! A [`Dataset`] becomes one group: dataset attributes on the group, one
//! array per data variable and per coordinate. The dimension names of each
//! array are stored in its `_ARRAY_DIMENSIONS` attribute, which is how
//! xarray recovers labeled dimensions from a Zarr store.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use grib2_parser::UNDEFINED;
use serde_json::json;
use tracing::debug;
use zarrs::array::codec::bytes_to_bytes::blosc::{
    BloscCodec, BloscCompressionLevel, BloscCompressor, BloscShuffleMode,
};
use zarrs::array::codec::BytesToBytesCodecTraits;
use zarrs::array::{ArrayBuilder, DataType, Element, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs::group::GroupBuilder;
use zarrs_filesystem::FilesystemStore;

use crate::coords::{Attributes, Values};
use crate::dataset::Dataset;
use crate::error::{DatasetError, Result};

/// Attribute holding the dimension names of an array.
pub const DIMENSIONS_ATTR: &str = "_ARRAY_DIMENSIONS";

/// Units of the exported reference time coordinate.
pub const TIME_UNITS: &str = "seconds since 1970-01-01 00:00:00";

/// Options of [`write_zarr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZarrOptions {
    /// Blosc/zstd compression level (1-9), `None` to store raw chunks.
    pub compression_level: Option<u8>,
}

impl Default for ZarrOptions {
    fn default() -> Self {
        Self {
            compression_level: Some(1),
        }
    }
}

/// Write `dataset` as a Zarr V3 group at `path`.
///
/// Data variables are chunked along the `chunks` hints in
/// [`Dataset::encoding`]. Dimensions without a hint get one chunk per 2-D
/// field: size 1 for leading dimensions, the full extent for the grid.
/// Reference times are stored as seconds since the Unix epoch.
pub fn write_zarr(dataset: &Dataset, path: &Path, options: &ZarrOptions) -> Result<()> {
    if let Some(level) = options.compression_level {
        if !(1..=9).contains(&level) {
            return Err(DatasetError::invalid_config(format!(
                "compression level {} is not between 1 and 9",
                level
            )));
        }
    }

    fs::create_dir_all(path)?;
    let store = Arc::new(FilesystemStore::new(path).map_err(DatasetError::storage)?);

    let group = GroupBuilder::new()
        .attributes(json_map(&dataset.attrs))
        .build(store.clone(), "/")
        .map_err(DatasetError::storage)?;
    group.store_metadata().map_err(DatasetError::storage)?;

    let hints = chunk_hints(&dataset.encoding);
    for (name, variable) in &dataset.data_vars {
        let array = ArraySpec {
            name,
            dims: &variable.dims,
            shape: to_u64(&variable.shape),
            chunks: chunk_shape(&variable.dims, &variable.shape, &hints),
            attrs: with_dims(&variable.attrs, &variable.dims),
        };
        array.write(
            &store,
            DataType::Float32,
            FillValue::from(UNDEFINED),
            &variable.data,
            options,
        )?;
    }

    for (name, coord) in &dataset.coords {
        let shape = coord_shape(dataset, name, &coord.dims, coord.len())?;
        let mut array = ArraySpec {
            name,
            dims: &coord.dims,
            chunks: shape.iter().map(|&n| n.max(1)).collect(),
            shape,
            attrs: with_dims(&coord.attrs, &coord.dims),
        };
        match &coord.values {
            Values::Numeric(values) => array.write(
                &store,
                DataType::Float64,
                FillValue::from(f64::NAN),
                values,
                options,
            )?,
            Values::Period(values) => {
                array.write(&store, DataType::Int64, FillValue::from(0i64), values, options)?
            }
            Values::Time(times) => {
                array.attrs.insert("units".into(), json!(TIME_UNITS));
                array
                    .attrs
                    .insert("calendar".into(), json!("proleptic_gregorian"));
                let seconds: Vec<i64> = times.iter().map(|t| t.timestamp()).collect();
                array.write(&store, DataType::Int64, FillValue::from(0i64), &seconds, options)?
            }
        }
    }

    debug!(
        path = %path.display(),
        variables = dataset.data_vars.len(),
        coords = dataset.coords.len(),
        "Wrote Zarr store"
    );
    Ok(())
}

struct ArraySpec<'a> {
    name: &'a str,
    dims: &'a [String],
    shape: Vec<u64>,
    chunks: Vec<u64>,
    attrs: serde_json::Map<String, serde_json::Value>,
}

impl ArraySpec<'_> {
    fn write<T: Element>(
        &self,
        store: &Arc<FilesystemStore>,
        data_type: DataType,
        fill_value: FillValue,
        values: &[T],
        options: &ZarrOptions,
    ) -> Result<()> {
        let expected: u64 = self.shape.iter().product();
        if values.len() as u64 != expected {
            return Err(DatasetError::schema(format!(
                "{} holds {} values, its dimensions {:?} need {}",
                self.name,
                values.len(),
                self.dims,
                expected
            )));
        }

        let chunk_grid: zarrs::array::ChunkGrid = self
            .chunks
            .clone()
            .try_into()
            .map_err(|e| DatasetError::storage(format!("{:?}", e)))?;
        let mut binding =
            ArrayBuilder::new(self.shape.clone(), data_type, chunk_grid, fill_value);
        let mut builder = binding.attributes(self.attrs.clone());
        if let Some(level) = options.compression_level {
            builder = builder.bytes_to_bytes_codecs(vec![blosc_codec(
                level,
                std::mem::size_of::<T>(),
            )?]);
        }

        let array = builder
            .build(store.clone(), &format!("/{}", self.name))
            .map_err(DatasetError::storage)?;
        array.store_metadata().map_err(DatasetError::storage)?;

        let subset = ArraySubset::new_with_shape(self.shape.clone());
        array
            .store_array_subset_elements(&subset, values)
            .map_err(DatasetError::storage)?;
        Ok(())
    }
}

fn blosc_codec(level: u8, typesize: usize) -> Result<Arc<dyn BytesToBytesCodecTraits>> {
    let level = BloscCompressionLevel::try_from(level)
        .map_err(|_| DatasetError::invalid_config(format!("invalid compression level {}", level)))?;
    let codec = BloscCodec::new(
        BloscCompressor::Zstd,
        level,
        None,
        BloscShuffleMode::Shuffle,
        Some(typesize),
    )
    .map_err(DatasetError::storage)?;
    Ok(Arc::new(codec))
}

/// Chunk size hints per dimension from `encoding["chunks"]`.
fn chunk_hints(encoding: &Attributes) -> serde_json::Map<String, serde_json::Value> {
    encoding
        .get("chunks")
        .and_then(|chunks| chunks.as_object())
        .cloned()
        .unwrap_or_default()
}

fn chunk_shape(
    dims: &[String],
    shape: &[usize],
    hints: &serde_json::Map<String, serde_json::Value>,
) -> Vec<u64> {
    let grid_start = dims.len().saturating_sub(2);
    dims.iter()
        .zip(shape)
        .enumerate()
        .map(|(axis, (dim, &size))| {
            let size = size.max(1) as u64;
            match hints.get(dim).and_then(|hint| hint.as_u64()) {
                Some(hint) => hint.clamp(1, size),
                None if axis < grid_start => 1,
                None => size,
            }
        })
        .collect()
}

/// Shape of a coordinate: its own length along a single dimension, the
/// dataset extents otherwise. Scalars are zero-dimensional.
fn coord_shape(dataset: &Dataset, name: &str, dims: &[String], len: usize) -> Result<Vec<u64>> {
    if dims.len() == 1 {
        return Ok(vec![len as u64]);
    }
    dims.iter()
        .map(|dim| {
            dataset.dims.get(dim).map(|&size| size as u64).ok_or_else(|| {
                DatasetError::schema(format!("coordinate {} uses unknown dimension {}", name, dim))
            })
        })
        .collect()
}

fn to_u64(shape: &[usize]) -> Vec<u64> {
    shape.iter().map(|&n| n as u64).collect()
}

fn json_map(attrs: &Attributes) -> serde_json::Map<String, serde_json::Value> {
    attrs
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn with_dims(attrs: &Attributes, dims: &[String]) -> serde_json::Map<String, serde_json::Value> {
    let mut map = json_map(attrs);
    map.insert(DIMENSIONS_ATTR.to_string(), json!(dims));
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_default_chunks_hold_one_field() {
        let dims = dims(&["reftime", "time1", "isobaric1", "latitude", "longitude"]);
        let chunks = chunk_shape(&dims, &[3, 3, 2, 181, 360], &serde_json::Map::new());
        assert_eq!(chunks, vec![1, 1, 1, 181, 360]);
    }

    #[test]
    fn test_chunk_hints_are_clamped() {
        let dims = dims(&["reftime", "latitude", "longitude"]);
        let hints = chunk_hints(&crate::coords::attrs([(
            "chunks",
            json!({ "reftime": 4, "latitude": 90, "longitude": 0 }),
        )]));
        let chunks = chunk_shape(&dims, &[2, 181, 360], &hints);
        assert_eq!(chunks, vec![2, 90, 1]);
    }

    #[test]
    fn test_invalid_compression_level() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = Dataset {
            dims: Default::default(),
            coords: Default::default(),
            data_vars: Default::default(),
            attrs: Default::default(),
            encoding: Default::default(),
        };
        let options = ZarrOptions {
            compression_level: Some(12),
        };
        let err = write_zarr(&dataset, &dir.path().join("out.zarr"), &options).unwrap_err();
        assert!(matches!(err, DatasetError::InvalidConfig(_)));
    }
}
