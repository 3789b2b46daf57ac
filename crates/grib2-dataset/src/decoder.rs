//! Decoding engine seam.
//!
//! Inventories and datasets only talk to GRIB2 files through [`Decoder`], so
//! the engine can be swapped (or mocked in tests). [`NativeDecoder`] is the
//! pure Rust engine from `grib2-parser`.

use std::fs;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use grib2_parser::tables::Grib2Tables;
use grib2_parser::{Grib2Reader, MessageRecord};
use tracing::debug;

use crate::error::{DatasetError, Result};

/// Decoded values of one field in storage order.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub values: Vec<f32>,
    pub nx: u32,
    pub ny: u32,
}

/// Position of a message in its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageLocation {
    pub ordinal: usize,
    pub offset: u64,
}

/// Access to the messages of GRIB2 files.
///
/// Implementations are shared between worker threads during parallel
/// assembly, so they must not keep per-file session state.
pub trait Decoder: Send + Sync {
    /// Metadata records of every message in `path`, in file order.
    fn scan(&self, path: &Path) -> Result<Vec<MessageRecord>>;

    /// Decode the field of the message at `location`.
    fn read_field(&self, path: &Path, location: MessageLocation) -> Result<Field>;

    /// Decode several fields of one file.
    fn read_fields(&self, path: &Path, locations: &[MessageLocation]) -> Result<Vec<Field>> {
        locations
            .iter()
            .map(|&location| self.read_field(path, location))
            .collect()
    }
}

/// Decoder backed by `grib2-parser`. Gzip-compressed files (`.gz`) are
/// decompressed in memory.
#[derive(Debug, Clone)]
pub struct NativeDecoder {
    tables: Arc<Grib2Tables>,
}

impl Default for NativeDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeDecoder {
    /// Decoder with the standard code tables.
    pub fn new() -> Self {
        Self::with_tables(Arc::new(Grib2Tables::standard()))
    }

    pub fn with_tables(tables: Arc<Grib2Tables>) -> Self {
        Self { tables }
    }

    fn open(&self, path: &Path) -> Result<Grib2Reader> {
        let raw = fs::read(path)?;
        let data = if path.extension().is_some_and(|ext| ext == "gz") {
            decompress_gzip(&raw).map_err(|e| DatasetError::decode(path, e))?
        } else {
            Bytes::from(raw)
        };
        Ok(Grib2Reader::with_tables(data, self.tables.clone()))
    }

    fn decode_at(reader: &Grib2Reader, path: &Path, location: MessageLocation) -> Result<Field> {
        let message = reader
            .message_at(location.offset, location.ordinal)
            .map_err(|e| DatasetError::decode(path, e))?;
        let values = message
            .unpack_data()
            .map_err(|e| DatasetError::decode(path, e))?;
        let (nx, ny) = message.grid_dims();
        Ok(Field { values, nx, ny })
    }
}

impl Decoder for NativeDecoder {
    fn scan(&self, path: &Path) -> Result<Vec<MessageRecord>> {
        let mut reader = self.open(path)?;
        let mut records = Vec::new();
        while let Some(message) = reader
            .next_message()
            .map_err(|e| DatasetError::decode(path, e))?
        {
            records.push(message.record().map_err(|e| DatasetError::decode(path, e))?);
        }
        debug!(file = %path.display(), messages = records.len(), "Scanned GRIB2 file");
        Ok(records)
    }

    fn read_field(&self, path: &Path, location: MessageLocation) -> Result<Field> {
        let reader = self.open(path)?;
        Self::decode_at(&reader, path, location)
    }

    fn read_fields(&self, path: &Path, locations: &[MessageLocation]) -> Result<Vec<Field>> {
        let reader = self.open(path)?;
        locations
            .iter()
            .map(|&location| Self::decode_at(&reader, path, location))
            .collect()
    }
}

/// Decompress gzip-compressed GRIB2 data.
pub fn decompress_gzip(data: &[u8]) -> std::io::Result<Bytes> {
    let mut decoder = flate2::read::GzDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder.read_to_end(&mut decompressed)?;
    Ok(Bytes::from(decompressed))
}
