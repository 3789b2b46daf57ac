//! Inventory building and persistence.
//!
//! An inventory is the ordered list of [`MetaData`] for the messages of one
//! file (or the concatenation for a file set). Inventories persist as gzip
//! compressed JSON, either next to the GRIB2 file (`<file>.inv.gz`) or in a
//! separate directory under the SHA-256 of the canonical file path.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::decoder::Decoder;
use crate::error::{DatasetError, Result};
use crate::metadata::MetaData;

/// Suffix of persisted inventory files.
pub const INVENTORY_SUFFIX: &str = ".inv.gz";

/// Ordered message metadata of one file or a file set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    items: Vec<MetaData>,
}

impl Inventory {
    pub fn new(items: Vec<MetaData>) -> Self {
        Self { items }
    }

    /// File of the first message, if any.
    pub fn file(&self) -> Option<&Path> {
        self.items.first().map(|item| item.file.as_path())
    }

    pub fn items(&self) -> &[MetaData] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MetaData> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_items(self) -> Vec<MetaData> {
        self.items
    }

    /// Append the messages of `other`, keeping order.
    pub fn merge(&mut self, other: Inventory) {
        self.items.extend(other.items);
    }

    /// Point every record at `file`.
    fn rebind(&mut self, file: &Path) {
        for item in &mut self.items {
            item.file = file.to_path_buf();
        }
    }
}

impl<'a> IntoIterator for &'a Inventory {
    type Item = &'a MetaData;
    type IntoIter = std::slice::Iter<'a, MetaData>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl IntoIterator for Inventory {
    type Item = MetaData;
    type IntoIter = std::vec::IntoIter<MetaData>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl FromIterator<MetaData> for Inventory {
    fn from_iter<I: IntoIterator<Item = MetaData>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Scan `file` with `decoder`.
///
/// A record the extractor rejects aborts the scan of this file.
pub fn make_inventory(decoder: &dyn Decoder, file: &Path) -> Result<Inventory> {
    let records = decoder.scan(file)?;
    let items = records
        .iter()
        .map(|record| MetaData::from_record(file, record))
        .collect::<Result<Vec<_>>>()?;
    debug!(file = %file.display(), messages = items.len(), "Built inventory");
    Ok(Inventory::new(items))
}

/// Location of the persisted inventory of `file`.
///
/// Without `directory` the inventory sits next to the file. With a
/// directory, the name is the SHA-256 of the canonical file path so files
/// sharing a basename across an archive tree do not collide.
pub fn inventory_path(file: &Path, directory: Option<&Path>) -> PathBuf {
    match directory {
        Some(directory) => {
            let canonical = fs::canonicalize(file).unwrap_or_else(|_| file.to_path_buf());
            let digest = Sha256::digest(canonical.to_string_lossy().as_bytes());
            let name: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
            directory.join(format!("{}{}", name, INVENTORY_SUFFIX))
        }
        None => {
            let mut name = file.as_os_str().to_os_string();
            name.push(INVENTORY_SUFFIX);
            PathBuf::from(name)
        }
    }
}

/// Persist `inventory` for `file`.
///
/// Empty inventories are not written. The file is written to a temporary
/// name and renamed into place, so concurrent readers never see a partial
/// inventory.
pub fn save_inventory(inventory: &Inventory, file: &Path, directory: Option<&Path>) -> Result<()> {
    if inventory.is_empty() {
        warn!(file = %file.display(), "Inventory is empty, not saving");
        return Ok(());
    }
    if let Some(directory) = directory {
        fs::create_dir_all(directory)?;
    }

    let path = inventory_path(file, directory);
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let tmp = tempfile::NamedTempFile::new_in(&parent)?;
    {
        let mut encoder = GzEncoder::new(BufWriter::new(tmp.as_file()), Compression::default());
        serde_json::to_writer(&mut encoder, inventory)?;
        encoder.finish()?.flush()?;
    }
    tmp.persist(&path).map_err(|e| DatasetError::Io(e.error))?;

    debug!(
        file = %file.display(),
        inventory = %path.display(),
        messages = inventory.len(),
        "Saved inventory"
    );
    Ok(())
}

/// Load the persisted inventory of `file`, rebound to `file`.
///
/// Returns `None` when there is no usable inventory; the caller is
/// expected to scan the file instead.
pub fn load_inventory(file: &Path, directory: Option<&Path>) -> Option<Inventory> {
    let path = inventory_path(file, directory);
    let handle = match File::open(&path) {
        Ok(handle) => handle,
        Err(e) => {
            info!(inventory = %path.display(), error = %e, "Cannot load inventory");
            return None;
        }
    };

    match read_blob(handle) {
        Ok(mut inventory) => {
            inventory.rebind(file);
            Some(inventory)
        }
        Err(e) => {
            warn!(inventory = %path.display(), error = %e, "Ignoring corrupt inventory");
            None
        }
    }
}

/// Read an inventory file written by [`save_inventory`].
///
/// Records keep the file path they were saved with.
pub fn read_inventory_file(path: &Path) -> Result<Inventory> {
    let handle = File::open(path)?;
    Ok(read_blob(handle)?)
}

fn read_blob(handle: File) -> serde_json::Result<Inventory> {
    serde_json::from_reader(GzDecoder::new(BufReader::new(handle)))
}

/// Load the inventory of `file`, or scan it (and optionally persist the
/// result) if none is stored.
pub fn load_or_make_inventory(
    decoder: &dyn Decoder,
    file: &Path,
    directory: Option<&Path>,
    save: bool,
) -> Result<Inventory> {
    if let Some(inventory) = load_inventory(file, directory) {
        if !inventory.is_empty() {
            return Ok(inventory);
        }
    }
    let inventory = make_inventory(decoder, file)?;
    if save {
        save_inventory(&inventory, file, directory)?;
    }
    Ok(inventory)
}

/// Inventories of `files` concatenated in order.
pub fn make_inventories<P: AsRef<Path>>(
    decoder: &dyn Decoder,
    files: &[P],
    directory: Option<&Path>,
    save: bool,
) -> Result<Inventory> {
    let mut merged = Inventory::default();
    for file in files {
        merged.merge(load_or_make_inventory(decoder, file.as_ref(), directory, save)?);
    }
    Ok(merged)
}
