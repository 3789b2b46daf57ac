//! Input file discovery.

use std::path::{Path, PathBuf};

use grib2_dataset::INVENTORY_SUFFIX;
use walkdir::WalkDir;

const GRIB_EXTENSIONS: &[&str] = &["grib2", "grb2"];

/// True for `*.grib2`/`*.grb2` files, optionally gzip compressed.
pub fn is_grib_file(path: &Path) -> bool {
    let path = match path.extension() {
        Some(ext) if ext == "gz" => path.with_extension(""),
        _ => path.to_path_buf(),
    };
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| GRIB_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

/// Expand directories into the GRIB2 files below them, sorted by path.
///
/// Other inputs are kept as given, including paths that do not exist, so
/// assembly can account for missing files.
pub fn collect_grib_files(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(input)
                .follow_links(true)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file() && is_grib_file(entry.path()))
                .map(|entry| entry.into_path())
                .collect();
            found.sort();
            files.extend(found);
        } else {
            files.push(input.clone());
        }
    }
    files
}

/// Inventory files in `dir`, descending into subdirectories when `recursive`.
pub fn collect_inventory_files(dir: &Path, recursive: bool) -> Vec<PathBuf> {
    let mut walker = WalkDir::new(dir).follow_links(true);
    if !recursive {
        walker = walker.max_depth(1);
    }
    let mut found: Vec<PathBuf> = walker
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry.file_name().to_string_lossy().ends_with(INVENTORY_SUFFIX)
        })
        .map(|entry| entry.into_path())
        .collect();
    found.sort();
    found
}
