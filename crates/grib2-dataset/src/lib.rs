//! Multi-run GRIB2 dataset assembly.
//!
//! Turns collections of GRIB2 files, typically one or more files per model
//! run, into labeled multi-dimensional datasets:
//!
//! - **Inventories** list the [`MetaData`] of every message in a file and
//!   persist as compressed JSON so files are scanned once.
//! - **Selectors** pick the messages of interest with OR-combined
//!   [`Classifier`]s.
//! - **Templates** infer variables, dimensions and coordinates from one
//!   complete run.
//! - **Assembly** fills a template for many runs, stacking them along a
//!   `reftime` dimension and filling gaps with [`UNDEFINED`].
//! - **Export** writes an assembled dataset to a Zarr V3 store.
//!
//! # Example
//!
//! ```no_run
//! use grib2_dataset::{
//!     make_template, open_dataset, NativeDecoder, OpenOptions, Selector, TemplateOptions,
//!     VertLevelClass,
//! };
//!
//! let decoder = NativeDecoder::new();
//! let selector = Selector::new().with(|item: &grib2_dataset::MetaData| item.varname == "TMP");
//! let options = TemplateOptions {
//!     vertlevels: vec![VertLevelClass::Isobaric],
//!     ..Default::default()
//! };
//! let template = make_template(&decoder, &["gfs_2020010100.grib2"], &selector, &options)?
//!     .expect("no TMP messages");
//!
//! let files = ["gfs_2020010100.grib2", "gfs_2020010106.grib2"];
//! let dataset = open_dataset(&decoder, &files, &template, &OpenOptions::default())?;
//! println!("{}", dataset.summary());
//! # Ok::<(), grib2_dataset::DatasetError>(())
//! ```

pub mod config;
pub mod coords;
pub mod dataset;
pub mod decoder;
pub mod error;
pub mod grid;
pub mod inventory;
pub mod metadata;
pub mod processing;
pub mod selector;
pub mod template;
pub mod zarr;

pub use config::AssemblyConfig;
pub use coords::{Attributes, Coordinate, Values};
pub use dataset::{open_dataset, Dataset, OpenOptions, Variable};
pub use decoder::{Decoder, Field, MessageLocation, NativeDecoder};
pub use error::{DatasetError, Result};
pub use grid::{reorient, Grid, Projection};
pub use inventory::{
    inventory_path, load_inventory, load_or_make_inventory, make_inventories, make_inventory,
    read_inventory_file, save_inventory, Inventory, INVENTORY_SUFFIX,
};
pub use metadata::MetaData;
pub use processing::ProcessingTable;
pub use selector::{Classifier, SelectionConfig, SelectionRule, Selector};
pub use template::{make_template, Template, TemplateOptions, VarSpec, VertLevelClass};
pub use zarr::{write_zarr, ZarrOptions};

pub use grib2_parser::UNDEFINED;
