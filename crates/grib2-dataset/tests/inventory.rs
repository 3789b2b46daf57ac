//! Inventory persistence against synthetic GRIB2 files.

use std::fs;

use grib2_dataset::{
    inventory_path, load_inventory, make_inventories, make_inventory, save_inventory,
    NativeDecoder, Selector,
};
use test_utils::{write_grib_file, write_sample_run, Grib2Builder, FORECAST_HOURS};

#[test]
fn test_inventory_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_sample_run(dir.path(), (2020, 1, 1, 0)).unwrap();
    let decoder = NativeDecoder::new();

    let made = make_inventory(&decoder, &file).unwrap();
    save_inventory(&made, &file, None).unwrap();
    assert!(inventory_path(&file, None).exists());

    // The file moves; its inventory follows it under the new name.
    let moved = dir.path().join("moved.grib2");
    fs::rename(&file, &moved).unwrap();
    fs::rename(inventory_path(&file, None), inventory_path(&moved, None)).unwrap();

    let loaded = load_inventory(&moved, None).unwrap();
    assert_eq!(loaded.len(), made.len());
    for (a, b) in made.iter().zip(loaded.iter()) {
        assert_eq!(b.file, moved);
        let mut a = a.clone();
        a.file = moved.clone();
        assert_eq!(&a, b);
    }
}

#[test]
fn test_inventory_round_trip_fractional_levels() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("fractional.grib2");
    write_grib_file(
        &file,
        &[
            Grib2Builder::new().with_level(103, 1, 14),
            Grib2Builder::new()
                .with_level(106, 2, 7)
                .with_second_level(106, 3, 283),
            Grib2Builder::new().with_level(103, 6, 1_234_567),
        ],
    )
    .unwrap();
    let decoder = NativeDecoder::new();

    let made = make_inventory(&decoder, &file).unwrap();
    assert_eq!(made.items()[0].bot_level_value, Some(1.4));
    save_inventory(&made, &file, None).unwrap();

    let loaded = load_inventory(&file, None).unwrap();
    assert_eq!(loaded, made);
}

#[test]
fn test_inventory_in_directory() {
    let dir = tempfile::tempdir().unwrap();
    let inv_dir = dir.path().join("inventories");
    let file = write_sample_run(dir.path(), (2020, 1, 1, 6)).unwrap();
    let decoder = NativeDecoder::new();

    let inventory = make_inventory(&decoder, &file).unwrap();
    save_inventory(&inventory, &file, Some(&inv_dir)).unwrap();

    assert!(!inventory_path(&file, None).exists());
    assert_eq!(fs::read_dir(&inv_dir).unwrap().count(), 1);
    assert_eq!(load_inventory(&file, Some(&inv_dir)).unwrap(), inventory);
}

#[test]
fn test_inventory_contents() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_sample_run(dir.path(), (2020, 1, 1, 0)).unwrap();
    let inventory = make_inventory(&NativeDecoder::new(), &file).unwrap();

    assert_eq!(inventory.len(), FORECAST_HOURS.len() * 3 + 2);

    let first = &inventory.items()[0];
    assert_eq!(first.ordinal, 1);
    assert_eq!(first.offset, 0);
    assert_eq!(first.varname, "TMP");
    assert_eq!(first.level_str, "500 mb");
    assert_eq!(first.time_str, "anl");
    assert_eq!(first.bot_level_value, Some(50000.0));

    let last = &inventory.items()[inventory.len() - 1];
    assert_eq!(last.varname, "APCP");
    assert_eq!(last.level_str, "surface");
    assert_eq!(last.time_str, "0-6 hour acc fcst");
    assert_eq!(last.forecast_period(), chrono::Duration::hours(6));

    let offsets: Vec<u64> = inventory.iter().map(|item| item.offset).collect();
    assert!(offsets.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_selection_over_file_set() {
    let dir = tempfile::tempdir().unwrap();
    let files = [
        write_sample_run(dir.path(), (2020, 1, 1, 0)).unwrap(),
        write_sample_run(dir.path(), (2020, 1, 1, 6)).unwrap(),
    ];
    let inventory = make_inventories(&NativeDecoder::new(), &files, None, false).unwrap();
    assert_eq!(inventory.len(), 22);

    assert_eq!(Selector::new().select(&inventory).len(), inventory.len());

    let selector = Selector::new()
        .with(|item: &grib2_dataset::MetaData| item.varname == "APCP")
        .with(|item: &grib2_dataset::MetaData| item.level_str == "500 mb");
    let selected = selector.select(&inventory);
    assert_eq!(selected.len(), 2 * (2 + FORECAST_HOURS.len()));
    assert!(selected
        .iter()
        .all(|item| item.varname == "APCP" || item.level_str == "500 mb"));
}
