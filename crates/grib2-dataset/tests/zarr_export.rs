//! Export of assembled datasets to Zarr V3 and reading them back.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use grib2_dataset::{
    make_template, open_dataset, write_zarr, NativeDecoder, OpenOptions, Selector,
    TemplateOptions, VertLevelClass, ZarrOptions, UNDEFINED,
};
use test_utils::write_sample_run;
use zarrs::array::Array;
use zarrs::array_subset::ArraySubset;
use zarrs::group::Group;
use zarrs_filesystem::FilesystemStore;

fn assembled(dir: &std::path::Path, options: &OpenOptions) -> grib2_dataset::Dataset {
    let files: Vec<PathBuf> = [(2020, 1, 1, 0), (2020, 1, 1, 6)]
        .iter()
        .map(|&run| write_sample_run(dir, run).unwrap())
        .collect();
    let decoder = NativeDecoder::new();
    let template_options = TemplateOptions {
        vertlevels: vec![VertLevelClass::Isobaric],
        ..Default::default()
    };
    let template = make_template(&decoder, &files[..1], &Selector::new(), &template_options)
        .unwrap()
        .unwrap();
    open_dataset(&decoder, &files, &template, options).unwrap()
}

fn read_all<T: zarrs::array::ElementOwned>(store: &Arc<FilesystemStore>, path: &str) -> Vec<T> {
    let array = Array::open(store.clone(), path).expect("Failed to open array");
    let subset = ArraySubset::new_with_shape(array.shape().to_vec());
    array
        .retrieve_array_subset_elements(&subset)
        .expect("Failed to read array")
}

#[test]
fn test_zarr_round_trip() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let dataset = assembled(dir.path(), &OpenOptions::default());
    let zarr_path = dir.path().join("runs.zarr");

    write_zarr(&dataset, &zarr_path, &ZarrOptions::default()).expect("Failed to write");

    let store = Arc::new(FilesystemStore::new(&zarr_path).expect("Failed to open store"));
    let group = Group::open(store.clone(), "/").expect("Failed to open group");
    assert_eq!(group.attributes()["source"], dataset.attrs["source"]);
    assert_eq!(group.attributes()["coordinates"], dataset.attrs["coordinates"]);

    for (name, variable) in &dataset.data_vars {
        let array = Array::open(store.clone(), &format!("/{}", name)).unwrap();
        let shape: Vec<u64> = variable.shape.iter().map(|&n| n as u64).collect();
        assert_eq!(array.shape(), shape.as_slice(), "{}", name);
        assert_eq!(
            array.attributes()["_ARRAY_DIMENSIONS"],
            serde_json::json!(variable.dims)
        );
        assert_eq!(array.attributes()["short_name"], variable.attrs["short_name"]);

        let values: Vec<f32> = read_all(&store, &format!("/{}", name));
        assert_eq!(values, variable.data, "{}", name);
    }

    let reftimes: Vec<i64> = read_all(&store, "/reftime");
    let expected: Vec<i64> = dataset.reftimes().iter().map(|t| t.timestamp()).collect();
    assert_eq!(reftimes, expected);

    let reftime = Array::open(store.clone(), "/reftime").unwrap();
    assert_eq!(
        reftime.attributes()["units"],
        "seconds since 1970-01-01 00:00:00"
    );

    let levels: Vec<f64> = read_all(&store, "/isobaric1");
    assert_eq!(levels, vec![70000.0, 50000.0]);
}

#[test]
fn test_zarr_chunks_follow_hints() {
    let dir = tempfile::tempdir().unwrap();
    let options = OpenOptions {
        chunks: BTreeMap::from([("reftime".to_string(), 2), ("latitude".to_string(), 2)]),
        ..Default::default()
    };
    let dataset = assembled(dir.path(), &options);
    let zarr_path = dir.path().join("chunked.zarr");

    let uncompressed = ZarrOptions {
        compression_level: None,
    };
    write_zarr(&dataset, &zarr_path, &uncompressed).unwrap();

    let store = Arc::new(FilesystemStore::new(&zarr_path).unwrap());
    let array = Array::open(store.clone(), "/TMP.isobaric").unwrap();
    // reftime, time1, isobaric1, latitude, longitude
    let chunk_shape: Vec<u64> = array
        .chunk_shape(&[0, 0, 0, 0, 0])
        .unwrap()
        .iter()
        .map(|n| n.get())
        .collect();
    assert_eq!(chunk_shape, vec![2, 1, 1, 2, 4]);

    let values: Vec<f32> = read_all(&store, "/TMP.isobaric");
    assert_eq!(values, dataset.variable("TMP.isobaric").unwrap().data);
}

#[test]
fn test_zarr_keeps_missing_values() {
    let dir = tempfile::tempdir().unwrap();
    let options = OpenOptions {
        expected_reftimes: Some(vec![Utc.with_ymd_and_hms(2020, 1, 1, 18, 0, 0).unwrap()]),
        ..Default::default()
    };
    let dataset = assembled(dir.path(), &options);
    assert_eq!(dataset.reftimes().len(), 3);
    let zarr_path = dir.path().join("gaps.zarr");
    write_zarr(&dataset, &zarr_path, &ZarrOptions::default()).unwrap();

    let store = Arc::new(FilesystemStore::new(&zarr_path).unwrap());
    let values: Vec<f32> = read_all(&store, "/TMP.2_m_above_ground");
    let slice = values.len() / 3;
    assert!(values[2 * slice..].iter().all(|&v| v == UNDEFINED));
    assert!(values[..slice].iter().all(|&v| v != UNDEFINED));
}
