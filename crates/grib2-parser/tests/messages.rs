//! Message-level decoding against synthetic GRIB2 files.

use bytes::Bytes;
use grib2_parser::{Grib2Error, Grib2Reader, UNDEFINED};
use test_utils::{assert_approx_eq, fixtures, require_test_file, Grib2Builder};

fn reader_for(messages: &[Grib2Builder]) -> Grib2Reader {
    let data: Vec<u8> = messages.iter().flat_map(|m| m.build()).collect();
    Grib2Reader::new(Bytes::from(data))
}

#[test]
fn test_message_can_be_parsed() {
    let mut reader = reader_for(&[Grib2Builder::new().with_grid(5, 5).with_constant_value(288.15)]);
    let msg = reader
        .next_message()
        .expect("Should parse")
        .expect("Should have message");

    assert_eq!(msg.parameter().short_name, "TMP");
    assert_eq!(msg.identification.center, 7);
    assert_eq!(msg.grid_dims(), (5, 5));
    assert_eq!(msg.ordinal, 1);
    assert_eq!(msg.offset, 0);

    assert!(reader.next_message().unwrap().is_none());
}

#[test]
fn test_ordinals_and_offsets() {
    let messages = fixtures::sample_run((2020, 1, 25, 0));
    let lengths: Vec<u64> = messages.iter().map(|m| m.build().len() as u64).collect();

    let records: Vec<_> = reader_for(&messages)
        .map(|m| m.unwrap().record().unwrap())
        .collect();

    assert_eq!(records.len(), messages.len());
    let mut offset = 0;
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record.ordinal, i + 1);
        assert_eq!(record.offset, offset);
        offset += lengths[i];
    }
}

#[test]
fn test_isobaric_record() {
    let mut reader = reader_for(&[fixtures::isobaric_temperature((2020, 1, 25, 0), 500, 12)]);
    let record = reader.next_message().unwrap().unwrap().record().unwrap();

    assert_eq!(record.short_name, "TMP");
    assert_eq!(record.long_name, "Temperature");
    assert_eq!(record.units, "K");
    assert_eq!(record.level, "500 mb");
    assert_eq!(record.time, "12 hour fcst");
    assert_eq!(record.first_surface.type_code, 100);
    assert_eq!(record.first_surface.value(), Some(50000.0));
    assert!(record.second_surface.is_missing());
    assert_eq!(record.forecast_start, 12 * 3600);
    assert_eq!(record.forecast_end, 12 * 3600);
    assert_eq!(record.centre, "7 - US National Weather Service - NCEP (WMC)");
    assert_eq!(record.subcentre, "0");
    assert_eq!(record.pdt, 0);
    assert_eq!(record.gdt, 0);
    assert_eq!((record.nx, record.ny, record.num_points), (4, 3, 12));
}

#[test]
fn test_analysis_descriptor() {
    let mut reader = reader_for(&[fixtures::surface_temperature((2020, 1, 25, 0), 0)]);
    let record = reader.next_message().unwrap().unwrap().record().unwrap();

    assert_eq!(record.level, "2 m above ground");
    assert_eq!(record.time, "anl");
}

#[test]
fn test_accumulation_record() {
    let mut reader = reader_for(&[fixtures::precipitation((2020, 1, 25, 0), 3, 6)]);
    let msg = reader.next_message().unwrap().unwrap();
    let record = msg.record().unwrap();

    assert_eq!(record.short_name, "APCP");
    assert_eq!(record.level, "surface");
    assert_eq!(record.time, "3-6 hour acc fcst");
    assert_eq!(record.pdt, 8);
    assert_eq!(record.forecast_start, 3 * 3600);
    assert_eq!(record.forecast_end, 6 * 3600);
    assert_eq!(msg.statistical_process(), Some(1));
}

#[test]
fn test_layer_record() {
    let builder = Grib2Builder::new()
        .with_discipline(2)
        .with_parameter(0, 192)
        .with_level(106, 0, 0)
        .with_second_level(106, 1, 1);
    let record = reader_for(&[builder]).next().unwrap().unwrap().record().unwrap();

    assert_eq!(record.short_name, "SOILW");
    assert_eq!(record.level, "0-0.1 m below ground");
    assert_eq!(record.second_surface.value(), Some(0.1));
}

#[test]
fn test_unpack_values() {
    let data: Vec<f32> = (0..12).map(|i| 250.0 + i as f32 * 0.25).collect();
    let mut reader = reader_for(&[Grib2Builder::new().with_data(data.clone())]);
    let values = reader.next_message().unwrap().unwrap().unpack_data().unwrap();

    assert_eq!(values.len(), 12);
    for (got, want) in values.iter().zip(&data) {
        assert_approx_eq!(*got, *want, 1e-3);
    }
}

#[test]
fn test_unpack_with_bitmap() {
    let mut present = vec![true; 12];
    present[1] = false;
    present[7] = false;
    let builder = Grib2Builder::new()
        .with_data((0..12).map(|i| i as f32).collect())
        .with_bitmap(present);
    let values = reader_for(&[builder])
        .next_message()
        .unwrap()
        .unwrap()
        .unpack_data()
        .unwrap();

    assert_eq!(values[0], 0.0);
    assert_eq!(values[1], UNDEFINED);
    assert_eq!(values[2], 2.0);
    assert_eq!(values[7], UNDEFINED);
    assert_eq!(values[11], 11.0);
}

#[test]
fn test_message_at_offset() {
    let messages = fixtures::sample_run((2020, 1, 25, 0));
    let data: Vec<u8> = messages.iter().flat_map(|m| m.build()).collect();
    let second = messages[0].build().len() as u64;
    let reader = Grib2Reader::new(Bytes::from(data));

    let msg = reader.message_at(second, 2).unwrap();
    assert_eq!(msg.record().unwrap().level, "700 mb");

    let err = reader.message_at(second + 1, 2).unwrap_err();
    assert!(matches!(err, Grib2Error::InvalidFormat(_)));
}

#[test]
fn test_garbage_between_messages_is_skipped() {
    let mut data = Grib2Builder::new().build();
    data.extend_from_slice(b"padding");
    data.extend_from_slice(&Grib2Builder::new().with_forecast_hour(6).build());

    let records: Vec<_> = Grib2Reader::new(Bytes::from(data))
        .map(|m| m.unwrap().record().unwrap())
        .collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].time, "6 hour fcst");
    assert_eq!(records[1].ordinal, 2);
}

#[test]
fn test_real_file_records() {
    let path = require_test_file!("gfs_sample.grib2");
    let data = std::fs::read(&path).expect("Failed to read test file");

    let mut count = 0;
    for message in Grib2Reader::new(Bytes::from(data)) {
        let record = message.expect("message decodes").record().expect("record");
        assert!(record.forecast_start <= record.forecast_end);
        count += 1;
    }
    assert!(count > 0);
}
