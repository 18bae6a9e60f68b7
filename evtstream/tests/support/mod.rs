//! Shared fixtures for evtstream integration tests.

// Not every test crate uses every helper.
#![allow(dead_code)]

use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;

use evtstream::{
    BatchSchema, Column, ColumnBatch, FieldInfo, FieldType, MemoryStorage, RowContainer,
};
use parquet::data_type::{ByteArray, ByteArrayType, DoubleType, Int32Type, Int64Type};
use parquet::file::properties::WriterProperties;
use parquet::file::writer::SerializedFileWriter;
use parquet::schema::parser::parse_message_type;

/// Hit-level columns: `energy`, `channel`, `timestamp`.
///
/// Row `i` holds `channel = id + i`, `energy = (id + i) * 0.5`,
/// `timestamp = 1000 * (id + i)`, so every row is identifiable across sources.
pub fn hit_batch(id: i32, rows: usize) -> ColumnBatch {
    let schema = Arc::new(BatchSchema::new(vec![
        FieldInfo::required("energy", FieldType::Float64),
        FieldInfo::required("channel", FieldType::Int32),
        FieldInfo::required("timestamp", FieldType::Int64),
    ]));
    let ids: Vec<i32> = (0..rows as i32).map(|i| id + i).collect();
    ColumnBatch::new(
        schema,
        vec![
            Column::Float64(ids.iter().map(|&v| Some(v as f64 * 0.5)).collect()),
            Column::Int32(ids.iter().map(|&v| Some(v)).collect()),
            Column::Int64(ids.iter().map(|&v| Some(v as i64 * 1000)).collect()),
        ],
    )
    .unwrap()
}

/// Columns `A`, `B` (primary side of a friend pair) with `A = id + i`.
pub fn ab_batch(id: i32, rows: usize) -> ColumnBatch {
    named_int_batch(&["A", "B"], id, rows)
}

/// Columns `C`, `D` (friend side) with `C = id + i`.
pub fn cd_batch(id: i32, rows: usize) -> ColumnBatch {
    named_int_batch(&["C", "D"], id, rows)
}

/// Int32 columns; column `k` of row `i` holds `(id + i) * (k + 1)`.
pub fn named_int_batch(names: &[&str], id: i32, rows: usize) -> ColumnBatch {
    let schema = Arc::new(BatchSchema::new(
        names
            .iter()
            .map(|n| FieldInfo::required(*n, FieldType::Int32))
            .collect(),
    ));
    let columns = (0..names.len() as i32)
        .map(|k| Column::Int32((0..rows as i32).map(|i| Some((id + i) * (k + 1))).collect()))
        .collect();
    ColumnBatch::new(schema, columns).unwrap()
}

/// Waveform table: `t0 = i`, `dt = 16`, `values = [i, i + 1, i + 2]`.
pub fn waveform_batch(rows: usize) -> ColumnBatch {
    let schema = Arc::new(BatchSchema::new(vec![
        FieldInfo::required("t0", FieldType::Float64),
        FieldInfo::required("dt", FieldType::Float64),
        FieldInfo::required("values", FieldType::Float64List),
    ]));
    ColumnBatch::new(
        schema,
        vec![
            Column::Float64((0..rows).map(|i| Some(i as f64)).collect()),
            Column::Float64(vec![Some(16.0); rows]),
            Column::Float64List(
                (0..rows)
                    .map(|i| Some(vec![i as f64, i as f64 + 1.0, i as f64 + 2.0]))
                    .collect(),
            ),
        ],
    )
    .unwrap()
}

/// Int32 values of a column in the container, in row order.
pub fn ints(container: &RowContainer, name: &str) -> Vec<i32> {
    let column = container.column(name).unwrap();
    (0..container.num_rows())
        .map(|i| column.get_i32(i).unwrap())
        .collect()
}

/// Column names of the container, in order.
pub fn names(container: &RowContainer) -> Vec<String> {
    container.column_names().map(String::from).collect()
}

/// Memory storage with `sources` hit sources named `run0`, `run1`, ... under
/// group `geds/hit`; source `k` starts at id `rows * k`.
pub fn hit_storage(sources: usize, rows: usize) -> MemoryStorage {
    let mut storage = MemoryStorage::new();
    for k in 0..sources {
        storage.add_group(format!("run{k}"), "geds/hit", hit_batch((rows * k) as i32, rows));
    }
    storage
}

/// Write a hit group file with the given row group sizes; row `i` holds
/// `channel = id + i`, `energy = (id + i) * 0.5`, `timestamp = 1000 * (id + i)`
/// and `label = "evt<id + i>"`.
pub fn write_hit_parquet(path: &Path, id: i32, row_groups: &[usize]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let schema = Arc::new(
        parse_message_type(
            "message hit {
                REQUIRED DOUBLE energy;
                REQUIRED INT32 channel;
                REQUIRED INT64 timestamp;
                OPTIONAL BYTE_ARRAY label (UTF8);
            }",
        )
        .unwrap(),
    );
    let props = Arc::new(WriterProperties::builder().build());
    let mut writer = SerializedFileWriter::new(File::create(path).unwrap(), schema, props).unwrap();

    let mut next = id;
    for &rows in row_groups {
        let ids: Vec<i32> = (next..next + rows as i32).collect();
        next += rows as i32;

        let mut rg = writer.next_row_group().unwrap();

        let mut col = rg.next_column().unwrap().unwrap();
        let energy: Vec<f64> = ids.iter().map(|&v| v as f64 * 0.5).collect();
        col.typed::<DoubleType>().write_batch(&energy, None, None).unwrap();
        col.close().unwrap();

        let mut col = rg.next_column().unwrap().unwrap();
        col.typed::<Int32Type>().write_batch(&ids, None, None).unwrap();
        col.close().unwrap();

        let mut col = rg.next_column().unwrap().unwrap();
        let timestamp: Vec<i64> = ids.iter().map(|&v| v as i64 * 1000).collect();
        col.typed::<Int64Type>().write_batch(&timestamp, None, None).unwrap();
        col.close().unwrap();

        let mut col = rg.next_column().unwrap().unwrap();
        let labels: Vec<ByteArray> = ids
            .iter()
            .map(|v| ByteArray::from(format!("evt{v}").as_str()))
            .collect();
        let def_levels = vec![1i16; labels.len()];
        col.typed::<ByteArrayType>()
            .write_batch(&labels, Some(&def_levels), None)
            .unwrap();
        col.close().unwrap();

        rg.close().unwrap();
    }
    writer.close().unwrap();
}

/// Write a waveform group file in one row group: `t0 = i`, `dt = 16`,
/// `values` holds `i % 3 + 1` samples `[i, i + 1, ...]`.
pub fn write_waveform_parquet(path: &Path, rows: usize) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let schema = Arc::new(
        parse_message_type(
            "message raw {
                REQUIRED DOUBLE t0;
                REQUIRED DOUBLE dt;
                REQUIRED group values (LIST) {
                    REPEATED group list {
                        REQUIRED DOUBLE element;
                    }
                }
            }",
        )
        .unwrap(),
    );
    let props = Arc::new(WriterProperties::builder().build());
    let mut writer = SerializedFileWriter::new(File::create(path).unwrap(), schema, props).unwrap();
    let mut rg = writer.next_row_group().unwrap();

    let mut col = rg.next_column().unwrap().unwrap();
    let t0: Vec<f64> = (0..rows).map(|i| i as f64).collect();
    col.typed::<DoubleType>().write_batch(&t0, None, None).unwrap();
    col.close().unwrap();

    let mut col = rg.next_column().unwrap().unwrap();
    col.typed::<DoubleType>().write_batch(&vec![16.0; rows], None, None).unwrap();
    col.close().unwrap();

    let mut values = Vec::new();
    let mut def_levels = Vec::new();
    let mut rep_levels = Vec::new();
    for samples in waveform_samples(rows) {
        for (k, sample) in samples.into_iter().enumerate() {
            values.push(sample);
            def_levels.push(1i16);
            rep_levels.push(if k == 0 { 0i16 } else { 1 });
        }
    }
    let mut col = rg.next_column().unwrap().unwrap();
    col.typed::<DoubleType>()
        .write_batch(&values, Some(&def_levels), Some(&rep_levels))
        .unwrap();
    col.close().unwrap();

    rg.close().unwrap();
    writer.close().unwrap();
}

/// Samples written by [`write_waveform_parquet`] for each row.
pub fn waveform_samples(rows: usize) -> Vec<Vec<f64>> {
    (0..rows)
        .map(|i| (0..i % 3 + 1).map(|k| (i + k) as f64).collect())
        .collect()
}

/// Two rows of annotated integer and string columns:
///
/// - `ts`: INT64 `TIMESTAMP_MILLIS` `[1, 1_700_000_000_000]`
/// - `us`: INT64 `TIMESTAMP_MICROS` `[2, 3]`
/// - `n`: INT32 `UINT_32` `[4, -1]`, so the second row reads back as `u32::MAX`
/// - `day`: INT32 `DATE` `[0, 19_000]`
/// - `kind`: BYTE_ARRAY `ENUM` `["hit", "pulser"]`
/// - `big`: INT64 `UINT_64` holding `big`
/// - `amount`: INT32 `DECIMAL(9,2)`, which has no column type
pub fn write_annotated_parquet(path: &Path, big: [i64; 2]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let schema = Arc::new(
        parse_message_type(
            "message annotated {
                REQUIRED INT64 ts (TIMESTAMP_MILLIS);
                REQUIRED INT64 us (TIMESTAMP_MICROS);
                REQUIRED INT32 n (UINT_32);
                REQUIRED INT32 day (DATE);
                REQUIRED BYTE_ARRAY kind (ENUM);
                REQUIRED INT64 big (UINT_64);
                REQUIRED INT32 amount (DECIMAL(9,2));
            }",
        )
        .unwrap(),
    );
    let props = Arc::new(WriterProperties::builder().build());
    let mut writer = SerializedFileWriter::new(File::create(path).unwrap(), schema, props).unwrap();
    let mut rg = writer.next_row_group().unwrap();

    let mut write_i64 = |values: &[i64]| {
        let mut col = rg.next_column().unwrap().unwrap();
        col.typed::<Int64Type>().write_batch(values, None, None).unwrap();
        col.close().unwrap();
    };
    write_i64(&[1, 1_700_000_000_000]);
    write_i64(&[2, 3]);

    for values in [[4, -1], [0, 19_000]] {
        let mut col = rg.next_column().unwrap().unwrap();
        col.typed::<Int32Type>().write_batch(&values, None, None).unwrap();
        col.close().unwrap();
    }

    let mut col = rg.next_column().unwrap().unwrap();
    let kinds = [ByteArray::from("hit"), ByteArray::from("pulser")];
    col.typed::<ByteArrayType>().write_batch(&kinds, None, None).unwrap();
    col.close().unwrap();

    let mut col = rg.next_column().unwrap().unwrap();
    col.typed::<Int64Type>().write_batch(&big, None, None).unwrap();
    col.close().unwrap();

    let mut col = rg.next_column().unwrap().unwrap();
    col.typed::<Int32Type>().write_batch(&[1250, 99], None, None).unwrap();
    col.close().unwrap();

    rg.close().unwrap();
    writer.close().unwrap();
}
