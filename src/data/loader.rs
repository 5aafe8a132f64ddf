use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{
    DataType, Date32Type, Float32Type, Float64Type, Int32Type, Int64Type, TimeUnit,
    TimestampMicrosecondType, TimestampMillisecondType, TimestampNanosecondType,
    TimestampSecondType,
};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use super::model::{MetadataValue, SpectralDataset, Spectrum};
use super::timestamp::parse_timestamp;

/// Load a processed dataset (integrated IMS spectra) from a file.
/// Dispatch by extension.
///
/// Supported formats, all written by [`super::writer::write_dataset`]:
/// * `.parquet` – `x` and `y` list columns plus one column per metadata key
/// * `.json`    – `[{ "x": [...], "y": [...], ...meta }, ...]`
/// * `.csv`     – columns `x` and `y` containing semicolon-separated floats
///
/// Pandas/Polars exports with the same layout load as well.
pub fn load_file(path: &Path) -> Result<SpectralDataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let spectra = match ext.as_str() {
        "parquet" | "pq" => load_parquet(path)?,
        "json" => load_json(path)?,
        "csv" => load_csv(path)?,
        other => bail!("Unsupported file extension: .{other}"),
    };
    log::debug!("{}: {} spectra", path.display(), spectra.len());
    Ok(SpectralDataset::from_spectra(spectra))
}

fn spectrum(
    row: usize,
    x: Vec<f64>,
    y: Vec<f64>,
    metadata: BTreeMap<String, MetadataValue>,
) -> Result<Spectrum> {
    if x.len() != y.len() {
        bail!("Row {row}: x has {} values but y has {}", x.len(), y.len());
    }
    Ok(Spectrum { x, y, metadata })
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct JsonRecord {
    x: Vec<f64>,
    y: Vec<f64>,
    #[serde(flatten)]
    metadata: BTreeMap<String, JsonValue>,
}

fn load_json(path: &Path) -> Result<Vec<Spectrum>> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let records: Vec<JsonRecord> =
        serde_json::from_str(&text).context("parsing JSON: expected an array of records")?;

    records
        .into_iter()
        .enumerate()
        .map(|(row, rec)| {
            let metadata = rec
                .metadata
                .iter()
                .map(|(k, v)| (k.clone(), json_to_metadata(v)))
                .collect();
            spectrum(row, rec.x, rec.y, metadata)
        })
        .collect()
}

fn json_to_metadata(val: &JsonValue) -> MetadataValue {
    match val {
        JsonValue::Null => MetadataValue::Null,
        JsonValue::Bool(b) => MetadataValue::Bool(*b),
        JsonValue::String(s) => text_to_metadata(s),
        JsonValue::Number(n) => n
            .as_i64()
            .map(MetadataValue::Integer)
            .or_else(|| n.as_f64().map(MetadataValue::Float))
            .unwrap_or_else(|| MetadataValue::String(n.to_string())),
        nested => MetadataValue::String(nested.to_string()),
    }
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

fn load_csv(path: &Path) -> Result<Vec<Spectrum>> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers = reader.headers().context("reading CSV headers")?.clone();
    for required in ["x", "y"] {
        if !headers.iter().any(|h| h == required) {
            bail!("CSV missing '{required}' column");
        }
    }

    let mut spectra = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("CSV row {row}"))?;
        let mut x = Vec::new();
        let mut y = Vec::new();
        let mut metadata = BTreeMap::new();
        for (name, cell) in headers.iter().zip(record.iter()) {
            match name {
                "x" => x = parse_semicolon_floats(cell, row, name)?,
                "y" => y = parse_semicolon_floats(cell, row, name)?,
                _ => {
                    metadata.insert(name.to_string(), guess_metadata_type(cell));
                }
            }
        }
        spectra.push(spectrum(row, x, y, metadata)?);
    }
    Ok(spectra)
}

fn parse_semicolon_floats(s: &str, row: usize, col: &str) -> Result<Vec<f64>> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(Vec::new());
    }
    s.split(';')
        .enumerate()
        .map(|(j, tok)| {
            tok.trim()
                .parse::<f64>()
                .with_context(|| format!("Row {row}, {col}[{j}]: '{tok}' is not a number"))
        })
        .collect()
}

/// Infer the type of a text cell: integer, float, bool, timestamp or text.
pub(crate) fn guess_metadata_type(s: &str) -> MetadataValue {
    if s.is_empty() {
        MetadataValue::Null
    } else if let Ok(i) = s.parse::<i64>() {
        MetadataValue::Integer(i)
    } else if let Ok(f) = s.parse::<f64>() {
        MetadataValue::Float(f)
    } else if let Ok(b) = s.parse::<bool>() {
        MetadataValue::Bool(b)
    } else {
        text_to_metadata(s)
    }
}

/// Text that reads as a timestamp becomes a `Date`, anything else a `String`.
fn text_to_metadata(s: &str) -> MetadataValue {
    match parse_timestamp(s) {
        Some(t) => MetadataValue::from_timestamp(t),
        None => MetadataValue::String(s.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet
// ---------------------------------------------------------------------------

fn load_parquet(path: &Path) -> Result<Vec<Spectrum>> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?
        .build()
        .context("building parquet reader")?;

    let mut spectra = Vec::new();
    for batch in reader {
        let batch = batch.context("reading parquet record batch")?;
        spectra.extend(batch_to_spectra(&batch, spectra.len())?);
    }
    Ok(spectra)
}

/// Decode one record batch; `first_row` keeps row numbers in errors global.
fn batch_to_spectra(batch: &RecordBatch, first_row: usize) -> Result<Vec<Spectrum>> {
    let column = |name: &str| {
        batch
            .column_by_name(name)
            .with_context(|| format!("Parquet file missing '{name}' column"))
    };
    let xs = column("x")?;
    let ys = column("y")?;

    let schema = batch.schema();
    let meta_cols: Vec<(&String, &ArrayRef)> = schema
        .fields()
        .iter()
        .zip(batch.columns())
        .filter(|(f, _)| f.name() != "x" && f.name() != "y")
        .map(|(f, col)| (f.name(), col))
        .collect();

    (0..batch.num_rows())
        .map(|i| {
            let row = first_row + i;
            let x = list_values(xs, i).with_context(|| format!("Row {row}: failed to read 'x'"))?;
            let y = list_values(ys, i).with_context(|| format!("Row {row}: failed to read 'y'"))?;
            let metadata = meta_cols
                .iter()
                .map(|(name, col)| ((*name).clone(), cell_value(col, i)))
                .collect();
            spectrum(row, x, y, metadata)
        })
        .collect()
}

/// Float values of a List / LargeList cell; nulls inside the list become NaN.
fn list_values(col: &ArrayRef, row: usize) -> Result<Vec<f64>> {
    if col.is_null(row) {
        bail!("null value in list column");
    }
    let values = match col.data_type() {
        DataType::List(_) => col.as_list::<i32>().value(row),
        DataType::LargeList(_) => col.as_list::<i64>().value(row),
        other => bail!("Expected List or LargeList column, got {other:?}"),
    };
    match values.data_type() {
        DataType::Float64 => Ok(values
            .as_primitive::<Float64Type>()
            .iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect()),
        DataType::Float32 => Ok(values
            .as_primitive::<Float32Type>()
            .iter()
            .map(|v| v.map_or(f64::NAN, f64::from))
            .collect()),
        other => bail!("List inner type is {other:?}, expected Float64 or Float32"),
    }
}

/// One metadata cell. Arrow timestamps and dates become `Date` values.
fn cell_value(col: &ArrayRef, row: usize) -> MetadataValue {
    if col.is_null(row) {
        return MetadataValue::Null;
    }
    let date = |t: Option<NaiveDateTime>| t.map_or(MetadataValue::Null, MetadataValue::from_timestamp);
    match col.data_type() {
        DataType::Utf8 => text_to_metadata(col.as_string::<i32>().value(row)),
        DataType::LargeUtf8 => text_to_metadata(col.as_string::<i64>().value(row)),
        DataType::Int32 => {
            MetadataValue::Integer(col.as_primitive::<Int32Type>().value(row).into())
        }
        DataType::Int64 => MetadataValue::Integer(col.as_primitive::<Int64Type>().value(row)),
        DataType::Float32 => {
            MetadataValue::Float(col.as_primitive::<Float32Type>().value(row).into())
        }
        DataType::Float64 => MetadataValue::Float(col.as_primitive::<Float64Type>().value(row)),
        DataType::Boolean => MetadataValue::Bool(col.as_boolean().value(row)),
        DataType::Date32 => {
            let days = col.as_primitive::<Date32Type>().value(row);
            date(
                NaiveDate::from_num_days_from_ce_opt(days + UNIX_EPOCH_DAYS_FROM_CE)
                    .and_then(|d| d.and_hms_opt(0, 0, 0)),
            )
        }
        DataType::Timestamp(unit, _) => {
            let micros = match unit {
                TimeUnit::Second => col
                    .as_primitive::<TimestampSecondType>()
                    .value(row)
                    .checked_mul(1_000_000),
                TimeUnit::Millisecond => col
                    .as_primitive::<TimestampMillisecondType>()
                    .value(row)
                    .checked_mul(1_000),
                TimeUnit::Microsecond => {
                    Some(col.as_primitive::<TimestampMicrosecondType>().value(row))
                }
                TimeUnit::Nanosecond => {
                    Some(col.as_primitive::<TimestampNanosecondType>().value(row) / 1_000)
                }
            };
            date(micros.and_then(DateTime::from_timestamp_micros).map(|t| t.naive_utc()))
        }
        other => MetadataValue::String(format!("{other:?}")),
    }
}

/// Days from 0001-01-01 to 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{
        Date32Array, Float32Builder, Int32Array, LargeListBuilder, StringArray,
        TimestampMillisecondArray,
    };
    use arrow::datatypes::{Field, Schema};
    use parquet::arrow::ArrowWriter;

    use super::*;

    #[test]
    fn test_guess_metadata_type() {
        assert_eq!(guess_metadata_type(""), MetadataValue::Null);
        assert_eq!(guess_metadata_type("42"), MetadataValue::Integer(42));
        assert_eq!(guess_metadata_type("1.5"), MetadataValue::Float(1.5));
        assert_eq!(guess_metadata_type("true"), MetadataValue::Bool(true));
        assert_eq!(
            guess_metadata_type("2021-03-01 08:15:30"),
            MetadataValue::Date("2021-03-01T08:15:30".into())
        );
        assert_eq!(
            guess_metadata_type("fermenter 2"),
            MetadataValue::String("fermenter 2".into())
        );
    }

    #[test]
    fn test_json_metadata_types() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("d.json");
        std::fs::write(
            &path,
            r#"[{"x":[1,2],"y":[3,4],"run":7,"note":{"a":1},"ok":null,
                "timestamp":"2021-03-01T08:00:00"}]"#,
        )
        .unwrap();
        let ds = load_file(&path).unwrap();
        let meta = &ds.spectra[0].metadata;
        assert_eq!(ds.spectra[0].x, vec![1.0, 2.0]);
        assert_eq!(meta["run"], MetadataValue::Integer(7));
        assert_eq!(meta["note"], MetadataValue::String(r#"{"a":1}"#.into()));
        assert_eq!(meta["ok"], MetadataValue::Null);
        assert!(ds.spectra[0].timestamp().is_some());
    }

    #[test]
    fn test_length_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "x,y,run\n1;2;3,1;2,a\n").unwrap();
        let err = load_file(&path).unwrap_err();
        assert!(err.to_string().contains("x has 3 values but y has 2"));

        let path = dir.path().join("noy.csv");
        std::fs::write(&path, "x,run\n1;2,a\n").unwrap();
        assert!(load_file(&path).is_err());
    }

    #[test]
    fn test_parquet_foreign_types() {
        // float32 large lists, int32, arrow dates and timestamps
        let mut xs = LargeListBuilder::new(Float32Builder::new());
        let mut ys = LargeListBuilder::new(Float32Builder::new());
        for _ in 0..2 {
            xs.values().append_slice(&[5.0, 5.5]);
            xs.append(true);
            ys.values().append_slice(&[0.5, 1.5]);
            ys.append(true);
        }
        let item = Arc::new(Field::new("item", DataType::Float32, true));
        let schema = Arc::new(Schema::new(vec![
            Field::new("x", DataType::LargeList(item.clone()), false),
            Field::new("y", DataType::LargeList(item), false),
            Field::new("run", DataType::Int32, false),
            Field::new("day", DataType::Date32, true),
            Field::new("measured", DataType::Timestamp(TimeUnit::Millisecond, None), true),
            Field::new("note", DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(xs.finish()),
                Arc::new(ys.finish()),
                Arc::new(Int32Array::from(vec![1, 2])),
                Arc::new(Date32Array::from(vec![Some(18_687), None])),
                Arc::new(TimestampMillisecondArray::from(vec![Some(1_614_585_600_000), None])),
                Arc::new(StringArray::from(vec![Some("a"), None])),
            ],
        )
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foreign.parquet");
        let mut writer = ArrowWriter::try_new(std::fs::File::create(&path).unwrap(), schema, None)
            .unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let ds = load_file(&path).unwrap();
        assert_eq!(ds.len(), 2);
        let first = &ds.spectra[0];
        assert_eq!(first.x, vec![5.0, 5.5]);
        assert_eq!(first.metadata["run"], MetadataValue::Integer(1));
        assert_eq!(first.metadata["day"], MetadataValue::Date("2021-03-01T00:00:00".into()));
        assert_eq!(
            first.metadata["measured"],
            MetadataValue::Date("2021-03-01T08:00:00".into())
        );
        assert_eq!(ds.spectra[1].metadata["note"], MetadataValue::Null);
        assert_eq!(ds.spectra[1].metadata["day"], MetadataValue::Null);
    }
}
