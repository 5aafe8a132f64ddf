use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{
    ArrayRef, BooleanBuilder, Float64Builder, Int64Builder, ListBuilder, StringBuilder,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDateTime;
use parquet::arrow::ArrowWriter;
use serde_json::{Map, Value as JsonValue};

use super::model::{MetadataValue, SpectralDataset};
use crate::processing::peaks::PeakArea;

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Write a dataset in the format matching the file extension, readable by
/// [`super::loader::load_file`].
pub fn write_dataset(dataset: &SpectralDataset, path: &Path) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "parquet" | "pq" => write_parquet(dataset, path),
        "json" => write_json(dataset, path),
        "csv" => write_csv(dataset, path),
        other => bail!("Unsupported output extension: .{other}"),
    }
    .with_context(|| format!("writing {}", path.display()))
}

// ---------------------------------------------------------------------------
// Parquet
// ---------------------------------------------------------------------------

/// Arrow type used for a metadata column.
#[derive(Debug, Clone, Copy, PartialEq)]
enum ColumnKind {
    Int,
    Float,
    Bool,
    Text,
}

fn column_kind(dataset: &SpectralDataset, column: &str) -> ColumnKind {
    let mut kind: Option<ColumnKind> = None;
    for sp in &dataset.spectra {
        let this = match sp.metadata.get(column) {
            None | Some(MetadataValue::Null) => continue,
            Some(MetadataValue::Integer(_)) => ColumnKind::Int,
            Some(MetadataValue::Float(_)) => ColumnKind::Float,
            Some(MetadataValue::Bool(_)) => ColumnKind::Bool,
            Some(_) => ColumnKind::Text,
        };
        kind = Some(match (kind, this) {
            (None, k) => k,
            (Some(a), b) if a == b => a,
            (Some(ColumnKind::Int), ColumnKind::Float) | (Some(ColumnKind::Float), ColumnKind::Int) => {
                ColumnKind::Float
            }
            _ => ColumnKind::Text,
        });
    }
    kind.unwrap_or(ColumnKind::Text)
}

fn list_array(rows: impl Iterator<Item = Vec<f64>>) -> ArrayRef {
    let mut builder = ListBuilder::new(Float64Builder::new());
    for row in rows {
        builder.values().append_slice(&row);
        builder.append(true);
    }
    Arc::new(builder.finish())
}

fn metadata_array(dataset: &SpectralDataset, column: &str, kind: ColumnKind) -> ArrayRef {
    let values = dataset.spectra.iter().map(|sp| sp.metadata.get(column));
    match kind {
        ColumnKind::Int => {
            let mut b = Int64Builder::new();
            for v in values {
                match v {
                    Some(MetadataValue::Integer(i)) => b.append_value(*i),
                    _ => b.append_null(),
                }
            }
            Arc::new(b.finish())
        }
        ColumnKind::Float => {
            let mut b = Float64Builder::new();
            for v in values {
                b.append_option(v.and_then(MetadataValue::as_f64));
            }
            Arc::new(b.finish())
        }
        ColumnKind::Bool => {
            let mut b = BooleanBuilder::new();
            for v in values {
                match v {
                    Some(MetadataValue::Bool(x)) => b.append_value(*x),
                    _ => b.append_null(),
                }
            }
            Arc::new(b.finish())
        }
        ColumnKind::Text => {
            let mut b = StringBuilder::new();
            for v in values {
                match v {
                    None | Some(MetadataValue::Null) => b.append_null(),
                    Some(other) => b.append_value(other.to_cell()),
                }
            }
            Arc::new(b.finish())
        }
    }
}

fn write_parquet(dataset: &SpectralDataset, path: &Path) -> Result<()> {
    let list_type = DataType::List(Arc::new(Field::new("item", DataType::Float64, true)));
    let mut fields = vec![
        Field::new("x", list_type.clone(), false),
        Field::new("y", list_type, false),
    ];
    let mut columns = vec![
        list_array(dataset.spectra.iter().map(|sp| sp.x.clone())),
        list_array(dataset.spectra.iter().map(|sp| sp.y.clone())),
    ];

    for name in &dataset.column_names {
        let kind = column_kind(dataset, name);
        let data_type = match kind {
            ColumnKind::Int => DataType::Int64,
            ColumnKind::Float => DataType::Float64,
            ColumnKind::Bool => DataType::Boolean,
            ColumnKind::Text => DataType::Utf8,
        };
        fields.push(Field::new(name, data_type, true));
        columns.push(metadata_array(dataset, name, kind));
    }

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), columns).context("building record batch")?;

    let file = std::fs::File::create(path).context("creating parquet file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing record batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// JSON / CSV
// ---------------------------------------------------------------------------

fn metadata_to_json(value: &MetadataValue) -> JsonValue {
    match value {
        MetadataValue::String(s) | MetadataValue::Date(s) => JsonValue::String(s.clone()),
        MetadataValue::Integer(i) => JsonValue::from(*i),
        MetadataValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        MetadataValue::Bool(b) => JsonValue::Bool(*b),
        MetadataValue::Null => JsonValue::Null,
    }
}

fn write_json(dataset: &SpectralDataset, path: &Path) -> Result<()> {
    let records: Vec<JsonValue> = dataset
        .spectra
        .iter()
        .map(|sp| {
            let mut obj = Map::new();
            obj.insert("x".into(), JsonValue::from(sp.x.clone()));
            obj.insert("y".into(), JsonValue::from(sp.y.clone()));
            for (key, value) in &sp.metadata {
                obj.insert(key.clone(), metadata_to_json(value));
            }
            JsonValue::Object(obj)
        })
        .collect();

    let file = std::fs::File::create(path).context("creating JSON file")?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), &records)
        .context("serializing JSON")?;
    Ok(())
}

fn join_floats(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(";")
}

fn write_csv(dataset: &SpectralDataset, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).context("creating CSV file")?;

    let mut header = vec!["x".to_string(), "y".to_string()];
    header.extend(dataset.column_names.iter().cloned());
    writer.write_record(&header)?;

    for sp in &dataset.spectra {
        let mut record = vec![join_floats(&sp.x), join_floats(&sp.y)];
        for col in &dataset.column_names {
            record.push(sp.metadata.get(col).map(MetadataValue::to_cell).unwrap_or_default());
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Peak table
// ---------------------------------------------------------------------------

/// Peak areas of one spectrum together with its reference columns.
#[derive(Debug, Clone)]
pub struct PeakTableRow {
    pub timestamp: NaiveDateTime,
    pub areas: Vec<PeakArea>,
    /// Reference values (e.g. `hplc_ethanol`) copied from the spectrum.
    pub reference: Vec<(String, MetadataValue)>,
}

/// Long-format CSV: one line per spectrum and peak window.
pub fn write_peak_table(rows: &[PeakTableRow], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating peak table {}", path.display()))?;

    let reference_columns: Vec<String> = rows
        .first()
        .map(|r| r.reference.iter().map(|(k, _)| k.clone()).collect())
        .unwrap_or_default();
    let mut header: Vec<String> = ["timestamp", "peak", "position", "left", "right", "area"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    header.extend(reference_columns);
    writer.write_record(&header)?;

    for row in rows {
        let ts = MetadataValue::from_timestamp(row.timestamp).to_cell();
        for area in &row.areas {
            let mut record = vec![
                ts.clone(),
                area.window.clone(),
                format!("{:?}", area.position),
                format!("{:?}", area.left),
                format!("{:?}", area.right),
                format!("{:?}", area.area),
            ];
            record.extend(row.reference.iter().map(|(_, v)| v.to_cell()));
            writer.write_record(&record)?;
        }
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::load_file;
    use crate::data::model::Spectrum;
    use crate::data::timestamp::parse_timestamp;
    use std::collections::BTreeMap;

    fn dataset() -> SpectralDataset {
        let mk = |t: &str, ethanol: MetadataValue, y: Vec<f64>| {
            let mut metadata = BTreeMap::new();
            metadata.insert(
                "timestamp".to_string(),
                MetadataValue::from_timestamp(parse_timestamp(t).unwrap()),
            );
            metadata.insert("hplc_ethanol".to_string(), ethanol);
            metadata.insert("operator".to_string(), MetadataValue::String("lab-3".into()));
            Spectrum {
                x: vec![5.0, 5.5, 6.0],
                y,
                metadata,
            }
        };
        SpectralDataset::from_spectra(vec![
            mk("2021-03-01 08:00:00", MetadataValue::Float(1.5), vec![1.0, 2.0, 3.0]),
            mk("2021-03-01 09:00:00", MetadataValue::Integer(4), vec![0.5, 0.25, 0.0]),
            mk("2021-03-01 10:00:00", MetadataValue::Null, vec![0.0, 0.0, 1.0]),
        ])
    }

    fn check_reloaded(reloaded: &SpectralDataset) {
        assert_eq!(reloaded.len(), 3);
        assert_eq!(reloaded.spectra[1].y, vec![0.5, 0.25, 0.0]);
        assert_eq!(
            reloaded.spectra[0].timestamp(),
            parse_timestamp("2021-03-01 08:00:00")
        );
        assert_eq!(
            reloaded.spectra[1].metadata["hplc_ethanol"].as_f64(),
            Some(4.0)
        );
        assert_eq!(reloaded.spectra[2].metadata["hplc_ethanol"], MetadataValue::Null);
        assert_eq!(
            reloaded.spectra[0].metadata["operator"],
            MetadataValue::String("lab-3".into())
        );
    }

    #[test]
    fn parquet_reloads_through_viewer_loader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.parquet");
        write_dataset(&dataset(), &path).unwrap();
        check_reloaded(&load_file(&path).unwrap());
    }

    #[test]
    fn json_reloads_through_viewer_loader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        write_dataset(&dataset(), &path).unwrap();
        check_reloaded(&load_file(&path).unwrap());
    }

    #[test]
    fn csv_reloads_through_viewer_loader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        write_dataset(&dataset(), &path).unwrap();
        check_reloaded(&load_file(&path).unwrap());
    }

    #[test]
    fn csv_keeps_integral_floats_as_floats() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let mut metadata = BTreeMap::new();
        metadata.insert("hplc_ethanol".to_string(), MetadataValue::Float(4.0));
        metadata.insert("area_monomer".to_string(), MetadataValue::Float(0.0));
        metadata.insert("batch".to_string(), MetadataValue::Integer(4));
        let ds = SpectralDataset::from_spectra(vec![Spectrum {
            x: vec![5.0, 5.5],
            y: vec![1.0, 2.0],
            metadata,
        }]);
        write_dataset(&ds, &path).unwrap();

        let reloaded = load_file(&path).unwrap();
        let meta = &reloaded.spectra[0].metadata;
        assert!(matches!(meta["hplc_ethanol"], MetadataValue::Float(v) if v == 4.0));
        assert!(matches!(meta["area_monomer"], MetadataValue::Float(v) if v == 0.0));
        assert!(matches!(meta["batch"], MetadataValue::Integer(4)));
    }

    #[test]
    fn mixed_numeric_column_is_float() {
        assert_eq!(column_kind(&dataset(), "hplc_ethanol"), ColumnKind::Float);
        assert_eq!(column_kind(&dataset(), "operator"), ColumnKind::Text);
        assert_eq!(column_kind(&dataset(), "missing"), ColumnKind::Text);
    }

    #[test]
    fn unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        assert!(write_dataset(&dataset(), &dir.path().join("out.xlsx")).is_err());
    }

    #[test]
    fn peak_table_is_long_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("peaks.csv");
        let area = |name: &str, a: f64| PeakArea {
            window: name.into(),
            position: 7.0,
            left: 6.9,
            right: 7.1,
            area: a,
        };
        let rows = vec![PeakTableRow {
            timestamp: parse_timestamp("2021-03-01 08:00:00").unwrap(),
            areas: vec![area("monomer", 2.0), area("dimer", 0.5)],
            reference: vec![("hplc_ethanol".into(), MetadataValue::Float(1.5))],
        }];
        write_peak_table(&rows, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "timestamp,peak,position,left,right,area,hplc_ethanol");
        assert_eq!(lines[1], "2021-03-01T08:00:00,monomer,7.0,6.9,7.1,2.0,1.5");
        assert_eq!(lines.len(), 3);
    }
}
