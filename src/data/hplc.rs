use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDateTime};

use super::loader::guess_metadata_type;
use super::model::{MetadataValue, SpectralDataset};
use super::timestamp::parse_timestamp;

/// Timestamped reference table: "Offline" HPLC concentrations or any other
/// per-sample experiment metadata.
#[derive(Debug, Clone, Default)]
pub struct ReferenceTable {
    /// Value columns, in file order (the timestamp column excluded).
    pub columns: Vec<String>,
    /// Rows sorted by timestamp.
    pub rows: Vec<(NaiveDateTime, BTreeMap<String, MetadataValue>)>,
}

impl ReferenceTable {
    pub fn from_path(path: &Path, timestamp_column: &str) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("opening reference table {}", path.display()))?;
        Self::from_reader(file, timestamp_column)
            .with_context(|| format!("parsing reference table {}", path.display()))
    }

    pub fn from_reader<R: Read>(reader: R, timestamp_column: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers: Vec<String> = reader
            .headers()
            .context("reading CSV headers")?
            .iter()
            .map(|h| h.to_string())
            .collect();
        let ts_idx = headers
            .iter()
            .position(|h| h == timestamp_column)
            .with_context(|| format!("missing '{timestamp_column}' column"))?;

        let mut rows = Vec::new();
        for (row_no, result) in reader.records().enumerate() {
            let record = result.with_context(|| format!("CSV row {row_no}"))?;
            let raw = record.get(ts_idx).unwrap_or("");
            let timestamp = parse_timestamp(raw)
                .with_context(|| format!("row {row_no}: unreadable timestamp '{raw}'"))?;

            let values = record
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != ts_idx)
                .map(|(i, cell)| (headers[i].clone(), guess_metadata_type(cell)))
                .collect();
            rows.push((timestamp, values));
        }
        rows.sort_by_key(|(t, _)| *t);

        let columns = headers
            .into_iter()
            .enumerate()
            .filter(|(i, _)| *i != ts_idx)
            .map(|(_, h)| h)
            .collect();
        Ok(Self { columns, rows })
    }

    /// Row closest in time to `t`, if it lies within `tolerance`.
    pub fn nearest(
        &self,
        t: NaiveDateTime,
        tolerance: Duration,
    ) -> Option<&BTreeMap<String, MetadataValue>> {
        let split = self.rows.partition_point(|(rt, _)| *rt < t);
        let before = split.checked_sub(1).map(|i| &self.rows[i]);
        let after = self.rows.get(split);

        let best = match (before, after) {
            (Some(b), Some(a)) => {
                if t - b.0 <= a.0 - t {
                    b
                } else {
                    a
                }
            }
            (Some(b), None) => b,
            (None, Some(a)) => a,
            (None, None) => return None,
        };
        ((best.0 - t).abs() <= tolerance).then_some(&best.1)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Copy the nearest reference row into each spectrum's metadata as
/// `{prefix}{column}`. Spectra without a match get `Null` for every column.
/// Returns the number of matched spectra.
pub fn attach_reference(
    dataset: &mut SpectralDataset,
    table: &ReferenceTable,
    tolerance: Duration,
    prefix: &str,
) -> usize {
    let mut matched = 0;
    for sp in &mut dataset.spectra {
        let row = sp.timestamp().and_then(|t| table.nearest(t, tolerance));
        if row.is_some() {
            matched += 1;
        }
        for col in &table.columns {
            let value = row
                .and_then(|r| r.get(col))
                .cloned()
                .unwrap_or(MetadataValue::Null);
            sp.metadata.insert(format!("{prefix}{col}"), value);
        }
    }
    log::info!(
        "Matched {matched}/{} spectra to reference rows (tolerance {} min)",
        dataset.len(),
        tolerance.num_minutes()
    );
    let spectra = std::mem::take(&mut dataset.spectra);
    *dataset = SpectralDataset::from_spectra(spectra);
    matched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Spectrum;

    const HPLC: &str = "timestamp,ethanol,glucose\n\
                        2021-03-01 10:00:00,4.2,11.0\n\
                        2021-03-01 08:00:00,1.5,\n\
                        2021-03-01 12:00:00,8.0,3.5\n";

    fn spectrum_at(t: &str) -> Spectrum {
        let mut metadata = BTreeMap::new();
        metadata.insert(
            "timestamp".to_string(),
            MetadataValue::from_timestamp(parse_timestamp(t).unwrap()),
        );
        Spectrum {
            x: vec![1.0],
            y: vec![1.0],
            metadata,
        }
    }

    #[test]
    fn parses_and_sorts_rows() {
        let table = ReferenceTable::from_reader(HPLC.as_bytes(), "timestamp").unwrap();
        assert_eq!(table.columns, vec!["ethanol", "glucose"]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.rows[0].1["ethanol"], MetadataValue::Float(1.5));
        assert_eq!(table.rows[0].1["glucose"], MetadataValue::Null);
    }

    #[test]
    fn missing_timestamp_column() {
        let err = ReferenceTable::from_reader(HPLC.as_bytes(), "time").unwrap_err();
        assert!(format!("{err:#}").contains("missing 'time' column"));
    }

    #[test]
    fn nearest_respects_tolerance() {
        let table = ReferenceTable::from_reader(HPLC.as_bytes(), "timestamp").unwrap();
        let t = parse_timestamp("2021-03-01 10:20:00").unwrap();
        let row = table.nearest(t, Duration::minutes(30)).unwrap();
        assert_eq!(row["ethanol"], MetadataValue::Float(4.2));

        let t = parse_timestamp("2021-03-01 11:00:00").unwrap();
        assert!(table.nearest(t, Duration::minutes(30)).is_none());
        // equidistant → earlier sample
        let row = table.nearest(t, Duration::minutes(60)).unwrap();
        assert_eq!(row["ethanol"], MetadataValue::Float(4.2));
    }

    #[test]
    fn attach_prefixes_columns_and_nulls_unmatched() {
        let table = ReferenceTable::from_reader(HPLC.as_bytes(), "timestamp").unwrap();
        let mut ds = SpectralDataset::from_spectra(vec![
            spectrum_at("2021-03-01 08:05:00"),
            spectrum_at("2021-03-02 08:00:00"),
        ]);
        let matched = attach_reference(&mut ds, &table, Duration::minutes(30), "hplc_");
        assert_eq!(matched, 1);
        assert_eq!(ds.spectra[0].metadata["hplc_ethanol"], MetadataValue::Float(1.5));
        assert_eq!(ds.spectra[1].metadata["hplc_ethanol"], MetadataValue::Null);
        assert!(ds.column_names.contains(&"hplc_glucose".to_string()));
    }
}
