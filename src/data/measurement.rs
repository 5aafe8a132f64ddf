use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, bail};

use super::discovery::DiscoveredFile;
use super::model::{Measurement, MeasurementSet};
use super::timestamp::{parse_timestamp, timestamp_from_file_name};

/// Reads one measurement file into a [`Measurement`].
///
/// Instrument-native formats (e.g. `.mea`) plug in here; the crate itself
/// only ships [`MatrixCsvReader`].
pub trait MeasurementReader {
    fn read(&self, path: &Path) -> Result<Measurement>;
}

// ---------------------------------------------------------------------------
// Matrix CSV reader
// ---------------------------------------------------------------------------

/// Reads the exported matrix layout:
///
/// ```text
/// # Timestamp: 2021-03-01T08:15:30
/// # Operator: lab-3
/// ret_time,5.01,5.02,5.03
/// 0.5,12.0,13.5,11.9
/// 1.0,12.2,40.1,12.4
/// ```
///
/// Header comment lines become attributes. The `Timestamp` attribute wins
/// over the timestamp in the file name.
#[derive(Debug, Clone)]
pub struct MatrixCsvReader {
    pub delimiter: u8,
}

impl Default for MatrixCsvReader {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

impl MeasurementReader for MatrixCsvReader {
    fn read(&self, path: &Path) -> Result<Measurement> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading measurement {}", path.display()))?;
        self.parse(&text, path)
            .with_context(|| format!("parsing measurement {}", path.display()))
    }
}

impl MatrixCsvReader {
    fn parse(&self, text: &str, path: &Path) -> Result<Measurement> {
        let mut attributes = BTreeMap::new();
        let mut body_start = 0;
        for line in text.split_inclusive('\n') {
            let Some(comment) = line.trim_start().strip_prefix('#') else {
                break;
            };
            if let Some((key, value)) = comment.split_once(':') {
                attributes.insert(key.trim().to_string(), value.trim().to_string());
            }
            body_start += line.len();
        }
        let body = text.get(body_start..).unwrap_or("");

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(body.as_bytes());

        let headers = reader.headers().context("reading header row")?.clone();
        if headers.len() < 2 {
            bail!("header row needs a label and at least one drift time");
        }
        let drift_times = headers
            .iter()
            .skip(1)
            .enumerate()
            .map(|(j, h)| {
                h.parse::<f64>()
                    .with_context(|| format!("drift time column {j}: '{h}' is not a number"))
            })
            .collect::<Result<Vec<f64>>>()?;

        let mut retention_times = Vec::new();
        let mut values = Vec::with_capacity(drift_times.len());
        for (row_no, result) in reader.records().enumerate() {
            let record = result.with_context(|| format!("row {row_no}"))?;
            let mut cells = record.iter().enumerate().map(|(col, cell)| {
                cell.parse::<f64>()
                    .with_context(|| format!("row {row_no}, column {col}: '{cell}' is not a number"))
            });
            let Some(rt) = cells.next() else {
                continue;
            };
            retention_times.push(rt?);
            for cell in cells {
                values.push(cell?);
            }
        }
        if retention_times.is_empty() {
            bail!("no data rows");
        }

        let timestamp = match attributes.get("Timestamp") {
            Some(raw) => parse_timestamp(raw)
                .with_context(|| format!("unreadable Timestamp attribute '{raw}'"))?,
            None => path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(timestamp_from_file_name)
                .context("no Timestamp attribute and no timestamp in file name")?,
        };

        let mut measurement = Measurement::from_row_major(
            timestamp,
            path.to_path_buf(),
            retention_times,
            drift_times,
            values,
        )?;
        measurement.attributes = attributes;
        Ok(measurement)
    }
}

/// Read all files, apply the value stride and key the result by timestamp.
pub fn load_measurements(
    files: &[DiscoveredFile],
    reader: &dyn MeasurementReader,
    value_stride: usize,
) -> Result<MeasurementSet> {
    let mut set = MeasurementSet::new();
    for file in files {
        log::info!("Reading file {}", file.path.display());
        let measurement = reader.read(&file.path)?.downsample(value_stride)?;
        set.insert(measurement);
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::timestamp::parse_timestamp;
    use ndarray::array;
    use std::path::PathBuf;

    const MATRIX: &str = "# Timestamp: 2021-03-01T08:15:30\n\
                          # Operator: lab-3\n\
                          ret_time,5.0,5.5,6.0\n\
                          0.5,1.0,2.0,3.0\n\
                          1.0,4.0,5.0,6.0\n";

    #[test]
    fn parses_attributes_axes_and_values() {
        let m = MatrixCsvReader::default()
            .parse(MATRIX, Path::new("x.csv"))
            .unwrap();
        assert_eq!(m.timestamp, parse_timestamp("2021-03-01 08:15:30").unwrap());
        assert_eq!(m.attributes["Operator"], "lab-3");
        assert_eq!(m.drift_times, vec![5.0, 5.5, 6.0]);
        assert_eq!(m.retention_times, vec![0.5, 1.0]);
        assert_eq!(m.values.row(1), array![4.0, 5.0, 6.0]);
    }

    #[test]
    fn falls_back_to_file_name_timestamp() {
        let m = MatrixCsvReader::default()
            .parse("ret_time,1.0\n0.0,2.0\n", Path::new("ims_210302_101010.csv"))
            .unwrap();
        assert_eq!(m.timestamp, parse_timestamp("2021-03-02 10:10:10").unwrap());
    }

    #[test]
    fn rejects_missing_timestamp() {
        let err = MatrixCsvReader::default()
            .parse("ret_time,1.0\n0.0,2.0\n", Path::new("blank.csv"))
            .unwrap_err();
        assert!(format!("{err:#}").contains("no Timestamp"));
    }

    #[test]
    fn rejects_non_numeric_cells() {
        let err = MatrixCsvReader::default()
            .parse("ret_time,1.0\n0.0,abc\n", Path::new("210302_101010.csv"))
            .unwrap_err();
        assert!(format!("{err:#}").contains("'abc' is not a number"));
    }

    #[test]
    fn rejects_empty_body() {
        assert!(MatrixCsvReader::default()
            .parse("ret_time,1.0\n", Path::new("210302_101010.csv"))
            .is_err());
    }

    #[test]
    fn semicolon_delimited_export() {
        let reader = MatrixCsvReader { delimiter: b';' };
        let m = reader
            .parse("rt;1.0;2.0\n0.0;3.0;4.0\n", Path::new("210302_101010.csv"))
            .unwrap();
        assert_eq!(m.values, array![[3.0, 4.0]]);
    }

    #[test]
    fn load_applies_value_stride() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("210301_081530.csv");
        std::fs::write(&path, MATRIX).unwrap();
        let files = vec![DiscoveredFile {
            path: PathBuf::from(&path),
            timestamp: parse_timestamp("2021-03-01 08:15:30").unwrap(),
        }];
        let set = load_measurements(&files, &MatrixCsvReader::default(), 2).unwrap();
        let (_, m) = set.iter().next().unwrap();
        assert_eq!(m.drift_times, vec![5.0, 6.0]);
        assert_eq!(m.values, array![[1.0, 3.0]]);
    }
}
