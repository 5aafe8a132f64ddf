use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDateTime;
use ndarray::{s, Array2, ArrayView1};

use crate::error::ProcessingError;

/// Format used when a timestamp is stored as a `MetadataValue::Date`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

// ---------------------------------------------------------------------------
// MetadataValue – a single cell in a metadata column
// ---------------------------------------------------------------------------

/// A dynamically-typed metadata value (timestamps, HPLC concentrations,
/// peak areas, free-form experiment annotations).
///
/// Values are keys of the filter and colour maps, so they are totally
/// ordered: first by kind (null < bool < integer < float < text < date),
/// then by value. Floats compare with `total_cmp`, which makes `NaN` equal
/// to itself.
#[derive(Debug, Clone)]
pub enum MetadataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    /// ISO-8601 date-time string, see [`TIMESTAMP_FORMAT`].
    Date(String),
    Null,
}

impl MetadataValue {
    fn rank(&self) -> u8 {
        match self {
            MetadataValue::Null => 0,
            MetadataValue::Bool(_) => 1,
            MetadataValue::Integer(_) => 2,
            MetadataValue::Float(_) => 3,
            MetadataValue::String(_) => 4,
            MetadataValue::Date(_) => 5,
        }
    }
}

impl Ord for MetadataValue {
    fn cmp(&self, other: &Self) -> Ordering {
        use MetadataValue::*;
        match (self, other) {
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) | (Date(a), Date(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for MetadataValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for MetadataValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MetadataValue {}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::String(s) => write!(f, "{s}"),
            MetadataValue::Integer(i) => write!(f, "{i}"),
            MetadataValue::Float(v) => write!(f, "{v:.4}"),
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::Date(d) => write!(f, "{d}"),
            MetadataValue::Null => write!(f, "<null>"),
        }
    }
}

impl MetadataValue {
    /// Try to interpret the value as an `f64` for numeric colour mapping.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Float(v) => Some(*v),
            MetadataValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn from_timestamp(t: NaiveDateTime) -> Self {
        MetadataValue::Date(t.format(TIMESTAMP_FORMAT).to_string())
    }

    /// Parse a `Date` value back into a timestamp.
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            MetadataValue::Date(s) => NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).ok(),
            _ => None,
        }
    }

    /// Plain text form used by the CSV writer; `Null` becomes an empty cell.
    /// Floats always carry a decimal point so they reload as floats.
    pub fn to_cell(&self) -> String {
        match self {
            MetadataValue::Null => String::new(),
            MetadataValue::Float(v) => format!("{v:?}"),
            other => other.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Spectrum – one integrated IMS spectrum
// ---------------------------------------------------------------------------

/// A single 1D spectrum, usually the integral of one measurement over its
/// retention times.
#[derive(Debug, Clone)]
pub struct Spectrum {
    /// Drift time axis (x).
    pub x: Vec<f64>,
    /// Intensity axis (y) – same length as `x`.
    pub y: Vec<f64>,
    /// Dynamic metadata columns: column_name → value.
    pub metadata: BTreeMap<String, MetadataValue>,
}

impl Spectrum {
    /// Measurement timestamp, if the spectrum carries one.
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        self.metadata.get("timestamp").and_then(MetadataValue::as_timestamp)
    }
}

// ---------------------------------------------------------------------------
// SpectralDataset – the complete loaded dataset
// ---------------------------------------------------------------------------

/// A collection of spectra with pre-computed column indices.
#[derive(Debug, Clone)]
pub struct SpectralDataset {
    /// All spectra (rows).
    pub spectra: Vec<Spectrum>,
    /// Ordered list of metadata column names (excludes x, y).
    pub column_names: Vec<String>,
    /// For each metadata column the sorted set of unique values.
    pub unique_values: BTreeMap<String, BTreeSet<MetadataValue>>,
}

impl SpectralDataset {
    /// Build column indices from the spectra.
    pub fn from_spectra(spectra: Vec<Spectrum>) -> Self {
        let mut column_names_set: BTreeSet<String> = BTreeSet::new();
        let mut unique_values: BTreeMap<String, BTreeSet<MetadataValue>> = BTreeMap::new();

        for sp in &spectra {
            for (col, val) in &sp.metadata {
                column_names_set.insert(col.clone());
                unique_values
                    .entry(col.clone())
                    .or_default()
                    .insert(val.clone());
            }
        }
        let column_names: Vec<String> = column_names_set.into_iter().collect();
        SpectralDataset {
            spectra,
            column_names,
            unique_values,
        }
    }

    /// Number of spectra.
    pub fn len(&self) -> usize {
        self.spectra.len()
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.spectra.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Measurement – one 2D IMS measurement (retention time × drift time)
// ---------------------------------------------------------------------------

/// A single IMS measurement as read from disk.
#[derive(Debug, Clone)]
pub struct Measurement {
    pub timestamp: NaiveDateTime,
    pub source: PathBuf,
    /// Row axis.
    pub retention_times: Vec<f64>,
    /// Column axis.
    pub drift_times: Vec<f64>,
    /// Intensities, shape `(retention_times.len(), drift_times.len())`.
    pub values: Array2<f64>,
    /// Free-form attributes from the file header.
    pub attributes: BTreeMap<String, String>,
}

impl Measurement {
    /// Build a measurement, checking that `values` matches both axes.
    pub fn new(
        timestamp: NaiveDateTime,
        source: PathBuf,
        retention_times: Vec<f64>,
        drift_times: Vec<f64>,
        values: Array2<f64>,
    ) -> Result<Self, ProcessingError> {
        let (rows, cols) = values.dim();
        if rows != retention_times.len() {
            return Err(ProcessingError::ShapeMismatch {
                what: "rows",
                expected: retention_times.len(),
                got: rows,
            });
        }
        if cols != drift_times.len() {
            return Err(ProcessingError::ShapeMismatch {
                what: "columns",
                expected: drift_times.len(),
                got: cols,
            });
        }
        Ok(Self {
            timestamp,
            source,
            retention_times,
            drift_times,
            values,
            attributes: BTreeMap::new(),
        })
    }

    /// Like [`Measurement::new`] for row-major intensities as they are read
    /// from a file.
    pub fn from_row_major(
        timestamp: NaiveDateTime,
        source: PathBuf,
        retention_times: Vec<f64>,
        drift_times: Vec<f64>,
        values: Vec<f64>,
    ) -> Result<Self, ProcessingError> {
        let grid = Array2::from_shape_vec((retention_times.len(), drift_times.len()), values)?;
        Self::new(timestamp, source, retention_times, drift_times, grid)
    }

    /// Keep every `stride`-th retention time and drift time together with
    /// the matching values.
    pub fn downsample(&self, stride: usize) -> Result<Self, ProcessingError> {
        if stride == 0 {
            return Err(ProcessingError::InvalidStride(stride));
        }
        if stride == 1 {
            return Ok(self.clone());
        }
        let step = stride as isize;
        Ok(Self {
            timestamp: self.timestamp,
            source: self.source.clone(),
            retention_times: self.retention_times.iter().step_by(stride).copied().collect(),
            drift_times: self.drift_times.iter().step_by(stride).copied().collect(),
            values: self.values.slice(s![..;step, ..;step]).to_owned(),
            attributes: self.attributes.clone(),
        })
    }

    /// Values of one drift-time column across all retention times.
    pub fn column(&self, index: usize) -> ArrayView1<'_, f64> {
        self.values.column(index)
    }

    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_cols(&self) -> usize {
        self.values.ncols()
    }
}

/// Measurements keyed (and ordered) by timestamp.
#[derive(Debug, Clone, Default)]
pub struct MeasurementSet {
    pub measurements: BTreeMap<NaiveDateTime, Measurement>,
}

impl MeasurementSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a measurement; a previous one with the same timestamp is replaced.
    pub fn insert(&mut self, measurement: Measurement) {
        let t = measurement.timestamp;
        if let Some(previous) = self.measurements.insert(t, measurement) {
            log::warn!(
                "Measurement {} replaced {} (same timestamp {t})",
                self.measurements[&t].source.display(),
                previous.source.display()
            );
        }
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NaiveDateTime, &Measurement)> {
        self.measurements.iter()
    }
}
