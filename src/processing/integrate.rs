use std::collections::BTreeMap;

use ndarray::Array1;

use crate::data::model::{Measurement, MeasurementSet, MetadataValue, SpectralDataset, Spectrum};

/// Trapezoidal rule over `(x, y)` samples. The sign follows the direction
/// of `x`, so a descending axis yields a negative area.
pub fn trapezoid(x: &[f64], y: &[f64]) -> f64 {
    if x.len() != y.len() || x.len() < 2 {
        return 0.0;
    }

    let mut area = 0.0;
    for i in 1..x.len() {
        let dx = x[i] - x[i - 1];
        area += dx * (y[i] + y[i - 1]) / 2.0;
    }
    area
}

/// Integrate every drift-time column over the retention-time axis. Same
/// rule as [`trapezoid`], applied to whole rows at once.
pub fn integrate_measurement(measurement: &Measurement) -> Spectrum {
    let rt = &measurement.retention_times;
    let values = &measurement.values;
    let mut y = Array1::<f64>::zeros(measurement.n_cols());
    for i in 1..measurement.n_rows() {
        let half_dx = (rt[i] - rt[i - 1]) / 2.0;
        y.scaled_add(half_dx, &values.row(i));
        y.scaled_add(half_dx, &values.row(i - 1));
    }

    let mut metadata = BTreeMap::new();
    metadata.insert(
        "timestamp".to_string(),
        MetadataValue::from_timestamp(measurement.timestamp),
    );
    metadata.insert(
        "source".to_string(),
        MetadataValue::String(measurement.source.display().to_string()),
    );

    Spectrum {
        x: measurement.drift_times.clone(),
        y: y.to_vec(),
        metadata,
    }
}

/// One integrated spectrum per measurement, in timestamp order.
pub fn integrate_set(set: &MeasurementSet) -> SpectralDataset {
    let spectra = set.iter().map(|(_, m)| integrate_measurement(m)).collect();
    SpectralDataset::from_spectra(spectra)
}

/// Area under `y` for the samples with `left <= x <= right`.
/// Missing bounds (NaN) mean no peak and give an area of 0.
pub fn integrate_peak(x: &[f64], y: &[f64], left: f64, right: f64) -> f64 {
    if left.is_nan() || right.is_nan() {
        return 0.0;
    }
    let (xs, ys): (Vec<f64>, Vec<f64>) = x
        .iter()
        .zip(y)
        .filter(|(xi, _)| **xi >= left && **xi <= right)
        .map(|(xi, yi)| (*xi, *yi))
        .unzip();
    trapezoid(&xs, &ys)
}
