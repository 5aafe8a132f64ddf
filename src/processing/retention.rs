use ndarray::Axis;

use crate::data::model::{Measurement, MeasurementSet};
use crate::error::ProcessingError;

/// Index of the axis value closest to `value`. On a tie the later index
/// wins, which on an ascending axis is the larger retention time.
pub fn nearest_index(axis: &[f64], value: f64) -> Option<usize> {
    if value.is_nan() {
        return None;
    }
    axis.iter()
        .enumerate()
        .filter(|(_, a)| !a.is_nan())
        .fold(None, |best: Option<(usize, f64)>, (i, &a)| {
            let diff = (a - value).abs();
            match best {
                Some((_, d)) if d < diff => best,
                _ => Some((i, diff)),
            }
        })
        .map(|(i, _)| i)
}

/// Keep the rows nearest each wanted retention time, in the given order.
pub fn filter_measurement(
    measurement: &Measurement,
    wanted: &[f64],
) -> Result<Measurement, ProcessingError> {
    if wanted.is_empty() {
        return Err(ProcessingError::EmptyAxis("retention time selection"));
    }
    let rows = wanted
        .iter()
        .map(|&rt| {
            nearest_index(&measurement.retention_times, rt)
                .ok_or(ProcessingError::EmptyAxis("retention times"))
        })
        .collect::<Result<Vec<usize>, _>>()?;

    let mut filtered = Measurement::new(
        measurement.timestamp,
        measurement.source.clone(),
        rows.iter().map(|&r| measurement.retention_times[r]).collect(),
        measurement.drift_times.clone(),
        measurement.values.select(Axis(0), &rows),
    )?;
    filtered.attributes = measurement.attributes.clone();
    Ok(filtered)
}

/// Apply [`filter_measurement`] to every measurement of the set.
pub fn filter_retention_times(
    set: &MeasurementSet,
    wanted: &[f64],
) -> Result<MeasurementSet, ProcessingError> {
    let mut filtered = MeasurementSet::new();
    for (_, m) in set.iter() {
        filtered.insert(filter_measurement(m, wanted)?);
    }
    Ok(filtered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::timestamp::parse_timestamp;
    use ndarray::array;
    use std::path::PathBuf;

    fn measurement() -> Measurement {
        Measurement::new(
            parse_timestamp("2021-03-01 08:00:00").unwrap(),
            PathBuf::from("m.csv"),
            vec![0.0, 1.0, 2.0, 3.0],
            vec![10.0, 20.0],
            array![[0.0, 0.5], [1.0, 1.5], [2.0, 2.5], [3.0, 3.5]],
        )
        .unwrap()
    }

    #[test]
    fn nearest_index_prefers_later_row_on_tie() {
        assert_eq!(nearest_index(&[0.0, 1.0, 2.0], 0.5), Some(1));
        assert_eq!(nearest_index(&[0.0, 1.0, 2.0], 1.5), Some(2));
        assert_eq!(nearest_index(&[2.0, 1.0, 0.0], 0.5), Some(2));
        assert_eq!(nearest_index(&[0.0, 1.0, 2.0], 0.4), Some(0));
        assert_eq!(nearest_index(&[0.0, 1.0, 2.0], 1.6), Some(2));
        assert_eq!(nearest_index(&[0.0, 1.0, 2.0], -4.0), Some(0));
        assert_eq!(nearest_index(&[], 1.0), None);
        assert_eq!(nearest_index(&[1.0], f64::NAN), None);
    }

    #[test]
    fn keeps_requested_rows_in_order() {
        let m = filter_measurement(&measurement(), &[2.9, 0.2]).unwrap();
        assert_eq!(m.retention_times, vec![3.0, 0.0]);
        assert_eq!(m.values, array![[3.0, 3.5], [0.0, 0.5]]);
        assert_eq!(m.drift_times, vec![10.0, 20.0]);
    }

    #[test]
    fn halfway_retention_time_takes_the_later_row() {
        let m = filter_measurement(&measurement(), &[1.5]).unwrap();
        assert_eq!(m.retention_times, vec![2.0]);
        assert_eq!(m.values, array![[2.0, 2.5]]);
    }

    #[test]
    fn duplicate_matches_are_kept() {
        let m = filter_measurement(&measurement(), &[1.1, 0.9]).unwrap();
        assert_eq!(m.retention_times, vec![1.0, 1.0]);
    }

    #[test]
    fn empty_selection_is_an_error() {
        assert!(filter_measurement(&measurement(), &[]).is_err());
    }

    #[test]
    fn filters_every_measurement_in_set() {
        let mut set = MeasurementSet::new();
        set.insert(measurement());
        let filtered = filter_retention_times(&set, &[2.0]).unwrap();
        assert_eq!(filtered.len(), 1);
        let (_, m) = filtered.iter().next().unwrap();
        assert_eq!(m.n_rows(), 1);
    }
}
