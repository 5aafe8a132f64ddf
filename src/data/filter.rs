use std::collections::{BTreeMap, BTreeSet};

use super::model::{MetadataValue, SpectralDataset};

// ---------------------------------------------------------------------------
// Filter predicate: which unique values are selected per column
// ---------------------------------------------------------------------------

/// Per-column selection state: maps column_name → set of selected values
/// (e.g. measurement day, HPLC concentration).
/// An absent column means "no filter"; an empty set hides every spectrum.
pub type FilterState = BTreeMap<String, BTreeSet<MetadataValue>>;

/// Initialise a [`FilterState`] with every value selected.
pub fn init_filter_state(dataset: &SpectralDataset) -> FilterState {
    dataset.unique_values.clone()
}

/// Whether one spectrum value passes a column selection. A spectrum without
/// the column is treated as `Null`.
fn accepts(
    value: Option<&MetadataValue>,
    selected: &BTreeSet<MetadataValue>,
    all: Option<&BTreeSet<MetadataValue>>,
) -> bool {
    if selected.is_empty() {
        return false;
    }
    if all.is_some_and(|all| selected.is_superset(all)) {
        return true;
    }
    selected.contains(value.unwrap_or(&MetadataValue::Null))
}

/// Indices of the spectra that pass every column filter. Columns absent
/// from `filters` do not constrain anything.
pub fn filtered_indices(dataset: &SpectralDataset, filters: &FilterState) -> Vec<usize> {
    dataset
        .spectra
        .iter()
        .enumerate()
        .filter(|(_, sp)| {
            filters.iter().all(|(col, selected)| {
                accepts(sp.metadata.get(col), selected, dataset.unique_values.get(col))
            })
        })
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Spectrum;

    fn dataset() -> SpectralDataset {
        let mk = |ethanol: Option<f64>, day: &str| {
            let mut metadata = BTreeMap::new();
            if let Some(e) = ethanol {
                metadata.insert("hplc_ethanol".to_string(), MetadataValue::Float(e));
            }
            metadata.insert("day".to_string(), MetadataValue::String(day.into()));
            Spectrum {
                x: vec![1.0],
                y: vec![1.0],
                metadata,
            }
        };
        SpectralDataset::from_spectra(vec![
            mk(Some(1.0), "d1"),
            mk(Some(2.0), "d1"),
            mk(None, "d2"),
        ])
    }

    #[test]
    fn initial_state_shows_everything() {
        let ds = dataset();
        let filters = init_filter_state(&ds);
        assert_eq!(filtered_indices(&ds, &filters), vec![0, 1, 2]);
    }

    #[test]
    fn value_selection_narrows_rows() {
        let ds = dataset();
        let mut filters = init_filter_state(&ds);
        filters.insert(
            "day".to_string(),
            BTreeSet::from([MetadataValue::String("d1".into())]),
        );
        assert_eq!(filtered_indices(&ds, &filters), vec![0, 1]);
    }

    #[test]
    fn empty_selection_hides_everything() {
        let ds = dataset();
        let mut filters = init_filter_state(&ds);
        filters.insert("day".to_string(), BTreeSet::new());
        assert!(filtered_indices(&ds, &filters).is_empty());
    }

    #[test]
    fn missing_column_passes_only_with_null_selected() {
        let ds = dataset();
        let mut filters = init_filter_state(&ds);
        filters.insert(
            "hplc_ethanol".to_string(),
            BTreeSet::from([MetadataValue::Float(2.0)]),
        );
        assert_eq!(filtered_indices(&ds, &filters), vec![1]);

        filters.insert(
            "hplc_ethanol".to_string(),
            BTreeSet::from([MetadataValue::Float(2.0), MetadataValue::Null]),
        );
        assert_eq!(filtered_indices(&ds, &filters), vec![1, 2]);
    }
}
