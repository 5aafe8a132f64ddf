use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Result;

use crate::color::ColorMap;
use ims_toolbox::config::PipelineConfig;
use ims_toolbox::data::filter::{FilterState, filtered_indices, init_filter_state};
use ims_toolbox::data::loader::load_file;
use ims_toolbox::data::model::{MetadataValue, SpectralDataset};
use ims_toolbox::processing::peaks::PeakWindow;

/// How intensities are transformed before plotting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scaling {
    #[default]
    Raw,
    /// Each spectrum mapped onto [0, 1].
    MinMax,
}

impl Scaling {
    pub fn apply(self, y: &[f64]) -> Vec<f64> {
        match self {
            Scaling::Raw => y.to_vec(),
            Scaling::MinMax => {
                let min = y.iter().copied().fold(f64::INFINITY, f64::min);
                let max = y.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let range = max - min;
                if !range.is_finite() || range.abs() < f64::EPSILON {
                    vec![0.0; y.len()]
                } else {
                    y.iter().map(|&v| (v - min) / range).collect()
                }
            }
        }
    }
}

/// The full viewer state, independent of rendering.
#[derive(Default)]
pub struct ViewerState {
    /// Integrated spectra written by `ims-process` (None until a file is opened).
    pub dataset: Option<SpectralDataset>,

    /// Per-column filter selections.
    pub filters: FilterState,

    /// Indices of spectra passing the current filters (cached).
    pub visible_indices: Vec<usize>,

    /// Which metadata column is used for colouring.
    pub color_column: Option<String>,

    pub color_map: Option<ColorMap>,

    pub scaling: Scaling,

    /// Drift time windows drawn on top of the spectra.
    pub peak_windows: Vec<PeakWindow>,

    /// Show the metadata table below the plot.
    pub show_table: bool,

    /// Status / error message shown in the top bar.
    pub status_message: Option<String>,
}

impl ViewerState {
    /// Load a dataset from disk, reporting failures through `status_message`.
    pub fn open(&mut self, path: &Path) {
        match load_file(path) {
            Ok(dataset) => {
                log::info!(
                    "Loaded {} spectra with columns {:?}",
                    dataset.len(),
                    dataset.column_names
                );
                self.set_dataset(dataset);
            }
            Err(e) => {
                log::error!("Failed to load {}: {e:#}", path.display());
                self.status_message = Some(format!("Error: {e:#}"));
            }
        }
    }

    /// Take the peak windows of a pipeline config as plot overlay.
    pub fn open_config(&mut self, path: &Path) -> Result<()> {
        let config = PipelineConfig::from_file(path)?;
        self.peak_windows = config.processing.peaks;
        log::info!(
            "{} peak window(s) from {}",
            self.peak_windows.len(),
            path.display()
        );
        Ok(())
    }

    /// Ingest a newly loaded dataset, initialise filters and colour.
    pub fn set_dataset(&mut self, dataset: SpectralDataset) {
        self.filters = init_filter_state(&dataset);
        self.visible_indices = (0..dataset.len()).collect();

        self.color_column = default_color_column(&dataset);
        self.color_map = build_color_map(&dataset, self.color_column.as_deref());

        self.dataset = Some(dataset);
        self.status_message = None;
    }

    /// Recompute `visible_indices` after a filter change.
    pub fn refilter(&mut self) {
        if let Some(ds) = &self.dataset {
            self.visible_indices = filtered_indices(ds, &self.filters);
        }
    }

    pub fn set_color_column(&mut self, col: String) {
        if let Some(ds) = &self.dataset {
            self.color_map = build_color_map(ds, Some(&col));
        }
        self.color_column = Some(col);
    }

    /// Toggle a single metadata value in a column's filter.
    pub fn toggle_filter_value(&mut self, column: &str, value: &MetadataValue) {
        let selected = self.filters.entry(column.to_string()).or_default();
        if !selected.remove(value) {
            selected.insert(value.clone());
        }
        self.refilter();
    }

    pub fn select_all(&mut self, column: &str) {
        let Some(all_vals) = self
            .dataset
            .as_ref()
            .and_then(|ds| ds.unique_values.get(column))
        else {
            return;
        };
        self.filters.insert(column.to_string(), all_vals.clone());
        self.refilter();
    }

    pub fn select_none(&mut self, column: &str) {
        self.filters.insert(column.to_string(), BTreeSet::new());
        self.refilter();
    }
}

/// Prefer an HPLC concentration, then a peak area, then whatever comes first.
fn default_color_column(dataset: &SpectralDataset) -> Option<String> {
    let cols = &dataset.column_names;
    cols.iter()
        .find(|c| c.starts_with("hplc_"))
        .or_else(|| cols.iter().find(|c| c.starts_with("area_")))
        .or_else(|| cols.first())
        .cloned()
}

fn build_color_map(dataset: &SpectralDataset, column: Option<&str>) -> Option<ColorMap> {
    let col = column?;
    dataset
        .unique_values
        .get(col)
        .map(|vals| ColorMap::new(col, vals))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use ims_toolbox::data::model::Spectrum;

    fn spectrum(source: &str, ethanol: Option<f64>) -> Spectrum {
        let mut metadata = BTreeMap::new();
        metadata.insert("source".to_string(), MetadataValue::String(source.into()));
        metadata.insert(
            "hplc_ethanol".to_string(),
            ethanol.map_or(MetadataValue::Null, MetadataValue::Float),
        );
        Spectrum {
            x: vec![5.0, 6.0, 7.0],
            y: vec![1.0, 3.0, 2.0],
            metadata,
        }
    }

    fn state() -> ViewerState {
        let mut state = ViewerState::default();
        state.set_dataset(SpectralDataset::from_spectra(vec![
            spectrum("a.csv", Some(1.0)),
            spectrum("b.csv", Some(2.0)),
            spectrum("c.csv", None),
        ]));
        state
    }

    #[test]
    fn test_set_dataset_shows_everything() {
        let state = state();
        assert_eq!(state.visible_indices, vec![0, 1, 2]);
        assert_eq!(state.color_column.as_deref(), Some("hplc_ethanol"));
        assert!(state.color_map.is_some());
    }

    #[test]
    fn test_toggle_and_select() {
        let mut state = state();
        state.toggle_filter_value("source", &MetadataValue::String("b.csv".into()));
        assert_eq!(state.visible_indices, vec![0, 2]);
        state.toggle_filter_value("source", &MetadataValue::String("b.csv".into()));
        assert_eq!(state.visible_indices, vec![0, 1, 2]);

        state.select_none("hplc_ethanol");
        assert!(state.visible_indices.is_empty());
        state.select_all("hplc_ethanol");
        assert_eq!(state.visible_indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_set_color_column() {
        let mut state = state();
        state.set_color_column("source".into());
        let map = state.color_map.as_ref().unwrap();
        assert_eq!(map.column, "source");
        assert_eq!(map.legend_entries().len(), 3);
    }

    #[test]
    fn test_minmax_scaling() {
        assert_eq!(Scaling::MinMax.apply(&[1.0, 3.0, 2.0]), vec![0.0, 1.0, 0.5]);
        assert_eq!(Scaling::MinMax.apply(&[2.0, 2.0]), vec![0.0, 0.0]);
        assert_eq!(Scaling::Raw.apply(&[2.0, 4.0]), vec![2.0, 4.0]);
    }

    #[test]
    fn test_open_reports_errors() {
        let mut state = ViewerState::default();
        state.open(Path::new("/nonexistent/integrated.parquet"));
        assert!(state.dataset.is_none());
        assert!(state.status_message.is_some());
    }
}
