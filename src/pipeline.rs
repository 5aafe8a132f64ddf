use anyhow::{Context, Result, bail};

use crate::config::PipelineConfig;
use crate::data::discovery::{discover, stride_files};
use crate::data::hplc::{ReferenceTable, attach_reference};
use crate::data::measurement::{MeasurementReader, load_measurements};
use crate::data::model::{MetadataValue, SpectralDataset};
use crate::data::writer::{PeakTableRow, write_dataset, write_peak_table};
use crate::processing::baseline::correct_dataset;
use crate::processing::integrate::integrate_set;
use crate::processing::peaks::quantify;
use crate::processing::retention::filter_retention_times;

/// What a pipeline run produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineReport {
    pub files_found: usize,
    pub measurements_loaded: usize,
    pub spectra_written: usize,
    pub reference_matches: usize,
    pub peak_rows: usize,
}

/// Run every configured stage and write the outputs.
pub fn run(config: &PipelineConfig, reader: &dyn MeasurementReader) -> Result<PipelineReport> {
    config.validate()?;
    let mut report = PipelineReport::default();

    // ---- discovery ----
    let folders = config.folder_specs()?;
    let files = discover(&folders, &config.input.extension)?;
    report.files_found = files.len();
    if files.is_empty() {
        bail!(
            "no .{} measurement files found in {} folder(s)",
            config.input.extension,
            folders.len()
        );
    }
    let files = stride_files(files, config.input.file_stride)?;
    log::info!("{} of {} files selected after stride", files.len(), report.files_found);

    // ---- loading ----
    let mut measurements = load_measurements(&files, reader, config.input.value_stride)?;
    report.measurements_loaded = measurements.len();

    if !config.processing.retention_times.is_empty() {
        measurements = filter_retention_times(&measurements, &config.processing.retention_times)?;
        log::info!(
            "Kept {} retention time(s) per measurement",
            config.processing.retention_times.len()
        );
    }

    // ---- integration & baseline ----
    let mut dataset = integrate_set(&measurements);
    if let Some(algorithm) = config.baseline()? {
        log::info!("Baseline correction: {algorithm:?}");
        dataset = correct_dataset(&dataset, &algorithm)?;
    }

    // ---- reference data ----
    if let Some(path) = &config.hplc.path {
        let table = ReferenceTable::from_path(path, &config.hplc.timestamp_column)?;
        report.reference_matches = attach_reference(
            &mut dataset,
            &table,
            config.hplc_tolerance(),
            &config.hplc.prefix,
        );
    }
    if let Some(path) = &config.metadata.path {
        let table = ReferenceTable::from_path(path, &config.metadata.timestamp_column)?;
        attach_reference(&mut dataset, &table, config.metadata_tolerance(), "");
    }

    // ---- peaks ----
    let peak_rows = quantify_dataset(&mut dataset, config)?;
    report.peak_rows = peak_rows.iter().map(|r| r.areas.len()).sum();
    if let Some(path) = &config.output.peaks {
        write_peak_table(&peak_rows, path)?;
        log::info!("Wrote {} peak rows to {}", report.peak_rows, path.display());
    }

    // ---- output ----
    write_dataset(&dataset, &config.output.dataset)?;
    report.spectra_written = dataset.len();
    log::info!(
        "Wrote {} spectra to {}",
        report.spectra_written,
        config.output.dataset.display()
    );
    Ok(report)
}

/// Quantify the configured peak windows in every spectrum. Areas are also
/// stored on the spectra as `area_{window}` so the viewer can colour by them.
fn quantify_dataset(
    dataset: &mut SpectralDataset,
    config: &PipelineConfig,
) -> Result<Vec<PeakTableRow>> {
    let windows = &config.processing.peaks;
    if windows.is_empty() {
        return Ok(Vec::new());
    }

    let prefix = &config.hplc.prefix;
    let mut rows = Vec::with_capacity(dataset.len());
    for sp in &mut dataset.spectra {
        let timestamp = sp
            .timestamp()
            .context("integrated spectrum without timestamp")?;
        let areas = quantify(sp, windows, config.processing.min_prominence);
        for area in &areas {
            sp.metadata
                .insert(format!("area_{}", area.window), MetadataValue::Float(area.area));
        }
        let reference = sp
            .metadata
            .iter()
            .filter(|(k, _)| !prefix.is_empty() && k.starts_with(prefix.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        rows.push(PeakTableRow {
            timestamp,
            areas,
            reference,
        });
    }

    let spectra = std::mem::take(&mut dataset.spectra);
    *dataset = SpectralDataset::from_spectra(spectra);
    Ok(rows)
}
