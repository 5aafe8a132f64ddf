//! TOML configuration for the processing pipeline.
//!
//! ```toml
//! # ims.toml
//! [input]
//! extension = "csv"
//! file_stride = 1
//! value_stride = 2
//!
//! [[input.folders]]
//! path = "data/fermentation1"
//! start = "2021-03-01 08:00:00"
//! end = "2021-03-02 08:00:00"
//!
//! [processing]
//! retention_times = [1.2, 3.4]
//! baseline = "Zhang"
//!
//! [[processing.peaks]]
//! name = "ethanol_monomer"
//! start = 6.8
//! end = 7.4
//! expected = 7.1
//!
//! [hplc]
//! path = "Offline/hplc.csv"
//!
//! [output]
//! dataset = "integrated.parquet"
//! peaks = "peak_areas.csv"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Duration;
use serde::Deserialize;

use crate::data::discovery::FolderSpec;
use crate::data::timestamp::parse_timestamp;
use crate::processing::baseline::BaselineAlgorithm;
use crate::processing::peaks::PeakWindow;

/// Root of an `ims.toml` file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub hplc: HplcConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FolderConfig {
    pub path: PathBuf,
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub folders: Vec<FolderConfig>,
    /// Measurement file extension, without the dot.
    pub extension: String,
    /// Keep every n-th measurement file.
    pub file_stride: usize,
    /// Keep every n-th retention time and drift time.
    pub value_stride: usize,
    /// Field delimiter of matrix CSV measurements.
    pub delimiter: char,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            folders: Vec::new(),
            extension: "csv".to_string(),
            file_stride: 1,
            value_stride: 1,
            delimiter: ',',
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Retention times to keep; empty keeps every row.
    pub retention_times: Vec<f64>,
    /// `Zhang`, `Modpoly`, `Imodpoly` or `none`.
    pub baseline: String,
    pub polynomial_degree: usize,
    pub min_prominence: f64,
    pub peaks: Vec<PeakWindow>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            retention_times: Vec::new(),
            baseline: "Zhang".to_string(),
            polynomial_degree: 2,
            min_prominence: 0.0,
            peaks: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HplcConfig {
    pub path: Option<PathBuf>,
    pub timestamp_column: String,
    pub tolerance_minutes: i64,
    pub prefix: String,
}

impl Default for HplcConfig {
    fn default() -> Self {
        Self {
            path: None,
            timestamp_column: "timestamp".to_string(),
            tolerance_minutes: 30,
            prefix: "hplc_".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub path: Option<PathBuf>,
    pub timestamp_column: String,
    pub tolerance_minutes: i64,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            path: None,
            timestamp_column: "timestamp".to_string(),
            tolerance_minutes: 30,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dataset: PathBuf,
    pub peaks: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dataset: PathBuf::from("integrated.parquet"),
            peaks: None,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }

    /// Check the settings that cannot be expressed in the types.
    pub fn validate(&self) -> Result<()> {
        if self.input.folders.is_empty() {
            bail!("no measurement folders configured");
        }
        if self.input.file_stride == 0 || self.input.value_stride == 0 {
            bail!("file_stride and value_stride must be >= 1");
        }
        if !self.input.delimiter.is_ascii() {
            bail!("delimiter must be a single ASCII character");
        }
        for window in &self.processing.peaks {
            if window.start > window.end {
                bail!(
                    "peak window '{}' has start {} after end {}",
                    window.name,
                    window.start,
                    window.end
                );
            }
        }
        if self.hplc.tolerance_minutes < 0 || self.metadata.tolerance_minutes < 0 {
            bail!("tolerance_minutes must not be negative");
        }
        self.baseline()?;
        self.folder_specs()?;
        Ok(())
    }

    /// Folders with their parsed acquisition windows.
    pub fn folder_specs(&self) -> Result<Vec<FolderSpec>> {
        self.input
            .folders
            .iter()
            .map(|f| -> Result<FolderSpec> {
                let parse = |raw: &Option<String>, what: &str| {
                    raw.as_deref()
                        .map(|s| {
                            parse_timestamp(s).with_context(|| {
                                format!("{}: unreadable {what} '{s}'", f.path.display())
                            })
                        })
                        .transpose()
                };
                Ok(FolderSpec {
                    path: f.path.clone(),
                    start: parse(&f.start, "start")?,
                    end: parse(&f.end, "end")?,
                })
            })
            .collect()
    }

    /// Baseline algorithm, `None` when correction is switched off.
    pub fn baseline(&self) -> Result<Option<BaselineAlgorithm>> {
        if self.processing.baseline.eq_ignore_ascii_case("none") {
            return Ok(None);
        }
        Ok(Some(BaselineAlgorithm::from_name(
            &self.processing.baseline,
            self.processing.polynomial_degree,
        )?))
    }

    pub fn hplc_tolerance(&self) -> Duration {
        Duration::minutes(self.hplc.tolerance_minutes)
    }

    pub fn metadata_tolerance(&self) -> Duration {
        Duration::minutes(self.metadata.tolerance_minutes)
    }
}
