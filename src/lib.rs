//! Preprocessing toolbox for ion mobility spectrometry (IMS) measurements
//! that are compared against offline HPLC reference concentrations.
//!
//! The [`pipeline`] turns folders of 2D measurements into integrated,
//! baseline-corrected spectra with peak areas and attached HPLC values;
//! the `ims-toolbox` viewer plots the result.

pub mod config;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod processing;

pub use config::PipelineConfig;
pub use data::measurement::{MatrixCsvReader, MeasurementReader};
pub use data::model::{Measurement, MeasurementSet, MetadataValue, SpectralDataset, Spectrum};
pub use error::ProcessingError;
pub use pipeline::{PipelineReport, run};
