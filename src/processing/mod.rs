/// Numeric preprocessing of IMS measurements.
///
/// ```text
///   MeasurementSet (2D)
///        │  retention   nearest retention-time rows
///        ▼
///   MeasurementSet (2D)
///        │  integrate   trapezoid over retention time
///        ▼
///   SpectralDataset (1D)
///        │  baseline    Zhang / ModPoly / IModPoly
///        ▼
///   SpectralDataset (1D)
///        │  peaks       detection, selection per window, peak area
///        ▼
///   Vec<PeakArea> per spectrum
/// ```

pub mod baseline;
pub mod integrate;
pub mod peaks;
pub mod retention;
