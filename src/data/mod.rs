/// Data layer: core types, measurement loading, reference tables, output.
///
/// Architecture:
/// ```text
///  measurement folders          .parquet / .json / .csv
///        │                               │
///        ▼                               ▼
///   ┌───────────┐                  ┌──────────┐
///   │ discovery │ timestamps,      │  loader   │  viewer input
///   └───────────┘ windows          └──────────┘
///        │                               │
///        ▼                               ▼
///   ┌─────────────┐               ┌────────────────┐
///   │ measurement │ → Measurement │ SpectralDataset │ Vec<Spectrum>, column index
///   └─────────────┘               └────────────────┘
///                                   ▲    │        │
///                    hplc (join) ───┘    ▼        ▼
///                                  ┌────────┐ ┌──────────┐
///                                  │ writer │ │  filter   │ metadata predicates
///                                  └────────┘ └──────────┘
/// ```

pub mod discovery;
pub mod filter;
pub mod hplc;
pub mod loader;
pub mod measurement;
pub mod model;
pub mod timestamp;
pub mod writer;
