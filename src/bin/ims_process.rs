//! # ims-process
//!
//! Command-line pipeline for IMS measurement folders.
//!
//! ```bash
//! # Run with a config file
//! ims-process run --config ims.toml
//!
//! # Quick run without a config file
//! ims-process run --folder data/day1 --baseline Modpoly --output day1.parquet
//!
//! # Look at a single measurement
//! ims-process inspect data/day1/210301_081530.csv
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use ims_toolbox::config::{FolderConfig, PipelineConfig};
use ims_toolbox::data::loader::load_file;
use ims_toolbox::{MatrixCsvReader, MeasurementReader};

/// IMS preprocessing: integrate, correct baselines, quantify peaks, join HPLC data
#[derive(Parser)]
#[command(name = "ims-process")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the processing pipeline
    Run {
        /// TOML pipeline configuration
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Measurement folder (repeatable, replaces the configured folders)
        #[arg(short, long = "folder", value_name = "DIR")]
        folders: Vec<PathBuf>,

        /// Measurement file extension
        #[arg(long)]
        extension: Option<String>,

        /// Keep every n-th measurement file
        #[arg(long)]
        file_stride: Option<usize>,

        /// Keep every n-th retention time and drift time
        #[arg(long)]
        value_stride: Option<usize>,

        /// Baseline algorithm: Zhang, Modpoly, Imodpoly or none
        #[arg(short, long)]
        baseline: Option<String>,

        /// HPLC reference table
        #[arg(long, value_name = "CSV")]
        hplc: Option<PathBuf>,

        /// Output dataset (.parquet, .json or .csv)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Print the axes and attributes of one measurement file
    Inspect {
        /// Measurement file (matrix CSV)
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Summarise a processed dataset
    Summary {
        /// Dataset written by `run`
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match cli.command {
        Commands::Run {
            config,
            folders,
            extension,
            file_stride,
            value_stride,
            baseline,
            hplc,
            output,
        } => {
            let mut cfg = match config {
                Some(path) => PipelineConfig::from_file(&path)?,
                None => PipelineConfig::default(),
            };
            if !folders.is_empty() {
                cfg.input.folders = folders
                    .into_iter()
                    .map(|path| FolderConfig {
                        path,
                        start: None,
                        end: None,
                    })
                    .collect();
            }
            if let Some(ext) = extension {
                cfg.input.extension = ext;
            }
            if let Some(n) = file_stride {
                cfg.input.file_stride = n;
            }
            if let Some(n) = value_stride {
                cfg.input.value_stride = n;
            }
            if let Some(b) = baseline {
                cfg.processing.baseline = b;
            }
            if hplc.is_some() {
                cfg.hplc.path = hplc;
            }
            if let Some(out) = output {
                cfg.output.dataset = out;
            }
            run_pipeline(&cfg)
        }
        Commands::Inspect { file } => run_inspect(file),
        Commands::Summary { file } => run_summary(file),
    }
}

fn run_pipeline(cfg: &PipelineConfig) -> Result<()> {
    let delimiter = u8::try_from(cfg.input.delimiter).context("delimiter must be ASCII")?;
    let reader = MatrixCsvReader { delimiter };
    let report = ims_toolbox::run(cfg, &reader)?;

    info!("Pipeline finished: {report:?}");
    println!(
        "{} files found, {} measurements loaded, {} spectra written to {}",
        report.files_found,
        report.measurements_loaded,
        report.spectra_written,
        cfg.output.dataset.display()
    );
    if cfg.hplc.path.is_some() {
        println!(
            "{}/{} spectra matched to HPLC samples",
            report.reference_matches, report.spectra_written
        );
    }
    if let Some(peaks) = &cfg.output.peaks {
        println!("{} peak areas written to {}", report.peak_rows, peaks.display());
    }
    Ok(())
}

fn run_inspect(file: PathBuf) -> Result<()> {
    let m = MatrixCsvReader::default().read(&file)?;
    let range = |v: &[f64]| {
        let lo = v.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = v.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        format!("{lo:.4} .. {hi:.4}")
    };

    println!("File:            {}", file.display());
    println!("Timestamp:       {}", m.timestamp);
    println!(
        "Retention times: {} ({})",
        m.n_rows(),
        range(&m.retention_times)
    );
    println!("Drift times:     {} ({})", m.n_cols(), range(&m.drift_times));
    for (key, value) in &m.attributes {
        println!("  {key}: {value}");
    }
    Ok(())
}

fn run_summary(file: PathBuf) -> Result<()> {
    let ds = load_file(&file).with_context(|| format!("loading {}", file.display()))?;
    println!("{}: {} spectra", file.display(), ds.len());
    for col in &ds.column_names {
        let n = ds.unique_values.get(col).map_or(0, |v| v.len());
        println!("  {col}: {n} distinct value(s)");
    }
    Ok(())
}
