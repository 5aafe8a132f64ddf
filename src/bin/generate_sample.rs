//! Writes a synthetic fermentation campaign: matrix CSV measurements named
//! `YYMMDD_HHMMSS.csv`, an HPLC reference table and an `ims.toml` that
//! processes both.
//!
//! ```bash
//! generate_sample [output_dir]
//! ims-process -v run --config sample_campaign/ims.toml
//! ims-toolbox sample_campaign/integrated.parquet sample_campaign/ims.toml
//! ```

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use ims_toolbox::data::timestamp::FILE_NAME_FORMAT;

/// Reactant ion peak, always present.
const RIP: (f64, f64, f64) = (6.2, 0.05, 5.0);
/// Ethanol monomer and proton-bound dimer (drift time, width, amplitude per g/L).
const MONOMER: (f64, f64, f64) = (7.1, 0.05, 0.8);
const DIMER: (f64, f64, f64) = (8.4, 0.06, 0.3);

const N_MEASUREMENTS: usize = 24;
const MEASUREMENT_INTERVAL_MIN: i64 = 30;
const HPLC_INTERVAL: usize = 4;
const SEED: u64 = 42;

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Logistic ethanol production in g/L over `hours`.
fn ethanol_at(hours: f64) -> f64 {
    40.0 / (1.0 + (-(hours - 6.0) / 1.5).exp())
}

/// One retention time × drift time matrix. Ethanol elutes around 2 s, the
/// RIP is depleted while it does; a slow drift adds a sloped baseline.
fn measurement_text(
    timestamp: NaiveDateTime,
    ethanol: f64,
    retention: &[f64],
    drift: &[f64],
    rng: &mut StdRng,
) -> Result<String> {
    let noise = Normal::new(0.0, 0.01)?;
    let mut text = String::new();
    writeln!(text, "# Timestamp: {}", timestamp.format("%Y-%m-%d %H:%M:%S"))?;
    writeln!(text, "# Instrument: synthetic GC-IMS")?;
    write!(text, "ret_time")?;
    for dt in drift {
        write!(text, ",{dt:.3}")?;
    }
    writeln!(text)?;

    for &rt in retention {
        let elution = gaussian(rt, 2.0, 0.6, 1.0);
        let response = ethanol * elution;
        write!(text, "{rt:.2}")?;
        for &dt in drift {
            let baseline = 0.2 + 0.05 * (dt - drift[0]);
            let rip = gaussian(dt, RIP.0, RIP.1, RIP.2 / (1.0 + 0.02 * response));
            let monomer = gaussian(dt, MONOMER.0, MONOMER.1, MONOMER.2 * response);
            let dimer = gaussian(dt, DIMER.0, DIMER.1, DIMER.2 * response * response / 40.0);
            let v = baseline + rip + monomer + dimer + noise.sample(rng);
            write!(text, ",{v:.5}")?;
        }
        writeln!(text)?;
    }
    Ok(text)
}

fn config_text(dir: &Path) -> String {
    let ims = dir.join("ims");
    format!(
        r#"[input]
extension = "csv"

[[input.folders]]
path = "{ims}"

[processing]
baseline = "Zhang"
min_prominence = 0.05

[[processing.peaks]]
name = "ethanol_monomer"
start = {m_start:.2}
end = {m_end:.2}
expected = {m:.2}

[[processing.peaks]]
name = "ethanol_dimer"
start = {d_start:.2}
end = {d_end:.2}
expected = {d:.2}

[hplc]
path = "{hplc}"
tolerance_minutes = 10

[output]
dataset = "{dataset}"
peaks = "{peaks}"
"#,
        ims = ims.display(),
        m = MONOMER.0,
        m_start = MONOMER.0 - 0.3,
        m_end = MONOMER.0 + 0.3,
        d = DIMER.0,
        d_start = DIMER.0 - 0.3,
        d_end = DIMER.0 + 0.3,
        hplc = dir.join("hplc.csv").display(),
        dataset = dir.join("integrated.parquet").display(),
        peaks = dir.join("peak_areas.csv").display(),
    )
}

fn main() -> Result<()> {
    let out_dir = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from("sample_campaign"), PathBuf::from);
    let ims_dir = out_dir.join("ims");
    std::fs::create_dir_all(&ims_dir)
        .with_context(|| format!("creating {}", ims_dir.display()))?;

    let mut rng = StdRng::seed_from_u64(SEED);
    let hplc_error = Normal::new(1.0, 0.02)?;
    let retention: Vec<f64> = (0..41).map(|i| i as f64 * 0.1).collect();
    let drift: Vec<f64> = (0..251).map(|i| 5.0 + i as f64 * 0.02).collect();

    let start = NaiveDate::from_ymd_opt(2021, 3, 1)
        .and_then(|d| d.and_hms_opt(8, 0, 0))
        .context("invalid start date")?;

    let mut hplc = csv::Writer::from_path(out_dir.join("hplc.csv"))?;
    hplc.write_record(["timestamp", "ethanol", "glucose"])?;

    for i in 0..N_MEASUREMENTS {
        let offset = Duration::minutes(MEASUREMENT_INTERVAL_MIN * i as i64);
        let timestamp = start + offset;
        let hours = offset.num_minutes() as f64 / 60.0;
        let ethanol = ethanol_at(hours);

        let name = format!("{}.csv", timestamp.format(FILE_NAME_FORMAT));
        let text = measurement_text(timestamp, ethanol, &retention, &drift, &mut rng)?;
        std::fs::write(ims_dir.join(&name), text)
            .with_context(|| format!("writing {name}"))?;

        if i % HPLC_INTERVAL == 0 {
            // sampled a few minutes after the IMS measurement
            let sampled = timestamp + Duration::minutes(3);
            let measured = ethanol * hplc_error.sample(&mut rng);
            let glucose = (90.0 - 2.0 * ethanol).max(0.0);
            hplc.write_record([
                sampled.format("%Y-%m-%d %H:%M:%S").to_string(),
                format!("{measured:.3}"),
                format!("{glucose:.3}"),
            ])?;
        }
    }
    hplc.flush()?;

    let config_path = out_dir.join("ims.toml");
    std::fs::write(&config_path, config_text(&out_dir))?;

    println!(
        "Wrote {N_MEASUREMENTS} measurements ({} × {} points each), hplc.csv and {} to {}",
        retention.len(),
        drift.len(),
        config_path.display(),
        out_dir.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_with_seed(seed: u64) -> String {
        let mut rng = StdRng::seed_from_u64(seed);
        let t = NaiveDate::from_ymd_opt(2021, 3, 1)
            .and_then(|d| d.and_hms_opt(8, 0, 0))
            .unwrap();
        measurement_text(t, 10.0, &[0.0, 2.0], &[6.0, 7.1, 8.4], &mut rng).unwrap()
    }

    #[test]
    fn same_seed_gives_same_measurement() {
        assert_eq!(text_with_seed(SEED), text_with_seed(SEED));
        assert_ne!(text_with_seed(SEED), text_with_seed(SEED + 1));
    }

    #[test]
    fn measurement_text_is_a_matrix_csv() {
        let text = text_with_seed(SEED);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "# Timestamp: 2021-03-01 08:00:00");
        assert_eq!(lines[2], "ret_time,6.000,7.100,8.400");
        assert_eq!(lines.len(), 5);
        assert!(lines[3..].iter().all(|l| l.split(',').count() == 4));
    }
}
