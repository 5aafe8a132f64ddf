//! Baseline removal for integrated IMS spectra.
//!
//! Three algorithms are available:
//!
//! * **Zhang** – adaptive iteratively reweighted penalized least squares
//!   (airPLS) with a first-order Whittaker smoother.
//! * **ModPoly** – modified polynomial fit: the signal is clipped to the
//!   fitted polynomial until the fit stops changing.
//! * **IModPoly** – improved ModPoly: peaks are removed once, then points
//!   are clipped to `fit + std(residual)` until the deviation settles.

use ndarray::{Array1, Array2, ArrayView1};

use crate::data::model::SpectralDataset;
use crate::error::ProcessingError;

/// Baseline algorithm and its tuning parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BaselineAlgorithm {
    Zhang { lambda: f64, iterations: usize },
    ModPoly { degree: usize, iterations: usize, gradient: f64 },
    IModPoly { degree: usize, iterations: usize, gradient: f64 },
}

impl Default for BaselineAlgorithm {
    fn default() -> Self {
        BaselineAlgorithm::Zhang {
            lambda: 100.0,
            iterations: 15,
        }
    }
}

impl BaselineAlgorithm {
    /// Build an algorithm from its name (`Zhang`, `Modpoly`, `Imodpoly`,
    /// case-insensitive) with default parameters and the given degree.
    pub fn from_name(name: &str, polynomial_degree: usize) -> Result<Self, ProcessingError> {
        match name.to_ascii_lowercase().as_str() {
            "zhang" => Ok(Self::default()),
            "modpoly" => Ok(Self::ModPoly {
                degree: polynomial_degree,
                iterations: 100,
                gradient: 0.001,
            }),
            "imodpoly" => Ok(Self::IModPoly {
                degree: polynomial_degree,
                iterations: 100,
                gradient: 0.001,
            }),
            _ => Err(ProcessingError::UnknownBaseline(name.to_string())),
        }
    }

    /// Return `y` with the estimated baseline subtracted.
    pub fn correct(&self, y: &[f64]) -> Result<Vec<f64>, ProcessingError> {
        if y.is_empty() {
            return Ok(Vec::new());
        }
        let baseline = match *self {
            Self::Zhang { lambda, iterations } => airpls(y, lambda, iterations)?,
            Self::ModPoly {
                degree,
                iterations,
                gradient,
            } => modpoly(y, degree, iterations, gradient)?,
            Self::IModPoly {
                degree,
                iterations,
                gradient,
            } => imodpoly(y, degree, iterations, gradient)?,
        };
        Ok(y.iter().zip(&baseline).map(|(v, b)| v - b).collect())
    }
}

/// Baseline-correct every spectrum of the dataset, keeping axes and metadata.
pub fn correct_dataset(
    dataset: &SpectralDataset,
    algorithm: &BaselineAlgorithm,
) -> Result<SpectralDataset, ProcessingError> {
    let mut spectra = dataset.spectra.clone();
    for sp in &mut spectra {
        sp.y = algorithm.correct(&sp.y)?;
    }
    Ok(SpectralDataset::from_spectra(spectra))
}

// ---------------------------------------------------------------------------
// airPLS (Zhang)
// ---------------------------------------------------------------------------

fn airpls(y: &[f64], lambda: f64, iterations: usize) -> Result<Vec<f64>, ProcessingError> {
    let n = y.len();
    let total: f64 = y.iter().map(|v| v.abs()).sum();
    let mut w = vec![1.0; n];
    let mut i = 1;

    loop {
        let z = whittaker_smooth(y, &w, lambda)?;
        let d: Vec<f64> = y.iter().zip(&z).map(|(a, b)| a - b).collect();
        let dssn: f64 = d.iter().filter(|v| **v < 0.0).sum::<f64>().abs();

        if dssn < 0.001 * total || dssn == 0.0 {
            return Ok(z);
        }
        if i >= iterations {
            log::warn!("airPLS reached the iteration limit ({iterations})");
            return Ok(z);
        }

        let it = i as f64;
        for (wk, dk) in w.iter_mut().zip(&d) {
            *wk = if *dk >= 0.0 { 0.0 } else { (it * dk.abs() / dssn).exp() };
        }
        let max_negative = d
            .iter()
            .copied()
            .filter(|v| *v < 0.0)
            .fold(f64::NEG_INFINITY, f64::max);
        let edge = (it * max_negative / dssn).exp();
        w[0] = edge;
        w[n - 1] = edge;
        i += 1;
    }
}

/// Solve `(W + λ DᵀD) z = W y` with `D` the first-difference operator.
fn whittaker_smooth(y: &[f64], w: &[f64], lambda: f64) -> Result<Vec<f64>, ProcessingError> {
    let n = y.len();
    if n == 1 {
        return Ok(y.to_vec());
    }
    let mut diag = vec![0.0; n];
    for (i, d) in diag.iter_mut().enumerate() {
        let penalty = if i == 0 || i == n - 1 { lambda } else { 2.0 * lambda };
        *d = w[i] + penalty;
    }
    let off = vec![-lambda; n - 1];
    let rhs: Vec<f64> = w.iter().zip(y).map(|(a, b)| a * b).collect();
    solve_tridiagonal(&off, &diag, &off, &rhs)
}

/// Thomas algorithm; `sub` and `sup` have length `n - 1`.
fn solve_tridiagonal(
    sub: &[f64],
    diag: &[f64],
    sup: &[f64],
    rhs: &[f64],
) -> Result<Vec<f64>, ProcessingError> {
    let n = diag.len();
    let mut c = vec![0.0; n];
    let mut d = vec![0.0; n];

    if diag[0].abs() < f64::EPSILON {
        return Err(ProcessingError::Singular("whittaker smoother"));
    }
    if n > 1 {
        c[0] = sup[0] / diag[0];
    }
    d[0] = rhs[0] / diag[0];
    for i in 1..n {
        let m = diag[i] - sub[i - 1] * c[i - 1];
        if m.abs() < f64::EPSILON {
            return Err(ProcessingError::Singular("whittaker smoother"));
        }
        if i < n - 1 {
            c[i] = sup[i] / m;
        }
        d[i] = (rhs[i] - sub[i - 1] * d[i - 1]) / m;
    }

    let mut x = d;
    for i in (0..n - 1).rev() {
        x[i] -= c[i] * x[i + 1];
    }
    Ok(x)
}

// ---------------------------------------------------------------------------
// Polynomial baselines
// ---------------------------------------------------------------------------

/// Sample positions mapped onto [-1, 1] to keep the normal equations sane.
fn unit_axis(n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![0.0];
    }
    let span = (n - 1) as f64;
    (0..n).map(|i| 2.0 * i as f64 / span - 1.0).collect()
}

#[derive(Debug, Clone)]
struct Polynomial {
    /// Lowest order first.
    coeffs: Vec<f64>,
}

impl Polynomial {
    fn fit(t: &[f64], y: &[f64], degree: usize) -> Result<Self, ProcessingError> {
        let terms = degree + 1;
        if t.len() < terms {
            return Err(ProcessingError::TooFewPoints {
                needed: terms,
                got: t.len(),
            });
        }
        let vandermonde = Array2::from_shape_fn((t.len(), terms), |(i, k)| t[i].powi(k as i32));
        let ata = vandermonde.t().dot(&vandermonde);
        let aty = vandermonde.t().dot(&ArrayView1::from(y));
        let coeffs = solve_dense(ata, aty)?;
        Ok(Self { coeffs })
    }

    fn eval(&self, t: f64) -> f64 {
        self.coeffs.iter().rev().fold(0.0, |acc, c| acc * t + c)
    }

    fn eval_all(&self, t: &[f64]) -> Vec<f64> {
        t.iter().map(|&ti| self.eval(ti)).collect()
    }
}

/// Gaussian elimination with partial pivoting.
fn solve_dense(mut a: Array2<f64>, mut b: Array1<f64>) -> Result<Vec<f64>, ProcessingError> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))
            .unwrap_or(col);
        if a[[pivot, col]].abs() < 1e-12 {
            return Err(ProcessingError::Singular("polynomial fit"));
        }
        if pivot != col {
            for k in 0..n {
                a.swap([col, k], [pivot, k]);
            }
            b.swap(col, pivot);
        }
        for row in col + 1..n {
            let factor = a[[row, col]] / a[[col, col]];
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[[row, k]] * x[k]).sum();
        x[row] = (b[row] - tail) / a[[row, row]];
    }
    Ok(x)
}

/// Population standard deviation.
fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}

fn modpoly(
    y: &[f64],
    degree: usize,
    iterations: usize,
    gradient: f64,
) -> Result<Vec<f64>, ProcessingError> {
    let t = unit_axis(y.len());
    let mut work = y.to_vec();
    let mut poly = Polynomial::fit(&t, &work, degree)?;

    for _ in 0..iterations {
        let fit = poly.eval_all(&t);
        let clipped: Vec<f64> = work.iter().zip(&fit).map(|(w, f)| w.min(*f)).collect();

        let norm = work.iter().map(|v| v * v).sum::<f64>().sqrt();
        let change = clipped
            .iter()
            .zip(&work)
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>()
            .sqrt();
        work = clipped;
        poly = Polynomial::fit(&t, &work, degree)?;

        if norm == 0.0 || change / norm < gradient {
            break;
        }
    }
    Ok(poly.eval_all(&t))
}

fn imodpoly(
    y: &[f64],
    degree: usize,
    iterations: usize,
    gradient: f64,
) -> Result<Vec<f64>, ProcessingError> {
    let t = unit_axis(y.len());
    let fit = Polynomial::fit(&t, y, degree)?.eval_all(&t);
    let residual: Vec<f64> = y.iter().zip(&fit).map(|(a, b)| a - b).collect();
    let mut previous_dev = std_dev(&residual);

    // Peak removal happens once, on the first fit.
    let (mut ts, mut ys): (Vec<f64>, Vec<f64>) = t
        .iter()
        .zip(y)
        .zip(&fit)
        .filter(|((_, yi), fi)| **yi <= **fi + previous_dev)
        .map(|((ti, yi), _)| (*ti, *yi))
        .unzip();
    if ts.len() <= degree {
        ts = t.clone();
        ys = y.to_vec();
    }

    let mut poly = Polynomial::fit(&ts, &ys, degree)?;
    for _ in 1..iterations.max(2) {
        let pred = poly.eval_all(&ts);
        let residual: Vec<f64> = ys.iter().zip(&pred).map(|(a, b)| a - b).collect();
        let dev = std_dev(&residual);

        if dev == 0.0 || ((dev - previous_dev) / dev).abs() < gradient {
            break;
        }
        for (yi, pi) in ys.iter_mut().zip(&pred) {
            if *yi >= pi + dev {
                *yi = pi + dev;
            }
        }
        previous_dev = dev;
        poly = Polynomial::fit(&ts, &ys, degree)?;
    }
    Ok(poly.eval_all(&t))
}
