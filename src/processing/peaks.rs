use serde::{Deserialize, Serialize};

use super::integrate::integrate_peak;
use crate::data::model::Spectrum;

/// A detected peak. `left` and `right` are the interpolated positions on the
/// x axis where the signal crosses half the prominence.
#[derive(Debug, Clone, PartialEq)]
pub struct Peak {
    pub index: usize,
    pub position: f64,
    pub height: f64,
    pub prominence: f64,
    pub left: f64,
    pub right: f64,
}

/// A peak to track, e.g. the ethanol monomer: only peaks inside
/// `[start, end]` qualify and the one nearest `expected` is taken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakWindow {
    pub name: String,
    pub start: f64,
    pub end: f64,
    pub expected: f64,
}

/// Result of quantifying one window in one spectrum.
/// Without a matching peak `position`/`left`/`right` are NaN and `area` is 0.
#[derive(Debug, Clone, PartialEq)]
pub struct PeakArea {
    pub window: String,
    pub position: f64,
    pub left: f64,
    pub right: f64,
    pub area: f64,
}

/// Strict local maxima of `y`. A flat top counts once, at its middle sample.
fn local_maxima(y: &[f64]) -> Vec<usize> {
    let n = y.len();
    let mut peaks = Vec::new();
    if n < 3 {
        return peaks;
    }
    let mut i = 1;
    while i < n - 1 {
        if y[i - 1] < y[i] {
            let mut ahead = i + 1;
            while ahead < n - 1 && y[ahead] == y[i] {
                ahead += 1;
            }
            if y[ahead] < y[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

/// Topographic prominence with its left and right bases.
fn prominence(y: &[f64], peak: usize) -> (f64, usize, usize) {
    let top = y[peak];

    let mut left_min = top;
    let mut left_base = peak;
    let mut i = peak as isize;
    while i >= 0 && y[i as usize] <= top {
        if y[i as usize] < left_min {
            left_min = y[i as usize];
            left_base = i as usize;
        }
        i -= 1;
    }

    let mut right_min = top;
    let mut right_base = peak;
    let mut j = peak;
    while j < y.len() && y[j] <= top {
        if y[j] < right_min {
            right_min = y[j];
            right_base = j;
        }
        j += 1;
    }

    (top - left_min.max(right_min), left_base, right_base)
}

/// Interpolated sample positions where the peak crosses
/// `top - rel_height * prominence`.
fn width_positions(
    y: &[f64],
    peak: usize,
    prominence: f64,
    bases: (usize, usize),
    rel_height: f64,
) -> (f64, f64) {
    let (left_base, right_base) = bases;
    let height = y[peak] - prominence * rel_height;

    let mut i = peak;
    while left_base < i && height < y[i] {
        i -= 1;
    }
    let mut left = i as f64;
    if y[i] < height {
        left += (height - y[i]) / (y[i + 1] - y[i]);
    }

    let mut i = peak;
    while i < right_base && height < y[i] {
        i += 1;
    }
    let mut right = i as f64;
    if y[i] < height {
        right -= (height - y[i]) / (y[i - 1] - y[i]);
    }
    (left, right)
}

/// Map a fractional sample index onto the x axis.
fn index_to_axis(x: &[f64], ip: f64) -> f64 {
    let lo = ip.floor().max(0.0) as usize;
    let hi = (ip.ceil() as usize).min(x.len() - 1);
    if lo >= hi {
        return x[lo.min(x.len() - 1)];
    }
    let frac = ip - lo as f64;
    x[lo] + frac * (x[hi] - x[lo])
}

/// Detect peaks in `y` whose prominence is at least `min_prominence`.
pub fn find_peaks(x: &[f64], y: &[f64], min_prominence: f64) -> Vec<Peak> {
    if x.len() != y.len() {
        return Vec::new();
    }
    local_maxima(y)
        .into_iter()
        .filter_map(|idx| {
            let (prom, left_base, right_base) = prominence(y, idx);
            if prom < min_prominence {
                return None;
            }
            let (left_ip, right_ip) = width_positions(y, idx, prom, (left_base, right_base), 0.5);
            Some(Peak {
                index: idx,
                position: x[idx],
                height: y[idx],
                prominence: prom,
                left: index_to_axis(x, left_ip),
                right: index_to_axis(x, right_ip),
            })
        })
        .collect()
}

/// The value inside `[start, end]` closest to `desired`, NaN if none.
pub fn nearest_within(values: &[f64], start: f64, end: f64, desired: f64) -> f64 {
    values
        .iter()
        .copied()
        .filter(|v| start <= *v && *v <= end)
        .min_by(|a, b| (a - desired).abs().total_cmp(&(b - desired).abs()))
        .unwrap_or(f64::NAN)
}

/// Locate each window's peak in the spectrum and integrate it.
pub fn quantify(spectrum: &Spectrum, windows: &[PeakWindow], min_prominence: f64) -> Vec<PeakArea> {
    let peaks = find_peaks(&spectrum.x, &spectrum.y, min_prominence);
    let positions: Vec<f64> = peaks.iter().map(|p| p.position).collect();

    windows
        .iter()
        .map(|window| {
            let position = nearest_within(&positions, window.start, window.end, window.expected);
            let peak = peaks.iter().find(|p| p.position == position);
            let (left, right) = peak.map_or((f64::NAN, f64::NAN), |p| (p.left, p.right));
            PeakArea {
                window: window.name.clone(),
                position,
                left,
                right,
                area: integrate_peak(&spectrum.x, &spectrum.y, left, right),
            }
        })
        .collect()
}
