use std::collections::{BTreeMap, BTreeSet};

use eframe::egui::Color32;
use palette::{Hsl, IntoColor, LinSrgb, Mix, Srgb};

use ims_toolbox::data::model::MetadataValue;

/// Colour of spectra whose value is missing or unknown to the map.
const MISSING: Color32 = Color32::GRAY;

/// More distinct numeric values than this are drawn as a gradient.
const MAX_CATEGORIES: usize = 12;

fn to_color32(rgb: Srgb) -> Color32 {
    let rgb: Srgb<u8> = rgb.into_format();
    Color32::from_rgb(rgb.red, rgb.green, rgb.blue)
}

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            to_color32(Hsl::new(hue, 0.75, 0.55).into_color())
        })
        .collect()
}

/// Blue → red ramp for concentrations and peak areas, `t` in [0, 1].
pub fn gradient(t: f64) -> Color32 {
    let low = LinSrgb::new(0.05f32, 0.2, 0.9);
    let high = LinSrgb::new(0.9f32, 0.1, 0.05);
    let mixed = low.mix(high, t.clamp(0.0, 1.0) as f32);
    to_color32(Srgb::from_linear(mixed))
}

#[derive(Debug, Clone)]
enum Scheme {
    /// One hue per distinct value.
    Categorical(BTreeMap<MetadataValue, Color32>),
    /// Numeric values placed on [`gradient`] between `min` and `max`.
    Gradient { min: f64, max: f64 },
}

/// Maps metadata values of a chosen column to colours.
#[derive(Debug, Clone)]
pub struct ColorMap {
    pub column: String,
    scheme: Scheme,
}

impl ColorMap {
    /// Build a colour map for `column`. Purely numeric columns with many
    /// distinct values (HPLC results, peak areas) get a gradient.
    pub fn new(column: &str, unique_values: &BTreeSet<MetadataValue>) -> Self {
        let present: Vec<&MetadataValue> = unique_values
            .iter()
            .filter(|v| **v != MetadataValue::Null)
            .collect();
        let numbers: Vec<f64> = present.iter().filter_map(|v| v.as_f64()).collect();

        let scheme = if numbers.len() == present.len() && numbers.len() > MAX_CATEGORIES {
            let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
            let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            Scheme::Gradient { min, max }
        } else {
            let palette = generate_palette(present.len());
            let mut mapping: BTreeMap<MetadataValue, Color32> = present
                .iter()
                .map(|v| (*v).clone())
                .zip(palette)
                .collect();
            if unique_values.contains(&MetadataValue::Null) {
                mapping.insert(MetadataValue::Null, MISSING);
            }
            Scheme::Categorical(mapping)
        };

        ColorMap {
            column: column.to_string(),
            scheme,
        }
    }

    pub fn is_gradient(&self) -> bool {
        matches!(self.scheme, Scheme::Gradient { .. })
    }

    /// Look up the colour for a given metadata value.
    pub fn color_for(&self, value: &MetadataValue) -> Color32 {
        match &self.scheme {
            Scheme::Categorical(mapping) => mapping.get(value).copied().unwrap_or(MISSING),
            Scheme::Gradient { min, max } => match value.as_f64() {
                Some(v) if max > min => gradient((v - min) / (max - min)),
                Some(_) => gradient(0.5),
                None => MISSING,
            },
        }
    }

    /// Legend entries (value label → colour). Gradients list their two ends.
    pub fn legend_entries(&self) -> Vec<(String, Color32)> {
        match &self.scheme {
            Scheme::Categorical(mapping) => mapping
                .iter()
                .map(|(v, c)| (v.to_string(), *c))
                .collect(),
            Scheme::Gradient { min, max } => vec![
                (format!("{min:.4}"), gradient(0.0)),
                (format!("{max:.4}"), gradient(1.0)),
            ],
        }
    }
}
