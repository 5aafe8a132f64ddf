use eframe::egui::{Color32, Ui};
use egui_plot::{Legend, Line, Plot, PlotPoints, VLine};

use crate::state::{Scaling, ViewerState};

/// Overlay colour of configured peak windows.
const WINDOW_COLOR: Color32 = Color32::from_rgb(120, 120, 120);

/// Render the integrated IMS spectra in the central panel.
pub fn spectral_plot(ui: &mut Ui, state: &ViewerState) {
    let Some(dataset) = &state.dataset else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Open a processed dataset to view spectra  (File → Open…)");
        });
        return;
    };

    let color_col = state.color_column.as_deref();
    let y_label = match state.scaling {
        Scaling::Raw => "Integrated intensity",
        Scaling::MinMax => "Intensity (min-max scaled)",
    };

    Plot::new("ims_plot")
        .legend(Legend::default())
        .x_axis_label("Drift time [ms]")
        .y_axis_label(y_label)
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true)
        .show(ui, |plot_ui| {
            for window in &state.peak_windows {
                for (x, suffix) in [(window.start, "start"), (window.end, "end")] {
                    plot_ui.vline(
                        VLine::new(x)
                            .name(format!("{} {suffix}", window.name))
                            .color(WINDOW_COLOR)
                            .style(egui_plot::LineStyle::dashed_loose()),
                    );
                }
            }

            for &idx in &state.visible_indices {
                let Some(sp) = dataset.spectra.get(idx) else {
                    continue;
                };
                let value = color_col.and_then(|col| sp.metadata.get(col));

                let color = value
                    .zip(state.color_map.as_ref())
                    .map(|(v, cm)| cm.color_for(v))
                    .unwrap_or(Color32::LIGHT_BLUE);

                // Gradients would put one legend row per spectrum, so lines
                // share the column name instead.
                let name = match (&state.color_map, value) {
                    (Some(cm), Some(_)) if cm.is_gradient() => cm.column.clone(),
                    (_, Some(v)) => v.to_string(),
                    _ => format!("spectrum {idx}"),
                };

                let points: PlotPoints = sp
                    .x
                    .iter()
                    .zip(state.scaling.apply(&sp.y))
                    .map(|(&xi, yi)| [xi, yi])
                    .collect();

                plot_ui.line(Line::new(points).name(name).color(color).width(1.5));
            }
        });
}
