use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};

use crate::state::{Scaling, ViewerState};

/// Render the left panel: colour selection and per-column filters.
pub fn side_panel(ui: &mut Ui, state: &mut ViewerState) {
    ui.heading("Filters");
    ui.separator();

    let Some(dataset) = &state.dataset else {
        ui.label("No dataset loaded.");
        return;
    };

    // Clone what we need so we can mutate state inside the loop.
    let columns = dataset.column_names.clone();
    let unique = dataset.unique_values.clone();

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            color_selector(ui, state, &columns);
            ui.separator();

            for col in &columns {
                let Some(all_values) = unique.get(col) else {
                    continue;
                };
                let n_selected = state.filters.get(col).map_or(0, |s| s.len());
                let header = format!("{col}  ({n_selected}/{})", all_values.len());

                egui::CollapsingHeader::new(RichText::new(header).strong())
                    .id_salt(col)
                    .default_open(false)
                    .show(ui, |ui: &mut Ui| {
                        ui.horizontal(|ui: &mut Ui| {
                            if ui.small_button("All").clicked() {
                                state.select_all(col);
                            }
                            if ui.small_button("None").clicked() {
                                state.select_none(col);
                            }
                        });

                        let colored = state.color_column.as_deref() == Some(col.as_str());
                        for val in all_values {
                            let mut text = RichText::new(val.to_string());
                            if let Some(cm) = state.color_map.as_ref().filter(|_| colored) {
                                text = text.color(cm.color_for(val));
                            }
                            let mut checked = state
                                .filters
                                .get(col)
                                .is_some_and(|s| s.contains(val));
                            if ui.checkbox(&mut checked, text).changed() {
                                state.toggle_filter_value(col, val);
                            }
                        }
                    });
            }

            if !state.peak_windows.is_empty() {
                ui.separator();
                ui.strong("Peak windows");
                for w in &state.peak_windows {
                    ui.label(format!(
                        "{}: {:.3} – {:.3} ms (expected {:.3})",
                        w.name, w.start, w.end, w.expected
                    ));
                }
            }
        });
}

fn color_selector(ui: &mut Ui, state: &mut ViewerState, columns: &[String]) {
    ui.strong("Color by");
    let current = state.color_column.clone().unwrap_or_default();
    egui::ComboBox::from_id_salt("color_by")
        .selected_text(&current)
        .show_ui(ui, |ui: &mut Ui| {
            for col in columns {
                if ui.selectable_label(current == *col, col).clicked() {
                    state.set_color_column(col.clone());
                }
            }
        });

    if let Some(cm) = state.color_map.as_ref().filter(|cm| cm.is_gradient()) {
        ui.horizontal(|ui: &mut Ui| {
            for (label, color) in cm.legend_entries() {
                ui.label(RichText::new("■").color(color));
                ui.label(label);
            }
        });
    }
}

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut ViewerState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open dataset…").clicked() {
                open_dataset_dialog(state);
                ui.close_menu();
            }
            if ui.button("Load peak windows…").clicked() {
                open_config_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        if let Some(ds) = &state.dataset {
            ui.label(format!(
                "{} spectra loaded, {} visible",
                ds.len(),
                state.visible_indices.len()
            ));
        }

        ui.separator();

        let mut minmax = state.scaling == Scaling::MinMax;
        if ui.toggle_value(&mut minmax, "Min-Max Scaling").changed() {
            state.scaling = if minmax { Scaling::MinMax } else { Scaling::Raw };
        }
        ui.toggle_value(&mut state.show_table, "Table");

        if let Some(msg) = &state.status_message {
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

fn open_dataset_dialog(state: &mut ViewerState) {
    let file = rfd::FileDialog::new()
        .set_title("Open processed IMS dataset")
        .add_filter("Supported files", &["parquet", "pq", "json", "csv"])
        .add_filter("Parquet", &["parquet", "pq"])
        .add_filter("JSON", &["json"])
        .add_filter("CSV", &["csv"])
        .pick_file();

    if let Some(path) = file {
        state.open(&path);
    }
}

fn open_config_dialog(state: &mut ViewerState) {
    let file = rfd::FileDialog::new()
        .set_title("Load peak windows from pipeline config")
        .add_filter("TOML", &["toml"])
        .pick_file();

    if let Some(path) = file {
        if let Err(e) = state.open_config(&path) {
            log::error!("Failed to load peak windows: {e:#}");
            state.status_message = Some(format!("Error: {e:#}"));
        }
    }
}
