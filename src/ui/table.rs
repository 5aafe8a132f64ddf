use eframe::egui::{RichText, Ui};
use egui_extras::{Column, TableBuilder};

use crate::state::ViewerState;

/// Metadata of the visible spectra, one row per spectrum.
pub fn metadata_table(ui: &mut Ui, state: &ViewerState) {
    let Some(dataset) = &state.dataset else {
        return;
    };
    let columns = &dataset.column_names;

    TableBuilder::new(ui)
        .striped(true)
        .resizable(true)
        .column(Column::auto())
        .columns(Column::auto().at_least(80.0), columns.len())
        .header(20.0, |mut header| {
            header.col(|ui| {
                ui.strong("#");
            });
            for col in columns {
                header.col(|ui| {
                    ui.strong(col);
                });
            }
        })
        .body(|body| {
            body.rows(18.0, state.visible_indices.len(), |mut row| {
                let idx = state.visible_indices[row.index()];
                let sp = &dataset.spectra[idx];
                row.col(|ui| {
                    ui.label(idx.to_string());
                });
                for col in columns {
                    row.col(|ui| {
                        let text = sp.metadata.get(col).map(|v| v.to_cell()).unwrap_or_default();
                        let mut text = RichText::new(text);
                        if state.color_column.as_deref() == Some(col.as_str()) {
                            if let Some(color) = sp
                                .metadata
                                .get(col)
                                .zip(state.color_map.as_ref())
                                .map(|(v, cm)| cm.color_for(v))
                            {
                                text = text.color(color);
                            }
                        }
                        ui.label(text);
                    });
                }
            });
        });
}
