use eframe::egui;

use crate::state::ViewerState;
use crate::ui::{panels, plot, table};

#[derive(Default)]
pub struct ImsViewerApp {
    pub state: ViewerState,
}

impl eframe::App for ImsViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: colour + filters ----
        egui::SidePanel::left("filter_panel")
            .default_width(240.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Bottom panel: metadata of visible spectra ----
        if self.state.show_table && self.state.dataset.is_some() {
            egui::TopBottomPanel::bottom("metadata_table")
                .resizable(true)
                .default_height(200.0)
                .show(ctx, |ui| {
                    table::metadata_table(ui, &self.state);
                });
        }

        // ---- Central panel: plot ----
        egui::CentralPanel::default().show(ctx, |ui| {
            plot::spectral_plot(ui, &self.state);
        });
    }
}
