//! `ims-toolbox`: viewer for datasets written by `ims-process`.
//!
//! ```bash
//! ims-toolbox integrated.parquet [ims.toml]
//! ```
//! The optional config contributes its peak windows as plot overlay.

mod app;
mod color;
mod state;
mod ui;

use std::path::Path;

use app::ImsViewerApp;
use eframe::egui;

fn main() -> eframe::Result {
    env_logger::init();

    let mut app = ImsViewerApp::default();
    let mut args = std::env::args().skip(1);
    if let Some(dataset) = args.next() {
        app.state.open(Path::new(&dataset));
    }
    if let Some(config) = args.next() {
        if let Err(e) = app.state.open_config(Path::new(&config)) {
            log::error!("Failed to load peak windows: {e:#}");
            app.state.status_message = Some(format!("Error: {e:#}"));
        }
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([600.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "IMS Toolbox – Spectral Viewer",
        options,
        Box::new(|_cc| Ok(Box::new(app))),
    )
}
