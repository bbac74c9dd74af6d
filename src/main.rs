use ariadne::gui::frontend::PaperApp;
use ariadne::persistence::settings::{AppSettings, EnvOverrides};

use eframe::egui;

fn main() -> eframe::Result {
    env_logger::init();
    let stored = AppSettings::load_stored();
    let overrides = EnvOverrides::from_env();
    log::info!("using backend {}", stored.effective(&overrides).api_base_url);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1300.0, 760.0])
            // Provide sensible bounds so the UI stays usable on small screens
            .with_min_inner_size([720.0, 440.0])
            .with_resizable(true),
        ..Default::default()
    };
    eframe::run_native(
        "Ariadne",
        options,
        Box::new(move |_cc| Ok(Box::new(PaperApp::new(stored, overrides)?) as Box<dyn eframe::App>)),
    )
}
