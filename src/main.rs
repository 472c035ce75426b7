use std::env;
use std::path::PathBuf;

use eframe::egui;

mod app;
mod encode;
mod gemini;
mod session;
mod worker;

use app::PravkaApp;

fn main() -> eframe::Result<()> {
    env_logger::init();

    // Optional path argument preloads an image.
    let args: Vec<String> = env::args().collect();
    let initial_path = args.get(1).map(PathBuf::from);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("pravka")
            .with_inner_size([1100.0, 800.0])
            .with_min_inner_size([640.0, 480.0])
            .with_app_id("pravka")
            .with_drag_and_drop(true),
        ..Default::default()
    };

    eframe::run_native(
        "pravka",
        options,
        Box::new(|cc| Ok(Box::new(PravkaApp::new(cc, initial_path)))),
    )
}
