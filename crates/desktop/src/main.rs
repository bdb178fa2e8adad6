//! Routechat Desktop — application entry.

mod app;

use eframe::egui;

fn main() -> eframe::Result<()> {
    app::install_logger();

    let chat = match app::ChatContext::from_config() {
        Ok(chat) => chat,
        Err(e) => {
            log::error!("startup failed: {:#}", e);
            eprintln!("routechat-desktop: {:#}", e);
            std::process::exit(1);
        }
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 760.0])
            .with_min_inner_size([720.0, 520.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Routechat",
        options,
        Box::new(|cc| Box::new(app::RoutechatApp::new(cc, chat))),
    )
}
