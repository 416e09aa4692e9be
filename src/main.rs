//! Application entry point: virtual mic provisioner.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Detect the host package family.
//! 4. Create the UI event channel and the [`Provisioner`] around it.
//! 5. Run [`eframe::run_native`]: blocks the main thread until the window
//!    is closed.

use std::sync::Arc;

use eframe::egui;
use vmic_provision::{
    app::VirtualMicApp,
    command::SystemExecutor,
    config::AppConfig,
    notify::ChannelSink,
    probe::{HostPackageProfile, PathLookup},
    provision::Provisioner,
};

fn native_options(config: &AppConfig) -> eframe::NativeOptions {
    let (width, height) = config.ui.window_size;
    let viewport = egui::ViewportBuilder::default()
        .with_title("Virtual Mic")
        .with_inner_size([width, height])
        .with_min_inner_size([360.0, 220.0]);

    eframe::NativeOptions {
        viewport,
        ..Default::default()
    }
}

fn main() -> eframe::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("virtual mic provisioner starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Package family
    let profile = HostPackageProfile::detect(&PathLookup);

    // 4. Channel + provisioner
    let (sink, events) = ChannelSink::channel();
    let sink = Arc::new(sink);
    let options = native_options(&config);
    let provisioner = Provisioner::new(
        config,
        profile,
        Arc::new(SystemExecutor::new()),
        Arc::new(PathLookup),
        sink.clone(),
        sink,
    );

    // 5. UI (blocks until the window is closed)
    let app = VirtualMicApp::new(provisioner, events);
    eframe::run_native(
        "Virtual Mic",
        options,
        Box::new(move |_cc| Ok(Box::new(app))),
    )
}
