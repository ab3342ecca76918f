#![cfg_attr(target_os = "windows", windows_subsystem = "windows")]

use anyhow::Context;

mod app;
mod client;
mod clipboard;
mod config;
mod hotkey;
mod logger;
mod menu;
mod status;
mod tray;
mod ui;

use clipboard::{ClipboardBridge, EnigoKeys, SystemPasteboard};
use config::Config;

fn main() -> anyhow::Result<()> {
    // Init logger first
    logger::init();
    log::info!("App starting");

    // Config: stored key wins; env vars fill in a missing key or redirect the endpoint
    let config_path = Config::path();
    let mut config = Config::load_from(&config_path);
    config.apply_env();
    log::info!("Config loaded from {}: {:?}", config_path.display(), config);

    let client = client::CorrectionClient::new(&config.base_url)?;
    let bridge = ClipboardBridge::new(
        Box::new(SystemPasteboard::new().context("opening clipboard")?),
        Box::new(EnigoKeys::new()?),
    );

    // Network work runs here; clipboard and status stay on the UI thread
    let runtime = tokio::runtime::Runtime::new().context("starting tokio runtime")?;

    let result = ui::run(ui::Startup {
        config,
        config_path,
        client,
        bridge,
        runtime: runtime.handle().clone(),
    });
    if let Err(e) = &result {
        log::error!("{:#}", e);
    }
    result
}
