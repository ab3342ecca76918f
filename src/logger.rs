use crate::config::APP_DIR;
use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, SharedLogger, TermLogger, TerminalMode, WriteLogger,
};
use std::fs::{self, OpenOptions};
use std::path::PathBuf;

pub fn log_path() -> PathBuf {
    APP_DIR.join("log.txt")
}

/// Level from `REWRITE_LOG` (e.g. `debug`), `info` otherwise.
fn level() -> LevelFilter {
    std::env::var("REWRITE_LOG")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(LevelFilter::Info)
}

/// Terminal plus append-only `log.txt`. If the file can't be opened we still
/// log to the terminal.
pub fn init() {
    let level = level();
    let config = ConfigBuilder::new()
        .add_filter_allow_str("rewrite")
        .build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        config.clone(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];

    let path = log_path();
    let _ = fs::create_dir_all(&*APP_DIR);
    match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(f) => loggers.push(WriteLogger::new(level, config, f)),
        Err(e) => eprintln!("Rewrite: cannot open {}: {}", path.display(), e),
    }

    if CombinedLogger::init(loggers).is_ok() {
        log::info!("===== Rewrite {} start =====", env!("CARGO_PKG_VERSION"));
    }
}
