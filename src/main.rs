mod app;
mod baud;
mod dialog;
mod logging;
mod monitor;
mod output;
mod serial;
mod settings;
mod theme;
mod ui;

use std::path::Path;

use anyhow::Result;

fn main() -> Result<()> {
    // Diagnostics are optional; the monitor works without a log file.
    let _ = logging::init_tracing(Path::new(logging::LOG_FILE));
    logging::install_panic_hook();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "serial monitor starting");

    let res = app::run();
    if let Err(e) = &res {
        tracing::error!(error = %format!("{e:#}"), "serial monitor exited with error");
    }
    res
}
