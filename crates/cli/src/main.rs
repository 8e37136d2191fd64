use std::process::ExitCode;

use bistro_core::config::{AppConfig, LoadOptions, LogFormat};
use tracing_subscriber::EnvFilter;

fn init_logging(config: Option<&AppConfig>) {
    let level = config.map(|config| config.logging.level.as_str()).unwrap_or("info");
    let format = config.map(|config| config.logging.format).unwrap_or(LogFormat::Compact);
    let filter = EnvFilter::try_from_env("BISTRO_LOG_FILTER")
        .unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn main() -> ExitCode {
    // Commands report config errors themselves; logging falls back to defaults.
    let config = AppConfig::load(LoadOptions::default()).ok();
    init_logging(config.as_ref());
    bistro_cli::run()
}
