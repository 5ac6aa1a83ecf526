use std::process::ExitCode;

use optiq_core::config::{AppConfig, LoadOptions};

fn init_logging(config: Option<&AppConfig>) {
    use optiq_core::config::LogFormat::*;
    use tracing::Level;

    let (level, format) = match config {
        Some(config) => (config.logging.level.as_str(), config.logging.format),
        None => ("info", Compact),
    };
    let log_level = level.parse::<Level>().unwrap_or(Level::INFO);

    match format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

fn main() -> ExitCode {
    // Logging uses the resolved config when it loads; commands report
    // configuration failures themselves.
    let config = AppConfig::load(LoadOptions::default()).ok();
    init_logging(config.as_ref());

    optiq_cli::run()
}
