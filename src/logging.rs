use log::LevelFilter;
use std::io::Write;

use crate::error::ConfigError;

/// Map a `--loglevel` name onto a log filter.
///
/// `CRITICAL` has no counterpart in the `log` crate and maps to `Error`.
/// The misspelling `CRTICAL` is accepted for old scripts.
pub fn parse_log_level(level: &str) -> Result<LevelFilter, ConfigError> {
    match level.trim().to_uppercase().as_str() {
        "CRITICAL" | "CRTICAL" | "ERROR" => Ok(LevelFilter::Error),
        "WARNING" | "WARN" => Ok(LevelFilter::Warn),
        "INFO" => Ok(LevelFilter::Info),
        "DEBUG" => Ok(LevelFilter::Debug),
        "TRACE" => Ok(LevelFilter::Trace),
        _ => Err(ConfigError::InvalidLogLevel(level.to_string())),
    }
}

/// Install the global logger. Records print as `LEVEL message` on stderr;
/// `RUST_LOG` may still refine individual modules.
pub fn init_logger(level: LevelFilter) {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(level)
        .format(|buf, record| writeln!(buf, "{} {}", record.level(), record.args()))
        .try_init();
}
