use std::io::Write;

use chrono::Local;
use log::{LevelFilter, SetLoggerError};

/// Parses a level name from the config, falling back to `Info`
pub fn parse_level(level: &str) -> LevelFilter {
    level.trim().parse().unwrap_or(LevelFilter::Info)
}

/// Installs the stderr logger. `RUST_LOG` takes precedence over `level`.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}",
                Local::now().to_rfc3339(),
                record.level(),
                record.args()
            )
        })
        .try_init()?;
    log::info!("Logging initialized");
    Ok(())
}
