use error_stack::{Report, ResultExt};
use log::LevelFilter;

use crate::error::RtdError;

/// Install a stderr logger with millisecond RFC 3339 timestamps.
///
/// Hosts that already route the `log` facade elsewhere should skip this.
///
/// # Errors
///
/// Returns an error if a global logger is already installed.
pub fn init_logging(level: LevelFilter) -> Result<(), Report<RtdError>> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}  {} [{}] {}",
                chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()
        .change_context(RtdError::Configuration {
            message: "Failed to initialize logger".to_string(),
        })
}
