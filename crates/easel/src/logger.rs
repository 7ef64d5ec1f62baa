use std::io::Write as _;

use log::{LevelFilter, Metadata, Record, SetLoggerError};

static LOGGER: StderrLogger = StderrLogger;

/// Installs a logger printing `LEVEL target - message` lines to stderr.
/// Only binaries should call this; the library just emits through `log`.
pub fn initialize(level_filter: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER).map(|()| log::set_max_level(level_filter))
}

/// Parses a level name such as `debug`; unknown names fall back to `default`.
pub fn level_from_name(name: Option<&str>, default: LevelFilter) -> LevelFilter {
    name.and_then(|name| name.trim().parse().ok())
        .unwrap_or(default)
}

struct StderrLogger;
impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(
                stderr,
                "{:<5} {} - {}",
                record.level(),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[cfg(test)]
mod tests {
    use log::LevelFilter;

    use super::level_from_name;

    #[test]
    fn level_names_parse_case_insensitively() {
        assert_eq!(level_from_name(Some("DEBUG"), LevelFilter::Info), LevelFilter::Debug);
        assert_eq!(level_from_name(Some(" trace "), LevelFilter::Info), LevelFilter::Trace);
        assert_eq!(level_from_name(Some("loud"), LevelFilter::Warn), LevelFilter::Warn);
        assert_eq!(level_from_name(None, LevelFilter::Info), LevelFilter::Info);
    }
}
