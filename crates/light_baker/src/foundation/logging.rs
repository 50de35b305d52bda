//! Logging utilities

pub use log::{debug, info, warn, error, trace};

/// Initialize the logging system from `RUST_LOG`
pub fn init() {
    env_logger::init();
}

/// Initialize logging with an explicit level filter.
///
/// Fails when a logger is already installed for this process.
pub fn init_with_level(level: log::LevelFilter) -> Result<(), log::SetLoggerError> {
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_reports_installed_logger() {
        // The first call may also fail if another test installed a logger already
        let _ = init_with_level(log::LevelFilter::Warn);
        assert!(init_with_level(log::LevelFilter::Debug).is_err());
    }
}
