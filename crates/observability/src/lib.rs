//! Process-wide logging setup.

pub mod logging;

pub use logging::{LogFormat, LogSettings};

/// JSON logs at `info` unless `RUST_LOG` says otherwise.
///
/// Safe to call multiple times; later calls are no-ops.
pub fn init() {
    logging::init(&LogSettings::default());
}

pub fn init_with(settings: &LogSettings) {
    logging::init(settings);
}
