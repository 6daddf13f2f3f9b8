//! `tracing` subscriber configuration.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    /// Human-readable lines for local development.
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub format: LogFormat,
    /// Default directive when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            level: "info".to_string(),
        }
    }
}

impl LogSettings {
    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.level))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

pub fn init(settings: &LogSettings) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(settings.filter())
        .with_timer(tracing_subscriber::fmt::time::SystemTime);

    // try_init: a second call (tests, embedded use) must not panic.
    let _ = match settings.format {
        LogFormat::Json => builder.json().with_target(false).try_init(),
        LogFormat::Pretty => builder.with_target(true).try_init(),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_is_harmless() {
        init(&LogSettings::default());
        init(&LogSettings {
            format: LogFormat::Pretty,
            level: "debug".into(),
        });
        tracing::info!("still logging");
    }

    #[test]
    fn settings_deserialize_with_defaults() {
        let s: LogSettings = serde_json::from_str(r#"{"format":"pretty"}"#).unwrap();
        assert_eq!(s.format, LogFormat::Pretty);
        assert_eq!(s.level, "info");
    }
}
