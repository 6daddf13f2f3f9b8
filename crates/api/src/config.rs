//! Service configuration.
//!
//! Loaded from (lowest to highest precedence): built-in defaults, a TOML file
//! (`aura.toml` in the working directory, or the path in `AURA_CONFIG`), and
//! `AURA_`-prefixed environment variables with `__` separating nested keys
//! (`AURA_SMTP__HOST`, `AURA_BOOTSTRAP_ADMIN__EMAIL`).

use std::net::SocketAddr;
use std::path::PathBuf;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use aura_infra::mail::SmtpSettings;
use aura_observability::LogSettings;

const CONFIG_FILE_NAME: &str = "aura.toml";
const DEV_JWT_SECRET: &str = "aura-dev-secret";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// HS256 signing secret. Unset falls back to a development secret.
    pub jwt_secret: Option<String>,
    pub token_ttl_minutes: i64,
    pub database_url: Option<String>,
    /// Use the Postgres event store (requires `database_url` and the `postgres` feature).
    pub use_persistent_stores: bool,
    /// No `smtp.host` means scheduled reports go to an in-memory outbox.
    pub smtp: SmtpConfig,
    pub scheduler_tick_seconds: u64,
    pub bootstrap_admin: BootstrapAdmin,
    pub log: LogSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    pub host: Option<String>,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

/// System administrator created on first start when no account with this
/// e-mail exists in the system tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            jwt_secret: None,
            token_ttl_minutes: 60,
            database_url: None,
            use_persistent_stores: false,
            smtp: SmtpConfig::default(),
            scheduler_tick_seconds: 30,
            bootstrap_admin: BootstrapAdmin::default(),
            log: LogSettings::default(),
        }
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: 587,
            username: None,
            password: None,
            from: "Aura HRMS <noreply@aura.local>".to_string(),
        }
    }
}

impl Default for BootstrapAdmin {
    fn default() -> Self {
        Self {
            email: "admin@aura.local".to_string(),
            password: None,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os("AURA_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
        Self::load_from(Figment::new().merge(Toml::file(path)))
    }

    /// Layer `overrides` between the defaults and the environment.
    pub fn load_from(overrides: Figment) -> Result<Self, ConfigError> {
        let config: AppConfig = Figment::new()
            .merge(Serialized::defaults(AppConfig::default()))
            .merge(overrides)
            .merge(Env::prefixed("AURA_").split("__"))
            .extract()
            .map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token_ttl_minutes <= 0 {
            return Err(ConfigError::Invalid("token_ttl_minutes must be positive".into()));
        }
        if self.scheduler_tick_seconds == 0 {
            return Err(ConfigError::Invalid("scheduler_tick_seconds must be positive".into()));
        }
        if self.use_persistent_stores && self.database_url.is_none() {
            return Err(ConfigError::Invalid(
                "use_persistent_stores requires database_url".into(),
            ));
        }
        if self.jwt_secret.as_deref().is_some_and(|s| s.trim().is_empty()) {
            return Err(ConfigError::Invalid("jwt_secret must not be blank".into()));
        }
        Ok(())
    }

    pub fn jwt_secret(&self) -> String {
        match &self.jwt_secret {
            Some(secret) => secret.clone(),
            None => {
                tracing::warn!("jwt_secret not configured; using insecure development secret");
                DEV_JWT_SECRET.to_string()
            }
        }
    }

    pub fn smtp_settings(&self) -> Option<SmtpSettings> {
        self.smtp.host.as_ref().map(|host| SmtpSettings {
            host: host.clone(),
            port: self.smtp.port,
            username: self.smtp.username.clone(),
            password: self.smtp.password.clone(),
            from: self.smtp.from.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bind_addr.port(), 8080);
        assert!(config.smtp_settings().is_none());
    }

    #[test]
    fn toml_overrides_defaults() {
        let toml = r#"
            token_ttl_minutes = 15
            [smtp]
            host = "smtp.acme.io"
            port = 2525
            [bootstrap_admin]
            email = "root@acme.io"
        "#;
        let config = AppConfig::load_from(Figment::new().merge(Toml::string(toml))).unwrap();
        assert_eq!(config.token_ttl_minutes, 15);
        assert_eq!(config.bootstrap_admin.email, "root@acme.io");
        let smtp = config.smtp_settings().unwrap();
        assert_eq!(smtp.port, 2525);
        assert_eq!(config.scheduler_tick_seconds, 30);
    }

    #[test]
    fn persistent_stores_need_a_database() {
        let toml = "use_persistent_stores = true";
        assert!(matches!(
            AppConfig::load_from(Figment::new().merge(Toml::string(toml))),
            Err(ConfigError::Invalid(_))
        ));
    }
}
