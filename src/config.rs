//! Layered application settings.
//!
//! Sources, lowest precedence first: built-in defaults, `config/default.toml`,
//! `config/{VIDAPLUS_ENV}.toml`, `VIDAPLUS__*` environment variables, and
//! finally the conventional `DATABASE_URL`, `JWT_SECRET` and `PORT` variables.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    pub cors: CorsSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    pub jwt_secret: Option<String>,
    pub token_ttl_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsSettings {
    pub allowed_origin: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    pub json: bool,
}

impl Settings {
    /// Loads settings from files and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("VIDAPLUS_ENV").unwrap_or_else(|_| "development".into());
        let builder = Self::defaults()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{env}")).required(false))
            .add_source(Environment::with_prefix("VIDAPLUS").prefix_separator("__").separator("__"))
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("auth.jwt_secret", std::env::var("JWT_SECRET").ok())?
            .set_override_option("server.port", std::env::var("PORT").ok())?;
        builder.build()?.try_deserialize()
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("database.url", "postgres://localhost/vidaplus")?
            .set_default("database.max_connections", 10)?
            .set_default("database.run_migrations", true)?
            .set_default("auth.token_ttl_hours", 168)?
            .set_default("cors.allowed_origin", "https://vidaplus.vercel.app")?
            .set_default("log.json", false)
    }

    pub fn jwt_secret(&self) -> Result<&str, ConfigError> {
        self.auth
            .jwt_secret
            .as_deref()
            .filter(|secret| !secret.is_empty())
            .ok_or_else(|| ConfigError::Message("JWT_SECRET is not defined".into()))
    }

    pub fn bind_address(&self) -> (String, u16) {
        (self.server.host.clone(), self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_deserialize() {
        let settings: Settings = Settings::defaults()
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(settings.server.port, 3000);
        assert_eq!(settings.auth.token_ttl_hours, 168);
        assert_eq!(settings.cors.allowed_origin, "https://vidaplus.vercel.app");
        assert!(settings.server.workers.is_none());
        assert!(settings.jwt_secret().is_err());
    }

    #[test]
    fn overrides_win_over_defaults() {
        let settings: Settings = Settings::defaults()
            .unwrap()
            .set_override("auth.jwt_secret", "s3cret")
            .unwrap()
            .set_override("server.port", "8080")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(settings.jwt_secret().unwrap(), "s3cret");
        assert_eq!(settings.bind_address(), ("0.0.0.0".to_string(), 8080));
    }
}
