//! Configuration management.
//!
//! Layers, lowest priority first:
//! 1. Default values in code (the bare `API_KEY` and `DATABASE_URL`
//!    variables seed the key and database defaults)
//! 2. Optional `config/skytheme.toml`, or an explicit file
//! 3. Environment overrides such as `SKYTHEME__SERVER__PORT=9000`

use config::{ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::location::DisambiguationPolicy;
use crate::theme::{ThemeRules, MAX_WINDOW_MINUTES};

pub const ENV_PREFIX: &str = "SKYTHEME";
const DEFAULT_FILE: &str = "config/skytheme";

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub upstream: UpstreamConfig,
    pub resolver: ResolverConfig,
    pub theme: ThemeRules,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// SQLite URL, e.g. `sqlite://skytheme.db`
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamConfig {
    pub openweather_api_key: String,
    pub openweather_base_url: String,
    pub open_meteo_base_url: String,
    pub timezone_base_url: String,
    pub timeout_secs: u64,
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ResolverConfig {
    /// Candidates requested per geocoding lookup.
    pub limit: usize,
    pub policy: DisambiguationPolicy,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_secs: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    pub level: String,
}

impl Settings {
    /// Load from `config/skytheme.toml` (if present) and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None, ENV_PREFIX)
    }

    /// Load with an explicit file (which must exist) and env prefix.
    pub fn load_from(file: Option<&Path>, env_prefix: &str) -> Result<Self, ConfigError> {
        let file_source = match file {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_FILE).required(false),
        };

        let settings: Settings = config::Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default(
                "database.url",
                std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://skytheme.db".into()),
            )?
            .set_default("database.max_connections", 5)?
            .set_default("upstream.openweather_api_key", std::env::var("API_KEY").unwrap_or_default())?
            .set_default("upstream.openweather_base_url", "https://api.openweathermap.org")?
            .set_default("upstream.open_meteo_base_url", "https://api.open-meteo.com")?
            .set_default("upstream.timezone_base_url", "https://timeapi.io")?
            .set_default("upstream.timeout_secs", 10)?
            .set_default("resolver.limit", 7)?
            .set_default("resolver.policy", "best_pick")?
            .set_default("theme.cold_policy", "freezing")?
            .set_default("theme.sunrise_window_minutes", 30)?
            .set_default("theme.sunset_window_minutes", 20)?
            .set_default("auth.jwt_secret", "dev")?
            .set_default("auth.token_ttl_secs", 86_400)?
            .set_default("logging.level", "skytheme=info,tower_http=info")?
            .add_source(file_source)
            .add_source(Environment::with_prefix(env_prefix).separator("__").try_parsing(true))
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.upstream.openweather_api_key.trim().is_empty() {
            return Err(ConfigError::Message(
                "missing OpenWeather API key (set API_KEY or SKYTHEME__UPSTREAM__OPENWEATHER_API_KEY)".into(),
            ));
        }
        if self.resolver.limit == 0 {
            return Err(ConfigError::Message("resolver.limit must be at least 1".into()));
        }
        for (key, minutes) in [
            ("theme.sunrise_window_minutes", self.theme.sunrise_window_minutes),
            ("theme.sunset_window_minutes", self.theme.sunset_window_minutes),
        ] {
            if minutes > MAX_WINDOW_MINUTES {
                return Err(ConfigError::Message(format!(
                    "{} must be at most {} minutes, got {}",
                    key, MAX_WINDOW_MINUTES, minutes
                )));
            }
        }
        Ok(())
    }
}
