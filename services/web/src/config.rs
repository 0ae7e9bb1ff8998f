//! Application configuration
//!
//! Values come from an optional `config.toml` next to the binary and are then
//! overridden by (unprefixed) environment variables such as `JWT_SECRET` or
//! `DATABASE_PASSWORD`.

use std::time::Duration;

use anyhow::{Context, Result};
use common::database::DatabaseConfig;
use serde::Deserialize;

/// Deployment mode, drives error verbosity and cookie security
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

/// How outgoing email is delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MailTransport {
    /// Write messages to the log instead of sending them
    #[default]
    Log,
    /// Relay through an SMTP server
    Smtp,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app_env: Environment,
    pub port: u16,

    /// Connection string, may contain `<PASSWORD>`
    pub database: String,
    pub database_password: String,
    pub database_max_connections: u32,

    pub jwt_secret: String,
    /// Token lifetime such as `90d`, `12h`, `30m` or `45s`
    pub jwt_expires_in: String,
    /// Cookie lifetime in days
    pub jwt_cookie_expires_in: i64,

    pub email_transport: MailTransport,
    pub email_from: String,
    pub email_host: String,
    pub email_port: u16,
    pub email_username: String,
    pub email_password: String,

    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub stripe_api_base: String,

    pub public_dir: String,
    pub templates_dir: String,

    /// Average applied to a tour once its last review is gone
    pub default_ratings_average: f64,

    pub rate_limit_max: u32,
    pub rate_limit_window_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_env: Environment::Development,
            port: 3000,
            database: "postgresql://postgres:<PASSWORD>@localhost:5432/natours".to_string(),
            database_password: String::new(),
            database_max_connections: 10,
            jwt_secret: String::new(),
            jwt_expires_in: "90d".to_string(),
            jwt_cookie_expires_in: 90,
            email_transport: MailTransport::Log,
            email_from: "hello@natours.io".to_string(),
            email_host: "localhost".to_string(),
            email_port: 587,
            email_username: String::new(),
            email_password: String::new(),
            stripe_secret_key: String::new(),
            stripe_webhook_secret: String::new(),
            stripe_api_base: "https://api.stripe.com".to_string(),
            public_dir: concat!(env!("CARGO_MANIFEST_DIR"), "/public").to_string(),
            templates_dir: concat!(env!("CARGO_MANIFEST_DIR"), "/templates").to_string(),
            default_ratings_average: 4.5,
            rate_limit_max: 100,
            rate_limit_window_secs: 60 * 60,
        }
    }
}

impl AppConfig {
    /// Load configuration from `config.toml` (optional) and the environment
    pub fn load() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::default().try_parsing(true))
            .build()
            .context("Failed to read configuration")?;

        let config: AppConfig = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.jwt_secret.trim().is_empty() {
            anyhow::bail!("JWT_SECRET must be set");
        }
        parse_duration(&self.jwt_expires_in)
            .with_context(|| format!("Invalid JWT_EXPIRES_IN: {}", self.jwt_expires_in))?;
        Ok(())
    }

    pub fn database_config(&self) -> DatabaseConfig {
        let mut config = DatabaseConfig::new(&self.database, &self.database_password);
        config.max_connections = self.database_max_connections;
        config
    }

    /// Token lifetime, falls back to 90 days when unparsable
    pub fn jwt_lifetime(&self) -> Duration {
        parse_duration(&self.jwt_expires_in).unwrap_or(Duration::from_secs(90 * 24 * 60 * 60))
    }
}

/// Parse lifetimes written as `<n>[s|m|h|d]`; a bare number means seconds.
pub fn parse_duration(value: &str) -> Result<Duration> {
    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (digits, unit) = value.split_at(split);
    let amount: u64 = digits
        .parse()
        .with_context(|| format!("Missing amount in duration '{}'", value))?;

    let seconds = match unit {
        "" | "s" => amount,
        "m" => amount * 60,
        "h" => amount * 60 * 60,
        "d" => amount * 24 * 60 * 60,
        other => anyhow::bail!("Unknown duration unit '{}'", other),
    };

    Ok(Duration::from_secs(seconds))
}
