//! Configuration for the pharmacy shift bot servers
//!
//! Settings load in layers: defaults in code, a `.env` file picked up by
//! dotenvy in the binaries, then flat environment-variable overrides
//! (e.g. `STORE_LINE_CHANNEL_ACCESS_TOKEN`, `SPREADSHEET_ID`).

use config::{ConfigError, Environment};
use serde::Deserialize;

/// Which bot a process is running as. Each role owns its own LINE channel
/// credentials; clients are bound to one role at construction so a store
/// message can never go out on the pharmacist channel or vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotRole {
    Store,
    Pharmacist,
}

impl BotRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            BotRole::Store => "store",
            BotRole::Pharmacist => "pharmacist",
        }
    }

    /// Default listen port for the role's server process
    pub fn default_port(&self) -> u16 {
        match self {
            BotRole::Store => 8001,
            BotRole::Pharmacist => 8002,
        }
    }
}

/// Credentials for one LINE Messaging API channel
#[derive(Debug, Clone)]
pub struct LineChannelConfig {
    pub access_token: String,
    pub channel_secret: String,
}

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Verbose logging and relaxed delivery checks
    pub debug: bool,

    /// Application secret
    pub secret_key: String,

    /// Listen host
    pub host: String,

    /// Listen port (defaults to 8001 for the store bot, 8002 for the
    /// pharmacist bot)
    pub port: u16,

    /// Store-channel LINE credentials
    pub store_line_channel_access_token: String,
    pub store_line_channel_secret: String,

    /// Pharmacist-channel LINE credentials
    pub pharmacist_line_channel_access_token: String,
    pub pharmacist_line_channel_secret: String,

    /// Path to the Google service account credentials JSON
    pub google_sheets_credentials_file: String,

    /// Shared spreadsheet holding pharmacists, stores, and applications
    pub spreadsheet_id: String,

    /// Redis connection URL for sessions and request records
    pub redis_url: String,

    /// Auxiliary relational store (reserved; no pool is opened)
    pub database_url: String,
}

impl Config {
    /// Load configuration for the given bot role
    pub fn load(role: BotRole) -> Result<Self, ConfigError> {
        let config = config::Config::builder()
            .set_default("environment", "development")?
            .set_default("debug", true)?
            .set_default("secret_key", "change-me")?
            .set_default("host", "0.0.0.0")?
            .set_default("port", role.default_port())?
            .set_default("store_line_channel_access_token", "")?
            .set_default("store_line_channel_secret", "")?
            .set_default("pharmacist_line_channel_access_token", "")?
            .set_default("pharmacist_line_channel_secret", "")?
            .set_default("google_sheets_credentials_file", "credentials.json")?
            .set_default("spreadsheet_id", "")?
            .set_default("redis_url", "redis://localhost:6379")?
            .set_default("database_url", "sqlite://pharmacy_schedule.db")?
            .add_source(Environment::default().try_parsing(true))
            .build()?;

        config.try_deserialize()
    }

    /// Role-keyed credential lookup. Callers bind the returned channel to a
    /// messaging client at construction time, never at call time.
    pub fn channel(&self, role: BotRole) -> LineChannelConfig {
        match role {
            BotRole::Store => LineChannelConfig {
                access_token: self.store_line_channel_access_token.clone(),
                channel_secret: self.store_line_channel_secret.clone(),
            },
            BotRole::Pharmacist => LineChannelConfig {
                access_token: self.pharmacist_line_channel_access_token.clone(),
                channel_secret: self.pharmacist_line_channel_secret.clone(),
            },
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }
}
