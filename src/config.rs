//! Worker settings.
//!
//! Values are layered: built-in defaults, `config/default.yaml`,
//! `config/{PIGEON_ENV}.yaml`, then `PIGEON_*` environment variables
//! (`__` separates nested keys, e.g. `PIGEON_RELAY__HOST`).

use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::errors::Error;

/// How messages are handed to the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    /// Step-by-step SMTP session driven by this crate.
    #[default]
    Session,
    /// One-shot dial-and-send through `mail-send`.
    Dial,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelaySettings {
    pub host: String,
    pub port: u16,
    pub helo_name: String,
    pub connect_timeout_secs: u64,
    pub command_timeout_secs: u64,
    pub prefer_ipv4: bool,
    #[serde(default)]
    pub mode: TransportMode,
}

impl RelaySettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            host: "smtp.gmail.com".to_owned(),
            port: 465,
            helo_name: "localhost".to_owned(),
            connect_timeout_secs: 30,
            command_timeout_secs: 60,
            prefer_ipv4: true,
            mode: TransportMode::Session,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database_url: String,
    pub zmq_address: String,
    pub relay: RelaySettings,
}

impl Settings {
    /// Loads settings from the default locations.
    pub fn load() -> Result<Self, Error> {
        let profile = std::env::var("PIGEON_ENV").unwrap_or_else(|_| "local".to_owned());
        Self::from_sources(
            Config::builder()
                .add_source(File::with_name("config/default").required(false))
                .add_source(File::with_name(&format!("config/{profile}")).required(false))
                .add_source(Environment::with_prefix("PIGEON").separator("__")),
        )
    }

    fn from_sources(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, Error> {
        let relay = RelaySettings::default();
        let settings = builder
            .set_default("database_url", "app.db")?
            .set_default("zmq_address", "tcp://127.0.0.1:5560")?
            .set_default("relay.host", relay.host)?
            .set_default("relay.port", i64::from(relay.port))?
            .set_default("relay.helo_name", relay.helo_name)?
            .set_default("relay.connect_timeout_secs", relay.connect_timeout_secs as i64)?
            .set_default("relay.command_timeout_secs", relay.command_timeout_secs as i64)?
            .set_default("relay.prefer_ipv4", relay.prefer_ipv4)?
            .set_default("relay.mode", "session")?
            .build()?
            .try_deserialize::<Settings>()?;

        if settings.relay.host.trim().is_empty() {
            return Err(Error::Config("relay host must not be empty".to_owned()));
        }
        if settings.relay.connect_timeout_secs == 0 {
            return Err(Error::Config("relay connect timeout must be positive".to_owned()));
        }

        Ok(settings)
    }
}
