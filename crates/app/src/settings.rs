//! Settings of the `splitia` binary.
//!
//! Read from `settings.toml` in the working directory, then overridden by
//! `SPLITIA_`-prefixed environment variables (`SPLITIA_APP__LEVEL=debug`).

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

const DEFAULT_PATH: &str = "settings";

#[derive(Debug, Deserialize)]
pub struct App {
    pub level: String,
}

/// Where the ledger lives.
///
/// ```toml
/// database = "memory"
/// database = { sqlite = "splitia.db" }
/// ```
#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

#[derive(Debug, Deserialize)]
pub struct Server {
    pub bind: Option<String>,
    pub port: u16,
    pub database: Database,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub app: App,
    pub server: Option<Server>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("app.level", "info")?
            .add_source(File::with_name(DEFAULT_PATH).required(false))
            .add_source(Environment::with_prefix("SPLITIA").separator("__"))
            .build()?
            .try_deserialize()
    }
}
