//! Application settings loaded from `settings.toml`.

use config::{Config, ConfigError, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub app: App,
    pub server: Option<Server>,
}

#[derive(Debug, Deserialize)]
pub struct App {
    /// Log level filter applied to every workspace crate.
    pub level: String,
}

#[derive(Debug, Deserialize)]
pub struct Server {
    /// Bind address; defaults to localhost when omitted.
    pub bind: Option<String>,
    pub port: u16,
    pub database: Database,
}

/// Where the server keeps its data: `database = "memory"` or
/// `database = { sqlite = "./romana.db" }`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name("settings"))
            .build()?
            .try_deserialize()
    }
}
