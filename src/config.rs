use anyhow::Result;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub fids: FidsConfig,
    #[serde(default)]
    pub ops: OpsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub token_secret: String,
    #[serde(default = "default_token_hours")]
    pub token_hours: i64,
    pub bootstrap_username: Option<String>,
    pub bootstrap_pin: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FidsConfig {
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpsConfig {
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for OpsConfig {
    fn default() -> Self {
        OpsConfig {
            timezone: default_timezone(),
        }
    }
}

fn default_token_hours() -> i64 {
    6
}

fn default_timezone() -> String {
    "America/Toronto".to_string()
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// The configured airport timezone. Invalid names fail at startup, not
    /// per-request.
    pub fn tz(&self) -> Result<Tz> {
        self.ops
            .timezone
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid timezone: {}", self.ops.timezone))
    }

    pub fn default_template() -> &'static str {
        r#"[server]
host = "0.0.0.0"
port = 8080

[database]
# URL for the SQLite database. Ensure the directory exists.
url = "sqlite://paxops.db"

[auth]
token_secret = "change-me-in-production"
# Bearer tokens expire after this many hours.
token_hours = 6
# Seeded on first start when the users table is empty.
bootstrap_username = "dispatch"
bootstrap_pin = "0000"

[fids]
# AeroDataBox API key.
api_key = ""

[ops]
timezone = "America/Toronto"
"#
    }
}
