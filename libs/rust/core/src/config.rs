//! Service settings: defaults, then an optional file, then `TRAINER_*` environment variables.
//!
//! Settings are loaded once at startup and passed explicitly to the store and service.

use std::fmt;
use std::net::{AddrParseError, SocketAddr};
use std::path::PathBuf;

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;

pub const ENV_PREFIX: &str = "TRAINER";
pub const CONFIG_FILE_VAR: &str = "TRAINER_CONFIG_FILE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid listen address {value}: {source}")]
    Address {
        value: String,
        #[source]
        source: AddrParseError,
    },
}

#[derive(Clone, Deserialize)]
pub struct AppConfig {
    pub service_name: String,
    /// Root under which `training/<job_id>/` directories are created.
    pub data_dir: PathBuf,
    /// Shared secret expected in the `x-key` header. Unset rejects every authenticated call.
    #[serde(default)]
    pub api_key: Option<String>,
    pub bind_addr: String,
    pub port: u16,
    pub log_level: String,
    pub json_log: bool,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("service_name", &self.service_name)
            .field("data_dir", &self.data_dir)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("bind_addr", &self.bind_addr)
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("json_log", &self.json_log)
            .finish()
    }
}

impl AppConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let value = format!("{}:{}", self.bind_addr, self.port);
        value.parse().map_err(|source| ConfigError::Address { value, source })
    }
}

/// Load settings for `service` from the default sources.
pub fn load_config(service: &str) -> Result<AppConfig, ConfigError> {
    let file = std::env::var(CONFIG_FILE_VAR).ok().map(PathBuf::from);
    load_config_from(service, file, ENV_PREFIX)
}

pub fn load_config_from(service: &str, file: Option<PathBuf>, env_prefix: &str) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder()
        .set_default("service_name", service)?
        .set_default("data_dir", "output")?
        .set_default("bind_addr", "0.0.0.0")?
        .set_default("port", 8000_i64)?
        .set_default("log_level", "info")?
        .set_default("json_log", false)?;
    if let Some(path) = file {
        builder = builder.add_source(File::from(path).required(false));
    }
    builder = builder.add_source(
        Environment::with_prefix(env_prefix)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );
    Ok(builder.build()?.try_deserialize()?)
}
