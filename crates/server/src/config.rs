//! Server configuration

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Loaded from `HERD_*` environment variables, e.g. `HERD_API_PORT=9000`
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// CSV record table
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,

    /// Directory holding `yield.bundle` and `disease.bundle`
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    /// Name attached to structured log events
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

fn default_api_port() -> u16 {
    8000
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_data_path() -> PathBuf {
    PathBuf::from("cattle_data.csv")
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_service_name() -> String {
    "herd-server".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            bind_address: default_bind_address(),
            data_path: default_data_path(),
            model_dir: default_model_dir(),
            service_name: default_service_name(),
        }
    }
}

impl ServerConfig {
    pub fn load() -> Result<Self> {
        Self::from_source(config::Environment::with_prefix("HERD").try_parsing(true))
    }

    fn from_source<S>(source: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        config::Config::builder()
            .add_source(source)
            .build()
            .context("Failed to read HERD_ environment")?
            .try_deserialize()
            .context("Invalid HERD_ configuration")
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.api_port)
    }
}
