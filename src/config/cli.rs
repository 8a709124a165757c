//! Command line and environment overrides.
//!
//! Precedence, lowest first: built-in defaults, TOML file, environment
//! variables / flags. Everything is read once at startup.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use crate::config::loader::{read_config, ConfigError};
use crate::config::schema::{AppConfig, Environment};
use crate::config::validation::validate_config;

#[derive(Debug, Default, Parser)]
#[command(name = "instrumented-server")]
#[command(about = "HTTP server with request-scoped metrics and structured logs", long_about = None)]
pub struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long, env = "APP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Listening port; keeps the host part of the configured bind address.
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Deployment mode (development, test, production).
    #[arg(short, long, env = "APP_ENV", value_enum)]
    pub environment: Option<Environment>,

    /// Base URL of the log agent; enables remote log push when set.
    #[arg(long, env = "GRAFANA_ALLOY_URL")]
    pub alloy_url: Option<String>,

    /// Directory for the NDJSON log file.
    #[arg(long, env = "LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Service name stamped on log events.
    #[arg(long, env = "SERVICE_NAME")]
    pub service_name: Option<String>,
}

impl Cli {
    /// Build the final, validated configuration.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => AppConfig::default(),
        };
        self.apply(&mut config);
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }

    /// Overlay the values that were supplied on top of `config`.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(port) = self.port {
            config.server.bind_address = match config.server.bind_address.parse::<SocketAddr>() {
                Ok(mut addr) => {
                    addr.set_port(port);
                    addr.to_string()
                }
                Err(_) => format!("0.0.0.0:{}", port),
            };
        }
        if let Some(environment) = self.environment {
            config.environment = environment;
        }
        if let Some(url) = &self.alloy_url {
            config.remote_log.enabled = true;
            config.remote_log.alloy_url = url.clone();
        }
        if let Some(dir) = &self.log_dir {
            config.logging.directory = dir.to_string_lossy().into_owned();
        }
        if let Some(service) = &self.service_name {
            config.logging.service = service.clone();
        }
    }
}
