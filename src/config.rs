//! Configuration management for shell-relay.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::{AppState, ServerConfig};
use crate::cli::Args;
use crate::execution::ExecutionConfig;
use crate::security::{ApiKeyStore, AuthConfig};
use crate::session::SessionRegistry;
use crate::sink::FileLineSink;
use crate::terminal::TerminalConfig;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerSection,
    pub execution: ExecutionConfig,
    pub terminal: TerminalConfig,
    pub security: AuthConfig,
    pub logging: LoggingSection,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Level or filter directives (error, warn, info, debug, trace).
    pub level: String,
    /// Append-only log of one-shot execution output; `null` disables it.
    pub session_log: Option<PathBuf>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            session_log: Some(PathBuf::from("logs/session.log")),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    /// Apply environment overrides read through `lookup`.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("SHELL_RELAY_HOST") {
            self.server.host = host;
        }

        if let Some(port) = lookup("SHELL_RELAY_PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }

        if let Some(token) = lookup("SHELL_RELAY_API_TOKEN").filter(|t| !t.is_empty()) {
            self.security.enabled = true;
            self.security.api_token = Some(token);
        }

        if let Some(dir) = lookup("SHELL_RELAY_WORKDIR").filter(|d| !d.is_empty()) {
            self.execution.working_dir = PathBuf::from(dir);
        }

        if let Some(level) = lookup("SHELL_RELAY_LOG_LEVEL").or_else(|| lookup("RUST_LOG")) {
            self.logging.level = level;
        }
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(host) = args.host {
            self.server.host = host.to_string();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }

        if let Some(ref token) = args.api_token {
            self.security.enabled = true;
            self.security.api_token = Some(token.clone());
        }

        if args.no_auth {
            self.security.enabled = false;
        }

        if let Some(ref dir) = args.workdir {
            self.execution.working_dir = dir.clone();
        }

        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match args.config {
            Some(ref path) => Config::from_file(path)?,
            None => Config::default(),
        };
        config.apply_env();
        config.apply_args(args);
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot serve requests.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server
            .host
            .parse::<IpAddr>()
            .map_err(|_| ConfigError::InvalidHost(self.server.host.clone()))?;

        let has_token = self
            .security
            .api_token
            .as_deref()
            .is_some_and(|t| !t.is_empty());
        if self.security.enabled && !has_token {
            return Err(ConfigError::MissingToken);
        }

        if self.execution.program.trim().is_empty() {
            return Err(ConfigError::Invalid("execution.program must not be empty".into()));
        }
        Ok(())
    }

    /// Listener address for the API server.
    pub fn to_server_config(&self) -> Result<ServerConfig, ConfigError> {
        let host: IpAddr = self
            .server
            .host
            .parse()
            .map_err(|_| ConfigError::InvalidHost(self.server.host.clone()))?;
        Ok(ServerConfig::new(host.to_string(), self.server.port))
    }

    /// Build the shared API state around `registry`.
    pub fn app_state(&self, registry: SessionRegistry) -> AppState {
        let mut state = AppState::new(self.execution.clone(), self.terminal.clone(), registry)
            .with_auth(ApiKeyStore::new(&self.security));
        if let Some(ref path) = self.logging.session_log {
            state = state.with_log(FileLineSink::new(path));
        }
        state
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid host address: {0}")]
    InvalidHost(String),

    #[error("authentication is enabled but no API token is set (use --api-token, SHELL_RELAY_API_TOKEN, or --no-auth)")]
    MissingToken,

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
