//! Configuration management with file, environment and CLI layering.

use anyhow::{anyhow, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

use crate::inbox::DEFAULT_CAPACITY;

const DEFAULTS: &str = include_str!("../config.toml");
const ENV_PREFIX: &str = "REQUEST_BOX";

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Time in-flight requests get to finish after a shutdown signal
    pub shutdown_grace_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_grace_seconds: 10,
        }
    }
}

/// Per-token inbox configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxConfig {
    pub capacity: usize,
}

impl Default for InboxConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

/// Request handling limits and CORS
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub max_body_mb: usize,
    pub enable_cors: bool,
    pub allowed_origins: Vec<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_body_mb: 5,
            enable_cors: false,
            allowed_origins: vec!["*".to_string()],
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "text"
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub enable_metrics: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            enable_metrics: true,
        }
    }
}

/// Main settings structure with all configuration sections
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub inbox: InboxConfig,
    pub http: HttpConfig,
    pub logging: LoggingConfig,
    pub observability: ObservabilityConfig,
}

impl Settings {
    /// Load settings from the embedded defaults, an optional config file and
    /// `REQUEST_BOX__*` environment variables.
    ///
    /// Without an explicit path, `config.toml` in the working directory is
    /// used if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, Environment::with_prefix(ENV_PREFIX))
    }

    fn load_with_env(path: Option<&Path>, env: Environment) -> Result<Self> {
        let local = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name("config").required(false),
        };

        let config = Config::builder()
            .add_source(File::from_str(DEFAULTS, FileFormat::Toml))
            .add_source(local)
            .add_source(
                env.separator("__")
                    .list_separator(",")
                    .with_list_parse_key("http.allowed_origins")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Replace host and port with a command-line listen address.
    pub fn apply_addr_override(&mut self, addr: Option<SocketAddr>) {
        if let Some(addr) = addr {
            self.server.host = addr.ip().to_string();
            self.server.port = addr.port();
        }
    }

    /// Validate settings for consistency
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow!("Server port cannot be 0"));
        }
        if self.server.shutdown_grace_seconds == 0 {
            return Err(anyhow!("Shutdown grace period must be at least 1 second"));
        }
        if self.inbox.capacity == 0 {
            return Err(anyhow!("Inbox capacity must be at least 1"));
        }
        if self.http.max_body_mb == 0 {
            return Err(anyhow!("Max body size cannot be 0"));
        }
        match self.logging.format.as_str() {
            "text" | "json" => {}
            other => return Err(anyhow!("Unknown log format '{}'", other)),
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| anyhow!("Invalid server address: {}", e))
    }

    pub fn max_body_bytes(&self) -> usize {
        self.http.max_body_mb * 1024 * 1024
    }

    /// Render the effective settings as TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
