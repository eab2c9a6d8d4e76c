use std::path::PathBuf;
use std::sync::RwLock;

use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid port {0:?}: expected 1-65535")]
    InvalidPort(String),
    #[error("auth token is not set")]
    MissingAuthToken,
    #[error("invalid body limit {0:?}")]
    InvalidBodyLimit(String),
}

/// Read-only snapshot taken when a server instance is created. Picking up a
/// change means building a new server.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub auth_token: String,
    pub webhook_url: Option<String>,
    pub webhook_token: Option<String>,
    pub host: String,
    pub staging_dir: PathBuf,
    pub transmit_command: Option<PathBuf>,
    pub max_body_bytes: usize,
}

impl Config {
    pub fn new(port: u16, auth_token: impl Into<String>) -> Self {
        Self {
            port,
            auth_token: auth_token.into(),
            webhook_url: None,
            webhook_token: None,
            host: DEFAULT_HOST.to_string(),
            staging_dir: std::env::temp_dir().join("fossify-api"),
            transmit_command: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_webhook(mut self, url: impl Into<String>, token: impl Into<String>) -> Self {
        self.webhook_url = non_empty(url.into());
        self.webhook_token = non_empty(token.into());
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port.to_string()));
        }
        if self.auth_token.is_empty() {
            return Err(ConfigError::MissingAuthToken);
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub trait ConfigStore: Send + Sync {
    fn load(&self) -> Result<Config, ConfigError>;
}

/// Reads the `FOSSIFY_*` environment variables.
pub struct EnvConfigStore;

impl EnvConfigStore {
    fn var(name: &str) -> Option<String> {
        std::env::var(name).ok().and_then(non_empty)
    }
}

impl ConfigStore for EnvConfigStore {
    fn load(&self) -> Result<Config, ConfigError> {
        let port = match Self::var("FOSSIFY_API_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(raw.clone()))?,
            None => DEFAULT_PORT,
        };

        let mut config = Config::new(port, Self::var("FOSSIFY_API_TOKEN").unwrap_or_default())
            .with_webhook(
                Self::var("FOSSIFY_WEBHOOK_URL").unwrap_or_default(),
                Self::var("FOSSIFY_WEBHOOK_TOKEN").unwrap_or_default(),
            );
        if let Some(host) = Self::var("FOSSIFY_API_HOST") {
            config.host = host;
        }
        if let Some(dir) = Self::var("FOSSIFY_STAGING_DIR") {
            config.staging_dir = PathBuf::from(dir);
        }
        config.transmit_command = Self::var("FOSSIFY_TRANSMIT_COMMAND").map(PathBuf::from);
        if let Some(raw) = Self::var("FOSSIFY_MAX_BODY_BYTES") {
            config.max_body_bytes = raw
                .parse()
                .map_err(|_| ConfigError::InvalidBodyLimit(raw.clone()))?;
        }

        Ok(config)
    }
}

/// In-process store for hosts that manage settings themselves.
pub struct MemoryConfigStore {
    config: RwLock<Config>,
}

impl MemoryConfigStore {
    pub fn new(config: Config) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }

    pub fn get(&self) -> Config {
        match self.config.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn set(&self, config: Config) {
        match self.config.write() {
            Ok(mut guard) => *guard = config,
            Err(poisoned) => *poisoned.into_inner() = config,
        }
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> Result<Config, ConfigError> {
        Ok(self.get())
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
