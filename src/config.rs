use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection settings for the cache under test
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Which client variant drives the session
    #[serde(default)]
    pub client: ClientKind,
}

/// Client variant selection, resolved once when a session is set up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientKind {
    /// Library client when compiled in, text client otherwise
    #[default]
    Auto,
    Text,
    Library,
}

impl fmt::Display for ClientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClientKind::Auto => "auto",
            ClientKind::Text => "text",
            ClientKind::Library => "library",
        };
        f.write_str(name)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            client: ClientKind::default(),
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    11211
}

impl CacheConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            client: ClientKind::default(),
        }
    }

    pub fn with_client(mut self, client: ClientKind) -> Self {
        self.client = client;
        self
    }

    /// `host:port` as handed to the client's connect call
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Load configuration from a YAML file
    pub async fn from_yaml_file(path: &str) -> Result<Self, ConfigError> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::FileNotFound(path.to_string()))
            }
            Err(e) => return Err(ConfigError::IoError(e.to_string())),
        };

        Self::from_yaml_str(&content)
    }

    /// Parse configuration from a YAML string (useful for testing)
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: CacheConfig =
            serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration for common errors
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "host must not be empty".to_string(),
            ));
        }

        if self.port == 0 {
            return Err(ConfigError::ValidationError(format!(
                "port for host '{}' must be non-zero",
                self.host
            )));
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("File not found: {0}")]
    FileNotFound(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
}
