use crate::config::ConfigError;
use crate::core::client::ClientError;
use serde_json::Value;
use std::fmt;

/// Everything a harness call can fail with
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// No usable client, or the configuration itself is invalid
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Assertion failed: {0}")]
    Assertion(#[from] AssertionFailure),
    /// The active client does not recognize the `set` call shape
    #[error("Unsupported client: '{0}' does not implement set")]
    UnsupportedClient(String),
    /// A session-scoped call was made with no live session
    #[error("Precondition failed: {0}")]
    Precondition(String),
    #[error("Client error: {0}")]
    Client(ClientError),
    #[error("Value encoding failed: {0}")]
    Encoding(String),
}

impl HarnessError {
    pub fn is_assertion_failure(&self) -> bool {
        matches!(self, HarnessError::Assertion(_))
    }

    pub fn as_assertion_failure(&self) -> Option<&AssertionFailure> {
        match self {
            HarnessError::Assertion(failure) => Some(failure),
            _ => None,
        }
    }
}

impl From<ConfigError> for HarnessError {
    fn from(e: ConfigError) -> Self {
        HarnessError::Configuration(e.to_string())
    }
}

impl From<ClientError> for HarnessError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Unsupported { client } => HarnessError::UnsupportedClient(client),
            ClientError::NotAvailable(msg) => HarnessError::Configuration(msg),
            other => HarnessError::Client(other),
        }
    }
}

impl From<serde_json::Error> for HarnessError {
    fn from(e: serde_json::Error) -> Self {
        HarnessError::Encoding(e.to_string())
    }
}

/// An unmet expectation about cache contents
#[derive(Debug, Clone, PartialEq)]
pub struct AssertionFailure {
    pub key: String,
    pub expected: Option<Value>,
    /// `None` when the key was absent
    pub actual: Option<Value>,
    pub message: String,
}

impl AssertionFailure {
    pub fn new(
        key: &str,
        expected: Option<&Value>,
        actual: Option<&Value>,
        message: String,
    ) -> Self {
        Self {
            key: key.to_string(),
            expected: expected.cloned(),
            actual: actual.cloned(),
            message,
        }
    }
}

impl fmt::Display for AssertionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for AssertionFailure {}
