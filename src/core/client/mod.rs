use crate::config::ClientKind;
use async_trait::async_trait;

#[cfg(feature = "library-client")]
pub mod library;
pub mod text;

#[cfg(feature = "library-client")]
pub use library::LibraryClient;
pub use text::{TextCommand, TextProtocolClient, TextResponse};

/// One write, in the shape every client variant is handed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheEntry<'a> {
    pub key: &'a str,
    pub value: &'a [u8],
    /// Seconds until expiry, 0 = never
    pub expiration: u32,
}

/// Core trait for cache clients a session can drive
#[async_trait]
pub trait CacheClient: Send {
    /// Register the server; reachability is checked by the first command
    async fn connect(&mut self, host: &str, port: u16) -> Result<(), ClientError>;

    /// Raw payload for `key`, `None` when absent
    async fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, ClientError>;

    /// Store an entry, mapping it onto the client's native call shape.
    /// Returns whether the server accepted the write.
    async fn set(&mut self, _entry: &CacheEntry<'_>) -> Result<bool, ClientError> {
        Err(ClientError::Unsupported {
            client: self.name().to_string(),
        })
    }

    /// Drop every key on the server
    async fn flush(&mut self) -> Result<bool, ClientError>;

    async fn close(&mut self) -> Result<(), ClientError>;

    /// Client variant name
    fn name(&self) -> &str;
}

/// Client factory, resolving `auto` to whatever is compiled in
pub fn create_client(kind: ClientKind) -> Result<Box<dyn CacheClient>, ClientError> {
    match kind {
        ClientKind::Text => Ok(Box::new(TextProtocolClient::new())),
        ClientKind::Library => library_client(),
        ClientKind::Auto => {
            if cfg!(feature = "library-client") {
                library_client()
            } else {
                Ok(Box::new(TextProtocolClient::new()))
            }
        }
    }
}

#[cfg(feature = "library-client")]
fn library_client() -> Result<Box<dyn CacheClient>, ClientError> {
    Ok(Box::new(LibraryClient::new()))
}

#[cfg(not(feature = "library-client"))]
fn library_client() -> Result<Box<dyn CacheClient>, ClientError> {
    Err(ClientError::NotAvailable(
        "client 'library' requires the `memcache` crate; enable the `library-client` feature"
            .to_string(),
    ))
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Client has no server registered; call connect first")]
    NotConnected,
    #[error("IO error: {0}")]
    Io(String),
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("Server error: {0}")]
    Server(String),
    #[error("Invalid key: {0}")]
    InvalidKey(String),
    #[error("Client '{client}' does not support set")]
    Unsupported { client: String },
    #[error("No cache client available: {0}")]
    NotAvailable(String),
}

impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        ClientError::Io(e.to_string())
    }
}
