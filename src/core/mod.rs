pub mod assertions;
pub mod client;
pub mod module;
pub mod session;
pub mod value;

// Re-export core types
pub use client::{create_client, CacheClient, CacheEntry, ClientError, TextProtocolClient};
pub use module::CacheModule;
pub use session::{run, CacheSession, SessionState};

#[cfg(feature = "library-client")]
pub use client::LibraryClient;
