pub mod config;
pub mod core;
pub mod error;
pub mod logging;

// Re-export main components for easy access
pub use config::{CacheConfig, ClientKind};
pub use self::core::*;
pub use error::{AssertionFailure, HarnessError};
