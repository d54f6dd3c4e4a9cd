use crate::config::CacheConfig;
use crate::core::client::{create_client, CacheClient};
use crate::error::HarnessError;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tracing::{debug, info, warn};

/// Where a session is in its per-test lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    Closed,
}

/// One test's handle on the cache.
///
/// Created by [`CacheSession::set_up`], consumed by
/// [`CacheSession::tear_down`], which flushes the server and closes the
/// connection.
pub struct CacheSession {
    client: Box<dyn CacheClient>,
    address: String,
    state: SessionState,
}

impl CacheSession {
    /// Pick a client for `config` and register the server with it
    pub async fn set_up(config: &CacheConfig) -> Result<Self, HarnessError> {
        config.validate()?;
        let client = create_client(config.client)?;
        Self::with_client(client, config).await
    }

    /// Set up around a caller-supplied client
    pub async fn with_client(
        mut client: Box<dyn CacheClient>,
        config: &CacheConfig,
    ) -> Result<Self, HarnessError> {
        client.connect(&config.host, config.port).await?;
        let address = config.address();
        info!("Cache session opened: {} client -> {}", client.name(), address);

        Ok(Self {
            client,
            address,
            state: SessionState::Connected,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn client_name(&self) -> &str {
        self.client.name()
    }

    pub(crate) fn client_mut(&mut self) -> &mut dyn CacheClient {
        self.client.as_mut()
    }

    /// Flush the server and close the connection. Failures are logged only,
    /// so they never mask the outcome of the test itself.
    pub async fn tear_down(mut self) {
        match self.client.flush().await {
            Ok(true) => debug!("Flushed cache at {}", self.address),
            Ok(false) => warn!("Flush of {} was not acknowledged", self.address),
            Err(e) => warn!("Flush of {} failed during teardown: {}", self.address, e),
        }

        if let Err(e) = self.client.close().await {
            warn!("Closing {} failed during teardown: {}", self.address, e);
        }

        self.state = SessionState::Closed;
        info!("Cache session closed: {}", self.address);
    }

    /// Run `body` against this session and tear it down afterwards, whether
    /// the body returned an error or panicked. Panics resume after teardown.
    pub async fn scope<T, F>(mut self, body: F) -> Result<T, HarnessError>
    where
        F: for<'s> FnOnce(&'s mut CacheSession) -> BoxFuture<'s, Result<T, HarnessError>>,
    {
        let outcome = AssertUnwindSafe(body(&mut self)).catch_unwind().await;
        self.tear_down().await;

        match outcome {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

impl Drop for CacheSession {
    fn drop(&mut self) {
        if self.state == SessionState::Connected {
            warn!(
                "Cache session for {} dropped without tear_down; cache was not flushed",
                self.address
            );
        }
    }
}

impl std::fmt::Debug for CacheSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheSession")
            .field("client", &self.client.name())
            .field("address", &self.address)
            .field("state", &self.state)
            .finish()
    }
}

/// Set up a session for `config`, run `body`, then tear down on every exit path
pub async fn run<T, F>(config: &CacheConfig, body: F) -> Result<T, HarnessError>
where
    F: for<'s> FnOnce(&'s mut CacheSession) -> BoxFuture<'s, Result<T, HarnessError>>,
{
    CacheSession::set_up(config).await?.scope(body).await
}
