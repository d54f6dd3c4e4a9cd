use super::text::validate_key;
use super::{CacheClient, CacheEntry, ClientError};
use async_trait::async_trait;
use tracing::debug;

/// Client backed by the `memcache` crate.
///
/// The crate is blocking, so every call hops onto tokio's blocking pool. The
/// underlying `memcache::Client` dials eagerly, which is why it is only built
/// on the first command rather than in `connect`.
pub struct LibraryClient {
    name: String,
    url: Option<String>,
    client: Option<memcache::Client>,
}

impl LibraryClient {
    pub fn new() -> Self {
        Self {
            name: "library".to_string(),
            url: None,
            client: None,
        }
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    async fn client(&mut self) -> Result<memcache::Client, ClientError> {
        if let Some(client) = &self.client {
            return Ok(client.clone());
        }

        let url = self.url.clone().ok_or(ClientError::NotConnected)?;
        debug!("Opening memcache client for {}", url);
        let client = blocking(move || {
            memcache::connect(url.as_str()).map_err(|e| ClientError::ConnectionFailed(e.to_string()))
        })
        .await?;

        self.client = Some(client.clone());
        Ok(client)
    }
}

impl Default for LibraryClient {
    fn default() -> Self {
        Self::new()
    }
}

async fn blocking<T, F>(f: F) -> Result<T, ClientError>
where
    F: FnOnce() -> Result<T, ClientError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ClientError::Io(format!("memcache task failed: {}", e)))?
}

fn command_error(e: memcache::MemcacheError) -> ClientError {
    ClientError::Server(e.to_string())
}

#[async_trait]
impl CacheClient for LibraryClient {
    async fn connect(&mut self, host: &str, port: u16) -> Result<(), ClientError> {
        let url = format!("memcache://{}:{}?protocol=ascii", host, port);
        debug!("Registered memcached server {}", url);
        self.url = Some(url);
        self.client = None;
        Ok(())
    }

    async fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, ClientError> {
        validate_key(key)?;
        let client = self.client().await?;
        let key = key.to_string();
        blocking(move || client.get::<Vec<u8>>(&key).map_err(command_error)).await
    }

    async fn set(&mut self, entry: &CacheEntry<'_>) -> Result<bool, ClientError> {
        validate_key(entry.key)?;
        let client = self.client().await?;
        let key = entry.key.to_string();
        let value = entry.value.to_vec();
        let expiration = entry.expiration;

        // Native call shape: key, value, expiration. The crate maps NOT_STORED
        // to Ok(()), so read the entry back to learn whether it landed.
        blocking(move || {
            client
                .set(&key, value.as_slice(), expiration)
                .map_err(command_error)?;
            let stored = client.get::<Vec<u8>>(&key).map_err(command_error)?;
            Ok(stored.as_deref() == Some(value.as_slice()))
        })
        .await
    }

    async fn flush(&mut self) -> Result<bool, ClientError> {
        let client = self.client().await?;
        // The crate offers no acknowledgement beyond Ok(()); failures arrive as Err
        blocking(move || client.flush().map_err(command_error)).await?;
        Ok(true)
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        if self.client.take().is_some() {
            debug!("Dropped memcache client for {}", self.url().unwrap_or("?"));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
