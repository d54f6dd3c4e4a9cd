//! Cache assertions layered on a live [`CacheSession`]

use crate::core::client::CacheEntry;
use crate::core::session::CacheSession;
use crate::core::value::{self, describe};
use crate::error::{AssertionFailure, HarnessError};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

impl CacheSession {
    /// Read `key`; `None` means the key is absent
    pub async fn grab_value(&mut self, key: &str) -> Result<Option<Value>, HarnessError> {
        let payload = self.client_mut().get(key).await?;
        let value = payload.as_deref().map(value::decode);
        debug!("Grabbed '{}' from cache: {}", key, describe(value.as_ref()));
        Ok(value)
    }

    /// Without `expected`, the key must exist. With it, the cached value must
    /// equal `expected`.
    pub async fn assert_present(
        &mut self,
        key: &str,
        expected: Option<&Value>,
    ) -> Result<(), HarnessError> {
        let actual = self.grab_value(key).await?;

        match (expected, &actual) {
            (None, Some(_)) => Ok(()),
            (None, None) => Err(AssertionFailure::new(
                key,
                None,
                None,
                format!("key '{}' is not present in the cache", key),
            )
            .into()),
            (Some(expected), Some(actual)) if actual == expected => Ok(()),
            (Some(expected), actual) => Err(AssertionFailure::new(
                key,
                Some(expected),
                actual.as_ref(),
                format!(
                    "cached value for key '{}' does not match: expected {}, got {}",
                    key,
                    expected,
                    describe(actual.as_ref())
                ),
            )
            .into()),
        }
    }

    /// Without `expected`, the key must be absent. With it, an absent key
    /// passes; a present key must hold a value equal to `expected`.
    ///
    /// The present-key branch compares for equality, not inequality, so a
    /// key holding a *different* value fails. Existing suites depend on this.
    pub async fn assert_absent_or_mismatched(
        &mut self,
        key: &str,
        expected: Option<&Value>,
    ) -> Result<(), HarnessError> {
        let actual = self.grab_value(key).await?;

        match (expected, &actual) {
            (_, None) => Ok(()),
            (None, Some(actual)) => Err(AssertionFailure::new(
                key,
                None,
                Some(actual),
                format!(
                    "key '{}' is present in the cache with value {}",
                    key, actual
                ),
            )
            .into()),
            (Some(expected), Some(actual)) if actual == expected => Ok(()),
            (Some(expected), Some(actual)) => Err(AssertionFailure::new(
                key,
                Some(expected),
                Some(actual),
                format!(
                    "cached value for key '{}' does not match {}: got {}",
                    key, expected, actual
                ),
            )
            .into()),
        }
    }

    /// Store `value` under `key` with no expiry
    pub async fn store<T: Serialize + ?Sized>(
        &mut self,
        key: &str,
        value: &T,
    ) -> Result<(), HarnessError> {
        self.store_with_expiration(key, value, 0).await
    }

    /// Store `value` under `key`, expiring after `expiration` seconds (0 = never).
    /// The write must be acknowledged by the server.
    pub async fn store_with_expiration<T: Serialize + ?Sized>(
        &mut self,
        key: &str,
        value: &T,
        expiration: u32,
    ) -> Result<(), HarnessError> {
        let payload = value::encode(value)?;
        let entry = CacheEntry {
            key,
            value: &payload,
            expiration,
        };

        if self.client_mut().set(&entry).await? {
            debug!("Stored '{}' (ttl {}s)", key, expiration);
            return Ok(());
        }

        let attempted = value::decode(&payload);
        Err(AssertionFailure::new(
            key,
            Some(&attempted),
            None,
            format!("cache did not store key '{}'", key),
        )
        .into())
    }

    /// Flush every key on the server; the acknowledgement is not checked
    pub async fn clear(&mut self) -> Result<(), HarnessError> {
        let acknowledged = self.client_mut().flush().await?;
        debug!("Cleared cache at {} (acknowledged: {})", self.address(), acknowledged);
        Ok(())
    }
}
