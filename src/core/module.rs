use crate::config::CacheConfig;
use crate::core::session::CacheSession;
use crate::error::HarnessError;
use tracing::warn;

/// Suite-level hook object for runners that drive fixtures through
/// before/after callbacks instead of a scoped closure.
#[derive(Debug)]
pub struct CacheModule {
    config: CacheConfig,
    session: Option<CacheSession>,
}

impl CacheModule {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            session: None,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Per-test setup. A session left over from a previous test is torn down first.
    pub async fn before(&mut self) -> Result<&mut CacheSession, HarnessError> {
        if let Some(stale) = self.session.take() {
            warn!("Previous cache session was never torn down; closing it now");
            stale.tear_down().await;
        }

        let session = CacheSession::set_up(&self.config).await?;
        Ok(self.session.insert(session))
    }

    /// Per-test teardown; no-op when `before` never succeeded
    pub async fn after(&mut self) {
        if let Some(session) = self.session.take() {
            session.tear_down().await;
        }
    }

    /// The live session, if called between `before` and `after`
    pub fn session(&mut self) -> Result<&mut CacheSession, HarnessError> {
        self.session.as_mut().ok_or_else(|| {
            HarnessError::Precondition(
                "no cache session is open; call before() at the start of the test".to_string(),
            )
        })
    }
}
