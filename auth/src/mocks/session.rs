//! Mock session store for testing.

use crate::error::{AuthError, Result};
use crate::providers::SessionStore;
use crate::state::{SessionId, SessionPayload, SessionRecord};
use crate::stores::MemorySessionStore;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Session store whose availability and latency can be changed mid-test.
///
/// Delegates to a [`MemorySessionStore`] when up. When down, every call
/// fails with [`AuthError::BackendUnavailable`]. An optional delay is applied
/// before `regenerate`, which is where login commits land.
#[derive(Debug, Clone, Default)]
pub struct FlakySessionStore {
    inner: MemorySessionStore,
    down: Arc<AtomicBool>,
    delay: Option<Duration>,
    regenerations: Arc<AtomicUsize>,
}

impl FlakySessionStore {
    /// Create a store that starts out available.
    #[must_use]
    pub fn new(inner: MemorySessionStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    /// Sleep for `delay` before every regeneration.
    #[must_use]
    pub const fn with_regenerate_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Take the backend down or bring it back.
    pub fn set_available(&self, available: bool) {
        self.down.store(!available, Ordering::SeqCst);
    }

    /// Number of regenerations that reached the inner store.
    #[must_use]
    pub fn regenerate_count(&self) -> usize {
        self.regenerations.load(Ordering::SeqCst)
    }

    /// The wrapped store (for inspecting state directly).
    #[must_use]
    pub const fn inner(&self) -> &MemorySessionStore {
        &self.inner
    }

    fn check(&self) -> Result<()> {
        if self.down.load(Ordering::SeqCst) {
            Err(AuthError::BackendUnavailable("session store down".to_string()))
        } else {
            Ok(())
        }
    }
}

impl SessionStore for FlakySessionStore {
    async fn load(&self, session_id: &SessionId) -> Result<Option<SessionRecord>> {
        self.check()?;
        self.inner.load(session_id).await
    }

    async fn create(&self) -> Result<SessionRecord> {
        self.check()?;
        self.inner.create().await
    }

    async fn save(&self, record: &SessionRecord) -> Result<()> {
        self.check()?;
        self.inner.save(record).await
    }

    async fn regenerate(
        &self,
        record: &SessionRecord,
        payload: SessionPayload,
    ) -> Result<SessionRecord> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.check()?;
        self.regenerations.fetch_add(1, Ordering::SeqCst);
        self.inner.regenerate(record, payload).await
    }

    async fn destroy(&self, session_id: &SessionId) -> Result<()> {
        self.check()?;
        self.inner.destroy(session_id).await
    }

    async fn push_flash(&self, session_id: &SessionId, category: &str, message: &str) -> Result<()> {
        self.check()?;
        self.inner.push_flash(session_id, category, message).await
    }

    async fn take_flash(&self, session_id: &SessionId, category: &str) -> Result<Vec<String>> {
        self.check()?;
        self.inner.take_flash(session_id, category).await
    }
}
