//! In-memory session store.
//!
//! # Locking
//!
//! The id map sits behind a `RwLock` that is held only long enough to look
//! up, insert, or remove a slot. Every read or mutation of a record happens
//! under that record's own `Mutex`, so unrelated sessions never contend.
//!
//! Lock order is always slot → map. No code path waits on a slot lock while
//! holding the map lock.
//!
//! Retired slots are tombstoned before they are unlinked from the map, so a
//! reader that fetched the slot just before retirement observes absence
//! rather than a stale record. No method awaits while holding a lock, which
//! means a dropped request future can never leave a record half-written.

use crate::environment::{Clock, SystemClock};
use crate::error::{AuthError, Result};
use crate::providers::SessionStore;
use crate::state::{SessionId, SessionPayload, SessionRecord};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

#[derive(Debug)]
enum Slot {
    Live(SessionRecord),
    Retired,
}

type SlotRef = Arc<Mutex<Slot>>;

fn poisoned<T>(_: T) -> AuthError {
    AuthError::InternalError("session lock poisoned".to_string())
}

/// Session store backed by process memory.
///
/// Cloning shares the underlying map.
#[derive(Clone)]
pub struct MemorySessionStore {
    slots: Arc<RwLock<HashMap<SessionId, SlotRef>>>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for MemorySessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySessionStore")
            .field("sessions", &self.len())
            .finish_non_exhaustive()
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySessionStore {
    /// Create an empty store using the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store using `clock` for creation times and expiry.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    /// Number of ids currently linked in the map (live or not yet reaped).
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.read().map_or(0, |slots| slots.len())
    }

    /// Whether the store holds no sessions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert a record as-is (fixtures and migrations).
    ///
    /// # Errors
    ///
    /// Returns error if the map lock is poisoned.
    pub fn insert(&self, record: SessionRecord) -> Result<()> {
        let id = record.session_id.clone();
        self.slots
            .write()
            .map_err(poisoned)?
            .insert(id, Arc::new(Mutex::new(Slot::Live(record))));
        Ok(())
    }

    fn slot(&self, session_id: &SessionId) -> Result<Option<SlotRef>> {
        Ok(self.slots.read().map_err(poisoned)?.get(session_id).cloned())
    }

    fn unlink(&self, session_id: &SessionId, slot: &SlotRef) -> Result<()> {
        let mut slots = self.slots.write().map_err(poisoned)?;
        if slots.get(session_id).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            slots.remove(session_id);
        }
        Ok(())
    }

    /// Lock `slot` and return the live record, reaping it if expired.
    ///
    /// The returned guard stays `Live` only when a record is returned.
    fn live<'a>(
        &self,
        session_id: &SessionId,
        slot: &'a SlotRef,
    ) -> Result<(MutexGuard<'a, Slot>, bool)> {
        let mut guard = slot.lock().map_err(poisoned)?;
        let expired = match &*guard {
            Slot::Retired => None,
            Slot::Live(record) => Some(self.expire(record, self.clock.now())),
        };
        let Some(expired) = expired else {
            return Ok((guard, false));
        };
        if expired {
            tracing::debug!(session_id = %session_id, "Session expired on read");
            *guard = Slot::Retired;
            self.unlink(session_id, slot)?;
        }
        Ok((guard, !expired))
    }

    fn load_now(&self, session_id: &SessionId) -> Result<Option<SessionRecord>> {
        let Some(slot) = self.slot(session_id)? else {
            return Ok(None);
        };
        let (guard, live) = self.live(session_id, &slot)?;
        Ok(match (&*guard, live) {
            (Slot::Live(record), true) => Some(record.clone()),
            _ => None,
        })
    }

    fn create_now(&self) -> Result<SessionRecord> {
        let record = SessionRecord::new(self.clock.now());
        self.insert(record.clone())?;
        tracing::debug!(session_id = %record.session_id, "Created session");
        Ok(record)
    }

    fn save_now(&self, record: &SessionRecord) -> Result<()> {
        let slot = self
            .slot(&record.session_id)?
            .ok_or(AuthError::SessionNotFound)?;
        let (mut guard, live) = self.live(&record.session_id, &slot)?;
        if !live {
            return Err(AuthError::SessionNotFound);
        }
        *guard = Slot::Live(record.clone());
        Ok(())
    }

    fn regenerate_now(
        &self,
        record: &SessionRecord,
        payload: SessionPayload,
    ) -> Result<SessionRecord> {
        let old_id = &record.session_id;
        let slot = self.slot(old_id)?.ok_or(AuthError::SessionNotFound)?;

        // Held until the old id is retired: a competing regenerate of the
        // same source waits here and then finds a tombstone.
        let (mut guard, live) = self.live(old_id, &slot)?;
        if !live {
            return Err(AuthError::SessionNotFound);
        }

        let next = SessionRecord::from_payload(SessionId::generate(), self.clock.now(), payload);
        {
            let mut slots = self.slots.write().map_err(poisoned)?;
            slots.insert(
                next.session_id.clone(),
                Arc::new(Mutex::new(Slot::Live(next.clone()))),
            );
            slots.remove(old_id);
        }
        *guard = Slot::Retired;

        tracing::debug!(
            old_session_id = %old_id,
            new_session_id = %next.session_id,
            "Regenerated session"
        );
        Ok(next)
    }

    fn destroy_now(&self, session_id: &SessionId) -> Result<()> {
        let Some(slot) = self.slot(session_id)? else {
            return Ok(());
        };
        let mut guard = slot.lock().map_err(poisoned)?;
        *guard = Slot::Retired;
        self.unlink(session_id, &slot)?;
        Ok(())
    }

    fn push_flash_now(&self, session_id: &SessionId, category: &str, message: &str) -> Result<()> {
        let slot = self.slot(session_id)?.ok_or(AuthError::SessionNotFound)?;
        let (mut guard, live) = self.live(session_id, &slot)?;
        match (&mut *guard, live) {
            (Slot::Live(record), true) => {
                record.push_flash(category, message);
                Ok(())
            }
            _ => Err(AuthError::SessionNotFound),
        }
    }

    fn take_flash_now(&self, session_id: &SessionId, category: &str) -> Result<Vec<String>> {
        let Some(slot) = self.slot(session_id)? else {
            return Ok(Vec::new());
        };
        let (mut guard, live) = self.live(session_id, &slot)?;
        Ok(match (&mut *guard, live) {
            (Slot::Live(record), true) => record.take_flash(category),
            _ => Vec::new(),
        })
    }
}

impl SessionStore for MemorySessionStore {
    async fn load(&self, session_id: &SessionId) -> Result<Option<SessionRecord>> {
        self.load_now(session_id)
    }

    async fn create(&self) -> Result<SessionRecord> {
        self.create_now()
    }

    async fn save(&self, record: &SessionRecord) -> Result<()> {
        self.save_now(record)
    }

    async fn regenerate(
        &self,
        record: &SessionRecord,
        payload: SessionPayload,
    ) -> Result<SessionRecord> {
        self.regenerate_now(record, payload)
    }

    async fn destroy(&self, session_id: &SessionId) -> Result<()> {
        self.destroy_now(session_id)
    }

    async fn push_flash(&self, session_id: &SessionId, category: &str, message: &str) -> Result<()> {
        self.push_flash_now(session_id, category, message)
    }

    async fn take_flash(&self, session_id: &SessionId, category: &str) -> Result<Vec<String>> {
        self.take_flash_now(session_id, category)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mocks::ManualClock;
    use crate::state::{Principal, UserId};
    use chrono::{Duration, Utc};

    fn store_with_clock() -> (MemorySessionStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        (MemorySessionStore::with_clock(clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_create_and_load() {
        let store = MemorySessionStore::new();
        let record = store.create().await.unwrap();

        assert!(record.principal.is_none());
        assert!(record.expires_at.is_none());
        assert_eq!(store.load(&record.session_id).await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn test_load_unknown_id_is_none() {
        let store = MemorySessionStore::new();
        assert_eq!(store.load(&SessionId::generate()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_persists_mutation() {
        let store = MemorySessionStore::new();
        let mut record = store.create().await.unwrap();
        record.principal = Some(Principal::new(UserId::from(3)));
        store.save(&record).await.unwrap();

        let loaded = store.load(&record.session_id).await.unwrap().unwrap();
        assert_eq!(loaded.principal, record.principal);
    }

    #[tokio::test]
    async fn test_regenerate_retires_old_id() {
        let store = MemorySessionStore::new();
        let old = store.create().await.unwrap();
        let principal = Principal::new(UserId::from(1));

        let next = store
            .regenerate(&old, SessionPayload::fresh().with_principal(principal.clone()))
            .await
            .unwrap();

        assert_ne!(next.session_id, old.session_id);
        assert_eq!(store.load(&old.session_id).await.unwrap(), None);
        let loaded = store.load(&next.session_id).await.unwrap().unwrap();
        assert_eq!(loaded.principal, Some(principal));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_regenerate_copies_only_the_payload() {
        let store = MemorySessionStore::new();
        let old = store.create().await.unwrap();
        store.push_flash(&old.session_id, "error", "stale").await.unwrap();

        let next = store.regenerate(&old, SessionPayload::fresh()).await.unwrap();
        assert!(store.take_flash(&next.session_id, "error").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_second_regenerate_of_same_source_fails() {
        let store = MemorySessionStore::new();
        let old = store.create().await.unwrap();

        store.regenerate(&old, SessionPayload::fresh()).await.unwrap();
        let again = store.regenerate(&old, SessionPayload::fresh()).await;

        assert_eq!(again, Err(AuthError::SessionNotFound));
    }

    #[tokio::test]
    async fn test_save_does_not_resurrect_retired_id() {
        let store = MemorySessionStore::new();
        let old = store.create().await.unwrap();
        store.regenerate(&old, SessionPayload::fresh()).await.unwrap();

        assert_eq!(store.save(&old).await, Err(AuthError::SessionNotFound));
        assert_eq!(store.load(&old.session_id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_destroy_is_idempotent() {
        let store = MemorySessionStore::new();
        let record = store.create().await.unwrap();

        store.destroy(&record.session_id).await.unwrap();
        store.destroy(&record.session_id).await.unwrap();
        store.destroy(&SessionId::generate()).await.unwrap();

        assert_eq!(store.load(&record.session_id).await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_expired_record_is_reaped_on_load() {
        let (store, clock) = store_with_clock();
        let mut record = store.create().await.unwrap();
        record.principal = Some(Principal::new(UserId::from(1)));
        record.expires_at = Some(clock.now() + Duration::seconds(15));
        store.save(&record).await.unwrap();

        assert!(store.load(&record.session_id).await.unwrap().is_some());

        clock.advance(Duration::seconds(16));
        assert_eq!(store.load(&record.session_id).await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_expired_record_cannot_be_regenerated() {
        let (store, clock) = store_with_clock();
        let mut record = SessionRecord::new(clock.now());
        record.expires_at = Some(clock.now() - Duration::seconds(1));
        store.insert(record.clone()).unwrap();

        let result = store.regenerate(&record, SessionPayload::fresh()).await;
        assert_eq!(result, Err(AuthError::SessionNotFound));
    }

    #[tokio::test]
    async fn test_flash_is_single_read() {
        let store = MemorySessionStore::new();
        let record = store.create().await.unwrap();
        let id = &record.session_id;

        store.push_flash(id, "error", "one").await.unwrap();
        store.push_flash(id, "error", "two").await.unwrap();

        assert_eq!(store.take_flash(id, "error").await.unwrap(), vec!["one", "two"]);
        assert!(store.take_flash(id, "error").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_flash_is_per_session() {
        let store = MemorySessionStore::new();
        let a = store.create().await.unwrap();
        let b = store.create().await.unwrap();

        store.push_flash(&a.session_id, "error", "for a").await.unwrap();

        assert!(store.take_flash(&b.session_id, "error").await.unwrap().is_empty());
        assert_eq!(store.take_flash(&a.session_id, "error").await.unwrap(), vec!["for a"]);
    }

    #[tokio::test]
    async fn test_push_flash_to_missing_session_fails() {
        let store = MemorySessionStore::new();
        let result = store.push_flash(&SessionId::generate(), "error", "x").await;
        assert_eq!(result, Err(AuthError::SessionNotFound));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_regenerations_have_one_winner() {
        let store = MemorySessionStore::new();
        let old = store.create().await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8u64 {
            let store = store.clone();
            let old = old.clone();
            handles.push(tokio::spawn(async move {
                let payload =
                    SessionPayload::fresh().with_principal(Principal::new(UserId::from(i)));
                store.regenerate(&old, payload).await
            }));
        }

        let mut winners = Vec::new();
        for handle in handles {
            if let Ok(record) = handle.await.unwrap() {
                winners.push(record);
            }
        }

        assert_eq!(winners.len(), 1, "exactly one regeneration must win");
        assert_eq!(store.len(), 1);
        let survivor = store.load(&winners[0].session_id).await.unwrap().unwrap();
        assert_eq!(survivor, winners[0]);
    }
}
