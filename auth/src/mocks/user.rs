//! Mock user repositories for testing.

use crate::error::{AuthError, Result};
use crate::providers::{UserRecord, UserRepository};
use crate::state::UserId;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock user repository.
///
/// Uses in-memory storage for testing and counts lookups.
#[derive(Debug, Clone, Default)]
pub struct MockUserRepository {
    users: Arc<Mutex<HashMap<String, UserRecord>>>,
    lookups: Arc<AtomicUsize>,
}

impl MockUserRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository holding the single user `{ id: 1, username: "admin", password: "supersecret" }`.
    #[must_use]
    pub fn with_admin() -> Self {
        let repo = Self::new();
        repo.insert(UserRecord::new(UserId::from(1), "admin", "supersecret"));
        repo
    }

    /// Add or replace a user.
    pub fn insert(&self, user: UserRecord) {
        if let Ok(mut users) = self.users.lock() {
            users.insert(user.username.clone(), user);
        }
    }

    /// Number of `find_by_username` calls so far.
    #[must_use]
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Snapshot of a stored user (for asserting the store is unchanged).
    #[must_use]
    pub fn get(&self, username: &str) -> Option<UserRecord> {
        self.users.lock().ok()?.get(username).cloned()
    }
}

impl UserRepository for MockUserRepository {
    fn find_by_username(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<Option<UserRecord>>> + Send {
        let users = Arc::clone(&self.users);
        let lookups = Arc::clone(&self.lookups);
        let username = username.to_string();

        async move {
            lookups.fetch_add(1, Ordering::SeqCst);
            Ok(users
                .lock()
                .map_err(|_| AuthError::InternalError("Mutex lock failed".to_string()))?
                .get(&username)
                .cloned())
        }
    }
}

/// Repository whose backend is always down.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingUserRepository;

impl UserRepository for FailingUserRepository {
    fn find_by_username(
        &self,
        _username: &str,
    ) -> impl Future<Output = Result<Option<UserRecord>>> + Send {
        async { Err(AuthError::BackendUnavailable("database failure".to_string())) }
    }
}

/// Repository that answers like [`MockUserRepository::with_admin`] after a delay.
#[derive(Debug, Clone)]
pub struct SlowUserRepository {
    inner: MockUserRepository,
    delay: Duration,
}

impl SlowUserRepository {
    /// Create a repository that sleeps for `delay` before every lookup.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MockUserRepository::with_admin(),
            delay,
        }
    }
}

impl UserRepository for SlowUserRepository {
    fn find_by_username(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<Option<UserRecord>>> + Send {
        let delay = self.delay;
        let lookup = self.inner.find_by_username(username);

        async move {
            tokio::time::sleep(delay).await;
            lookup.await
        }
    }
}
