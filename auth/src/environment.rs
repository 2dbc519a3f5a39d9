//! Authentication environment.
//!
//! Dependencies the authenticator needs from the outside world, injected so
//! the state machine can run at memory speed in tests.

use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Clock trait - abstracts time operations for testability.
pub trait Clock: Send + Sync {
    /// Get the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

/// Authentication environment.
///
/// # Type Parameters
///
/// - `U`: User repository
/// - `P`: Password comparator
/// - `S`: Session store
#[derive(Clone)]
pub struct AuthEnvironment<U, P, S> {
    /// User repository (injected by the application).
    pub users: U,

    /// Password comparator.
    pub comparator: P,

    /// Session store (memory or `Redis`).
    pub sessions: S,

    /// Time source for expiry decisions.
    pub clock: Arc<dyn Clock>,
}

impl<U, P, S> AuthEnvironment<U, P, S> {
    /// Create a new authentication environment using the system clock.
    #[must_use]
    pub fn new(users: U, comparator: P, sessions: S) -> Self {
        Self {
            users,
            comparator,
            sessions,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}
