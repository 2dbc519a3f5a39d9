//! Session store trait.

use crate::error::Result;
use crate::state::{SessionId, SessionPayload, SessionRecord};
use chrono::{DateTime, Utc};
use std::future::Future;

/// Session store.
///
/// Maps opaque session identifiers to [`SessionRecord`]s.
///
/// # Implementation Notes
///
/// - Operations on one id are mutually exclusive; different ids never contend
/// - Expiry is lazy: `load` of an expired record removes it and returns `None`
/// - A retired id (destroyed or regenerated) is never resurrected by `save`
pub trait SessionStore: Send + Sync {
    /// Load a session.
    ///
    /// # Returns
    ///
    /// The record if present and not expired, `None` otherwise.
    ///
    /// # Errors
    ///
    /// Returns error if the backend cannot be reached.
    fn load(
        &self,
        session_id: &SessionId,
    ) -> impl Future<Output = Result<Option<SessionRecord>>> + Send;

    /// Create a fresh, unauthenticated session with no expiry.
    ///
    /// # Errors
    ///
    /// Returns error if the backend cannot be reached.
    fn create(&self) -> impl Future<Output = Result<SessionRecord>> + Send;

    /// Persist a mutated record.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The backend cannot be reached
    /// - The id is no longer live → `AuthError::SessionNotFound`
    fn save(&self, record: &SessionRecord) -> impl Future<Output = Result<()>> + Send;

    /// Move a session to a new identifier.
    ///
    /// Allocates a new id, installs `payload`, and retires `record`'s id as
    /// one atomic step. Only one regeneration of a given source id succeeds.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The backend cannot be reached
    /// - The source id is no longer live → `AuthError::SessionNotFound`
    fn regenerate(
        &self,
        record: &SessionRecord,
        payload: SessionPayload,
    ) -> impl Future<Output = Result<SessionRecord>> + Send;

    /// Remove a session. Removing an absent id is not an error.
    ///
    /// # Errors
    ///
    /// Returns error if the backend cannot be reached.
    fn destroy(&self, session_id: &SessionId) -> impl Future<Output = Result<()>> + Send;

    /// Append a flash message to a live session.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The backend cannot be reached
    /// - The session is not live → `AuthError::SessionNotFound`
    fn push_flash(
        &self,
        session_id: &SessionId,
        category: &str,
        message: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Atomically read and clear a flash category.
    ///
    /// Returns an empty list if the category (or the session) is empty or absent.
    ///
    /// # Errors
    ///
    /// Returns error if the backend cannot be reached.
    fn take_flash(
        &self,
        session_id: &SessionId,
        category: &str,
    ) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Lazy expiry decision applied by `load`.
    ///
    /// Returns `true` if `record` must be treated as absent at `now`.
    fn expire(&self, record: &SessionRecord, now: DateTime<Utc>) -> bool {
        record.is_expired(now)
    }
}
