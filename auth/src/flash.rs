//! One-shot, per-session flash messages.

use crate::error::Result;
use crate::providers::SessionStore;
use crate::state::SessionId;

/// Category used for rejected logins.
pub const FLASH_ERROR: &str = "error";

/// Flash messages of one session.
///
/// Messages are ordered per category. [`FlashChannel::consume`] reads and
/// clears a category in one store operation, so each message is delivered
/// at most once.
#[derive(Debug)]
pub struct FlashChannel<'a, S> {
    store: &'a S,
    session_id: &'a SessionId,
}

impl<'a, S: SessionStore> FlashChannel<'a, S> {
    /// Bind a channel to `session_id` in `store`.
    #[must_use]
    pub const fn new(store: &'a S, session_id: &'a SessionId) -> Self {
        Self { store, session_id }
    }

    /// Session this channel writes to.
    #[must_use]
    pub const fn session_id(&self) -> &SessionId {
        self.session_id
    }

    /// Append `message` to `category`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AuthError::SessionNotFound`] if the session is not
    /// live, or a backend error.
    pub async fn push(&self, category: &str, message: &str) -> Result<()> {
        self.store.push_flash(self.session_id, category, message).await
    }

    /// Read and clear `category`. Empty when nothing is queued.
    ///
    /// # Errors
    ///
    /// Returns error if the backend cannot be reached.
    pub async fn consume(&self, category: &str) -> Result<Vec<String>> {
        self.store.take_flash(self.session_id, category).await
    }
}
