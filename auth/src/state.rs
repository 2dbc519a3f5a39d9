//! Session and identity types.
//!
//! All types are `Clone` so records can be copied out of a store, mutated,
//! and written back without holding any lock across an `.await`.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Number of random bytes in a session identifier (256 bits).
pub const SESSION_ID_BYTES: usize = 32;

// ═══════════════════════════════════════════════════════════════════════
// ID Types
// ═══════════════════════════════════════════════════════════════════════

/// Opaque identifier for a user, as assigned by the user repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl From<u64> for UserId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque session identifier.
///
/// Generated from the OS CSPRNG and encoded as unpadded base64url.
/// `Debug` and `Display` only print a short prefix so full identifiers
/// never end up in logs.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a new random `SessionId`.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; SESSION_ID_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Parse an identifier presented by a client.
    ///
    /// Returns `None` unless the value has the exact shape of a generated id,
    /// so arbitrary cookie contents never reach the store.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let decoded = URL_SAFE_NO_PAD.decode(raw).ok()?;
        (decoded.len() == SESSION_ID_BYTES).then(|| Self(raw.to_string()))
    }

    /// Full identifier, for cookies and storage keys only.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Short prefix suitable for logs.
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({}…)", self.short())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}…", self.short())
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Core State Types
// ═══════════════════════════════════════════════════════════════════════

/// Verified identity attached to a session.
///
/// Carries no credential material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Identifier from the user repository.
    pub id: UserId,

    /// Optional name for display purposes.
    pub display_name: Option<String>,
}

impl Principal {
    /// Principal with only an identifier.
    #[must_use]
    pub const fn new(id: UserId) -> Self {
        Self {
            id,
            display_name: None,
        }
    }

    /// Attach a display name.
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

/// Server-side session record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    /// Opaque identifier sent to the client.
    pub session_id: SessionId,

    /// Authenticated identity, if logged in.
    pub principal: Option<Principal>,

    /// When the record was created.
    pub created_at: DateTime<Utc>,

    /// Expiration (set at successful authentication when a TTL is configured).
    pub expires_at: Option<DateTime<Utc>>,

    /// Flash messages by category, in push order.
    pub flash: BTreeMap<String, Vec<String>>,
}

impl SessionRecord {
    /// Fresh, unauthenticated record with a newly generated id.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self::from_payload(SessionId::generate(), now, SessionPayload::fresh())
    }

    /// Record built from a payload under a given id.
    #[must_use]
    pub fn from_payload(session_id: SessionId, now: DateTime<Utc>, payload: SessionPayload) -> Self {
        Self {
            session_id,
            principal: payload.principal,
            created_at: now,
            expires_at: payload.expires_at,
            flash: payload.flash,
        }
    }

    /// Whether `expires_at` is set and not after `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Whether this record is evidence of authentication at `now`.
    #[must_use]
    pub fn is_authenticated(&self, now: DateTime<Utc>) -> bool {
        self.principal.is_some() && !self.is_expired(now)
    }

    /// Authenticated principal at `now`, if any.
    #[must_use]
    pub fn principal_at(&self, now: DateTime<Utc>) -> Option<&Principal> {
        if self.is_expired(now) {
            None
        } else {
            self.principal.as_ref()
        }
    }

    /// Append a flash message to `category`.
    pub fn push_flash(&mut self, category: &str, message: impl Into<String>) {
        self.flash
            .entry(category.to_string())
            .or_default()
            .push(message.into());
    }

    /// Remove and return all flash messages in `category`.
    pub fn take_flash(&mut self, category: &str) -> Vec<String> {
        self.flash.remove(category).unwrap_or_default()
    }
}

/// State installed into a regenerated session.
///
/// Regeneration never copies anything implicitly; the caller decides which
/// parts of the old record move forward.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionPayload {
    /// Principal for the new record.
    pub principal: Option<Principal>,

    /// Expiration for the new record.
    pub expires_at: Option<DateTime<Utc>>,

    /// Flash messages for the new record.
    pub flash: BTreeMap<String, Vec<String>>,
}

impl SessionPayload {
    /// Empty payload: nothing carried forward.
    #[must_use]
    pub fn fresh() -> Self {
        Self::default()
    }

    /// Payload that carries principal, expiry and flash from `record`.
    #[must_use]
    pub fn carry(record: &SessionRecord) -> Self {
        Self {
            principal: record.principal.clone(),
            expires_at: record.expires_at,
            flash: record.flash.clone(),
        }
    }

    /// Set the principal.
    #[must_use]
    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    /// Set the expiration.
    #[must_use]
    pub const fn expiring_at(mut self, expires_at: Option<DateTime<Utc>>) -> Self {
        self.expires_at = expires_at;
        self
    }
}

/// Where a request stands in the authentication state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    /// No valid session cookie presented.
    NoSession,
    /// A live session exists but carries no (unexpired) principal.
    Unauthenticated,
    /// Credentials are being verified for this request.
    Authenticating,
    /// A live session carries a principal.
    Authenticated,
}
