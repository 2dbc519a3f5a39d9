//! Redis-based session store implementation.
//!
//! # Architecture
//!
//! Each session is a Redis hash at `session:{session_id}`:
//!
//! | Field | Value |
//! |-------|-------|
//! | `created_at` | Unix milliseconds |
//! | `expires_at` | Unix milliseconds (absent for sessions without expiry) |
//! | `principal` | [`crate::codec::to_record`] bytes (absent when unauthenticated) |
//! | `flash:{category}` | JSON array of messages |
//!
//! The key's Redis TTL follows `expires_at`, or the configured storage TTL
//! for sessions without one. `expires_at` is still checked on every read and
//! inside every script, so a record is never served after it expires even
//! if Redis has not evicted it yet.
//!
//! Every compound operation (create, save, regenerate, flash push/take) is
//! a Lua script, so each runs atomically on the server and concurrent
//! regenerations of one source id have exactly one winner.
//!
//! # Example
//!
//! ```no_run
//! use gatehouse_auth::stores::RedisSessionStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = RedisSessionStore::new("redis://127.0.0.1:6379", chrono::Duration::hours(24)).await?;
//! # Ok(())
//! # }
//! ```

use crate::codec;
use crate::environment::{Clock, SystemClock};
use crate::error::{AuthError, Result};
use crate::providers::SessionStore;
use crate::state::{SessionId, SessionPayload, SessionRecord};
use chrono::{DateTime, Duration, Utc};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, LazyLock};

const FIELD_CREATED_AT: &str = "created_at";
const FIELD_EXPIRES_AT: &str = "expires_at";
const FIELD_PRINCIPAL: &str = "principal";
const FLASH_PREFIX: &str = "flash:";

/// Shared prologue: returns 0 from the script if KEYS[1] is absent or its
/// `expires_at` is not after ARGV[1] (now, ms). Expired keys are deleted.
macro_rules! live_guard {
    () => {
        r"
        if redis.call('EXISTS', KEYS[1]) == 0 then
            return 0
        end
        local exp = redis.call('HGET', KEYS[1], 'expires_at')
        if exp and tonumber(exp) <= tonumber(ARGV[1]) then
            redis.call('DEL', KEYS[1])
            return 0
        end
        "
    };
}

/// KEYS[1] new key; ARGV[1] ttl ms; ARGV[2..] field/value pairs.
static CREATE_SCRIPT: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
        if redis.call('EXISTS', KEYS[1]) == 1 then
            return 0
        end
        redis.call('HSET', KEYS[1], unpack(ARGV, 2))
        redis.call('PEXPIRE', KEYS[1], ARGV[1])
        return 1
        ",
    )
});

/// KEYS[1] key; ARGV[1] now ms; ARGV[2] ttl ms; ARGV[3..] field/value pairs.
static SAVE_SCRIPT: LazyLock<Script> = LazyLock::new(|| {
    Script::new(concat!(
        live_guard!(),
        r"
        redis.call('DEL', KEYS[1])
        redis.call('HSET', KEYS[1], unpack(ARGV, 3))
        redis.call('PEXPIRE', KEYS[1], ARGV[2])
        return 1
        "
    ))
});

/// KEYS[1] old key; KEYS[2] new key; ARGV[1] now ms; ARGV[2] ttl ms;
/// ARGV[3..] field/value pairs for the new record.
static REGENERATE_SCRIPT: LazyLock<Script> = LazyLock::new(|| {
    Script::new(concat!(
        live_guard!(),
        r"
        if redis.call('EXISTS', KEYS[2]) == 1 then
            return -1
        end
        redis.call('DEL', KEYS[1])
        redis.call('HSET', KEYS[2], unpack(ARGV, 3))
        redis.call('PEXPIRE', KEYS[2], ARGV[2])
        return 1
        "
    ))
});

/// KEYS[1] key; ARGV[1] now ms; ARGV[2] flash field; ARGV[3] message.
static PUSH_FLASH_SCRIPT: LazyLock<Script> = LazyLock::new(|| {
    Script::new(concat!(
        live_guard!(),
        r"
        local current = redis.call('HGET', KEYS[1], ARGV[2])
        local messages = {}
        if current then
            messages = cjson.decode(current)
        end
        table.insert(messages, ARGV[3])
        redis.call('HSET', KEYS[1], ARGV[2], cjson.encode(messages))
        return 1
        "
    ))
});

/// KEYS[1] key; ARGV[1] now ms; ARGV[2] flash field. Returns the stored
/// JSON array (or 0 when absent) and removes it.
static TAKE_FLASH_SCRIPT: LazyLock<Script> = LazyLock::new(|| {
    Script::new(concat!(
        live_guard!(),
        r"
        local current = redis.call('HGET', KEYS[1], ARGV[2])
        if not current then
            return 0
        end
        redis.call('HDEL', KEYS[1], ARGV[2])
        return current
        "
    ))
});

/// Redis-based session store.
///
/// Provides:
/// - Session storage with automatic key expiration
/// - Atomic regeneration via server-side scripts
/// - Per-session flash storage
/// - Connection pooling via `ConnectionManager`
#[derive(Clone)]
pub struct RedisSessionStore {
    /// Connection manager for connection pooling.
    conn_manager: ConnectionManager,

    /// Key lifetime for sessions without `expires_at`.
    storage_ttl: Duration,

    clock: Arc<dyn Clock>,
}

impl RedisSessionStore {
    /// Create a new Redis session store.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection URL (e.g., "redis://127.0.0.1:6379")
    /// * `storage_ttl` - Key lifetime for sessions that carry no expiry
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::BackendUnavailable`] if connection to Redis fails.
    pub async fn new(redis_url: &str, storage_ttl: Duration) -> Result<Self> {
        let client = Client::open(redis_url)?;
        let conn_manager = ConnectionManager::new(client).await?;

        Ok(Self {
            conn_manager,
            storage_ttl,
            clock: Arc::new(SystemClock),
        })
    }

    /// Replace the clock used for expiry decisions.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Get the Redis key for a session.
    fn session_key(session_id: &SessionId) -> String {
        format!("session:{}", session_id.expose())
    }

    fn flash_field(category: &str) -> String {
        format!("{FLASH_PREFIX}{category}")
    }

    /// Key TTL in milliseconds for `record` at `now` (at least 1).
    fn ttl_millis(&self, record: &SessionRecord, now: DateTime<Utc>) -> i64 {
        let ttl = record
            .expires_at
            .map_or(self.storage_ttl, |at| at.signed_duration_since(now));
        ttl.num_milliseconds().max(1)
    }

    /// Flatten a record into hash field/value pairs.
    fn encode(record: &SessionRecord) -> Result<Vec<(String, Vec<u8>)>> {
        let mut fields = vec![(
            FIELD_CREATED_AT.to_string(),
            record.created_at.timestamp_millis().to_string().into_bytes(),
        )];

        if let Some(expires_at) = record.expires_at {
            fields.push((
                FIELD_EXPIRES_AT.to_string(),
                expires_at.timestamp_millis().to_string().into_bytes(),
            ));
        }

        if let Some(principal) = &record.principal {
            fields.push((FIELD_PRINCIPAL.to_string(), codec::to_record(principal)?));
        }

        for (category, messages) in &record.flash {
            if !messages.is_empty() {
                fields.push((Self::flash_field(category), serde_json::to_vec(messages)?));
            }
        }

        Ok(fields)
    }

    /// Rebuild a record from `HGETALL` output.
    fn decode(session_id: &SessionId, fields: &HashMap<String, Vec<u8>>) -> Result<SessionRecord> {
        let millis = |name: &str| -> Result<Option<DateTime<Utc>>> {
            let Some(raw) = fields.get(name) else {
                return Ok(None);
            };
            let value: i64 = std::str::from_utf8(raw)
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| AuthError::SerializationError(format!("invalid {name}")))?;
            DateTime::from_timestamp_millis(value)
                .map(Some)
                .ok_or_else(|| AuthError::SerializationError(format!("{name} out of range")))
        };

        let created_at = millis(FIELD_CREATED_AT)?
            .ok_or_else(|| AuthError::SerializationError("missing created_at".into()))?;
        let expires_at = millis(FIELD_EXPIRES_AT)?;
        let principal = fields
            .get(FIELD_PRINCIPAL)
            .map(|bytes| codec::from_record(bytes))
            .transpose()?;

        let mut flash = BTreeMap::new();
        for (field, raw) in fields {
            if let Some(category) = field.strip_prefix(FLASH_PREFIX) {
                let messages: Vec<String> = serde_json::from_slice(raw)?;
                flash.insert(category.to_string(), messages);
            }
        }

        Ok(SessionRecord {
            session_id: session_id.clone(),
            principal,
            created_at,
            expires_at,
            flash,
        })
    }

    fn push_fields(invocation: &mut redis::ScriptInvocation<'_>, fields: &[(String, Vec<u8>)]) {
        for (field, value) in fields {
            invocation.arg(field.as_str()).arg(value.as_slice());
        }
    }
}

impl SessionStore for RedisSessionStore {
    async fn load(&self, session_id: &SessionId) -> Result<Option<SessionRecord>> {
        let mut conn = self.conn_manager.clone();
        let key = Self::session_key(session_id);

        let fields: HashMap<String, Vec<u8>> = conn.hgetall(&key).await?;
        if fields.is_empty() {
            return Ok(None);
        }

        let record = Self::decode(session_id, &fields)?;
        let now = self.clock.now();

        // Redis TTL normally evicts first; this covers clock skew and
        // keys whose TTL was changed out of band.
        if self.expire(&record, now) {
            tracing::debug!(
                session_id = %session_id,
                "Session expired before Redis eviction, deleting"
            );
            let _: () = conn.del(&key).await?;
            return Ok(None);
        }

        Ok(Some(record))
    }

    async fn create(&self) -> Result<SessionRecord> {
        let mut conn = self.conn_manager.clone();
        let now = self.clock.now();
        let record = SessionRecord::new(now);
        let fields = Self::encode(&record)?;

        let mut invocation = CREATE_SCRIPT.key(Self::session_key(&record.session_id));
        invocation.arg(self.ttl_millis(&record, now));
        Self::push_fields(&mut invocation, &fields);
        let created: i64 = invocation.invoke_async(&mut conn).await?;

        if created != 1 {
            return Err(AuthError::InternalError(
                "Session ID already exists (session fixation prevention)".into(),
            ));
        }

        tracing::debug!(session_id = %record.session_id, "Created session in Redis");
        Ok(record)
    }

    async fn save(&self, record: &SessionRecord) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let now = self.clock.now();
        let fields = Self::encode(record)?;

        let mut invocation = SAVE_SCRIPT.key(Self::session_key(&record.session_id));
        invocation
            .arg(now.timestamp_millis())
            .arg(self.ttl_millis(record, now));
        Self::push_fields(&mut invocation, &fields);
        let saved: i64 = invocation.invoke_async(&mut conn).await?;

        if saved == 1 {
            Ok(())
        } else {
            Err(AuthError::SessionNotFound)
        }
    }

    async fn regenerate(
        &self,
        record: &SessionRecord,
        payload: SessionPayload,
    ) -> Result<SessionRecord> {
        let mut conn = self.conn_manager.clone();
        let now = self.clock.now();
        let next = SessionRecord::from_payload(SessionId::generate(), now, payload);
        let fields = Self::encode(&next)?;

        let mut invocation = REGENERATE_SCRIPT.key(Self::session_key(&record.session_id));
        invocation
            .key(Self::session_key(&next.session_id))
            .arg(now.timestamp_millis())
            .arg(self.ttl_millis(&next, now));
        Self::push_fields(&mut invocation, &fields);
        let outcome: i64 = invocation.invoke_async(&mut conn).await?;

        match outcome {
            1 => {
                tracing::info!(
                    old_session_id = %record.session_id,
                    new_session_id = %next.session_id,
                    "Regenerated session atomically in Redis"
                );
                Ok(next)
            }
            -1 => Err(AuthError::InternalError(
                "Session ID already exists (session fixation prevention)".into(),
            )),
            _ => Err(AuthError::SessionNotFound),
        }
    }

    async fn destroy(&self, session_id: &SessionId) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let _: () = conn.del(Self::session_key(session_id)).await?;

        tracing::debug!(session_id = %session_id, "Deleted session from Redis");
        Ok(())
    }

    async fn push_flash(&self, session_id: &SessionId, category: &str, message: &str) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let pushed: i64 = PUSH_FLASH_SCRIPT
            .key(Self::session_key(session_id))
            .arg(self.clock.now().timestamp_millis())
            .arg(Self::flash_field(category))
            .arg(message)
            .invoke_async(&mut conn)
            .await?;

        if pushed == 1 {
            Ok(())
        } else {
            Err(AuthError::SessionNotFound)
        }
    }

    async fn take_flash(&self, session_id: &SessionId, category: &str) -> Result<Vec<String>> {
        let mut conn = self.conn_manager.clone();
        let taken: redis::Value = TAKE_FLASH_SCRIPT
            .key(Self::session_key(session_id))
            .arg(self.clock.now().timestamp_millis())
            .arg(Self::flash_field(category))
            .invoke_async(&mut conn)
            .await?;

        match taken {
            redis::Value::BulkString(bytes) => Ok(serde_json::from_slice(&bytes)?),
            _ => Ok(Vec::new()),
        }
    }
}
