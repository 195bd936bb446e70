//! One-time-code session storage
//!
//! A [`SessionStore`] holds at most one pending [`OtcSession`] per identity.
//! Issuing a new code replaces the previous session unconditionally, which
//! invalidates the old code even if it was never used and has not expired.
//!
//! Expiry is not swept here. Backends may drop expired rows whenever they
//! like; the verification engine re-checks `expires_at` on every read.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use handoff_common::Identity;
use serde::{Deserialize, Serialize};
use dashmap::DashMap;
use std::time::Duration;
use thiserror::Error;

/// Storage-layer failure (the session store is unreachable or inconsistent)
///
/// Never retried here; the caller decides on a retry policy.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Session database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Session store unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt session record: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Profile fields carried alongside a pending code
///
/// Handed back on successful verification so the caller can provision or
/// update the user record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileFields {
    #[serde(default)]
    pub display_name: Option<String>,
}

/// A pending login code for one identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtcSession {
    pub identity: Identity,
    pub profile: ProfileFields,
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl OtcSession {
    /// Build a session issued at `now` that expires `ttl` later
    ///
    /// Timestamps are truncated to whole milliseconds, the resolution the
    /// persistent backend stores.
    pub fn issue(
        identity: Identity,
        profile: ProfileFields,
        code: String,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        let created_at = truncate_to_millis(now);
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = created_at
            .checked_add_signed(ChronoDuration::milliseconds(ttl_ms))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            identity,
            profile,
            code,
            created_at,
            expires_at,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Whether `other` is the same issued code (not a later replacement)
    pub fn same_issue(&self, other: &OtcSession) -> bool {
        self.identity == other.identity
            && self.code == other.code
            && self.expires_at == other.expires_at
    }
}

fn truncate_to_millis(t: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(t.timestamp_millis()).unwrap_or(t)
}

/// Storage collaborator for pending login codes
///
/// Implementations must make `put_session` atomic with respect to `get` and
/// `delete` on the same identity: a concurrent reader sees either the old
/// session or the new one, never an empty slot in between.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert or replace the session for `session.identity`
    async fn put_session(&self, session: &OtcSession) -> StoreResult<()>;

    /// Fetch the pending session for an identity
    async fn get(&self, identity: &Identity) -> StoreResult<Option<OtcSession>>;

    /// Remove the session for an identity; removing nothing is not an error
    async fn delete(&self, identity: &Identity) -> StoreResult<()>;

    /// Atomically remove and return the session if its code equals `code`
    ///
    /// Returns `None` when there is no session or the code differs, in which
    /// case nothing is removed.
    async fn consume(&self, identity: &Identity, code: &str) -> StoreResult<Option<OtcSession>>;

    /// Remove `session` only if it is still the one stored for its identity
    ///
    /// A session replaced since it was read (same identity, different code
    /// or expiry) is left alone. Returns `true` if something was removed.
    async fn discard(&self, session: &OtcSession) -> StoreResult<bool>;

    /// Issue a session for `identity`, replacing any previous one
    async fn put(
        &self,
        identity: Identity,
        profile: ProfileFields,
        code: String,
        ttl: Duration,
    ) -> StoreResult<OtcSession> {
        let session = OtcSession::issue(identity, profile, code, ttl, Utc::now());
        self.put_session(&session).await?;
        Ok(session)
    }
}

/// In-process session store
///
/// Keyed by identity in a [`DashMap`], so operations on different
/// identities do not contend and every per-identity operation is atomic
/// under the entry's shard lock.
pub struct MemorySessionStore {
    sessions: DashMap<Identity, OtcSession>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Number of pending sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn put_session(&self, session: &OtcSession) -> StoreResult<()> {
        self.sessions.insert(session.identity.clone(), session.clone());
        Ok(())
    }

    async fn get(&self, identity: &Identity) -> StoreResult<Option<OtcSession>> {
        Ok(self.sessions.get(identity).map(|entry| entry.value().clone()))
    }

    async fn delete(&self, identity: &Identity) -> StoreResult<()> {
        self.sessions.remove(identity);
        Ok(())
    }

    async fn consume(&self, identity: &Identity, code: &str) -> StoreResult<Option<OtcSession>> {
        Ok(self
            .sessions
            .remove_if(identity, |_, session| session.code == code)
            .map(|(_, session)| session))
    }

    async fn discard(&self, session: &OtcSession) -> StoreResult<bool> {
        Ok(self
            .sessions
            .remove_if(&session.identity, |_, current| current.same_issue(session))
            .is_some())
    }
}
