//! SQLite-backed session store
//!
//! One row per identity in `otc_sessions`. Replacement is a single upsert
//! statement, so readers never observe the slot empty between the old and
//! the new code.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use handoff_common::Identity;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use tracing::info;

use super::store::{OtcSession, ProfileFields, SessionStore, StoreError, StoreResult};

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS otc_sessions (
        identity TEXT PRIMARY KEY NOT NULL,
        display_name TEXT,
        code TEXT NOT NULL,
        created_at_ms INTEGER NOT NULL,
        expires_at_ms INTEGER NOT NULL
    )
"#;

/// Session store persisted in SQLite
#[derive(Clone)]
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    /// Open (creating if missing) the database file and ensure the schema
    pub async fn open(path: &Path) -> StoreResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        info!("Opened session database at {}", path.display());
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool and ensure the schema
    pub async fn from_pool(pool: SqlitePool) -> StoreResult<Self> {
        sqlx::query(CREATE_TABLE).execute(&pool).await?;
        Ok(Self { pool })
    }

    /// In-memory database, used by tests
    ///
    /// Exactly one connection, never recycled: every SQLite in-memory
    /// connection is its own database.
    pub async fn in_memory() -> StoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::from_pool(pool).await
    }
}

fn from_millis(ms: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StoreError::Corrupt(format!("timestamp out of range: {}", ms)))
}

fn session_from_row(row: &sqlx::sqlite::SqliteRow) -> StoreResult<OtcSession> {
    let identity: String = row.try_get("identity")?;
    let identity =
        Identity::parse(&identity).map_err(|e| StoreError::Corrupt(e.to_string()))?;

    Ok(OtcSession {
        identity,
        profile: ProfileFields {
            display_name: row.try_get("display_name")?,
        },
        code: row.try_get("code")?,
        created_at: from_millis(row.try_get("created_at_ms")?)?,
        expires_at: from_millis(row.try_get("expires_at_ms")?)?,
    })
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn put_session(&self, session: &OtcSession) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO otc_sessions (identity, display_name, code, created_at_ms, expires_at_ms)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(identity) DO UPDATE SET
                display_name = excluded.display_name,
                code = excluded.code,
                created_at_ms = excluded.created_at_ms,
                expires_at_ms = excluded.expires_at_ms
            "#,
        )
        .bind(session.identity.as_str())
        .bind(session.profile.display_name.as_deref())
        .bind(&session.code)
        .bind(session.created_at.timestamp_millis())
        .bind(session.expires_at.timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, identity: &Identity) -> StoreResult<Option<OtcSession>> {
        let row = sqlx::query(
            "SELECT identity, display_name, code, created_at_ms, expires_at_ms \
             FROM otc_sessions WHERE identity = ?",
        )
        .bind(identity.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(session_from_row).transpose()
    }

    async fn delete(&self, identity: &Identity) -> StoreResult<()> {
        sqlx::query("DELETE FROM otc_sessions WHERE identity = ?")
            .bind(identity.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn consume(&self, identity: &Identity, code: &str) -> StoreResult<Option<OtcSession>> {
        let row = sqlx::query(
            "DELETE FROM otc_sessions WHERE identity = ? AND code = ? \
             RETURNING identity, display_name, code, created_at_ms, expires_at_ms",
        )
        .bind(identity.as_str())
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(session_from_row).transpose()
    }

    async fn discard(&self, session: &OtcSession) -> StoreResult<bool> {
        let result = sqlx::query(
            "DELETE FROM otc_sessions WHERE identity = ? AND code = ? AND expires_at_ms = ?",
        )
        .bind(session.identity.as_str())
        .bind(&session.code)
        .bind(session.expires_at.timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
