//! Login code verification
//!
//! Per identity the session moves through:
//!
//! ```text
//! NoSession ──put──▶ Pending ──match──▶ Consumed (session deleted)
//!                     │  ▲
//!                     │  └── mismatch (session kept, retry allowed)
//!                     └──── now > expires_at ──▶ Expired (session deleted)
//! ```
//!
//! Expiry is checked before the code is compared, so an expired session is
//! reported as expired even when the submitted code is correct. Codes are
//! compared exactly; trimming user input is the caller's business.

use chrono::{DateTime, Utc};
use handoff_common::Identity;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use super::store::{ProfileFields, SessionStore, StoreError};

/// Outcome of a failed verification
///
/// `NoSession`, `Expired` and `Mismatch` are user-facing outcomes, not
/// faults. `Infrastructure` means the session store could not be reached.
#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("no pending code; request a new one")]
    NoSession,

    #[error("code expired; request a new one")]
    Expired,

    #[error("invalid code")]
    Mismatch,

    #[error(transparent)]
    Infrastructure(#[from] StoreError),
}

/// Identity proven by a consumed code, with the profile issued alongside it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedIdentity {
    pub identity: Identity,
    pub profile: ProfileFields,
}

/// Consumes submitted codes against a [`SessionStore`]
#[derive(Clone)]
pub struct VerificationEngine {
    store: Arc<dyn SessionStore>,
}

impl VerificationEngine {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Verify `submitted_code` for `identity` as of `now`
    ///
    /// On success the session is consumed; a second call with the same code
    /// yields [`VerificationError::NoSession`].
    pub async fn verify(
        &self,
        identity: &Identity,
        submitted_code: &str,
        now: DateTime<Utc>,
    ) -> Result<AuthenticatedIdentity, VerificationError> {
        let session = self
            .store
            .get(identity)
            .await?
            .ok_or(VerificationError::NoSession)?;

        if session.is_expired_at(now) {
            // Only the session we read; a code issued since then stays valid.
            self.store.discard(&session).await?;
            debug!(%identity, "Login code expired");
            return Err(VerificationError::Expired);
        }

        if submitted_code != session.code {
            debug!(%identity, "Login code mismatch");
            return Err(VerificationError::Mismatch);
        }

        let consumed = match self.store.consume(identity, &session.code).await? {
            Some(consumed) => consumed,
            // Lost a race since the read: consumed by a concurrent verify,
            // or replaced by a newer code the submission does not match.
            None => {
                return match self.store.get(identity).await? {
                    Some(_) => {
                        debug!(%identity, "Login code replaced during verification");
                        Err(VerificationError::Mismatch)
                    }
                    None => Err(VerificationError::NoSession),
                };
            }
        };

        debug!(%identity, "Login code verified");
        Ok(AuthenticatedIdentity {
            identity: consumed.identity,
            profile: consumed.profile,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::otc::store::{MemorySessionStore, OtcSession, StoreResult};
    use chrono::Duration as ChronoDuration;
    use std::sync::Mutex;
    use std::time::Duration;

    fn identity() -> Identity {
        Identity::parse("a@x.com").unwrap()
    }

    async fn setup(code: &str) -> (Arc<MemorySessionStore>, VerificationEngine, OtcSession) {
        let store = Arc::new(MemorySessionStore::new());
        let session = store
            .put(
                identity(),
                ProfileFields {
                    display_name: Some("Ada".to_string()),
                },
                code.to_string(),
                Duration::from_secs(600),
            )
            .await
            .unwrap();
        let engine = VerificationEngine::new(store.clone());
        (store, engine, session)
    }

    fn at(session: &OtcSession, secs: i64) -> DateTime<Utc> {
        session.created_at + ChronoDuration::seconds(secs)
    }

    #[tokio::test]
    async fn test_success_then_replay_has_no_session() {
        let (_store, engine, session) = setup("482913").await;

        let auth = engine.verify(&identity(), "482913", at(&session, 599)).await.unwrap();
        assert_eq!(auth.identity, identity());
        assert_eq!(auth.profile.display_name.as_deref(), Some("Ada"));

        let replay = engine.verify(&identity(), "482913", at(&session, 601)).await;
        assert!(matches!(replay, Err(VerificationError::NoSession)));
    }

    #[tokio::test]
    async fn test_expiry_wins_over_mismatch_and_deletes() {
        let (store, engine, session) = setup("482913").await;

        let result = engine.verify(&identity(), "000000", at(&session, 601)).await;
        assert!(matches!(result, Err(VerificationError::Expired)));
        assert!(store.get(&identity()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_correct_code_is_still_expired() {
        let (_store, engine, session) = setup("482913").await;

        let result = engine.verify(&identity(), "482913", at(&session, 601)).await;
        assert!(matches!(result, Err(VerificationError::Expired)));

        let again = engine.verify(&identity(), "482913", at(&session, 602)).await;
        assert!(matches!(again, Err(VerificationError::NoSession)));
    }

    #[tokio::test]
    async fn test_expiry_boundary_is_inclusive() {
        let (_store, engine, session) = setup("482913").await;

        let result = engine.verify(&identity(), "482913", session.expires_at).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_mismatch_keeps_session_for_retry() {
        let (store, engine, session) = setup("482913").await;

        for _ in 0..3 {
            let result = engine.verify(&identity(), "111111", at(&session, 10)).await;
            assert!(matches!(result, Err(VerificationError::Mismatch)));
        }
        assert!(store.get(&identity()).await.unwrap().is_some());

        assert!(engine.verify(&identity(), "482913", at(&session, 20)).await.is_ok());
    }

    #[tokio::test]
    async fn test_no_session() {
        let store = Arc::new(MemorySessionStore::new());
        let engine = VerificationEngine::new(store);

        let result = engine.verify(&identity(), "482913", Utc::now()).await;
        assert!(matches!(result, Err(VerificationError::NoSession)));
    }

    #[tokio::test]
    async fn test_replaced_code_is_unverifiable() {
        let (store, engine, first) = setup("111111").await;
        store
            .put(identity(), ProfileFields::default(), "222222".to_string(), Duration::from_secs(600))
            .await
            .unwrap();

        let old = engine.verify(&identity(), "111111", at(&first, 5)).await;
        assert!(matches!(old, Err(VerificationError::Mismatch)));

        let current = engine.verify(&identity(), "222222", at(&first, 5)).await.unwrap();
        assert_eq!(current.profile, ProfileFields::default());
    }

    #[tokio::test]
    async fn test_concurrent_verifies_consume_once() {
        let (_store, engine, session) = setup("482913").await;
        let now = at(&session, 1);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = engine.clone();
                tokio::spawn(async move { engine.verify(&identity(), "482913", now).await })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(VerificationError::NoSession) => {}
                Err(other) => panic!("unexpected outcome: {:?}", other),
            }
        }
        assert_eq!(successes, 1);
    }

    /// Lets a new code be issued between the engine's read and its cleanup
    struct ReissueAfterGet {
        inner: MemorySessionStore,
        reissue: Mutex<Option<OtcSession>>,
    }

    impl ReissueAfterGet {
        async fn new(current: &OtcSession, reissue: &OtcSession) -> Arc<Self> {
            let inner = MemorySessionStore::new();
            inner.put_session(current).await.unwrap();
            Arc::new(Self {
                inner,
                reissue: Mutex::new(Some(reissue.clone())),
            })
        }
    }

    #[async_trait::async_trait]
    impl SessionStore for ReissueAfterGet {
        async fn put_session(&self, session: &OtcSession) -> StoreResult<()> {
            self.inner.put_session(session).await
        }

        async fn get(&self, identity: &Identity) -> StoreResult<Option<OtcSession>> {
            let read = self.inner.get(identity).await?;
            let pending = self.reissue.lock().unwrap().take();
            if let Some(fresh) = pending {
                self.inner.put_session(&fresh).await?;
            }
            Ok(read)
        }

        async fn delete(&self, identity: &Identity) -> StoreResult<()> {
            self.inner.delete(identity).await
        }

        async fn consume(&self, identity: &Identity, code: &str) -> StoreResult<Option<OtcSession>> {
            self.inner.consume(identity, code).await
        }

        async fn discard(&self, session: &OtcSession) -> StoreResult<bool> {
            self.inner.discard(session).await
        }
    }

    fn issued(code: &str, at: DateTime<Utc>) -> OtcSession {
        OtcSession::issue(
            identity(),
            ProfileFields::default(),
            code.to_string(),
            Duration::from_secs(600),
            at,
        )
    }

    #[tokio::test]
    async fn test_expiry_cleanup_spares_code_issued_meanwhile() {
        let now = Utc::now();
        let stale = issued("111111", now - ChronoDuration::minutes(20));
        let fresh = issued("777777", now);
        let store = ReissueAfterGet::new(&stale, &fresh).await;
        let engine = VerificationEngine::new(store.clone());

        let result = engine.verify(&identity(), "111111", now).await;
        assert!(matches!(result, Err(VerificationError::Expired)));

        let remaining = store.get(&identity()).await.unwrap().unwrap();
        assert_eq!(remaining.code, "777777");
        assert!(engine.verify(&identity(), "777777", now).await.is_ok());
    }

    #[tokio::test]
    async fn test_code_replaced_during_verify_is_mismatch() {
        let now = Utc::now();
        let current = issued("111111", now);
        let replacement = issued("222222", now);
        let store = ReissueAfterGet::new(&current, &replacement).await;
        let engine = VerificationEngine::new(store.clone());

        let result = engine.verify(&identity(), "111111", now).await;
        assert!(matches!(result, Err(VerificationError::Mismatch)));
        assert_eq!(store.get(&identity()).await.unwrap().unwrap().code, "222222");
    }

    struct DownStore;

    #[async_trait::async_trait]
    impl SessionStore for DownStore {
        async fn put_session(&self, _: &OtcSession) -> StoreResult<()> {
            Err(StoreError::Unavailable("down".to_string()))
        }

        async fn get(&self, _: &Identity) -> StoreResult<Option<OtcSession>> {
            Err(StoreError::Unavailable("down".to_string()))
        }

        async fn delete(&self, _: &Identity) -> StoreResult<()> {
            Err(StoreError::Unavailable("down".to_string()))
        }

        async fn consume(&self, _: &Identity, _: &str) -> StoreResult<Option<OtcSession>> {
            Err(StoreError::Unavailable("down".to_string()))
        }

        async fn discard(&self, _: &OtcSession) -> StoreResult<bool> {
            Err(StoreError::Unavailable("down".to_string()))
        }
    }

    #[tokio::test]
    async fn test_store_failure_is_infrastructure_error() {
        let engine = VerificationEngine::new(Arc::new(DownStore));

        let result = engine.verify(&identity(), "482913", Utc::now()).await;
        assert!(matches!(
            result,
            Err(VerificationError::Infrastructure(StoreError::Unavailable(_)))
        ));
    }

    #[tokio::test]
    async fn test_code_is_compared_exactly() {
        let (store, engine, session) = setup("482913").await;

        let result = engine.verify(&identity(), " 482913 ", at(&session, 1)).await;
        assert!(matches!(result, Err(VerificationError::Mismatch)));
        assert!(store.get(&identity()).await.unwrap().is_some());
    }
}
