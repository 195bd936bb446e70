//! Passwordless login flow
//!
//! Ties the code generator, the session store and the verification engine
//! together, and hands issued codes to a [`CodeDelivery`] collaborator
//! (normally the transactional email service).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use handoff_common::Identity;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use super::code::generate_code;
use super::store::{ProfileFields, SessionStore, StoreError};
use super::verify::{AuthenticatedIdentity, VerificationEngine, VerificationError};

/// Failure to deliver an issued code to its owner
#[derive(Error, Debug)]
#[error("Code delivery failed: {0}")]
pub struct DeliveryError(pub String);

/// Sends an issued code to the identity's delivery channel
#[async_trait]
pub trait CodeDelivery: Send + Sync {
    async fn deliver(
        &self,
        identity: &Identity,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DeliveryError>;
}

/// Writes issued codes to the log instead of sending them
///
/// Stand-in for the email service in development deployments.
pub struct LogCodeDelivery;

#[async_trait]
impl CodeDelivery for LogCodeDelivery {
    async fn deliver(
        &self,
        identity: &Identity,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DeliveryError> {
        info!(%identity, code, %expires_at, "Issued login code");
        Ok(())
    }
}

/// Errors from requesting a login code
#[derive(Error, Debug)]
pub enum LoginError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

/// Summary of an issued code, safe to return to the requester
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCode {
    pub identity: Identity,
    pub expires_at: DateTime<Utc>,
}

/// Issues and verifies login codes
#[derive(Clone)]
pub struct LoginService {
    store: Arc<dyn SessionStore>,
    delivery: Arc<dyn CodeDelivery>,
    engine: VerificationEngine,
    ttl: Duration,
}

impl LoginService {
    pub fn new(store: Arc<dyn SessionStore>, delivery: Arc<dyn CodeDelivery>, ttl: Duration) -> Self {
        let engine = VerificationEngine::new(Arc::clone(&store));
        Self {
            store,
            delivery,
            engine,
            ttl,
        }
    }

    /// Issue a fresh code for `identity`, invalidating any earlier one
    ///
    /// If delivery fails the new session is discarded again, so no pending
    /// code exists that nobody received. The earlier code stays invalidated;
    /// the user has to request another.
    pub async fn request_code(
        &self,
        identity: Identity,
        profile: ProfileFields,
    ) -> Result<IssuedCode, LoginError> {
        let session = self
            .store
            .put(identity, profile, generate_code(), self.ttl)
            .await?;

        if let Err(e) = self
            .delivery
            .deliver(&session.identity, &session.code, session.expires_at)
            .await
        {
            warn!(identity = %session.identity, "Failed to deliver login code: {}", e);
            self.store.discard(&session).await?;
            return Err(e.into());
        }

        Ok(IssuedCode {
            identity: session.identity,
            expires_at: session.expires_at,
        })
    }

    /// Verify a submitted code against the current wall-clock time
    pub async fn verify(
        &self,
        identity: &Identity,
        code: &str,
    ) -> Result<AuthenticatedIdentity, VerificationError> {
        self.engine.verify(identity, code, Utc::now()).await
    }
}
