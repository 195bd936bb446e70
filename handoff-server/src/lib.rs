//! # Handoff Server Library (handoff-server)
//!
//! Passwordless login and live notification fan-out for the image-handoff
//! portal.
//!
//! **Purpose:** Issue and verify one-time login codes, keep a registry of
//! live WebSocket clients tagged by identity and role, and push
//! "new submission" / "submission completed" events to the right clients.
//!
//! **Architecture:** axum HTTP + WebSocket front, a concurrent in-memory or
//! SQLite session store, and a single mutex-guarded connection registry
//! with one bounded outbound queue per connection.

use axum::Router;
use handoff_common::config::{PortalConfig, StorageConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub mod api;
pub mod error;
pub mod otc;
pub mod realtime;

pub use error::{Error, Result};

use otc::{CodeDelivery, LoginService, MemorySessionStore, SessionStore, SqliteSessionStore};
use realtime::{ConnectionRegistry, NotificationDispatcher};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub login: LoginService,
    pub registry: Arc<ConnectionRegistry>,
    pub dispatcher: NotificationDispatcher,
    /// Interval between server pings on each WebSocket
    pub ping_interval: Duration,
}

impl AppState {
    /// Wire the login flow and the real-time registry from configuration
    pub fn new(
        store: Arc<dyn SessionStore>,
        delivery: Arc<dyn CodeDelivery>,
        config: &PortalConfig,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new(config.realtime.outbound_queue_capacity));
        Self {
            login: LoginService::new(store, delivery, config.otc.ttl()),
            dispatcher: NotificationDispatcher::new(Arc::clone(&registry)),
            registry,
            ping_interval: config.realtime.ping_interval().max(Duration::from_millis(100)),
        }
    }
}

/// Open the configured session store
///
/// SQLite when a database path is configured, in-memory otherwise.
pub async fn open_session_store(config: &StorageConfig) -> Result<Arc<dyn SessionStore>> {
    match &config.database_path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let store = SqliteSessionStore::open(path).await?;
            Ok(Arc::new(store))
        }
        None => {
            info!("No database configured, keeping login sessions in memory");
            Ok(Arc::new(MemorySessionStore::new()))
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    api::router(state)
}
