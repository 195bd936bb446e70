//! Live connection registry
//!
//! Tracks every open real-time connection together with the identity and
//! role it announced. One registry is constructed at startup and shared by
//! reference with every connection task and with the dispatcher.
//!
//! All four operations (`add`, `register`, `remove`, `matching`) take the
//! same mutex. The lock only guards membership; it is never held while a
//! frame is written to a socket. Each connection owns a bounded outbound
//! queue drained by its own task, so pushes are non-blocking enqueues.

use handoff_common::{Identity, Role};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// Serialized JSON text frame queued for a connection
pub type OutboundFrame = Arc<str>;

/// Opaque key of one registered connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionHandle(Uuid);

impl ConnectionHandle {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Identity and role announced by a connection, unset until `register`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionTags {
    pub identity: Option<Identity>,
    pub role: Option<Role>,
}

impl ConnectionTags {
    pub fn has_role(&self, role: Role) -> bool {
        self.role == Some(role)
    }

    pub fn has_identity(&self, identity: &Identity) -> bool {
        self.identity.as_ref() == Some(identity)
    }
}

/// Why a frame could not be queued for a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushError {
    /// The connection's outbound queue is at capacity
    QueueFull,
    /// The connection task has gone away
    Closed,
}

impl std::fmt::Display for PushError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PushError::QueueFull => f.write_str("outbound queue full"),
            PushError::Closed => f.write_str("connection closed"),
        }
    }
}

/// Snapshot of a live connection returned by [`ConnectionRegistry::matching`]
#[derive(Debug, Clone)]
pub struct LiveConnection {
    pub handle: ConnectionHandle,
    pub tags: ConnectionTags,
    outbound: mpsc::Sender<OutboundFrame>,
}

impl LiveConnection {
    /// Queue a frame without waiting
    pub fn try_push(&self, frame: OutboundFrame) -> Result<(), PushError> {
        self.outbound.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => PushError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => PushError::Closed,
        })
    }
}

struct Entry {
    tags: ConnectionTags,
    outbound: mpsc::Sender<OutboundFrame>,
}

/// Registry of live connections
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<ConnectionHandle, Entry>>,
    queue_capacity: usize,
}

impl ConnectionRegistry {
    /// Create an empty registry
    ///
    /// # Arguments
    ///
    /// * `queue_capacity` - Frames buffered per connection before pushes fail
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            queue_capacity: queue_capacity.max(1),
        }
    }

    // Every mutation leaves the map consistent, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionHandle, Entry>> {
        self.connections.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a freshly opened transport with identity and role unset
    ///
    /// Returns the handle and the receiving end of the connection's outbound
    /// queue, which the connection task drains to its socket.
    pub fn add(&self) -> (ConnectionHandle, mpsc::Receiver<OutboundFrame>) {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let handle = ConnectionHandle::new();

        let total = {
            let mut connections = self.lock();
            connections.insert(
                handle,
                Entry {
                    tags: ConnectionTags::default(),
                    outbound: tx,
                },
            );
            connections.len()
        };

        debug!(%handle, total, "Connection added");
        (handle, rx)
    }

    /// Attach identity and role to a connection (last write wins)
    ///
    /// Returns `false` if the handle is not (or no longer) registered.
    pub fn register(&self, handle: ConnectionHandle, identity: Identity, role: Role) -> bool {
        let mut connections = self.lock();
        match connections.get_mut(&handle) {
            Some(entry) => {
                debug!(%handle, %identity, %role, "Connection registered");
                entry.tags = ConnectionTags {
                    identity: Some(identity),
                    role: Some(role),
                };
                true
            }
            None => {
                debug!(%handle, "Register for unknown connection ignored");
                false
            }
        }
    }

    /// Unregister a connection; removing an unknown handle is a no-op
    ///
    /// Returns `true` if the handle was present.
    pub fn remove(&self, handle: ConnectionHandle) -> bool {
        let (removed, total) = {
            let mut connections = self.lock();
            let removed = connections.remove(&handle).is_some();
            (removed, connections.len())
        };

        if removed {
            debug!(%handle, total, "Connection removed");
        }
        removed
    }

    /// Live connections whose tags satisfy `predicate`, evaluated now
    pub fn matching<F>(&self, predicate: F) -> Vec<LiveConnection>
    where
        F: Fn(&ConnectionTags) -> bool,
    {
        self.lock()
            .iter()
            .filter(|(_, entry)| predicate(&entry.tags))
            .map(|(handle, entry)| LiveConnection {
                handle: *handle,
                tags: entry.tags.clone(),
                outbound: entry.outbound.clone(),
            })
            .collect()
    }

    /// Tags currently recorded for a handle
    pub fn tags(&self, handle: ConnectionHandle) -> Option<ConnectionTags> {
        self.lock().get(&handle).map(|entry| entry.tags.clone())
    }

    /// Number of live connections
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
