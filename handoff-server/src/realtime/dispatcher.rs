//! Notification fan-out
//!
//! Turns a [`DomainEvent`] into a server frame and queues it on every
//! matching live connection:
//!
//! - `SubmissionCreated` goes to every connection registered as reviewer
//! - `SubmissionCompleted` goes to every connection registered with the
//!   submitter's identity (normally zero or one)
//!
//! Delivery is best-effort. A push that fails (queue full, connection
//! closing) is logged and dropped; nothing is retried and nothing is
//! reported back as an error.

use handoff_common::{DomainEvent, Role};
use std::sync::Arc;
use tracing::{debug, warn};

use super::registry::{ConnectionRegistry, OutboundFrame};

/// Counts from one dispatch, for diagnostics only
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Connections that satisfied the targeting rule
    pub matched: usize,
    /// Connections the frame was queued on
    pub delivered: usize,
}

/// Pushes domain events to live connections
#[derive(Clone)]
pub struct NotificationDispatcher {
    registry: Arc<ConnectionRegistry>,
}

impl NotificationDispatcher {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Fan an event out to its targets
    ///
    /// Never blocks on a slow client: the registry lock is released before
    /// any frame is queued, and queueing itself does not wait.
    pub fn dispatch(&self, event: &DomainEvent) -> DispatchReport {
        let message = event.to_server_message();
        let frame: OutboundFrame = match serde_json::to_string(&message) {
            Ok(json) => Arc::from(json),
            Err(e) => {
                warn!("Failed to serialize {} frame: {}", message.kind(), e);
                return DispatchReport::default();
            }
        };

        let targets = match event {
            DomainEvent::SubmissionCreated(_) => {
                self.registry.matching(|tags| tags.has_role(Role::Reviewer))
            }
            DomainEvent::SubmissionCompleted(submission) => {
                let submitter = &submission.submitter_identity;
                self.registry.matching(|tags| tags.has_identity(submitter))
            }
        };

        let mut report = DispatchReport {
            matched: targets.len(),
            delivered: 0,
        };

        for conn in &targets {
            match conn.try_push(Arc::clone(&frame)) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    debug!(handle = %conn.handle, "Dropped {} frame: {}", message.kind(), e);
                }
            }
        }

        debug!(
            kind = message.kind(),
            submission = %event.submission().submission_id,
            matched = report.matched,
            delivered = report.delivered,
            "Dispatched event"
        );
        report
    }
}
