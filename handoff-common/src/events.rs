//! Domain events
//!
//! Emitted by the upload and completion handlers once their own persistence
//! step has succeeded. Events are immutable and only live for the duration
//! of one dispatch; nothing here is stored.
//!
//! JSON form (as accepted by the event ingestion endpoint):
//! ```json
//! {"kind":"submission_created","submissionId":"42","submitterIdentity":"a@x.com","metadata":{"fileName":"scan.png"}}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::identity::Identity;
use crate::wire::{ServerMessage, SubmissionData, SubmissionStatus};

/// Keys owned by [`SubmissionData`]; metadata entries with these names are
/// dropped so the payload never carries duplicate keys.
const RESERVED_KEYS: &[&str] = &["id", "userId", "status", "uploadedAt", "completedAt"];

/// A submission lifecycle occurrence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A submitter uploaded a new item; every reviewer should hear about it
    SubmissionCreated(SubmissionEvent),

    /// A reviewer finished an item; only its submitter should hear about it
    SubmissionCompleted(SubmissionEvent),
}

/// Fields shared by both submission events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionEvent {
    pub submission_id: String,
    pub submitter_identity: Identity,
    /// When the upload or completion was persisted
    #[serde(default = "Utc::now")]
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl SubmissionEvent {
    pub fn new(submission_id: impl Into<String>, submitter_identity: Identity) -> Self {
        Self {
            submission_id: submission_id.into(),
            submitter_identity,
            occurred_at: Utc::now(),
            metadata: Map::new(),
        }
    }

    /// Attach one metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

impl DomainEvent {
    pub fn submission(&self) -> &SubmissionEvent {
        match self {
            DomainEvent::SubmissionCreated(event) | DomainEvent::SubmissionCompleted(event) => event,
        }
    }

    /// Build the frame pushed to matching connections
    pub fn to_server_message(&self) -> ServerMessage {
        let event = self.submission();
        let mut metadata = event.metadata.clone();
        for key in RESERVED_KEYS {
            metadata.remove(*key);
        }

        match self {
            DomainEvent::SubmissionCreated(_) => ServerMessage::NewImageUpload {
                data: SubmissionData {
                    id: event.submission_id.clone(),
                    user_id: event.submitter_identity.clone(),
                    status: SubmissionStatus::Pending,
                    uploaded_at: Some(event.occurred_at),
                    completed_at: None,
                    metadata,
                },
            },
            DomainEvent::SubmissionCompleted(_) => ServerMessage::ImageEdited {
                data: SubmissionData {
                    id: event.submission_id.clone(),
                    user_id: event.submitter_identity.clone(),
                    status: SubmissionStatus::Completed,
                    uploaded_at: None,
                    completed_at: Some(event.occurred_at),
                    metadata,
                },
            },
        }
    }
}
