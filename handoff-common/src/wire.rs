//! Real-time wire messages
//!
//! JSON text frames exchanged between the connection registry and the
//! presence agent. Every frame is an object tagged by `"type"`.
//!
//! Client → server:
//! ```json
//! {"type":"register","userId":"a@x.com","role":"user"}
//! ```
//!
//! Server → client:
//! ```json
//! {"type":"connected","message":"..."}
//! {"type":"new_image_upload","data":{"id":"...","userId":"...","status":"pending","uploadedAt":"..."}}
//! {"type":"image_edited","data":{"id":"...","userId":"...","status":"completed","completedAt":"..."}}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::identity::{Identity, Role};

/// Frames sent by a client to the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Attach an identity and role to the sending connection
    Register {
        #[serde(rename = "userId")]
        user_id: Identity,
        role: Role,
    },
}

/// Frames pushed by the server to a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Greeting sent once, right after the transport opens
    Connected { message: String },

    /// A submitter uploaded a new item (reviewer fan-out)
    NewImageUpload { data: SubmissionData },

    /// A reviewer completed an item (submitter fan-out)
    ImageEdited { data: SubmissionData },
}

impl ServerMessage {
    /// Wire tag of this message, used for logging
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Connected { .. } => "connected",
            ServerMessage::NewImageUpload { .. } => "new_image_upload",
            ServerMessage::ImageEdited { .. } => "image_edited",
        }
    }
}

/// Processing status of a submission as shown to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Pending,
    Completed,
}

/// Submission payload carried by the fan-out messages
///
/// Free-form metadata supplied by the upload handler (file name, display
/// name, notes) is flattened into the same object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionData {
    pub id: String,
    pub user_id: Identity,
    pub status: SubmissionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}
