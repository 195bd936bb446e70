//! Real-time presence and notification fan-out

pub mod dispatcher;
pub mod registry;
pub mod socket;

pub use dispatcher::{DispatchReport, NotificationDispatcher};
pub use registry::{ConnectionHandle, ConnectionRegistry, ConnectionTags, LiveConnection, OutboundFrame, PushError};
