//! # Handoff Presence Agent
//!
//! Client-side half of the live notification channel. Keeps one logical
//! connection to the server, reconnects after a fixed delay when it drops,
//! re-announces the current identity and role on every (re)connect, and
//! hands parsed server messages to the application.

pub mod agent;
pub mod connector;
pub mod error;

pub use agent::{PresenceAgent, PresenceConfig, PresenceState};
pub use connector::{Connector, Transport, WsConnector};
pub use error::PresenceError;
