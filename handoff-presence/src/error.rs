//! Error types for the presence agent

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PresenceError {
    /// The transport could not be opened
    #[error("Connect failed: {0}")]
    Connect(String),

    /// The transport closed while a frame was being sent
    #[error("Connection closed")]
    Closed,
}
