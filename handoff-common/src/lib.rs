//! # Handoff Common Library
//!
//! Shared code for the image-handoff portal crates including:
//! - Identity and role types
//! - Domain events emitted by the upload/completion handlers
//! - Wire messages exchanged over the real-time channel
//! - Configuration loading

pub mod config;
pub mod error;
pub mod events;
pub mod identity;
pub mod wire;

pub use error::{Error, Result};
pub use events::{DomainEvent, SubmissionEvent};
pub use identity::{Identity, Role};
pub use wire::{ClientMessage, ServerMessage, SubmissionData, SubmissionStatus};
