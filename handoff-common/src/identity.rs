//! Identity and role types
//!
//! An [`Identity`] is the join key between a pending login code, a live
//! connection and the submissions a user owns. Depending on deployment it is
//! an email address or an employee identifier; the portal treats it as an
//! opaque string.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// Opaque identity key (email address or employee id)
///
/// Surrounding whitespace is trimmed on construction and an empty value is
/// rejected. No other normalization is applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    /// Parse an identity, trimming surrounding whitespace
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("identity must not be empty".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Identity {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Identity> for String {
    fn from(identity: Identity) -> Self {
        identity.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role announced by a connected client
///
/// On the wire a submitter is `"user"` and a reviewer is `"admin"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Uploads images and waits for them to be completed
    #[serde(rename = "user", alias = "submitter")]
    Submitter,
    /// Receives new submissions and completes them
    #[serde(rename = "admin", alias = "reviewer")]
    Reviewer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Submitter => f.write_str("submitter"),
            Role::Reviewer => f.write_str("reviewer"),
        }
    }
}
