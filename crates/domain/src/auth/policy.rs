//! Handling of undecodable access credentials at login.

use serde::{Deserialize, Serialize};

/// What a login does when the access credential cannot be decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodePolicy {
    /// Reject the login; nothing is stored or persisted.
    #[default]
    Strict,
    /// Accept and persist the pair with no claims, still reporting the error.
    Lenient,
}

impl DecodePolicy {
    /// Returns true if undecodable credentials are still accepted.
    #[must_use]
    pub const fn accepts_undecodable(self) -> bool {
        matches!(self, Self::Lenient)
    }
}
