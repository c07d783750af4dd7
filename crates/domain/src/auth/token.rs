//! Bearer credentials

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when constructing a [`Token`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The credential string was empty or whitespace only.
    #[error("credential must not be empty")]
    Empty,
}

/// An opaque, non-empty credential string.
///
/// Used for both access and refresh credentials. The `Debug` output only
/// shows a short preview so credentials do not leak into logs.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Token(String);

impl Token {
    /// Creates a token, rejecting empty values.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Empty`] if the value is empty or whitespace.
    pub fn new(value: impl Into<String>) -> Result<Self, TokenError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(TokenError::Empty);
        }
        Ok(Self(value))
    }

    /// Returns the raw credential.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the `Authorization` header value for this credential.
    #[must_use]
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }

    /// Get a preview of the credential (first 8 chars + ...).
    #[must_use]
    pub fn preview(&self) -> String {
        if self.0.chars().count() > 12 {
            let head: String = self.0.chars().take(8).collect();
            format!("{head}...")
        } else {
            "***".to_string()
        }
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Token").field(&self.preview()).finish()
    }
}

impl TryFrom<String> for Token {
    type Error = TokenError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Token> for String {
    fn from(token: Token) -> Self {
        token.0
    }
}

/// Access and refresh credentials, always held together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    /// Short-lived bearer credential attached to API calls.
    pub access: Token,
    /// Longer-lived credential exchanged for a new access credential.
    pub refresh: Token,
}

impl CredentialPair {
    /// Creates a pair from two tokens.
    #[must_use]
    pub const fn new(access: Token, refresh: Token) -> Self {
        Self { access, refresh }
    }

    /// Creates a pair from raw strings.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Empty`] if either value is empty.
    pub fn from_raw(
        access: impl Into<String>,
        refresh: impl Into<String>,
    ) -> Result<Self, TokenError> {
        Ok(Self {
            access: Token::new(access)?,
            refresh: Token::new(refresh)?,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_token_rejected() {
        assert_eq!(Token::new(""), Err(TokenError::Empty));
        assert_eq!(Token::new("   "), Err(TokenError::Empty));
    }

    #[test]
    fn test_bearer_header() {
        let token = Token::new("abc.def.ghi").unwrap();
        assert_eq!(token.bearer(), "Bearer abc.def.ghi");
    }

    #[test]
    fn test_debug_is_redacted() {
        let token = Token::new("eyJhbGciOiJIUzI1NiJ9.payload.signature").unwrap();
        let debug = format!("{token:?}");
        assert!(debug.contains("eyJhbGci..."));
        assert!(!debug.contains("signature"));

        let short = Token::new("secret").unwrap();
        assert!(!format!("{short:?}").contains("secret"));
    }

    #[test]
    fn test_pair_from_raw_requires_both() {
        assert!(CredentialPair::from_raw("a", "b").is_ok());
        assert!(CredentialPair::from_raw("a", "").is_err());
        assert!(CredentialPair::from_raw("", "b").is_err());
    }

    #[test]
    fn test_token_deserialize_rejects_empty() {
        let result: Result<Token, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());
        let token: Token = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(token.as_str(), "abc");
    }
}
