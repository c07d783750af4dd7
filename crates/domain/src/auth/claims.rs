//! Identity claims carried in the access credential.
//!
//! The access credential is a three-segment, period-delimited structure
//! whose middle segment is a base64url-encoded JSON document. Claims are
//! never stored on their own; they are always recomputed from the current
//! access credential.

use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::token::Token;

/// Number of leading characters stripped from the first authority
/// (`ROLE_ADMIN` becomes `ADMIN`).
pub const ROLE_PREFIX_LEN: usize = 5;

/// Errors raised while deriving claims from an access credential.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The credential does not have exactly three segments.
    #[error("credential must have three period-delimited segments, found {found}")]
    SegmentCount {
        /// Number of segments found.
        found: usize,
    },

    /// The payload segment is empty.
    #[error("credential payload segment is empty")]
    EmptyPayload,

    /// The payload is not valid base64url.
    #[error("credential payload is not valid base64url: {0}")]
    Base64(String),

    /// The decoded payload is not valid UTF-8.
    #[error("credential payload is not valid UTF-8: {0}")]
    Utf8(String),

    /// The payload is not a valid claims document.
    #[error("credential payload is not a valid claims document: {0}")]
    Json(String),

    /// A required claim is absent.
    #[error("credential payload is missing the `{0}` claim")]
    MissingClaim(&'static str),

    /// The first authority is too short to carry a role.
    #[error("authority `{0}` is shorter than the role prefix")]
    InvalidAuthority(String),
}

/// Identity attributes extracted from an access credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Role of the first authority, prefix stripped.
    pub role: String,
    /// Subject identifier (`sub`).
    pub subject: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Department the subject belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    /// Job title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    /// When the credential was issued (`iat`), if present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<DateTime<Utc>>,
    /// When the credential expires (`exp`), if present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl IdentityClaims {
    /// Returns true if the role contains `required_role`.
    #[must_use]
    pub fn has_role(&self, required_role: &str) -> bool {
        self.role.contains(required_role)
    }

    /// Returns true if the credential carries an `exp` that is not after `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }
}

#[derive(Debug, Deserialize)]
struct RawPayload {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    auth: Vec<RawAuthority>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    department: Option<String>,
    #[serde(default, rename = "jobTitle", alias = "job_title")]
    job_title: Option<String>,
    #[serde(default)]
    iat: Option<i64>,
    #[serde(default)]
    exp: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawAuthority {
    authority: String,
}

/// Decodes the payload segment of `token` into [`IdentityClaims`].
///
/// # Errors
///
/// Returns a [`DecodeError`] naming the step that failed: segment split,
/// base64url decoding, UTF-8 interpretation, JSON parsing, or claim
/// extraction.
pub fn decode_claims(token: &Token) -> Result<IdentityClaims, DecodeError> {
    let segments: Vec<&str> = token.as_str().split('.').collect();
    if segments.len() != 3 {
        return Err(DecodeError::SegmentCount {
            found: segments.len(),
        });
    }

    let text = decode_segment(segments[1])?;
    let raw: RawPayload =
        serde_json::from_str(&text).map_err(|e| DecodeError::Json(e.to_string()))?;

    let subject = raw.sub.ok_or(DecodeError::MissingClaim("sub"))?;
    let authority = raw
        .auth
        .into_iter()
        .next()
        .ok_or(DecodeError::MissingClaim("auth"))?
        .authority;
    if authority.chars().count() < ROLE_PREFIX_LEN {
        return Err(DecodeError::InvalidAuthority(authority));
    }
    let role: String = authority.chars().skip(ROLE_PREFIX_LEN).collect();

    Ok(IdentityClaims {
        role,
        subject,
        name: raw.name,
        department: raw.department,
        job_title: raw.job_title,
        issued_at: raw.iat.and_then(|secs| DateTime::from_timestamp(secs, 0)),
        expires_at: raw.exp.and_then(|secs| DateTime::from_timestamp(secs, 0)),
    })
}

/// Translates the base64url alphabet, decodes, and reads the bytes as UTF-8.
fn decode_segment(segment: &str) -> Result<String, DecodeError> {
    let trimmed = segment.trim_end_matches('=');
    if trimmed.is_empty() {
        return Err(DecodeError::EmptyPayload);
    }
    let standard: String = trimmed
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    let bytes = STANDARD_NO_PAD
        .decode(standard.as_bytes())
        .map_err(|e| DecodeError::Base64(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| DecodeError::Utf8(e.to_string()))
}
