//! Persisted session record
//!
//! The credential pair is mirrored into durable key-value storage under
//! fixed string keys so a restarted process can restore its session.

use serde::{Deserialize, Serialize};

use super::claims::IdentityClaims;
use super::token::{CredentialPair, Token};

/// Storage key for the access credential.
pub const ACCESS_TOKEN_KEY: &str = "accessToken";
/// Storage key for the refresh credential.
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
/// Storage key for the cached display name.
pub const USER_NAME_KEY: &str = "userName";
/// Storage key for the cached department.
pub const USER_DEPARTMENT_KEY: &str = "userDepartment";
/// Storage key for the cached job title.
pub const USER_JOB_TITLE_KEY: &str = "userJobTitle";

/// Profile fields cached alongside the credentials for display purposes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedProfile {
    /// Display name.
    pub name: Option<String>,
    /// Department.
    pub department: Option<String>,
    /// Job title.
    pub job_title: Option<String>,
}

impl CachedProfile {
    /// Copies the profile fields out of decoded claims.
    #[must_use]
    pub fn from_claims(claims: &IdentityClaims) -> Self {
        Self {
            name: claims.name.clone(),
            department: claims.department.clone(),
            job_title: claims.job_title.clone(),
        }
    }

    /// Storage entries for the fields that are present.
    #[must_use]
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        [
            (USER_NAME_KEY, &self.name),
            (USER_DEPARTMENT_KEY, &self.department),
            (USER_JOB_TITLE_KEY, &self.job_title),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.clone().map(|v| (key, v)))
        .collect()
    }

    /// Keys of the fields that are absent, whose stored values must go.
    #[must_use]
    pub fn absent_keys(&self) -> Vec<&'static str> {
        [
            (USER_NAME_KEY, &self.name),
            (USER_DEPARTMENT_KEY, &self.department),
            (USER_JOB_TITLE_KEY, &self.job_title),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.is_none().then_some(key))
        .collect()
    }
}

/// The durable mirror of an authenticated session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    /// The persisted credential pair.
    pub credentials: CredentialPair,
}

impl SessionRecord {
    /// Every key owned by the session record.
    pub const KEYS: [&'static str; 5] = [
        ACCESS_TOKEN_KEY,
        REFRESH_TOKEN_KEY,
        USER_NAME_KEY,
        USER_DEPARTMENT_KEY,
        USER_JOB_TITLE_KEY,
    ];

    /// Rebuilds a record from raw storage lookups.
    ///
    /// Returns `None` unless both credentials are present and non-empty;
    /// a lone credential is not a session.
    #[must_use]
    pub fn from_entries<F>(mut lookup: F) -> Option<Self>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let access = lookup(ACCESS_TOKEN_KEY).and_then(|v| Token::new(v).ok())?;
        let refresh = lookup(REFRESH_TOKEN_KEY).and_then(|v| Token::new(v).ok())?;
        Some(Self {
            credentials: CredentialPair::new(access, refresh),
        })
    }
}
