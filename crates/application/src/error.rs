//! Application error types

use keystone_domain::{DecodeError, TokenError};
use thiserror::Error;

use crate::ports::{StorageError, TransportError};

/// Errors raised by [`crate::AuthSession`] operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The access credential could not be decoded into claims.
    #[error("invalid access credential: {0}")]
    Decode(#[from] DecodeError),

    /// A credential string was empty.
    #[error("invalid credential: {0}")]
    InvalidToken(#[from] TokenError),

    /// The session record could not be written.
    #[error("session storage failed: {0}")]
    Storage(#[from] StorageError),
}

/// Result type alias for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Why a credential refresh did not produce a new credential pair.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    /// The refresh endpoint answered with a non-success status.
    #[error("refresh rejected with status {status}")]
    Rejected {
        /// HTTP status of the refresh response.
        status: u16,
    },

    /// The refresh call failed at the network level.
    #[error("refresh call failed: {0}")]
    Transport(#[from] TransportError),

    /// The refresh response lacked one or both new credentials.
    #[error("refresh response is missing the {missing} credential")]
    Incomplete {
        /// Which credential(s) were absent.
        missing: String,
    },

    /// The task driving a shared refresh was dropped before it finished.
    #[error("refresh was abandoned before completing")]
    Abandoned,

    /// The refreshed credentials could not be persisted.
    #[error("refreshed credentials could not be stored: {0}")]
    Storage(String),
}

/// Errors returned to callers of [`crate::ApiGateway`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The call failed at the network level.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The access credential was rejected and could not be recovered.
    #[error("authorization denied")]
    AuthorizationDenied {
        /// Response body of the rejected call.
        body: String,
    },

    /// The service answered with a non-success status.
    #[error("request failed with status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// Recovering from a rejected credential failed; the session was ended.
    #[error("session refresh failed: {0}")]
    Refresh(#[from] RefreshError),

    /// A response handler asked for a second retry of the same call.
    #[error("retry limit reached")]
    RetryLimit,
}

impl GatewayError {
    /// Returns the HTTP status carried by this error, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::AuthorizationDenied { .. } => Some(keystone_domain::UNAUTHORIZED),
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
