//! Keystone Domain - Core session types
//!
//! This crate defines the domain model for the Keystone API session layer:
//! credentials, the identity claims derived from them, the persisted
//! session record, HTTP request/response values and the route guard.
//! All types here are pure Rust with no I/O dependencies.

pub mod auth;
pub mod error;
pub mod guard;
pub mod request;
pub mod response;

pub use auth::{
    CachedProfile, CredentialPair, DecodeError, DecodePolicy, IdentityClaims, ROLE_PREFIX_LEN,
    SessionRecord, Token, TokenError, decode_claims,
};
pub use error::{DomainError, DomainResult};
pub use guard::{GuardDecision, RouteGuard, RouteMeta, RouteTable};
pub use request::{AUTHORIZATION, ApiRequest, Header, Headers, HttpMethod, REFRESH_TOKEN};
pub use response::{ApiResponse, UNAUTHORIZED};
