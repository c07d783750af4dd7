//! Authentication state for the API session.
//!
//! This module provides:
//! - The process-wide `AuthSession` holding the credential pair
//! - Claim derivation on every access credential change
//! - Persistence of the pair through the `SessionStorage` port

mod session;

pub use session::{AuthSession, SessionSnapshot};
