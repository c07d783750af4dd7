//! Authentication domain types

mod claims;
mod policy;
mod record;
mod token;

pub use claims::{DecodeError, IdentityClaims, ROLE_PREFIX_LEN, decode_claims};
pub use policy::DecodePolicy;
pub use record::{
    ACCESS_TOKEN_KEY, CachedProfile, REFRESH_TOKEN_KEY, SessionRecord, USER_DEPARTMENT_KEY,
    USER_JOB_TITLE_KEY, USER_NAME_KEY,
};
pub use token::{CredentialPair, Token, TokenError};
