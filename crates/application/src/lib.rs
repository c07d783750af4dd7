//! Keystone Application - Session state and API gateway
//!
//! This crate defines the application layer with:
//! - Port traits (session storage, transport)
//! - The authentication session
//! - The API gateway with single-flight credential refresh
//! - Application-level error handling

pub mod auth;
pub mod error;
pub mod gateway;
pub mod ports;

#[cfg(test)]
mod test_support;

pub use auth::{AuthSession, SessionSnapshot};
pub use error::{GatewayError, GatewayResult, RefreshError, SessionError, SessionResult};
pub use gateway::{
    ApiGateway, Attempt, BearerDecorator, DEFAULT_REFRESH_PATH, GatewayConfig, Pipeline, Recovery,
    RefreshCoordinator, RefreshOnUnauthorized, RequestDecorator, ResponseAction, ResponseHandler,
};
pub use ports::{
    FileSystem, FileSystemError, MemorySessionStorage, SessionStorage, StorageError, Transport,
    TransportError,
};
