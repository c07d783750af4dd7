//! API gateway: the outgoing call path.
//!
//! Requests flow through a [`Pipeline`] of decorators and response
//! handlers. The gateway wires in the bearer decorator and the
//! refresh-on-401 handler, both backed by the shared [`crate::AuthSession`].

mod client;
mod pipeline;
mod refresh;

pub use client::{ApiGateway, DEFAULT_REFRESH_PATH, GatewayConfig, RefreshOnUnauthorized};
pub use pipeline::{Attempt, BearerDecorator, Pipeline, RequestDecorator, ResponseAction, ResponseHandler};
pub use refresh::{Recovery, RefreshCoordinator};
