//! Request/response interceptor pipeline.
//!
//! A [`Pipeline`] is an ordered list of request decorators and response
//! handlers wrapped around any [`Transport`]. Decorators run once before
//! the first attempt; handlers see every outcome and may ask for a single
//! resubmission of a rewritten request.

use std::sync::Arc;

use async_trait::async_trait;
use keystone_domain::{AUTHORIZATION, ApiRequest, ApiResponse};
use tracing::debug;

use crate::auth::AuthSession;
use crate::error::{GatewayError, GatewayResult};
use crate::ports::{SessionStorage, Transport, TransportError};

/// Which send of a request a handler is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    /// The original send.
    First,
    /// The single resubmission after a handler asked for a retry.
    Retry,
}

/// What a response handler wants done with an outcome.
#[derive(Debug)]
pub enum ResponseAction {
    /// Hand the outcome to the next handler, or to the caller.
    Complete(GatewayResult<ApiResponse>),
    /// Resubmit this request once.
    Retry(ApiRequest),
}

/// Mutates a request before it is sent.
#[async_trait]
pub trait RequestDecorator: Send + Sync {
    /// Decorates `request` in place.
    async fn decorate(&self, request: &mut ApiRequest);
}

/// Inspects the outcome of a send.
#[async_trait]
pub trait ResponseHandler: Send + Sync {
    /// Handles `outcome` for `request`.
    async fn handle(
        &self,
        request: &ApiRequest,
        outcome: GatewayResult<ApiResponse>,
        attempt: Attempt,
    ) -> ResponseAction;
}

/// Ordered decorators and handlers around a transport.
#[derive(Clone, Default)]
pub struct Pipeline {
    decorators: Vec<Arc<dyn RequestDecorator>>,
    handlers: Vec<Arc<dyn ResponseHandler>>,
}

impl Pipeline {
    /// Creates an empty pipeline: requests pass straight to the transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a request decorator.
    #[must_use]
    pub fn decorate_with(mut self, decorator: Arc<dyn RequestDecorator>) -> Self {
        self.decorators.push(decorator);
        self
    }

    /// Appends a response handler.
    #[must_use]
    pub fn handle_with(mut self, handler: Arc<dyn ResponseHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Sends `request` through the pipeline.
    ///
    /// # Errors
    ///
    /// Returns whatever error the last handler leaves in place, or
    /// [`GatewayError::RetryLimit`] if a handler asks to retry a retry.
    pub async fn run<T>(&self, transport: &T, mut request: ApiRequest) -> GatewayResult<ApiResponse>
    where
        T: Transport + ?Sized,
    {
        for decorator in &self.decorators {
            decorator.decorate(&mut request).await;
        }

        let mut attempt = Attempt::First;
        loop {
            debug!(method = %request.method, path = %request.path, ?attempt, "sending request");
            let outcome = classify(transport.send(&request).await);
            match self.handle_all(&request, outcome, attempt).await {
                ResponseAction::Complete(outcome) => return outcome,
                ResponseAction::Retry(next) if attempt == Attempt::First => {
                    request = next;
                    attempt = Attempt::Retry;
                }
                ResponseAction::Retry(_) => return Err(GatewayError::RetryLimit),
            }
        }
    }

    async fn handle_all(
        &self,
        request: &ApiRequest,
        outcome: GatewayResult<ApiResponse>,
        attempt: Attempt,
    ) -> ResponseAction {
        let mut action = ResponseAction::Complete(outcome);
        for handler in &self.handlers {
            action = match action {
                ResponseAction::Complete(outcome) => handler.handle(request, outcome, attempt).await,
                retry @ ResponseAction::Retry(_) => return retry,
            };
        }
        action
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("decorators", &self.decorators.len())
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// Maps a raw transport result onto the gateway taxonomy: 2xx passes
/// through, 401 becomes `AuthorizationDenied`, other statuses `Status`.
pub(crate) fn classify(
    result: Result<ApiResponse, TransportError>,
) -> GatewayResult<ApiResponse> {
    let response = result?;
    if response.is_success() {
        Ok(response)
    } else if response.is_unauthorized() {
        Err(GatewayError::AuthorizationDenied {
            body: response.text(),
        })
    } else {
        Err(GatewayError::Status {
            status: response.status,
            body: response.text(),
        })
    }
}

/// Attaches the session's access credential as a bearer `Authorization`
/// header. Requests go out unauthenticated when no credential is held.
pub struct BearerDecorator<S> {
    session: Arc<AuthSession<S>>,
}

impl<S> BearerDecorator<S> {
    /// Creates a decorator reading from `session`.
    #[must_use]
    pub const fn new(session: Arc<AuthSession<S>>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl<S: SessionStorage> RequestDecorator for BearerDecorator<S> {
    async fn decorate(&self, request: &mut ApiRequest) {
        if let Some(token) = self.session.access_credential().await {
            request.headers.set(AUTHORIZATION, token.bearer());
        }
    }
}
