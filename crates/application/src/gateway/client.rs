//! API gateway client.

use std::sync::Arc;

use async_trait::async_trait;
use keystone_domain::{AUTHORIZATION, ApiRequest, ApiResponse};
use tracing::debug;

use super::pipeline::{Attempt, BearerDecorator, Pipeline, RequestDecorator, ResponseAction, ResponseHandler};
use super::refresh::RefreshCoordinator;
use crate::auth::AuthSession;
use crate::error::{GatewayError, GatewayResult};
use crate::ports::{SessionStorage, Transport};

/// Default path of the credential refresh endpoint.
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";

/// Gateway settings that are not the transport's business.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Path the refresh call is posted to, relative to the base URL.
    pub refresh_path: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
        }
    }
}

/// Turns a first-attempt 401 into a refresh and one retry.
pub struct RefreshOnUnauthorized<T: ?Sized, S> {
    coordinator: Arc<RefreshCoordinator<T, S>>,
}

impl<T: ?Sized, S> RefreshOnUnauthorized<T, S> {
    /// Creates a handler recovering through `coordinator`.
    #[must_use]
    pub const fn new(coordinator: Arc<RefreshCoordinator<T, S>>) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl<T, S> ResponseHandler for RefreshOnUnauthorized<T, S>
where
    T: Transport + ?Sized,
    S: SessionStorage,
{
    async fn handle(
        &self,
        request: &ApiRequest,
        outcome: GatewayResult<ApiResponse>,
        attempt: Attempt,
    ) -> ResponseAction {
        let body = match outcome {
            Err(GatewayError::AuthorizationDenied { body }) if attempt == Attempt::First => body,
            other => return ResponseAction::Complete(other),
        };

        match self.coordinator.recover(request.authorization()).await {
            Ok(recovery) => match recovery.token() {
                Some(token) => {
                    debug!(path = %request.path, "retrying with recovered credential");
                    let mut retry = request.clone();
                    retry.headers.set(AUTHORIZATION, token.bearer());
                    ResponseAction::Retry(retry)
                }
                None => ResponseAction::Complete(Err(GatewayError::AuthorizationDenied { body })),
            },
            Err(e) => ResponseAction::Complete(Err(GatewayError::Refresh(e))),
        }
    }
}

/// The single entry point for outgoing API calls.
///
/// Every call carries the session's access credential. A 401 on the first
/// attempt triggers one shared refresh and one retry; a refresh failure
/// ends the session and is returned to the caller.
pub struct ApiGateway<T: ?Sized, S> {
    transport: Arc<T>,
    session: Arc<AuthSession<S>>,
    pipeline: Pipeline,
}

impl<T, S> ApiGateway<T, S>
where
    T: Transport + ?Sized + 'static,
    S: SessionStorage + 'static,
{
    /// Creates a gateway sending through `transport` on behalf of `session`.
    pub fn new(transport: Arc<T>, session: Arc<AuthSession<S>>, config: GatewayConfig) -> Self {
        let coordinator = Arc::new(RefreshCoordinator::new(
            transport.clone(),
            session.clone(),
            config.refresh_path,
        ));
        let pipeline = Pipeline::new()
            .decorate_with(Arc::new(BearerDecorator::new(session.clone())))
            .handle_with(Arc::new(RefreshOnUnauthorized::new(coordinator)));

        Self {
            transport,
            session,
            pipeline,
        }
    }

    /// Adds a decorator that runs after the bearer credential is attached.
    #[must_use]
    pub fn decorate_with(mut self, decorator: Arc<dyn RequestDecorator>) -> Self {
        self.pipeline = self.pipeline.decorate_with(decorator);
        self
    }

    /// Returns the session this gateway authenticates with.
    #[must_use]
    pub const fn session(&self) -> &Arc<AuthSession<S>> {
        &self.session
    }

    /// Sends `request` through the pipeline.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::Transport`] if no response was received
    /// - [`GatewayError::AuthorizationDenied`] for a 401 that could not be
    ///   recovered, or that recurred on the retry
    /// - [`GatewayError::Refresh`] if the refresh failed
    /// - [`GatewayError::Status`] for any other non-2xx status
    pub async fn execute(&self, request: ApiRequest) -> GatewayResult<ApiResponse> {
        self.pipeline.run(self.transport.as_ref(), request).await
    }

    /// GET `path`.
    ///
    /// # Errors
    ///
    /// See [`ApiGateway::execute`].
    pub async fn get(&self, path: &str) -> GatewayResult<ApiResponse> {
        self.execute(ApiRequest::get(path)).await
    }

    /// GET `path` with query parameters.
    ///
    /// # Errors
    ///
    /// See [`ApiGateway::execute`].
    pub async fn get_with_params(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> GatewayResult<ApiResponse> {
        let request = params
            .iter()
            .fold(ApiRequest::get(path), |request, (name, value)| {
                request.with_query(*name, *value)
            });
        self.execute(request).await
    }

    /// POST `body` to `path`.
    ///
    /// # Errors
    ///
    /// See [`ApiGateway::execute`].
    pub async fn post(&self, path: &str, body: serde_json::Value) -> GatewayResult<ApiResponse> {
        self.execute(ApiRequest::post(path, body)).await
    }

    /// PUT `body` to `path`.
    ///
    /// # Errors
    ///
    /// See [`ApiGateway::execute`].
    pub async fn put(&self, path: &str, body: serde_json::Value) -> GatewayResult<ApiResponse> {
        self.execute(ApiRequest::put(path, body)).await
    }

    /// DELETE `path`.
    ///
    /// # Errors
    ///
    /// See [`ApiGateway::execute`].
    pub async fn delete(&self, path: &str) -> GatewayResult<ApiResponse> {
        self.execute(ApiRequest::delete(path)).await
    }
}

impl<T: ?Sized, S> std::fmt::Debug for ApiGateway<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiGateway")
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}
