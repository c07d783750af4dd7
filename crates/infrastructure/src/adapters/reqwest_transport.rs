//! HTTP transport implementation using reqwest.
//!
//! This adapter implements the `Transport` port. Request paths are resolved
//! against the configured base URL; every response is returned as-is,
//! whatever its status.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use keystone_application::ports::{Transport, TransportError};
use keystone_domain::{ApiRequest, ApiResponse, Headers, HttpMethod};
use reqwest::{Client, Method, Url};
use tracing::debug;

use crate::config::GatewaySettings;

const MAX_REDIRECTS: usize = 10;

/// HTTP transport backed by `reqwest::Client`.
///
/// Credentialed requests go through a client with a cookie store, so
/// cookies set by the API service (e.g. on the refresh call) are sent back.
/// Requests with `with_credentials == false` use a cookieless client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    credentialed: Client,
    anonymous: Client,
    base_url: Url,
    timeout_ms: u64,
}

impl ReqwestTransport {
    /// Creates a transport from gateway settings.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidUrl`] for an unusable base URL, or
    /// [`TransportError::Other`] if the HTTP client cannot be built.
    pub fn new(settings: &GatewaySettings) -> Result<Self, TransportError> {
        let base_url = Url::parse(&settings.base_url)
            .map_err(|e| TransportError::InvalidUrl(format!("{e}: {}", settings.base_url)))?;

        Ok(Self {
            credentialed: Self::build_client(settings, true)?,
            anonymous: Self::build_client(settings, false)?,
            base_url,
            timeout_ms: settings.timeout_ms,
        })
    }

    /// Returns the base URL requests are resolved against.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn build_client(settings: &GatewaySettings, cookies: bool) -> Result<Client, TransportError> {
        Client::builder()
            .user_agent(settings.user_agent.as_str())
            .timeout(Duration::from_millis(settings.timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .cookie_store(cookies)
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))
    }

    /// Converts domain `HttpMethod` to reqwest `Method`.
    const fn to_reqwest_method(method: HttpMethod) -> Method {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
        }
    }

    /// Resolves the request path and query against the base URL.
    fn resolve(&self, request: &ApiRequest) -> Result<Url, TransportError> {
        let joined = request.url(self.base_url.as_str());
        let mut url =
            Url::parse(&joined).map_err(|e| TransportError::InvalidUrl(format!("{e}: {joined}")))?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }
        Ok(url)
    }

    /// Copies response headers. Values that are not visible ASCII are
    /// skipped, so they can never be taken for a credential.
    fn collect_headers(headers: &reqwest::header::HeaderMap) -> Headers {
        headers
            .iter()
            .filter_map(|(name, value)| match value.to_str() {
                Ok(value) => Some((name.as_str(), value)),
                Err(_) => {
                    debug!(header = %name, "skipping non-ASCII header value");
                    None
                }
            })
            .collect()
    }

    /// Maps reqwest errors to `TransportError`.
    fn map_error(error: &reqwest::Error, timeout_ms: u64) -> TransportError {
        if error.is_timeout() {
            return TransportError::Timeout { timeout_ms };
        }

        let host = || {
            error
                .url()
                .and_then(|u| u.host_str())
                .unwrap_or("unknown")
                .to_string()
        };

        if error.is_connect() {
            let message = error.to_string();
            let lower = message.to_lowercase();
            if lower.contains("dns") || lower.contains("resolve") {
                return TransportError::DnsError {
                    host: host(),
                    message,
                };
            }
            if lower.contains("refused") {
                return TransportError::ConnectionRefused {
                    host: host(),
                    port: error
                        .url()
                        .and_then(Url::port_or_known_default)
                        .unwrap_or(80),
                };
            }
            return TransportError::ConnectionFailed(message);
        }

        if error.is_redirect() {
            return TransportError::TooManyRedirects { max: MAX_REDIRECTS };
        }

        if error.is_builder() {
            return TransportError::InvalidHeader(error.to_string());
        }

        TransportError::Other(error.to_string())
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = self.resolve(request)?;
        let client = if request.with_credentials {
            &self.credentialed
        } else {
            &self.anonymous
        };

        let start = Instant::now();

        let mut builder = client.request(Self::to_reqwest_method(request.method), url);
        for header in request.headers.iter() {
            builder = builder.header(&header.name, &header.value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Self::map_error(&e, self.timeout_ms))?;

        let status = response.status().as_u16();
        let headers = Self::collect_headers(response.headers());
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Other(format!("Failed to read body: {e}")))?
            .to_vec();

        Ok(ApiResponse {
            status,
            headers,
            body,
            duration: start.elapsed(),
        })
    }
}
