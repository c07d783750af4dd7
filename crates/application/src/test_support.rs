//! Test doubles for the session and transport ports.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::missing_panics_doc)]

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use keystone_domain::{ApiRequest, ApiResponse, CredentialPair, Header, REFRESH_TOKEN, Token};
use serde_json::json;

use crate::ports::{SessionStorage, StorageError, Transport, TransportError};

/// Builds an unsigned three-segment credential around `payload`.
pub fn jwt(payload: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string().as_bytes());
    format!("{header}.{body}.dGVzdC1zaWduYXR1cmU")
}

/// Builds an access credential for `sub` holding `authority`.
pub fn access_token(sub: &str, authority: &str) -> Token {
    Token::new(jwt(&json!({"sub": sub, "auth": [{"authority": authority}]}))).unwrap()
}

/// Builds a pair from raw strings.
pub fn pair(access: &str, refresh: &str) -> CredentialPair {
    CredentialPair::from_raw(access, refresh).unwrap()
}

/// Storage whose every operation fails.
#[derive(Debug, Clone, Copy)]
pub struct FailingStorage;

#[async_trait]
impl SessionStorage for FailingStorage {
    async fn get_item(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Io("disk unavailable".to_string()))
    }

    async fn set_item(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Io("disk unavailable".to_string()))
    }

    async fn remove_item(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Io("disk unavailable".to_string()))
    }
}

/// How the fake refresh endpoint answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// Rotate both credentials.
    Rotate,
    /// Rotate, sending the access credential with a `Bearer ` prefix.
    RotatePrefixed,
    /// Answer 401.
    Reject,
    /// Answer 200 with only the access credential.
    Incomplete,
    /// Fail at the network level.
    Unreachable,
}

#[derive(Debug)]
struct FakeState {
    valid_access: Option<String>,
    valid_refresh: Option<String>,
    generation: u32,
    mode: RefreshMode,
    sent: Vec<ApiRequest>,
    refresh_calls: usize,
}

/// In-memory API service.
///
/// - `/public` answers 200 to anyone
/// - `/missing` answers 404
/// - `/down` fails at the network level
/// - `/auth/refresh` exchanges the refresh credential per [`RefreshMode`]
/// - every other path answers 200 only to the currently valid access
///   credential, echoing the request body, and 401 otherwise
#[derive(Debug)]
pub struct FakeApi {
    state: Mutex<FakeState>,
    refresh_delay: Duration,
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                valid_access: None,
                valid_refresh: None,
                generation: 0,
                mode: RefreshMode::Rotate,
                sent: Vec::new(),
                refresh_calls: 0,
            }),
            refresh_delay: Duration::ZERO,
        }
    }

    pub fn with_mode(self, mode: RefreshMode) -> Self {
        self.state.lock().unwrap().mode = mode;
        self
    }

    pub const fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = delay;
        self
    }

    /// Issues a fresh pair the service accepts.
    pub fn issue(&self) -> CredentialPair {
        let mut state = self.state.lock().unwrap();
        state.generation += 1;
        let credentials = Self::mint(state.generation);
        state.valid_access = Some(credentials.access.as_str().to_string());
        state.valid_refresh = Some(credentials.refresh.as_str().to_string());
        credentials
    }

    /// Makes the service reject the current access credential.
    pub fn expire_access(&self) {
        self.state.lock().unwrap().valid_access = None;
    }

    /// Every request received, in order, including refresh calls.
    pub fn sent(&self) -> Vec<ApiRequest> {
        self.state.lock().unwrap().sent.clone()
    }

    /// Requests received for `path`.
    pub fn sent_to(&self, path: &str) -> Vec<ApiRequest> {
        self.sent().into_iter().filter(|r| r.path == path).collect()
    }

    pub fn refresh_calls(&self) -> usize {
        self.state.lock().unwrap().refresh_calls
    }

    /// The access credential the service currently accepts.
    pub fn valid_access(&self) -> Option<String> {
        self.state.lock().unwrap().valid_access.clone()
    }

    fn mint(generation: u32) -> CredentialPair {
        let access = jwt(&json!({
            "sub": "EMP-1",
            "auth": [{"authority": "ROLE_USER"}],
            "gen": generation,
        }));
        pair(&access, &format!("refresh-{generation}"))
    }

    fn refresh(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let mut state = self.state.lock().unwrap();
        state.refresh_calls += 1;

        let presented = request.headers.get(REFRESH_TOKEN).map(str::to_string);
        if state.mode == RefreshMode::Unreachable {
            return Err(TransportError::ConnectionFailed("refresh host down".to_string()));
        }
        if state.mode == RefreshMode::Reject || presented != state.valid_refresh {
            return Ok(ApiResponse::new(401));
        }

        state.generation += 1;
        let next = Self::mint(state.generation);
        state.valid_access = Some(next.access.as_str().to_string());
        state.valid_refresh = Some(next.refresh.as_str().to_string());

        let mut response = ApiResponse::new(200);
        let access_value = if state.mode == RefreshMode::RotatePrefixed {
            next.access.bearer()
        } else {
            next.access.as_str().to_string()
        };
        response.headers.add(Header::new("authorization", access_value));
        if state.mode != RefreshMode::Incomplete {
            response
                .headers
                .add(Header::new("refresh-token", next.refresh.as_str()));
        }
        Ok(response)
    }

    fn protected(&self, request: &ApiRequest) -> ApiResponse {
        let state = self.state.lock().unwrap();
        let expected = state.valid_access.as_ref().map(|t| format!("Bearer {t}"));
        if expected.is_some() && request.authorization() == expected.as_deref() {
            let mut response = ApiResponse::new(200);
            response.body = serde_json::to_vec(&json!({
                "path": request.path,
                "body": request.body,
            }))
            .unwrap();
            response
        } else {
            ApiResponse::new(401)
        }
    }
}

/// Issues a pair from `api` for tests that only need valid credentials.
pub fn pair_for(api: &FakeApi) -> CredentialPair {
    api.issue()
}

#[async_trait]
impl Transport for FakeApi {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        self.state.lock().unwrap().sent.push(request.clone());
        match request.path.as_str() {
            "/public" => Ok(ApiResponse::new(200)),
            "/missing" => Ok(ApiResponse::new(404)),
            "/down" => Err(TransportError::ConnectionFailed("connection reset".to_string())),
            "/auth/refresh" => {
                if !self.refresh_delay.is_zero() {
                    tokio::time::sleep(self.refresh_delay).await;
                }
                self.refresh(request)
            }
            _ => Ok(self.protected(request)),
        }
    }
}
