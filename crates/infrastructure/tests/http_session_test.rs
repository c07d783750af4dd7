//! End-to-end tests: gateway, reqwest transport and file storage against a
//! local HTTP service.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use keystone_application::{
    ApiGateway, AuthSession, GatewayConfig, GatewayError, RefreshError, SessionStorage,
};
use keystone_domain::{ApiRequest, CredentialPair};
use keystone_infrastructure::{FileSessionStorage, GatewaySettings, ReqwestTransport, TokioFileSystem};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;

#[derive(Default)]
struct Service {
    generation: u32,
    valid_access: Option<String>,
    valid_refresh: Option<String>,
    refresh_calls: usize,
    reject_refresh: bool,
}

type Shared = Arc<Mutex<Service>>;

fn jwt(sub: &str, generation: u32) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256"}"#);
    let payload = json!({
        "sub": sub,
        "auth": [{"authority": "ROLE_MANAGER"}],
        "name": "이영희",
        "department": "영업",
        "gen": generation,
    });
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{header}.{body}.c2ln")
}

impl Service {
    fn issue(&mut self) -> (String, String) {
        self.generation += 1;
        let access = jwt("EMP-100", self.generation);
        let refresh = format!("refresh-{}", self.generation);
        self.valid_access = Some(access.clone());
        self.valid_refresh = Some(refresh.clone());
        (access, refresh)
    }
}

async fn customers(State(service): State<Shared>, headers: HeaderMap) -> Response {
    let service = service.lock().unwrap();
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if presented.is_some() && presented == service.valid_access.as_deref() {
        axum::Json(json!([{"id": 1, "name": "한빛상사"}])).into_response()
    } else {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

async fn refresh(State(service): State<Shared>, headers: HeaderMap) -> Response {
    let mut service = service.lock().unwrap();
    service.refresh_calls += 1;
    let presented = headers.get("refresh-token").and_then(|v| v.to_str().ok());
    if service.reject_refresh || presented != service.valid_refresh.as_deref() {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let (access, refresh) = service.issue();
    (
        StatusCode::OK,
        [
            ("authorization", format!("Bearer {access}")),
            ("refresh-token", refresh),
            ("set-cookie", "refresh_session=1; Path=/".to_string()),
        ],
    )
        .into_response()
}

async fn cookie(headers: HeaderMap) -> String {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}

async fn spawn_service(service: Shared) -> String {
    let app = Router::new()
        .route("/api/v1/customer/list", get(customers))
        .route("/api/v1/auth/refresh", post(refresh))
        .route("/api/v1/cookie", get(cookie))
        .with_state(service);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/api/v1")
}

struct Harness {
    service: Shared,
    settings: GatewaySettings,
    _dir: TempDir,
    session_path: std::path::PathBuf,
}

impl Harness {
    async fn start() -> Self {
        let service: Shared = Arc::default();
        let base_url = spawn_service(service.clone()).await;
        let dir = TempDir::new().unwrap();
        let session_path = dir.path().join("session.json");
        Self {
            service,
            settings: GatewaySettings {
                base_url,
                timeout_ms: 5_000,
                ..GatewaySettings::default()
            },
            _dir: dir,
            session_path,
        }
    }

    fn session(&self) -> Arc<AuthSession<FileSessionStorage<TokioFileSystem>>> {
        Arc::new(AuthSession::new(FileSessionStorage::new(
            TokioFileSystem::new(),
            &self.session_path,
        )))
    }

    fn gateway(
        &self,
        session: Arc<AuthSession<FileSessionStorage<TokioFileSystem>>>,
    ) -> ApiGateway<ReqwestTransport, FileSessionStorage<TokioFileSystem>> {
        let transport = Arc::new(ReqwestTransport::new(&self.settings).unwrap());
        ApiGateway::new(transport, session, GatewayConfig::default())
    }

    fn issue(&self) -> CredentialPair {
        let (access, refresh) = self.service.lock().unwrap().issue();
        CredentialPair::from_raw(access, refresh).unwrap()
    }

    fn expire_access(&self) {
        self.service.lock().unwrap().valid_access = None;
    }

    fn refresh_calls(&self) -> usize {
        self.service.lock().unwrap().refresh_calls
    }

    async fn restarted_has_session(&self) -> bool {
        self.session().restore().await
    }
}

#[tokio::test]
async fn test_authenticated_call_over_http() {
    let harness = Harness::start().await;
    let session = harness.session();
    session.login(harness.issue()).await.unwrap();
    let gateway = harness.gateway(session);

    let response = gateway.get("/customer/list").await.unwrap();

    let customers: serde_json::Value = response.json().unwrap();
    assert_eq!(customers[0]["name"], "한빛상사");
    assert_eq!(harness.refresh_calls(), 0);
}

#[tokio::test]
async fn test_expired_access_is_refreshed_and_persisted() {
    let harness = Harness::start().await;
    let session = harness.session();
    let original = harness.issue();
    session.login(original.clone()).await.unwrap();
    let gateway = harness.gateway(session.clone());
    harness.expire_access();

    let response = gateway.get("/customer/list").await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(harness.refresh_calls(), 1);
    let current = session.access_credential().await.unwrap();
    assert_ne!(current, original.access);
    assert!(!current.as_str().starts_with("Bearer"));

    let again = gateway.get("/customer/list").await.unwrap();
    assert_eq!(again.status, 200);
    assert_eq!(harness.refresh_calls(), 1);

    let restarted = harness.session();
    assert!(restarted.initialize().await);
    assert_eq!(restarted.access_credential().await, Some(current));
    assert_eq!(restarted.claims().await.unwrap().department.as_deref(), Some("영업"));
}

#[tokio::test]
async fn test_concurrent_calls_share_one_refresh_over_http() {
    let harness = Harness::start().await;
    let session = harness.session();
    session.login(harness.issue()).await.unwrap();
    let gateway = harness.gateway(session);
    harness.expire_access();

    let (a, b, c) = tokio::join!(
        gateway.get("/customer/list"),
        gateway.get("/customer/list"),
        gateway.get("/customer/list"),
    );

    assert!(a.is_ok() && b.is_ok() && c.is_ok());
    assert_eq!(harness.refresh_calls(), 1);
}

#[tokio::test]
async fn test_rejected_refresh_clears_session_file() {
    let harness = Harness::start().await;
    let session = harness.session();
    session.login(harness.issue()).await.unwrap();
    assert!(harness.session_path.exists());
    let gateway = harness.gateway(session.clone());
    harness.expire_access();
    harness.service.lock().unwrap().reject_refresh = true;

    let result = gateway.get("/customer/list").await;

    assert_eq!(
        result,
        Err(GatewayError::Refresh(RefreshError::Rejected { status: 401 }))
    );
    assert!(!session.is_authenticated().await);
    assert_eq!(
        session.storage().get_item("accessToken").await.unwrap(),
        None
    );
    assert!(!harness.restarted_has_session().await);
}

#[tokio::test]
async fn test_refresh_cookies_follow_credentialed_requests_only() {
    let harness = Harness::start().await;
    let session = harness.session();
    session.login(harness.issue()).await.unwrap();
    let gateway = harness.gateway(session);
    harness.expire_access();
    gateway.get("/customer/list").await.unwrap();

    let with = gateway.get("/cookie").await.unwrap();
    assert_eq!(with.text(), "refresh_session=1");

    let mut anonymous = ApiRequest::get("/cookie");
    anonymous.with_credentials = false;
    let without = gateway.execute(anonymous).await.unwrap();
    assert_eq!(without.text(), "");
}

#[tokio::test]
async fn test_unreachable_service_is_a_transport_error() {
    let settings = GatewaySettings {
        base_url: "http://127.0.0.1:1/api/v1".to_string(),
        timeout_ms: 2_000,
        ..GatewaySettings::default()
    };
    let transport = Arc::new(ReqwestTransport::new(&settings).unwrap());
    let dir = TempDir::new().unwrap();
    let session = Arc::new(AuthSession::new(FileSessionStorage::new(
        TokioFileSystem::new(),
        dir.path().join("session.json"),
    )));
    let gateway = ApiGateway::new(transport, session, GatewayConfig::default());

    let result = tokio::time::timeout(Duration::from_secs(10), gateway.get("/customer/list"))
        .await
        .expect("call should fail fast");

    assert!(matches!(result, Err(GatewayError::Transport(_))));
}
