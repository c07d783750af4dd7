//! Command execution against a live session.

use std::sync::Arc;

use anyhow::{Context, Result};
use keystone_application::{ApiGateway, AuthSession, GatewayConfig};
use keystone_domain::{
    ApiResponse, CredentialPair, GuardDecision, RouteGuard, RouteMeta, RouteTable,
};
use keystone_infrastructure::{FileSessionStorage, KeystoneConfig, ReqwestTransport, TokioFileSystem};
use tracing::debug;

use crate::cli::Command;

type Storage = FileSessionStorage<TokioFileSystem>;

/// Everything a command needs, wired from configuration.
struct App {
    session: Arc<AuthSession<Storage>>,
    gateway: ApiGateway<ReqwestTransport, Storage>,
    guard: RouteGuard,
    routes: RouteTable,
}

impl App {
    async fn start(config: &KeystoneConfig) -> Result<Self> {
        let storage_path = config.session.storage_path();
        debug!(path = %storage_path.display(), "using session file");

        let storage = FileSessionStorage::new(TokioFileSystem::new(), storage_path);
        let session = Arc::new(AuthSession::with_policy(storage, config.session.decode_policy));
        session.initialize().await;

        let transport =
            Arc::new(ReqwestTransport::new(&config.gateway).context("creating HTTP transport")?);
        let gateway = ApiGateway::new(
            transport,
            session.clone(),
            GatewayConfig {
                refresh_path: config.gateway.refresh_path.clone(),
            },
        );

        let mut routes = RouteTable::new().with("/*", RouteMeta::protected())?;
        for pattern in &config.guard.public_routes {
            routes
                .insert(pattern, RouteMeta::public())
                .with_context(|| format!("invalid public route '{pattern}'"))?;
        }

        Ok(Self {
            session,
            gateway,
            guard: RouteGuard::new(config.guard.login_path.as_str()),
            routes,
        })
    }

    async fn execute(&self, command: Command) -> Result<()> {
        match command {
            Command::Login { access, refresh } => {
                let credentials = CredentialPair::from_raw(access, refresh)?;
                let claims = self.session.login(credentials).await?;
                println!("Logged in as {} ({})", claims.subject, claims.role);
            }
            Command::Whoami { role } => {
                let Some(claims) = self.session.claims().await else {
                    anyhow::bail!("not logged in");
                };
                println!("{}", serde_json::to_string_pretty(&claims)?);
                if let Some(role) = role {
                    let authorized = self.session.is_authorized(&role).await;
                    println!("{role}: {}", if authorized { "granted" } else { "denied" });
                }
            }
            Command::Get { path, params } => {
                let params: Vec<(&str, &str)> = params
                    .iter()
                    .map(|(name, value)| (name.as_str(), value.as_str()))
                    .collect();
                print_response(&self.gateway.get_with_params(&path, &params).await?);
            }
            Command::Post { path, data } => {
                let body = serde_json::from_str(&data).context("--data is not valid JSON")?;
                print_response(&self.gateway.post(&path, body).await?);
            }
            Command::Put { path, data } => {
                let body = serde_json::from_str(&data).context("--data is not valid JSON")?;
                print_response(&self.gateway.put(&path, body).await?);
            }
            Command::Delete { path } => {
                print_response(&self.gateway.delete(&path).await?);
            }
            Command::Logout => {
                self.session.logout().await;
                println!("Logged out");
            }
            Command::Guard { path } => {
                let route = self.routes.resolve(&path).unwrap_or_else(RouteMeta::protected);
                match self.session.check_route(&self.guard, &path, route).await {
                    GuardDecision::Proceed => println!("proceed"),
                    GuardDecision::RedirectToLogin {
                        login_path,
                        return_to,
                    } => println!("redirect to {login_path} (return to {return_to})"),
                }
            }
        }
        Ok(())
    }
}

fn print_response(response: &ApiResponse) {
    match response.json::<serde_json::Value>() {
        Ok(json) => println!(
            "{}",
            serde_json::to_string_pretty(&json).unwrap_or_else(|_| response.text())
        ),
        Err(_) => println!("{}", response.text()),
    }
}

/// Runs `command`, tearing the in-memory session down afterwards.
pub async fn run(command: Command, config: &KeystoneConfig) -> Result<()> {
    let app = App::start(config).await?;
    let outcome = app.execute(command).await;
    app.session.teardown().await;
    outcome
}
