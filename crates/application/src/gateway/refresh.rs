//! Single-flight credential refresh.
//!
//! When several calls are rejected at once, exactly one of them (the
//! leader) exchanges the refresh credential; the rest subscribe to the
//! leader's outcome and retry with whatever it produced.

use std::sync::Arc;

use keystone_domain::{AUTHORIZATION, ApiRequest, CredentialPair, HttpMethod, REFRESH_TOKEN, Token};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::auth::AuthSession;
use crate::error::RefreshError;
use crate::ports::{SessionStorage, Transport};

type Outcome = Option<Result<Token, RefreshError>>;

/// How a rejected call can be recovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recovery {
    /// The access credential already changed since the call was sent.
    Current(Token),
    /// A refresh produced this access credential.
    Refreshed(Token),
    /// No refresh credential is held; nothing can be done.
    Unavailable,
}

impl Recovery {
    /// The access credential to retry with, if any.
    #[must_use]
    pub const fn token(&self) -> Option<&Token> {
        match self {
            Self::Current(token) | Self::Refreshed(token) => Some(token),
            Self::Unavailable => None,
        }
    }
}

/// Coordinates refresh calls so at most one is in flight.
pub struct RefreshCoordinator<T: ?Sized, S> {
    transport: Arc<T>,
    session: Arc<AuthSession<S>>,
    refresh_path: String,
    in_flight: Mutex<Option<watch::Receiver<Outcome>>>,
}

impl<T, S> RefreshCoordinator<T, S>
where
    T: Transport + ?Sized,
    S: SessionStorage,
{
    /// Creates a coordinator posting to `refresh_path` on `transport`.
    pub fn new(
        transport: Arc<T>,
        session: Arc<AuthSession<S>>,
        refresh_path: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            session,
            refresh_path: refresh_path.into(),
            in_flight: Mutex::new(None),
        }
    }

    /// Recovers from a rejected call whose `Authorization` header was
    /// `failed_authorization`.
    ///
    /// Joins a refresh already in flight if there is one. Otherwise, if the
    /// session's access credential no longer matches the rejected one, the
    /// current credential is returned without a refresh call; if no refresh
    /// credential is held, [`Recovery::Unavailable`]; else this caller
    /// performs the refresh.
    ///
    /// # Errors
    ///
    /// Returns the [`RefreshError`] of the shared refresh. The session has
    /// been logged out by then.
    pub async fn recover(&self, failed_authorization: Option<&str>) -> Result<Recovery, RefreshError> {
        let mut slot = self.in_flight.lock().await;

        if let Some(rx) = slot.as_ref().filter(|rx| Self::is_pending(rx)) {
            let rx = rx.clone();
            drop(slot);
            debug!("joining refresh in flight");
            return Self::follow(rx).await.map(Recovery::Refreshed);
        }

        let snapshot = self.session.snapshot().await;
        if let Some(access) = snapshot.access
            && failed_authorization != Some(access.bearer().as_str())
        {
            debug!("access credential changed since the call was sent");
            return Ok(Recovery::Current(access));
        }
        let Some(refresh) = snapshot.refresh else {
            debug!("no refresh credential, cannot recover");
            return Ok(Recovery::Unavailable);
        };

        let (tx, rx) = watch::channel(None);
        *slot = Some(rx.clone());
        drop(slot);

        let outcome = self.perform_refresh(&refresh).await;
        if tx.send(Some(outcome.clone())).is_err() {
            debug!("no callers waiting on refresh");
        }
        self.release(&rx).await;

        outcome.map(Recovery::Refreshed)
    }

    /// Empties the slot if it still holds `own`; a later leader may have
    /// replaced it already.
    async fn release(&self, own: &watch::Receiver<Outcome>) {
        let mut slot = self.in_flight.lock().await;
        if slot.as_ref().is_some_and(|rx| rx.same_channel(own)) {
            *slot = None;
        }
    }

    /// A slot is pending while its leader is alive and has not finished.
    fn is_pending(rx: &watch::Receiver<Outcome>) -> bool {
        rx.has_changed().is_ok() && rx.borrow().is_none()
    }

    async fn follow(mut rx: watch::Receiver<Outcome>) -> Result<Token, RefreshError> {
        match rx.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone().unwrap_or(Err(RefreshError::Abandoned)),
            Err(_) => Err(RefreshError::Abandoned),
        }
    }

    async fn perform_refresh(&self, refresh: &Token) -> Result<Token, RefreshError> {
        info!(refresh = %refresh.preview(), "refreshing session credentials");
        let result = match self.exchange(refresh).await {
            Ok(credentials) => {
                let access = credentials.access.clone();
                self.session
                    .store_refreshed(credentials)
                    .await
                    .map(|()| access)
                    .map_err(|e| RefreshError::Storage(e.to_string()))
            }
            Err(e) => Err(e),
        };

        match &result {
            Ok(_) => info!("session credentials refreshed"),
            Err(e) => {
                warn!(error = %e, "credential refresh failed, ending session");
                self.session.logout().await;
            }
        }
        result
    }

    async fn exchange(&self, refresh: &Token) -> Result<CredentialPair, RefreshError> {
        let request = ApiRequest::new(HttpMethod::Post, self.refresh_path.as_str())
            .with_header(REFRESH_TOKEN, refresh.as_str());
        let response = self.transport.send(&request).await?;
        if !response.is_success() {
            return Err(RefreshError::Rejected {
                status: response.status,
            });
        }

        let access = response
            .headers
            .get(AUTHORIZATION)
            .map(|value| value.strip_prefix("Bearer ").unwrap_or(value))
            .and_then(|value| Token::new(value.trim()).ok());
        let refresh = response
            .headers
            .get(REFRESH_TOKEN)
            .and_then(|value| Token::new(value.trim()).ok());

        match (access, refresh) {
            (Some(access), Some(refresh)) => Ok(CredentialPair::new(access, refresh)),
            (None, Some(_)) => Err(RefreshError::Incomplete {
                missing: "access".to_string(),
            }),
            (Some(_), None) => Err(RefreshError::Incomplete {
                missing: "refresh".to_string(),
            }),
            (None, None) => Err(RefreshError::Incomplete {
                missing: "access and refresh".to_string(),
            }),
        }
    }
}

impl<T: ?Sized, S> std::fmt::Debug for RefreshCoordinator<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("refresh_path", &self.refresh_path)
            .finish_non_exhaustive()
    }
}
