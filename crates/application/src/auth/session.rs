//! Authentication state holder.
//!
//! `AuthSession` owns the credential pair and the identity claims derived
//! from the access credential, and mirrors the pair into a
//! [`SessionStorage`] so a restarted process can pick the session back up.

use std::collections::BTreeMap;

use keystone_domain::auth::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use keystone_domain::{
    CachedProfile, CredentialPair, DecodePolicy, GuardDecision, IdentityClaims, RouteGuard,
    RouteMeta, SessionRecord, Token, decode_claims,
};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{SessionError, SessionResult};
use crate::ports::{SessionStorage, StorageError};

/// Point-in-time copy of the session state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Current access credential.
    pub access: Option<Token>,
    /// Current refresh credential.
    pub refresh: Option<Token>,
    /// Claims decoded from `access`.
    pub claims: Option<IdentityClaims>,
}

impl SessionSnapshot {
    /// Returns true if both credentials are held.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.access.is_some() && self.refresh.is_some()
    }
}

/// The process-wide authentication session.
///
/// Construct one at startup, call [`AuthSession::initialize`] before the
/// first API call, and share it by `Arc` with the gateway and with
/// whatever reads identity.
#[derive(Debug)]
pub struct AuthSession<S> {
    storage: S,
    policy: DecodePolicy,
    state: RwLock<SessionSnapshot>,
}

impl<S: SessionStorage> AuthSession<S> {
    /// Creates an unauthenticated session using the strict decode policy.
    pub fn new(storage: S) -> Self {
        Self::with_policy(storage, DecodePolicy::default())
    }

    /// Creates an unauthenticated session with an explicit decode policy.
    pub fn with_policy(storage: S, policy: DecodePolicy) -> Self {
        Self {
            storage,
            policy,
            state: RwLock::new(SessionSnapshot::default()),
        }
    }

    /// Returns the decode policy in effect.
    #[must_use]
    pub const fn policy(&self) -> DecodePolicy {
        self.policy
    }

    /// Returns the backing storage.
    #[must_use]
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    /// Startup entry point: restores any persisted session and logs the
    /// outcome. Returns true if a session was restored.
    pub async fn initialize(&self) -> bool {
        let restored = self.restore().await;
        if restored {
            info!("restored persisted session");
        } else {
            info!("no persisted session, starting unauthenticated");
        }
        restored
    }

    /// Seeds in-memory state from the persisted record.
    ///
    /// Missing or unreadable storage is treated as "no prior session" and
    /// never raises. Returns true if a session was restored.
    pub async fn restore(&self) -> bool {
        let record = match self.read_record().await {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "session storage unreadable, treating as no prior session");
                None
            }
        };

        let mut state = self.state.write().await;
        *state = SessionSnapshot::default();

        let Some(record) = record else {
            debug!("no persisted credential pair");
            return false;
        };

        let claims = match decode_claims(&record.credentials.access) {
            Ok(claims) => Some(claims),
            Err(e) if self.policy.accepts_undecodable() => {
                warn!(error = %e, "restored access credential carries no readable claims");
                None
            }
            Err(e) => {
                warn!(error = %e, "discarding persisted session with undecodable access credential");
                self.clear_record().await;
                return false;
            }
        };

        state.access = Some(record.credentials.access);
        state.refresh = Some(record.credentials.refresh);
        state.claims = claims;
        true
    }

    /// Replaces the credential pair, recomputes claims and persists both
    /// credentials.
    ///
    /// Under [`DecodePolicy::Strict`] an undecodable access credential
    /// rejects the login and nothing changes. Under
    /// [`DecodePolicy::Lenient`] the pair is stored without claims and the
    /// decode error is still returned.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Decode`] for an undecodable access credential
    /// and [`SessionError::Storage`] if the record cannot be written; in the
    /// latter case the in-memory state is unchanged.
    pub async fn login(&self, credentials: CredentialPair) -> SessionResult<IdentityClaims> {
        let decoded = decode_claims(&credentials.access);
        if let Err(e) = &decoded {
            if !self.policy.accepts_undecodable() {
                warn!(error = %e, "rejecting login with undecodable access credential");
                return Err(SessionError::Decode(e.clone()));
            }
            warn!(error = %e, "accepting login without readable claims");
        }

        let claims = decoded.as_ref().ok().cloned();
        let mut state = self.state.write().await;
        self.persist(
            vec![
                (ACCESS_TOKEN_KEY, credentials.access.as_str().to_string()),
                (REFRESH_TOKEN_KEY, credentials.refresh.as_str().to_string()),
            ],
            claims.as_ref(),
        )
        .await?;
        state.access = Some(credentials.access);
        state.refresh = Some(credentials.refresh);
        state.claims = claims;
        drop(state);

        let claims = decoded?;
        info!(subject = %claims.subject, role = %claims.role, "logged in");
        Ok(claims)
    }

    /// Clears the credential pair and claims and deletes the persisted
    /// record. Always succeeds; storage failures are logged.
    pub async fn logout(&self) {
        let mut state = self.state.write().await;
        *state = SessionSnapshot::default();
        self.clear_record().await;
        drop(state);
        info!("logged out");
    }

    /// Clears in-memory state without touching storage, for process
    /// shutdown.
    pub async fn teardown(&self) {
        *self.state.write().await = SessionSnapshot::default();
        debug!("session torn down");
    }

    /// Replaces the access credential only, persisting it together with
    /// the profile fields of its recomputed claims.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Storage`] if the value cannot be persisted.
    pub async fn set_access_credential(&self, token: Token) -> SessionResult<()> {
        let claims = Self::readable_claims(&token);
        let mut state = self.state.write().await;
        self.persist(
            vec![(ACCESS_TOKEN_KEY, token.as_str().to_string())],
            claims.as_ref(),
        )
        .await?;
        state.access = Some(token);
        state.claims = claims;
        Ok(())
    }

    /// Replaces the refresh credential only, persisting it.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Storage`] if the value cannot be persisted.
    pub async fn set_refresh_credential(&self, token: Token) -> SessionResult<()> {
        let mut state = self.state.write().await;
        self.storage
            .set_item(REFRESH_TOKEN_KEY, token.as_str())
            .await?;
        state.refresh = Some(token);
        Ok(())
    }

    /// Applies a refreshed pair as one update, so no reader observes the
    /// new access credential next to the old refresh credential.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Storage`] if the pair cannot be persisted;
    /// the in-memory state is then unchanged.
    pub async fn store_refreshed(&self, credentials: CredentialPair) -> SessionResult<()> {
        let claims = Self::readable_claims(&credentials.access);
        let mut state = self.state.write().await;
        self.persist(
            vec![
                (ACCESS_TOKEN_KEY, credentials.access.as_str().to_string()),
                (REFRESH_TOKEN_KEY, credentials.refresh.as_str().to_string()),
            ],
            claims.as_ref(),
        )
        .await?;
        state.access = Some(credentials.access);
        state.refresh = Some(credentials.refresh);
        state.claims = claims;
        debug!("stored refreshed credential pair");
        Ok(())
    }

    /// Returns true iff claims are present and the role contains
    /// `required_role`. Never fails; false when unauthenticated.
    pub async fn is_authorized(&self, required_role: &str) -> bool {
        self.state
            .read()
            .await
            .claims
            .as_ref()
            .is_some_and(|claims| claims.has_role(required_role))
    }

    /// Runs the navigation guard against the current session.
    pub async fn check_route(
        &self,
        guard: &RouteGuard,
        path: &str,
        route: RouteMeta,
    ) -> GuardDecision {
        let has_access = self.state.read().await.access.is_some();
        guard.check(path, route, has_access)
    }

    /// Returns the current access credential.
    pub async fn access_credential(&self) -> Option<Token> {
        self.state.read().await.access.clone()
    }

    /// Returns the current refresh credential.
    pub async fn refresh_credential(&self) -> Option<Token> {
        self.state.read().await.refresh.clone()
    }

    /// Returns the current identity claims.
    pub async fn claims(&self) -> Option<IdentityClaims> {
        self.state.read().await.claims.clone()
    }

    /// Returns true if both credentials are held.
    pub async fn is_authenticated(&self) -> bool {
        self.state.read().await.is_authenticated()
    }

    /// Returns a copy of the whole state.
    pub async fn snapshot(&self) -> SessionSnapshot {
        self.state.read().await.clone()
    }

    fn readable_claims(token: &Token) -> Option<IdentityClaims> {
        match decode_claims(token) {
            Ok(claims) => Some(claims),
            Err(e) => {
                warn!(error = %e, "new access credential carries no readable claims");
                None
            }
        }
    }

    async fn read_record(&self) -> Result<Option<SessionRecord>, StorageError> {
        let mut values = BTreeMap::new();
        for key in SessionRecord::KEYS {
            if let Some(value) = self.storage.get_item(key).await? {
                values.insert(key, value);
            }
        }
        Ok(SessionRecord::from_entries(|key| values.get(key).cloned()))
    }

    /// Writes credential entries and the profile cache derived from
    /// `claims`. Profile fields the claims lack are removed.
    async fn persist(
        &self,
        mut entries: Vec<(&'static str, String)>,
        claims: Option<&IdentityClaims>,
    ) -> Result<(), StorageError> {
        let profile = claims.map(CachedProfile::from_claims).unwrap_or_default();
        entries.extend(profile.entries());
        self.storage.set_items(&entries).await?;

        let stale = profile.absent_keys();
        if !stale.is_empty() {
            self.storage.remove_items(&stale).await?;
        }
        Ok(())
    }

    async fn clear_record(&self) {
        if let Err(e) = self.storage.remove_items(&SessionRecord::KEYS).await {
            warn!(error = %e, "failed to delete persisted session");
        }
    }
}
