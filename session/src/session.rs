//! Session state machine.
//!
//! SYSTEM CONTEXT
//! ==============
//! One `SessionStore` is built per client root and shared by reference with
//! every component that needs to know who is signed in. Components observe it
//! through `subscribe()`; only the four operations below mutate it.
//!
//! ```text
//! Unknown ──check()──▶ Checking ──profile ok────────────▶ Authenticated
//!    │                    │      ──profile err, cache ok─▶ Authenticated
//!    │                    └───── profile err, no cache ──▶ Unauthenticated
//!    └──no token──────────────────────────────────────────▶ Unauthenticated
//! login()/register() ─▶ Authenticated | Unauthenticated
//! logout() ─▶ Unauthenticated + hard reload
//! ```
//!
//! CONCURRENCY
//! ===========
//! Every check start and every login/logout commit bumps an epoch under a
//! short synchronous lock, and storage writes happen under that same lock. A
//! `check()` remembers the epoch it started at and discards its profile
//! response if anything else started or committed in the meantime, so a slow
//! response cannot resurrect a session that `logout()` already cleared, and
//! an older check cannot overwrite a newer one.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::AuthApi;
use crate::app::Navigator;
use crate::error::SessionError;
use crate::storage::{StorageError, TOKEN_KEY, TokenStore, USER_KEY};
use crate::types::{LoginData, RegisterData, User, parse_cached_user};

// =============================================================================
// STATE
// =============================================================================

/// Where the session is in its check cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthStatus {
    /// Initial state before the first check has run.
    Unknown,
    /// A token is present and the profile fetch is in flight.
    Checking,
    Authenticated(User),
    Unauthenticated,
}

impl AuthStatus {
    fn label(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Checking => "checking",
            Self::Authenticated(_) => "authenticated",
            Self::Unauthenticated => "unauthenticated",
        }
    }
}

/// Snapshot of the session as seen by components.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthState {
    pub status: AuthStatus,
    /// True while a check/login/register operation is in flight.
    pub loading: bool,
}

impl Default for AuthState {
    fn default() -> Self {
        Self { status: AuthStatus::Unknown, loading: true }
    }
}

impl AuthState {
    #[must_use]
    pub fn user(&self) -> Option<&User> {
        match &self.status {
            AuthStatus::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self.status, AuthStatus::Authenticated(_))
    }
}

// =============================================================================
// STORE
// =============================================================================

pub struct SessionStore {
    storage: Arc<dyn TokenStore>,
    api: Arc<dyn AuthApi>,
    navigator: Arc<dyn Navigator>,
    state: watch::Sender<AuthState>,
    epoch: Mutex<u64>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Build a store in the `Unknown` state. Call [`SessionStore::check`] to
    /// resolve it.
    #[must_use]
    pub fn new(storage: Arc<dyn TokenStore>, api: Arc<dyn AuthApi>, navigator: Arc<dyn Navigator>) -> Self {
        let (state, _) = watch::channel(AuthState::default());
        Self { storage, api, navigator, state, epoch: Mutex::new(0) }
    }

    /// Current state snapshot.
    #[must_use]
    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    /// Register for state change notifications.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// The stored bearer token, if any. Unreadable storage counts as none.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        match self.storage.get(TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                warn!(error = %e, "token store unreadable");
                None
            }
        }
    }

    /// The stored bearer token for an authenticated request.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::MissingToken`] when nobody is logged in.
    pub fn require_token(&self) -> Result<String, SessionError> {
        self.token().ok_or(SessionError::MissingToken)
    }

    /// Resolve the session from storage and the profile endpoint.
    ///
    /// Never fails: profile errors fall back to the cached user, and an
    /// unusable cache logs the session out. When checks overlap, the one that
    /// started last wins. If another tab swaps the token while the profile is
    /// in flight, the check starts over with the new token.
    pub async fn check(&self) -> AuthState {
        loop {
            let (started, token) = {
                let mut epoch = self.lock_epoch();
                *epoch += 1;
                let Some(token) = self.token() else {
                    debug!("no token in storage");
                    self.transition(AuthStatus::Unauthenticated, false);
                    return self.state();
                };
                self.transition(AuthStatus::Checking, true);
                (*epoch, token)
            };

            let fetched = self.api.fetch_profile(&token).await;
            if let Some(state) = self.finish_check(started, &token, fetched) {
                return state;
            }
        }
    }

    /// Commit a profile response. `None` means the token moved underneath the
    /// check and it has to run again.
    fn finish_check(&self, started: u64, token: &str, fetched: Result<User, SessionError>) -> Option<AuthState> {
        let epoch = self.lock_epoch();
        if *epoch != started {
            debug!("session check superseded; discarding profile response");
            return Some(self.state());
        }
        if self.token().as_deref() != Some(token) {
            debug!("token changed during session check; re-checking");
            return None;
        }

        let status = match fetched {
            Ok(user) => {
                if let Err(e) = self.write_user(&user) {
                    warn!(error = %e, "failed to cache refreshed user");
                }
                debug!(user_id = %user.id, "profile refreshed");
                AuthStatus::Authenticated(user)
            }
            Err(err) => {
                warn!(error = %err, "profile refresh failed; trying cached user");
                if let Some(user) = self.cached_user() {
                    AuthStatus::Authenticated(user)
                } else {
                    self.clear_storage();
                    AuthStatus::Unauthenticated
                }
            }
        };
        self.transition(status, false);
        drop(epoch);
        Some(self.state())
    }

    /// Log in with email/phone and password.
    ///
    /// # Errors
    ///
    /// Returns the backend's credential error (or a transport/storage error).
    /// On any error the stored session is cleared.
    pub async fn login(&self, credentials: &LoginData) -> Result<User, SessionError> {
        self.set_loading(true);
        let outcome = self.resolve_login(credentials).await;

        let mut epoch = self.lock_epoch();
        *epoch += 1;
        let outcome = outcome.and_then(|(token, user)| {
            self.write_session(&token, &user)?;
            Ok(user)
        });
        match &outcome {
            Ok(user) => {
                info!(user_id = %user.id, "login succeeded");
                self.transition(AuthStatus::Authenticated(user.clone()), false);
            }
            Err(err) => {
                warn!(error = %err, "login failed");
                self.clear_storage();
                self.transition(AuthStatus::Unauthenticated, false);
            }
        }
        drop(epoch);
        outcome
    }

    /// Create an account, then log in with the same email and password.
    ///
    /// # Errors
    ///
    /// Returns the registration error (status left as before the call) or
    /// the error of the chained login.
    pub async fn register(&self, data: &RegisterData) -> Result<User, SessionError> {
        self.set_loading(true);
        let outcome = match self.api.register(data).await {
            Ok(response) => {
                info!(message = %response.message, "registration accepted; logging in");
                self.login(&data.login_data()).await
            }
            Err(err) => {
                warn!(error = %err, "registration failed");
                Err(err)
            }
        };
        self.set_loading(false);
        outcome
    }

    /// Clear the stored session and request a hard reload of the client.
    pub fn logout(&self) {
        let mut epoch = self.lock_epoch();
        *epoch += 1;
        self.clear_storage();
        self.transition(AuthStatus::Unauthenticated, false);
        drop(epoch);
        info!("logged out");
        self.navigator.hard_reload("/");
    }

    // -------------------------------------------------------------------------

    async fn resolve_login(&self, credentials: &LoginData) -> Result<(String, User), SessionError> {
        let response = self.api.login(credentials).await?;
        let token = response
            .token
            .ok_or_else(|| SessionError::Credential("Login failed: no token returned".to_owned()))?;
        let user = match response.user {
            Some(user) => user,
            None => self.api.fetch_profile(&token).await?,
        };
        Ok((token, user))
    }

    fn lock_epoch(&self) -> MutexGuard<'_, u64> {
        self.epoch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, status: AuthStatus, loading: bool) {
        self.state.send_modify(|state| {
            if state.status.label() != status.label() {
                debug!(from = state.status.label(), to = status.label(), "session transition");
            }
            state.status = status;
            state.loading = loading;
        });
    }

    fn set_loading(&self, loading: bool) {
        self.state.send_if_modified(|state| {
            let changed = state.loading != loading;
            state.loading = loading;
            changed
        });
    }

    fn cached_user(&self) -> Option<User> {
        match self.storage.get(USER_KEY) {
            Ok(Some(raw)) => {
                let user = parse_cached_user(&raw);
                if user.is_none() {
                    warn!("cached user is corrupt or incomplete");
                }
                user
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "cached user unreadable");
                None
            }
        }
    }

    fn write_user(&self, user: &User) -> Result<(), StorageError> {
        let raw = serde_json::to_string(user).map_err(|e| StorageError::Encode(e.to_string()))?;
        self.storage.set(USER_KEY, &raw)
    }

    fn write_session(&self, token: &str, user: &User) -> Result<(), StorageError> {
        self.storage.set(TOKEN_KEY, token)?;
        self.write_user(user)
    }

    fn clear_storage(&self) {
        for key in [TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.storage.remove(key) {
                warn!(key, error = %e, "failed to clear session key");
            }
        }
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
