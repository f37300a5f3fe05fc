//! # Session Context
//!
//! Sign-in state for one client, shared by reference (`Arc<SessionContext>`).
//!
//! ```text
//! Uninitialized ──initialize()──▶ Restoring ──▶ Authenticated
//!                                           └─▶ Anonymous
//! ```
//!
//! Restoring from storage is optimistic: a saved user and token put the
//! session in `Authenticated` before the server has seen the token. A spawned
//! task then calls `/api/auth/verify` and signs out if that fails.
//!
//! State lives in a `watch` channel so resources can follow it.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::client::api::ApiClient;
use crate::client::error::ApiError;
use crate::client::storage::{DurableStorage, StorageError, TOKEN_KEY, USER_KEY};
use crate::types::{LoginRequest, Role, UserView};

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Uninitialized,
    Restoring,
    Authenticated { user: UserView, token: String },
    Anonymous,
}

impl SessionState {
    pub fn user(&self) -> Option<&UserView> {
        match self {
            SessionState::Authenticated { user, .. } => Some(user),
            _ => None,
        }
    }

    pub fn token(&self) -> Option<&str> {
        match self {
            SessionState::Authenticated { token, .. } => Some(token),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated { .. })
    }
}

pub struct SessionContext {
    api: Arc<ApiClient>,
    storage: Arc<dyn DurableStorage>,
    state: watch::Sender<SessionState>,
}

impl SessionContext {
    pub fn new(api: Arc<ApiClient>, storage: Arc<dyn DurableStorage>) -> Arc<Self> {
        let (state, _) = watch::channel(SessionState::Uninitialized);
        Arc::new(Self { api, storage, state })
    }

    pub fn api(&self) -> &Arc<ApiClient> {
        &self.api
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn user(&self) -> Option<UserView> {
        self.state.borrow().user().cloned()
    }

    pub fn token(&self) -> Option<String> {
        self.state.borrow().token().map(str::to_string)
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    /// Restores a saved session.
    ///
    /// Returns the verification task when a session was restored; the state
    /// is already `Authenticated` by the time this returns. Must be called
    /// inside a tokio runtime.
    pub fn initialize(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        self.state.send_replace(SessionState::Restoring);

        let Some((user, token)) = self.read_saved() else {
            self.state.send_replace(SessionState::Anonymous);
            return None;
        };

        tracing::info!("🔑 Restored session for {}", user.email);
        self.api.set_token(Some(token.clone()));
        self.state.send_replace(SessionState::Authenticated {
            user,
            token: token.clone(),
        });

        let session = Arc::clone(self);
        Some(tokio::spawn(async move { session.verify_restored(token).await }))
    }

    fn read_saved(&self) -> Option<(UserView, String)> {
        let read = |key: &str| match self.storage.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Failed to read {} from storage: {}", key, e);
                None
            }
        };
        let token = read(TOKEN_KEY).filter(|t| !t.is_empty());
        let raw_user = read(USER_KEY);
        match (raw_user, token) {
            (Some(raw), Some(token)) => match serde_json::from_str::<UserView>(&raw) {
                Ok(user) => Some((user, token)),
                Err(e) => {
                    tracing::warn!("Discarding unreadable saved user: {}", e);
                    self.clear_storage();
                    None
                }
            },
            _ => None,
        }
    }

    async fn verify_restored(&self, token: String) {
        match self.api.verify().await {
            Ok(current) => {
                let user = current.user;
                let refreshed = self.state.send_if_modified(|state| match state {
                    SessionState::Authenticated {
                        user: cached,
                        token: t,
                    } if *t == token && *cached != user => {
                        *cached = user.clone();
                        true
                    }
                    _ => false,
                });
                if refreshed {
                    self.persist_user(&user);
                }
                tracing::debug!("Restored session verified");
            }
            Err(e) => {
                // A login that happened meanwhile owns the session now.
                if self.token().as_deref() == Some(token.as_str()) {
                    tracing::warn!("Saved session rejected ({}), signing out", e);
                    self.logout();
                }
            }
        }
    }

    /// Signs in and persists the session. A failed attempt signs out any
    /// previous session first.
    pub async fn login(
        &self,
        email: &str,
        password: Option<&str>,
        role: Role,
    ) -> Result<UserView, ApiError> {
        let request = LoginRequest::new(email, role, password.map(str::to_string));
        let response = match self.api.login(&request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Login failed for {}: {}", email, e);
                self.logout();
                return Err(e);
            }
        };

        self.persist_user(&response.user);
        if let Err(e) = self.storage.set(TOKEN_KEY, &response.access_token) {
            tracing::warn!("Failed to persist token: {}", e);
        }
        self.api.set_token(Some(response.access_token.clone()));
        self.state.send_replace(SessionState::Authenticated {
            user: response.user.clone(),
            token: response.access_token,
        });
        tracing::info!("✅ Signed in as {} ({})", response.user.email, response.user.role);
        Ok(response.user)
    }

    /// Forgets the session locally. Safe to call repeatedly.
    pub fn logout(&self) {
        self.api.set_token(None);
        self.clear_storage();
        self.state.send_replace(SessionState::Anonymous);
    }

    /// Tells the server to revoke the token, then forgets the session. The
    /// local sign-out happens even when the server call fails.
    pub async fn sign_out(&self) {
        if self.is_authenticated() {
            if let Err(e) = self.api.logout().await {
                tracing::debug!("Server logout failed: {}", e);
            }
        }
        self.logout();
    }

    /// Submits a face image. On success the cached user is marked enrolled.
    pub async fn enroll_face(&self, image: &str) -> bool {
        match self.api.enroll_face(image).await {
            Ok(enrollment) => {
                let mut updated = None;
                self.state.send_if_modified(|state| match state {
                    SessionState::Authenticated { user, .. }
                        if user.face_enrolled != enrollment.face_enrolled =>
                    {
                        user.face_enrolled = enrollment.face_enrolled;
                        updated = Some(user.clone());
                        true
                    }
                    _ => false,
                });
                if let Some(user) = updated {
                    self.persist_user(&user);
                }
                true
            }
            Err(e) => {
                tracing::warn!("Face enrollment failed: {}", e);
                false
            }
        }
    }

    fn persist_user(&self, user: &UserView) {
        let result = serde_json::to_string(user)
            .map_err(StorageError::from)
            .and_then(|raw| self.storage.set(USER_KEY, &raw));
        if let Err(e) = result {
            tracing::warn!("Failed to persist user: {}", e);
        }
    }

    fn clear_storage(&self) {
        for key in [USER_KEY, TOKEN_KEY] {
            if let Err(e) = self.storage.remove(key) {
                tracing::warn!("Failed to clear {} from storage: {}", key, e);
            }
        }
    }
}
