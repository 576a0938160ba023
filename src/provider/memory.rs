//! MemoryAuthProvider: an in-process identity backend.
//!
//! Keeps an account registry and at most one active session in memory. Used
//! for tests, demos, and offline development. Besides the `AuthProvider`
//! surface it exposes the backend-side events the session core must cope
//! with: out-of-band OAuth completion, token rotation, expiry, and sign-out
//! from another tab. One-shot fault injection covers failure paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::{AuthProvider, AuthStateCallback, ProviderResult};
use crate::error::{ProviderError, ProviderErrorKind};
use crate::subscription::Unsubscribe;
use crate::types::{
    AccessToken, OAuthConfig, OAuthProvider, PasswordCredentials, Session, SignUpParams, User,
};

/// Default lifetime of an issued access token.
const DEFAULT_SESSION_TTL_SECS: i64 = 3600;

/// Provider operations, for fault injection and call accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderOp {
    SignInWithOAuth,
    SignInWithPassword,
    SignUpWithPassword,
    SignOut,
    GetUser,
    GetSession,
}

/// OAuth flow started but not yet completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOAuth {
    pub provider: OAuthProvider,
    pub redirect_url: Option<String>,
}

struct Account {
    user: User,
    password: String,
}

struct ActiveSession {
    user: User,
    token: AccessToken,
    expires_at: DateTime<Utc>,
}

impl ActiveSession {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Default)]
struct MemoryState {
    /// email → account
    accounts: HashMap<String, Account>,
    session: Option<ActiveSession>,
    pending_oauth: Option<PendingOAuth>,
    faults: HashMap<ProviderOp, ProviderError>,
    calls: HashMap<ProviderOp, usize>,
    require_email_confirmation: bool,
}

type ListenerList = Mutex<Vec<(u64, AuthStateCallback)>>;

pub struct MemoryAuthProvider {
    state: Mutex<MemoryState>,
    listeners: Arc<ListenerList>,
    next_listener_id: AtomicU64,
    session_ttl: Duration,
}

impl MemoryAuthProvider {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_listener_id: AtomicU64::new(1),
            session_ttl: Duration::seconds(DEFAULT_SESSION_TTL_SECS),
        }
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Add an account that can sign in with `password`.
    pub fn with_account(self, user: User, password: impl Into<String>) -> Self {
        self.register(user, password);
        self
    }

    pub fn register(&self, user: User, password: impl Into<String>) {
        let email = user.email.clone();
        self.state.lock().accounts.insert(
            email,
            Account {
                user,
                password: password.into(),
            },
        );
    }

    /// When set, password sign-ups create the account without a session.
    pub fn require_email_confirmation(&self, required: bool) {
        self.state.lock().require_email_confirmation = required;
    }

    // ========================================================================
    // Backend-side events
    // ========================================================================

    /// Install a session persisted from an earlier visit. No notification is
    /// sent; the client discovers it through its initial lookup.
    pub fn restore_session(&self, user: User) -> AccessToken {
        self.open_session(user)
    }

    /// Finish the pending OAuth flow (the redirect came back) and notify.
    pub fn complete_oauth(&self, user: User) -> AccessToken {
        self.state.lock().pending_oauth = None;
        let token = self.open_session(user.clone());
        self.emit(Some(user));
        token
    }

    /// Issue a new token for the active session and notify. Returns `None`
    /// when no session is active.
    pub fn rotate_token(&self) -> Option<AccessToken> {
        let (user, token) = {
            let mut state = self.state.lock();
            let session = state.session.as_mut()?;
            session.token = new_token();
            session.expires_at = Utc::now() + self.session_ttl;
            (session.user.clone(), session.token.clone())
        };
        self.emit(Some(user));
        Some(token)
    }

    /// Drop the active session (expiry, or sign-out in another tab) and notify.
    pub fn expire_session(&self) {
        self.state.lock().session = None;
        self.emit(None);
    }

    /// Make the next call of `op` fail with `error`.
    pub fn fail_next(&self, op: ProviderOp, error: ProviderError) {
        self.state.lock().faults.insert(op, error);
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    pub fn call_count(&self, op: ProviderOp) -> usize {
        self.state.lock().calls.get(&op).copied().unwrap_or(0)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn pending_oauth(&self) -> Option<PendingOAuth> {
        self.state.lock().pending_oauth.clone()
    }

    pub fn current_token(&self) -> Option<AccessToken> {
        self.state.lock().session.as_ref().map(|s| s.token.clone())
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Count the call and consume an injected fault, if any.
    fn begin(&self, op: ProviderOp) -> ProviderResult<()> {
        let mut state = self.state.lock();
        *state.calls.entry(op).or_insert(0) += 1;
        match state.faults.remove(&op) {
            Some(err) => {
                debug!(?op, error = %err, "memory provider injected fault");
                Err(err)
            }
            None => Ok(()),
        }
    }

    fn open_session(&self, user: User) -> AccessToken {
        let token = new_token();
        self.state.lock().session = Some(ActiveSession {
            user,
            token: token.clone(),
            expires_at: Utc::now() + self.session_ttl,
        });
        token
    }

    /// Live session, discarding it if it has expired.
    fn live_session<T>(&self, f: impl FnOnce(&ActiveSession) -> T) -> Option<T> {
        let mut state = self.state.lock();
        if state
            .session
            .as_ref()
            .is_some_and(|s| s.is_expired(Utc::now()))
        {
            state.session = None;
        }
        state.session.as_ref().map(f)
    }

    /// Notify listeners outside the listener lock.
    fn emit(&self, user: Option<User>) {
        let listeners: Vec<AuthStateCallback> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for listener in listeners {
            listener(user.clone());
        }
    }
}

impl Default for MemoryAuthProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn new_token() -> AccessToken {
    AccessToken::new(format!("mem_{}", Uuid::new_v4().simple()))
}

#[async_trait]
impl AuthProvider for MemoryAuthProvider {
    async fn sign_in_with_oauth(
        &self,
        provider: OAuthProvider,
        config: &OAuthConfig,
    ) -> ProviderResult<()> {
        self.begin(ProviderOp::SignInWithOAuth)?;
        self.state.lock().pending_oauth = Some(PendingOAuth {
            provider,
            redirect_url: config.redirect_url.clone(),
        });
        Ok(())
    }

    async fn sign_in_with_password(
        &self,
        credentials: &PasswordCredentials,
    ) -> ProviderResult<Option<User>> {
        self.begin(ProviderOp::SignInWithPassword)?;
        let user = {
            let state = self.state.lock();
            match state.accounts.get(&credentials.email) {
                Some(account) if account.password == credentials.password => account.user.clone(),
                _ => return Err(ProviderError::invalid_credentials()),
            }
        };
        self.open_session(user.clone());
        self.emit(Some(user.clone()));
        Ok(Some(user))
    }

    async fn sign_up_with_password(&self, params: &SignUpParams) -> ProviderResult<Option<User>> {
        self.begin(ProviderOp::SignUpWithPassword)?;
        let (user, confirm) = {
            let mut state = self.state.lock();
            if state.accounts.contains_key(&params.email) {
                return Err(ProviderError::with_kind(
                    "User already registered",
                    ProviderErrorKind::Rejected,
                )
                .with_code("user_already_exists"));
            }
            let user = User {
                id: Uuid::new_v4().to_string(),
                email: params.email.clone(),
                name: params.name.clone(),
                avatar_url: None,
            };
            state.accounts.insert(
                params.email.clone(),
                Account {
                    user: user.clone(),
                    password: params.password.clone(),
                },
            );
            (user, state.require_email_confirmation)
        };

        if confirm {
            return Ok(None);
        }
        self.open_session(user.clone());
        self.emit(Some(user.clone()));
        Ok(Some(user))
    }

    async fn sign_out(&self) -> ProviderResult<()> {
        self.begin(ProviderOp::SignOut)?;
        self.state.lock().session = None;
        self.emit(None);
        Ok(())
    }

    async fn get_user(&self) -> ProviderResult<Option<User>> {
        self.begin(ProviderOp::GetUser)?;
        Ok(self.live_session(|s| s.user.clone()))
    }

    async fn get_session(&self) -> ProviderResult<Option<Session>> {
        self.begin(ProviderOp::GetSession)?;
        Ok(self.live_session(|s| Session {
            access_token: s.token.clone(),
            expires_at: Some(s.expires_at),
        }))
    }

    fn on_auth_state_change(&self, callback: AuthStateCallback) -> Unsubscribe {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((id, callback));

        let registry: Weak<ListenerList> = Arc::downgrade(&self.listeners);
        Box::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.lock().retain(|(lid, _)| *lid != id);
            }
        })
    }
}
