//! The identity backend seam.
//!
//! `AuthProvider` is implemented outside the session core (hosted backend
//! SDK wrapper, in-memory backend for tests). The session core only ever talks
//! to an injected `Arc<dyn AuthProvider>`.

pub mod hosted;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::subscription::Unsubscribe;
use crate::types::{OAuthConfig, OAuthProvider, PasswordCredentials, Session, SignUpParams, User};

pub use hosted::{HostedSession, HostedUser};
pub use memory::{MemoryAuthProvider, ProviderOp};

/// Callback receiving the current user on every backend-side session change.
pub type AuthStateCallback = Arc<dyn Fn(Option<User>) + Send + Sync>;

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Capability offered by an identity backend.
///
/// "No user" and "no session" are `Ok(None)`, never errors.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Start an OAuth flow. Completion arrives out-of-band through
    /// `on_auth_state_change`.
    async fn sign_in_with_oauth(
        &self,
        provider: OAuthProvider,
        config: &OAuthConfig,
    ) -> ProviderResult<()>;

    async fn sign_in_with_password(
        &self,
        credentials: &PasswordCredentials,
    ) -> ProviderResult<Option<User>>;

    /// Register a new account. `Ok(None)` when the backend accepted the
    /// sign-up but did not open a session.
    async fn sign_up_with_password(&self, params: &SignUpParams) -> ProviderResult<Option<User>>;

    async fn sign_out(&self) -> ProviderResult<()>;

    async fn get_user(&self) -> ProviderResult<Option<User>>;

    async fn get_session(&self) -> ProviderResult<Option<Session>>;

    /// Register for session changes. The returned closure cancels the
    /// registration.
    fn on_auth_state_change(&self, callback: AuthStateCallback) -> Unsubscribe;
}
