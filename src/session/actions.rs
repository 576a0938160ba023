//! ActionMediator: user-initiated session operations.
//!
//! Each operation calls the provider and, where the operation has a local
//! effect, writes the outcome into the store. Writes are skipped once the
//! owning instance has been torn down, so a result that arrives late never
//! lands in a discarded store.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{AuthError, Result};
use crate::options::{SessionOptions, SessionPhase, SignOutPolicy};
use crate::provider::AuthProvider;
use crate::store::SessionStore;
use crate::types::{AccessToken, OAuthProvider, PasswordCredentials, SignUpParams, User};

pub struct ActionMediator {
    provider: Arc<dyn AuthProvider>,
    store: Arc<SessionStore>,
    options: Arc<SessionOptions>,
}

impl ActionMediator {
    pub fn new(
        provider: Arc<dyn AuthProvider>,
        store: Arc<SessionStore>,
        options: Arc<SessionOptions>,
    ) -> Self {
        Self {
            provider,
            store,
            options,
        }
    }

    /// Sign in with e-mail and password.
    ///
    /// On success the returned user replaces the current one. On failure the
    /// provider error is returned and the store is left untouched, so an
    /// existing session survives a bad attempt.
    pub async fn sign_in_with_password(
        &self,
        credentials: &PasswordCredentials,
    ) -> Result<Option<User>> {
        self.ensure_live()?;
        match self.provider.sign_in_with_password(credentials).await {
            Ok(user) => {
                if let Some(user) = &user {
                    self.commit("sign_in_with_password", Some(user.clone()));
                }
                Ok(user)
            }
            Err(err) => {
                debug!(email = %credentials.email, error = %err, "password sign-in rejected");
                Err(err.into())
            }
        }
    }

    /// Register and, when the backend opens a session right away, sign in.
    pub async fn sign_up_with_password(&self, params: &SignUpParams) -> Result<Option<User>> {
        self.ensure_live()?;
        match self.provider.sign_up_with_password(params).await {
            Ok(user) => {
                match &user {
                    Some(user) => self.commit("sign_up_with_password", Some(user.clone())),
                    None => debug!(email = %params.email, "sign-up accepted without session"),
                }
                Ok(user)
            }
            Err(err) => {
                debug!(email = %params.email, error = %err, "sign-up rejected");
                Err(err.into())
            }
        }
    }

    /// Start an OAuth flow. The session arrives later through the
    /// synchronizer's subscription; nothing is written here.
    pub async fn sign_in_with_oauth(&self, provider: OAuthProvider) -> Result<()> {
        self.ensure_live()?;
        let config = self.options.oauth_config();
        self.provider
            .sign_in_with_oauth(provider, &config)
            .await
            .map_err(|err| {
                warn!(%provider, error = %err, "OAuth sign-in failed to start");
                AuthError::from(err)
            })
    }

    pub async fn sign_out(&self) -> Result<()> {
        self.ensure_live()?;
        match self.options.sign_out_policy {
            SignOutPolicy::Confirmed => {
                if let Err(err) = self.provider.sign_out().await {
                    warn!(error = %err, "sign-out failed; keeping local session");
                    return Err(err.into());
                }
                self.commit("sign_out", None);
                Ok(())
            }
            SignOutPolicy::Optimistic => {
                self.commit("sign_out", None);
                if let Err(err) = self.provider.sign_out().await {
                    warn!(error = %err, "sign-out failed after local session was cleared");
                    self.options.report(SessionPhase::SignOut, &err);
                    return Err(err.into());
                }
                Ok(())
            }
        }
    }

    /// Fresh bearer token from the provider. Never cached; `Ok(None)` when
    /// there is no session.
    pub async fn get_access_token(&self) -> Result<Option<AccessToken>> {
        self.ensure_live()?;
        let session = self.provider.get_session().await?;
        Ok(session.map(|s| s.access_token))
    }

    fn ensure_live(&self) -> Result<()> {
        if self.store.is_open() {
            Ok(())
        } else {
            Err(AuthError::Unmounted)
        }
    }

    fn commit(&self, op: &'static str, user: Option<User>) {
        if !self.store.replace_user(user) {
            debug!(op, "instance torn down while action was in flight; result discarded");
        }
    }
}
