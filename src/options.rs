//! Configuration for a mounted `AuthSession`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::types::OAuthConfig;

/// Path the OAuth partner redirects back to, relative to the app origin.
pub const DEFAULT_CALLBACK_PATH: &str = "/auth/callback";

/// When `sign_out` clears the local session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SignOutPolicy {
    /// Clear only after the provider confirmed the sign-out. On failure the
    /// local session stays as it was.
    #[default]
    Confirmed,
    /// Clear before calling the provider. A provider failure is still
    /// returned to the caller.
    Optimistic,
}

/// Which part of the session lifecycle an error event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    InitialLookup,
    /// Optimistic sign-out whose provider call failed after the local
    /// session was already cleared.
    SignOut,
}

/// Reported through `SessionOptions::on_error`; never thrown.
#[derive(Debug, Clone)]
pub struct SessionErrorEvent {
    pub phase: SessionPhase,
    pub error: String,
}

pub type SessionErrorCallback = Arc<dyn Fn(&SessionErrorEvent) + Send + Sync>;

/// Configuration for `AuthSession::mount`.
#[derive(Clone, Default)]
pub struct SessionOptions {
    /// Explicit OAuth redirect URL. Takes precedence over `app_origin`.
    pub redirect_url: Option<String>,
    /// Origin of the running app, e.g. `https://app.example.com`. Used to
    /// build `{origin}/auth/callback` when `redirect_url` is unset.
    pub app_origin: Option<String>,
    /// Default: `Confirmed`.
    pub sign_out_policy: SignOutPolicy,
    /// Upper bound for the initial user lookup (default: unbounded).
    pub initial_lookup_timeout: Option<Duration>,
    /// Called for background failures that have no caller to return to.
    pub on_error: Option<SessionErrorCallback>,
}

impl SessionOptions {
    /// Redirect target forwarded with OAuth sign-ins.
    pub fn oauth_config(&self) -> OAuthConfig {
        let redirect_url = self.redirect_url.clone().or_else(|| {
            self.app_origin.as_ref().map(|origin| {
                format!("{}{}", origin.trim_end_matches('/'), DEFAULT_CALLBACK_PATH)
            })
        });
        OAuthConfig { redirect_url }
    }

    pub(crate) fn report(&self, phase: SessionPhase, error: &dyn fmt::Display) {
        if let Some(on_error) = &self.on_error {
            on_error(&SessionErrorEvent {
                phase,
                error: error.to_string(),
            });
        }
    }
}

impl fmt::Debug for SessionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionOptions")
            .field("redirect_url", &self.redirect_url)
            .field("app_origin", &self.app_origin)
            .field("sign_out_policy", &self.sign_out_policy)
            .field("initial_lookup_timeout", &self.initial_lookup_timeout)
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}
