//! AuthContext: where application code finds the mounted session.
//!
//! Holds at most one `AuthSession`. Reading it with nothing mounted is a
//! programming error and comes back as `AuthError::NotMounted` instead of a
//! silently empty view.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::AuthSession;
use crate::error::{AuthError, Result};
use crate::options::SessionOptions;
use crate::provider::AuthProvider;

#[derive(Default)]
pub struct AuthContext {
    slot: RwLock<Option<AuthSession>>,
}

impl AuthContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session with `AuthSession::start` and install it. The session
    /// has finished its initial lookup when this returns.
    pub async fn start(
        &self,
        provider: Arc<dyn AuthProvider>,
        options: SessionOptions,
    ) -> AuthSession {
        let session = AuthSession::start(provider, options).await;
        self.provide(session.clone());
        session
    }

    /// Install `session`. A previously provided session is unmounted, so only
    /// one provider subscription is live per context.
    ///
    /// A session created with `AuthSession::mount` keeps loading until its
    /// owner calls `load`; `start` does both steps.
    pub fn provide(&self, session: AuthSession) {
        let incoming = Arc::clone(&session.inner);
        let previous = self.slot.write().replace(session);
        if let Some(previous) = previous {
            if !Arc::ptr_eq(&previous.inner, &incoming) {
                debug!("replacing mounted auth session");
                previous.unmount();
            }
        }
    }

    /// The mounted session.
    ///
    /// # Errors
    /// `AuthError::NotMounted` when nothing was provided or the provided
    /// session has been unmounted.
    pub fn session(&self) -> Result<AuthSession> {
        match self.slot.read().as_ref() {
            Some(session) if session.is_mounted() => Ok(session.clone()),
            _ => Err(AuthError::NotMounted),
        }
    }

    /// Unmount and remove the session, if any.
    pub fn clear(&self) {
        let previous = self.slot.write().take();
        if let Some(previous) = previous {
            previous.unmount();
        }
    }

    pub fn is_provided(&self) -> bool {
        self.slot.read().as_ref().is_some_and(AuthSession::is_mounted)
    }
}
