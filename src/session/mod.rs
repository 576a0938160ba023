//! AuthSession: the consumer-facing facade over one mounted session.
//!
//! Mounting wires an injected provider to a fresh store: the synchronizer
//! subscribes immediately, `load` performs the initial lookup, and the action
//! mediator handles sign-in/out and token requests. The facade adds no state
//! of its own.
//!
//! ```ignore
//! let session = AuthSession::start(provider, SessionOptions::default()).await;
//! let _sub = session.subscribe(|state| render(state));
//! session.sign_in_with_password(&PasswordCredentials::new(email, password)).await?;
//! ```

pub mod actions;
pub mod context;
pub mod synchronizer;

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::error::Result;
use crate::options::SessionOptions;
use crate::provider::AuthProvider;
use crate::store::SessionStore;
use crate::subscription::Subscription;
use crate::types::{
    AccessToken, OAuthProvider, PasswordCredentials, SessionState, SignUpParams, User,
};

pub use actions::ActionMediator;
pub use context::AuthContext;
pub use synchronizer::SessionSynchronizer;

struct SessionInner {
    store: Arc<SessionStore>,
    synchronizer: SessionSynchronizer,
    actions: ActionMediator,
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        self.synchronizer.teardown();
    }
}

/// Handle to a mounted session. Clones share the same instance; the
/// instance is torn down by `unmount` or when the last handle is dropped.
#[derive(Clone)]
pub struct AuthSession {
    inner: Arc<SessionInner>,
}

impl AuthSession {
    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Create the store and subscribe to the provider, without the initial
    /// lookup. The state stays `{user: None, is_loading: true}` until the
    /// provider pushes a change or `load` resolves. Use `start` unless the
    /// lookup has to be driven separately.
    pub fn mount(provider: Arc<dyn AuthProvider>, options: SessionOptions) -> Self {
        let options = Arc::new(options);
        let store = Arc::new(SessionStore::new());
        let synchronizer =
            SessionSynchronizer::start(Arc::clone(&provider), Arc::clone(&store), Arc::clone(&options));
        let actions = ActionMediator::new(provider, Arc::clone(&store), options);
        debug!("auth session mounted");

        Self {
            inner: Arc::new(SessionInner {
                store,
                synchronizer,
                actions,
            }),
        }
    }

    /// Create a session: `mount` followed by the initial lookup. This is the
    /// usual entry point. A failed initial lookup has already been
    /// logged and reported through `on_error`; the session is returned
    /// either way, no longer loading.
    pub async fn start(provider: Arc<dyn AuthProvider>, options: SessionOptions) -> Self {
        let session = Self::mount(provider, options);
        let _ = session.load().await;
        session
    }

    /// Initial user lookup. Only the first call queries the provider.
    pub async fn load(&self) -> Result<()> {
        self.inner.synchronizer.load().await
    }

    /// Release the provider subscription and stop all further state writes.
    /// Idempotent.
    pub fn unmount(&self) {
        if self.inner.synchronizer.teardown() {
            debug!("auth session unmounted");
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.store.is_open()
    }

    // ========================================================================
    // View
    // ========================================================================

    pub fn user(&self) -> Option<User> {
        self.inner.store.user()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.store.is_loading()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.store.is_authenticated()
    }

    pub fn state(&self) -> SessionState {
        self.inner.store.snapshot()
    }

    /// Listener called with the full snapshot after every state change.
    pub fn subscribe(&self, listener: impl Fn(&SessionState) + Send + Sync + 'static) -> Subscription {
        self.inner.store.subscribe(listener)
    }

    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.inner.store.watch()
    }

    /// Resolves with the first snapshot that is no longer loading, or
    /// `AuthError::Unmounted` if the session is unmounted before that.
    pub async fn loaded(&self) -> Result<SessionState> {
        self.inner.store.loaded().await
    }

    // ========================================================================
    // Actions
    // ========================================================================

    pub async fn sign_in_with_password(
        &self,
        credentials: &PasswordCredentials,
    ) -> Result<Option<User>> {
        self.inner.actions.sign_in_with_password(credentials).await
    }

    pub async fn sign_up_with_password(&self, params: &SignUpParams) -> Result<Option<User>> {
        self.inner.actions.sign_up_with_password(params).await
    }

    pub async fn sign_in_with_oauth(&self, provider: OAuthProvider) -> Result<()> {
        self.inner.actions.sign_in_with_oauth(provider).await
    }

    pub async fn sign_out(&self) -> Result<()> {
        self.inner.actions.sign_out().await
    }

    pub async fn get_access_token(&self) -> Result<Option<AccessToken>> {
        self.inner.actions.get_access_token().await
    }

    #[cfg(test)]
    pub(crate) fn is_subscribed(&self) -> bool {
        self.inner.synchronizer.is_subscribed()
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("state", &self.state())
            .field("mounted", &self.is_mounted())
            .finish()
    }
}
